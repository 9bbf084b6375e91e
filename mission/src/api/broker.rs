//! Broker API - offers, decisions, risk feeds, payment and reports

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared_types::{
    AckResponse, DecisionRequest, DecisionResponse, NextOfferQuery, OfferResponse, ReportAck,
    RiskFeedRequest, SettleRequest, SettleResponse, SettlementRecord,
};

use crate::actors::broker::{BrokerError, BrokerMsg};
use crate::api::{actor_unavailable, error_response};
use crate::app_state::AppState;

pub async fn next_offer(
    State(state): State<AppState>,
    Query(query): Query<NextOfferQuery>,
) -> Response {
    if query.requester.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            "requester must not be empty",
        );
    }

    let broker = state.broker();
    match ractor::call!(broker, |reply| BrokerMsg::NextOffer {
        requester: query.requester,
        reply,
    }) {
        Ok(offer) => (StatusCode::OK, Json(OfferResponse::from(offer))).into_response(),
        Err(err) => actor_unavailable(err),
    }
}

pub async fn decide(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> Response {
    let broker = state.broker();
    match ractor::call!(broker, |reply| BrokerMsg::Decide {
        requester: request.requester,
        accepted: request.accepted,
        reply,
    }) {
        Ok(message) => (StatusCode::OK, Json(DecisionResponse { message })).into_response(),
        Err(err) => actor_unavailable(err),
    }
}

pub async fn start_risk_feed(
    State(state): State<AppState>,
    Json(request): Json<RiskFeedRequest>,
) -> Response {
    if request.risk_factor > 100 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            format!("risk_factor {} is out of range", request.risk_factor),
        );
    }

    let broker = state.broker();
    let character = request.character.clone();
    match ractor::call!(broker, |reply| BrokerMsg::StartRiskFeed {
        character: request.character,
        risk_factor: request.risk_factor,
        reply,
    }) {
        Ok(Ok(period)) => (
            StatusCode::OK,
            Json(AckResponse {
                accepted: true,
                message: format!(
                    "Risk feed for {character} started, one level every {}ms",
                    period.as_millis()
                ),
            }),
        )
            .into_response(),
        Ok(Err(err @ BrokerError::ChannelUnavailable(_))) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(AckResponse {
                accepted: false,
                message: err.to_string(),
            }),
        )
            .into_response(),
        Ok(Err(err)) => error_response(StatusCode::BAD_REQUEST, err.code(), err.to_string()),
        Err(err) => actor_unavailable(err),
    }
}

pub async fn stop_risk_feed(
    State(state): State<AppState>,
    Path(character): Path<String>,
) -> Response {
    let broker = state.broker();
    match ractor::call!(broker, |reply| BrokerMsg::StopRiskFeed {
        character: character.clone(),
        reply,
    }) {
        Ok(was_running) => {
            let message = if was_running {
                format!("Risk feed for {character} stopped")
            } else {
                format!("No risk feed running for {character}")
            };
            (
                StatusCode::OK,
                Json(AckResponse {
                    accepted: was_running,
                    message,
                }),
            )
                .into_response()
        }
        Err(err) => actor_unavailable(err),
    }
}

pub async fn settle(
    State(state): State<AppState>,
    Json(request): Json<SettleRequest>,
) -> Response {
    let broker = state.broker();
    match ractor::call!(broker, |reply| BrokerMsg::Settle {
        amount: request.amount,
        reply,
    }) {
        Ok(result) => {
            let body = match result {
                Ok(message) => SettleResponse {
                    accepted: true,
                    message,
                },
                Err(err) => SettleResponse {
                    accepted: false,
                    message: err.to_string(),
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => actor_unavailable(err),
    }
}

pub async fn record_final_report(
    State(state): State<AppState>,
    Json(record): Json<SettlementRecord>,
) -> Response {
    let broker = state.broker();
    match ractor::call!(broker, |reply| BrokerMsg::RecordFinalReport { record, reply }) {
        Ok(message) => (StatusCode::OK, Json(ReportAck { message })).into_response(),
        Err(err) => actor_unavailable(err),
    }
}

pub async fn list_reports(State(state): State<AppState>) -> Response {
    let broker = state.broker();
    match ractor::call!(broker, |reply| BrokerMsg::GetReports { reply }) {
        Ok(reports) => (StatusCode::OK, Json(reports)).into_response(),
        Err(err) => actor_unavailable(err),
    }
}
