//! Crew API - begin runs, poll status, abort, settle

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ractor::ActorRef;
use shared_types::{
    AbortRequest, AckResponse, BeginDistractionRequest, BeginHeistRequest, BeginResponse,
    FinalLootResponse, SettleRequest, SettleResponse,
};

use crate::actors::crew::{CrewError, CrewMsg};
use crate::api::{actor_unavailable, error_response};
use crate::app_state::AppState;

fn crew_ref(state: &AppState, character: &str) -> Result<ActorRef<CrewMsg>, Response> {
    state.crew(character).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            "UNKNOWN_CHARACTER",
            format!("No crew member named '{character}'"),
        )
    })
}

fn begin_response(character: &str, what: &str, result: Result<String, CrewError>) -> Response {
    match result {
        Ok(run_id) => (
            StatusCode::OK,
            Json(BeginResponse {
                accepted: true,
                message: format!("{character} started the {what}"),
                run_id: Some(run_id),
            }),
        )
            .into_response(),
        Err(err) => {
            let status = match err {
                CrewError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::CONFLICT,
            };
            (
                status,
                Json(BeginResponse {
                    accepted: false,
                    message: err.to_string(),
                    run_id: None,
                }),
            )
                .into_response()
        }
    }
}

pub async fn begin_distraction(
    State(state): State<AppState>,
    Path(character): Path<String>,
    Json(request): Json<BeginDistractionRequest>,
) -> Response {
    let actor = match crew_ref(&state, &character) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| CrewMsg::BeginDistraction {
        run_id: request.run_id,
        required_turns: request.required_turns,
        reply,
    }) {
        Ok(result) => begin_response(&character, "distraction", result),
        Err(err) => actor_unavailable(err),
    }
}

pub async fn begin_heist(
    State(state): State<AppState>,
    Path(character): Path<String>,
    Json(request): Json<BeginHeistRequest>,
) -> Response {
    let actor = match crew_ref(&state, &character) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| CrewMsg::BeginHeist {
        run_id: request.run_id,
        required_turns: request.required_turns,
        risk_factor: request.risk_factor,
        base_loot: request.base_loot,
        reply,
    }) {
        Ok(result) => begin_response(&character, "heist", result),
        Err(err) => actor_unavailable(err),
    }
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(character): Path<String>,
) -> Response {
    let actor = match crew_ref(&state, &character) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| CrewMsg::GetStatus { reply }) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => actor_unavailable(err),
    }
}

pub async fn get_final_loot(
    State(state): State<AppState>,
    Path(character): Path<String>,
) -> Response {
    let actor = match crew_ref(&state, &character) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| CrewMsg::GetFinalLoot { reply }) {
        Ok(Ok(final_loot)) => (
            StatusCode::OK,
            Json(FinalLootResponse {
                character,
                final_loot,
            }),
        )
            .into_response(),
        Ok(Err(err)) => error_response(StatusCode::CONFLICT, err.code(), err.to_string()),
        Err(err) => actor_unavailable(err),
    }
}

pub async fn abort_run(
    State(state): State<AppState>,
    Path(character): Path<String>,
    Json(request): Json<AbortRequest>,
) -> Response {
    let actor = match crew_ref(&state, &character) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let run_id = request.run_id.clone();
    match ractor::call!(actor, |reply| CrewMsg::Abort {
        run_id: request.run_id,
        reason: request.reason,
        reply,
    }) {
        Ok(aborted) => {
            let message = if aborted {
                format!("Run {run_id} aborted")
            } else {
                format!("Run {run_id} was not pending")
            };
            (
                StatusCode::OK,
                Json(AckResponse {
                    accepted: aborted,
                    message,
                }),
            )
                .into_response()
        }
        Err(err) => actor_unavailable(err),
    }
}

/// Payment outcome is part of the body; refusals still answer 200
pub async fn settle(
    State(state): State<AppState>,
    Path(character): Path<String>,
    Json(request): Json<SettleRequest>,
) -> Response {
    let actor = match crew_ref(&state, &character) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| CrewMsg::Settle {
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
