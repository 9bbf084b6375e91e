//! HTTP API routes for the mission server
//!
//! Thin handlers over the actor refs held in `AppState`. Every handler maps
//! actor errors onto status codes plus a machine-readable `code`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use shared_types::ApiError;

pub mod broker;
pub mod crew;

use crate::app_state::AppState;

/// Configure all API routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        // Crew routes
        .route("/crew/{character}/distraction", post(crew::begin_distraction))
        .route("/crew/{character}/heist", post(crew::begin_heist))
        .route("/crew/{character}/status", get(crew::get_status))
        .route("/crew/{character}/loot", get(crew::get_final_loot))
        .route("/crew/{character}/abort", post(crew::abort_run))
        .route("/crew/{character}/settle", post(crew::settle))
        // Broker routes
        .route("/broker/offers/next", get(broker::next_offer))
        .route("/broker/decisions", post(broker::decide))
        .route("/broker/risk-feeds", post(broker::start_risk_feed))
        .route("/broker/risk-feeds/{character}", delete(broker::stop_risk_feed))
        .route("/broker/settle", post(broker::settle))
        .route(
            "/broker/reports",
            get(broker::list_reports).post(broker::record_final_report),
        )
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "mission-server",
            "crew": state.crew_names(),
        })),
    )
}

pub(crate) fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        Json(ApiError {
            code: code.to_string(),
            message: message.into(),
        }),
    )
        .into_response()
}

pub(crate) fn actor_unavailable(err: impl std::fmt::Display) -> Response {
    tracing::error!(error = %err, "Actor RPC failed");
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "ACTOR_UNAVAILABLE",
        format!("Actor RPC failed: {err}"),
    )
}
