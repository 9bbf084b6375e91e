//! Mission API Integration Tests
//!
//! Tests full HTTP request/response cycles for crew and broker endpoints

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use mission::actors::broker::{BrokerPolicy, RiskFeedSettings};
use mission::actors::crew::{CrewRoster, CrewSettings};
use mission::api;
use mission::app_state::{AppState, AppStateConfig};
use shared_types::{MissionOutcome, Offer, SettlementRecord};

fn test_requester() -> String {
    format!("test-requester-{}", uuid::Uuid::new_v4())
}

async fn setup_test_app() -> (axum::Router, AppState) {
    let mut roster = CrewRoster::default();
    for profile in &mut roster.crew {
        profile.mishap_chance = 0.0;
    }

    let app_state = AppState::spawn(AppStateConfig {
        roster,
        crew_settings: CrewSettings {
            turn_tick: Duration::from_millis(50),
            num_parties: 4,
        },
        broker_policy: BrokerPolicy {
            unavailable_chance: 0.0,
            rejection_limit: 3,
            cooldown: Duration::from_millis(10),
            risk_feed: RiskFeedSettings {
                max_levels: 7,
                period_unit: Duration::from_millis(100),
                min_period_factor: 10,
            },
        },
        offers: vec![
            Offer {
                loot: 25_000,
                success_rate_a: 60,
                success_rate_b: 45,
                risk_factor: 85,
            },
            Offer {
                loot: 60_000,
                success_rate_a: 75,
                success_rate_b: 50,
                risk_factor: 30,
            },
        ],
        report_sink: None,
    })
    .await
    .expect("Failed to spawn mission actors");

    let app = api::router().with_state(app_state.clone());
    (app, app_state)
}

async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).expect("Invalid JSON response");
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, state) = setup_test_app().await;

    let (status, body) = json_response(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "mission-server");
    assert_eq!(body["crew"], json!(["Franklin", "Trevor"]));

    state.shutdown();
}

#[tokio::test]
async fn test_crew_status_waiting() {
    let (app, state) = setup_test_app().await;

    let (status, body) = json_response(&app, get("/crew/Franklin/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["character"], "Franklin");
    assert_eq!(body["status"], "waiting");
    assert!(body["run_id"].is_null());

    state.shutdown();
}

#[tokio::test]
async fn test_unknown_character_is_not_found() {
    let (app, state) = setup_test_app().await;

    let (status, body) = json_response(&app, get("/crew/Lamar/status")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "UNKNOWN_CHARACTER");

    let req = post("/crew/Lamar/distraction", json!({"required_turns": 5}));
    let (status, _) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    state.shutdown();
}

#[tokio::test]
async fn test_begin_run_then_busy_then_abort() {
    let (app, state) = setup_test_app().await;

    let req = post(
        "/crew/Trevor/heist",
        json!({
            "run_id": "api-heist",
            "required_turns": 10000,
            "risk_factor": 40,
            "base_loot": 60000
        }),
    );
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);
    assert_eq!(body["run_id"], "api-heist");
    assert_eq!(body["message"], "Trevor started the heist");

    let req = post("/crew/Trevor/distraction", json!({"required_turns": 5}));
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["accepted"], false);
    assert!(body["run_id"].is_null());

    let (status, body) = json_response(&app, get("/crew/Trevor/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "working");
    assert_eq!(body["phase"], "heist");

    let req = post(
        "/crew/Trevor/abort",
        json!({"run_id": "api-heist", "reason": "cops everywhere"}),
    );
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);

    let (_, body) = json_response(&app, get("/crew/Trevor/status")).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["failure_reason"], "cops everywhere");

    state.shutdown();
}

#[tokio::test]
async fn test_zero_turns_is_bad_request() {
    let (app, state) = setup_test_app().await;

    let req = post("/crew/Franklin/distraction", json!({"required_turns": 0}));
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["accepted"], false);

    state.shutdown();
}

#[tokio::test]
async fn test_loot_and_settle_before_success() {
    let (app, state) = setup_test_app().await;

    let (status, body) = json_response(&app, get("/crew/Franklin/loot")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_READY");

    let req = post("/crew/Franklin/settle", json!({"amount": 1000}));
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], false);

    state.shutdown();
}

#[tokio::test]
async fn test_offers_and_decisions() {
    let (app, state) = setup_test_app().await;
    let requester = test_requester();

    let (status, body) =
        json_response(&app, get(&format!("/broker/offers/next?requester={requester}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_offer"], true);
    assert_eq!(body["loot"], 25_000);
    assert_eq!(body["risk_factor"], 85);

    let req = post(
        "/broker/decisions",
        json!({"requester": requester, "accepted": false}),
    );
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Ok, I'll look for another option...");

    let (_, body) =
        json_response(&app, get(&format!("/broker/offers/next?requester={requester}"))).await;
    assert_eq!(body["loot"], 60_000);

    let req = post(
        "/broker/decisions",
        json!({"requester": requester, "accepted": true}),
    );
    let (_, body) = json_response(&app, req).await;
    assert_eq!(body["message"], "Perfect, the job is on.");

    let (status, body) =
        json_response(&app, get(&format!("/broker/offers/next?requester={requester}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_offer"], false);

    state.shutdown();
}

#[tokio::test]
async fn test_next_offer_requires_requester() {
    let (app, state) = setup_test_app().await;

    let (status, body) = json_response(&app, get("/broker/offers/next?requester=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    state.shutdown();
}

#[tokio::test]
async fn test_risk_feed_lifecycle() {
    let (app, state) = setup_test_app().await;

    // Nobody is listening yet.
    let req = post(
        "/broker/risk-feeds",
        json!({"character": "Franklin", "risk_factor": 30}),
    );
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["accepted"], false);

    let req = post(
        "/crew/Franklin/heist",
        json!({"required_turns": 10000, "risk_factor": 30, "base_loot": 60000}),
    );
    let (status, _) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = post(
        "/broker/risk-feeds",
        json!({"character": "Franklin", "risk_factor": 30}),
    );
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);
    assert_eq!(
        body["message"],
        "Risk feed for Franklin started, one level every 7000ms"
    );

    let req = Request::builder()
        .method("DELETE")
        .uri("/broker/risk-feeds/Franklin")
        .body(Body::empty())
        .unwrap();
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);

    let req = post(
        "/broker/risk-feeds",
        json!({"character": "Franklin", "risk_factor": 120}),
    );
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    state.shutdown();
}

#[tokio::test]
async fn test_broker_settle() {
    let (app, state) = setup_test_app().await;

    let req = post("/broker/settle", json!({"amount": 15000}));
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);
    assert_eq!(body["message"], "Pleasure doing business with you.");

    let req = post("/broker/settle", json!({"amount": -5}));
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], false);

    state.shutdown();
}

#[tokio::test]
async fn test_reports_are_recorded_and_listed() {
    let (app, state) = setup_test_app().await;

    let (status, body) = json_response(&app, get("/broker/reports")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let record = SettlementRecord {
        mission_id: "api-mission".to_string(),
        outcome: MissionOutcome::Success,
        base_loot: 60_000,
        bonus_loot: 2_000,
        total_loot: 62_000,
        shares: Vec::new(),
        remainder: 0,
        payments: Vec::new(),
        failure: None,
        created_at: Utc::now(),
    };
    let req = post(
        "/broker/reports",
        serde_json::to_value(&record).expect("Failed to serialize record"),
    );
    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Report for mission api-mission filed.");

    let (_, body) = json_response(&app, get("/broker/reports")).await;
    let reports: Vec<SettlementRecord> = serde_json::from_value(body).expect("Invalid report list");
    assert_eq!(reports, vec![record]);

    state.shutdown();
}
