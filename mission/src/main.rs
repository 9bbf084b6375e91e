use axum::http::{header, Method};
use mission::api;
use mission::app_state::{AppState, AppStateConfig};
use mission::config::MissionConfig;
use mission::offers::{CsvOfferSource, OfferSource};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mission=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MissionConfig::from_env()?;
    tracing::info!(addr = %config.server_addr, "Starting mission server");

    let roster = config.load_roster()?;
    let offer_source = CsvOfferSource::new(&config.offers_path);
    let offers = offer_source.load_offers()?;
    if offers.is_empty() {
        tracing::warn!(path = %offer_source.path().display(), "No valid offers loaded");
    }

    let app_state = AppState::spawn(AppStateConfig {
        roster,
        crew_settings: config.crew.clone(),
        broker_policy: config.broker.clone(),
        offers,
        report_sink: None,
    })
    .await
    .map_err(|e| anyhow::anyhow!("Failed to start mission actors: {e}"))?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    let app = api::router()
        .with_state(app_state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.server_addr).await?;
    tracing::info!(
        addr = %config.server_addr,
        crew = ?app_state.crew_names(),
        "Mission server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.shutdown();
    tracing::info!("Mission server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

