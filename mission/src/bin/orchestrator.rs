use std::sync::Arc;
use std::time::Duration;

use mission::config::MissionConfig;
use mission::orchestrator::{
    build_http_client, BrokerClient, CrewClient, HttpBrokerClient, HttpCrewClient,
    MissionOrchestrator,
};
use mission::report::{FileReportSink, ReportSink};
use shared_types::MissionOutcome;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HEALTH_ATTEMPTS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mission=info,mission_orchestrator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MissionConfig::from_env()?;
    let roster = config.load_roster()?;
    let names = roster.names();
    let [first, second] = names.as_slice() else {
        anyhow::bail!("crew roster must have exactly two members");
    };

    let http = build_http_client(config.rpc_timeout)?;
    wait_for_server(&http, &config.server_url).await?;

    let broker: Arc<dyn BrokerClient> = Arc::new(
        HttpBrokerClient::new(http.clone(), &config.server_url)
            .with_offer_timeout(config.offer_timeout()),
    );
    let first: Arc<dyn CrewClient> = Arc::new(HttpCrewClient::new(
        http.clone(),
        &config.server_url,
        first.clone(),
    ));
    let second: Arc<dyn CrewClient> = Arc::new(HttpCrewClient::new(
        http,
        &config.server_url,
        second.clone(),
    ));
    let report_file = FileReportSink::new(&config.report_path);
    let report_path = report_file.path().to_path_buf();
    let sink: Arc<dyn ReportSink> = Arc::new(report_file);

    let orchestrator =
        MissionOrchestrator::new(config.orchestrator.clone(), broker, first, second, sink);
    let record = orchestrator.run().await;

    match record.outcome {
        MissionOutcome::Success => tracing::info!(
            mission_id = %record.mission_id,
            total_loot = record.total_loot,
            report = %report_path.display(),
            "Mission complete"
        ),
        MissionOutcome::Failed => tracing::warn!(
            mission_id = %record.mission_id,
            report = %report_path.display(),
            "Mission failed"
        ),
    }
    Ok(())
}

async fn wait_for_server(http: &reqwest::Client, server_url: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server_url.trim_end_matches('/'));
    for attempt in 1..=HEALTH_ATTEMPTS {
        match http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(url = %url, "Mission server reachable");
                return Ok(());
            }
            Ok(response) => {
                tracing::warn!(
                    url = %url,
                    status = %response.status(),
                    attempt,
                    "Mission server not healthy"
                );
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, attempt, "Mission server unreachable");
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    anyhow::bail!("mission server at {server_url} did not become healthy")
}
