use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::actors::broker::{BrokerPolicy, RiskFeedSettings};
use crate::actors::crew::{CrewRoster, CrewSettings};
use crate::orchestrator::OrchestratorSettings;

#[derive(Debug, Clone)]
pub struct MissionConfig {
    /// Address mission-server binds to
    pub server_addr: SocketAddr,
    /// Base URL the orchestrator uses to reach mission-server
    pub server_url: String,
    /// CSV file with the broker's offers
    pub offers_path: PathBuf,
    /// Text report written by the orchestrator
    pub report_path: PathBuf,
    /// Optional TOML roster overriding the built-in crew profiles
    pub crew_profiles: Option<PathBuf>,
    /// Per-request timeout of the orchestrator's HTTP clients
    pub rpc_timeout: Duration,
    pub crew: CrewSettings,
    pub broker: BrokerPolicy,
    pub orchestrator: OrchestratorSettings,
}

impl MissionConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; missing keys take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let env = Env { lookup: &lookup };

        let num_parties: i64 = env.parse("MISSION_NUM_PARTIES", 4)?;
        if num_parties < 1 {
            anyhow::bail!("MISSION_NUM_PARTIES must be at least 1, got {num_parties}");
        }
        let unavailable_chance: f64 = env.parse("BROKER_UNAVAILABLE_CHANCE", 0.1)?;
        if !(0.0..=1.0).contains(&unavailable_chance) {
            anyhow::bail!(
                "BROKER_UNAVAILABLE_CHANCE must be within 0..=1, got {unavailable_chance}"
            );
        }

        let rpc_timeout = Duration::from_millis(env.parse("MISSION_RPC_TIMEOUT_MS", 5_000)?);
        if rpc_timeout.is_zero() {
            anyhow::bail!("MISSION_RPC_TIMEOUT_MS must be greater than zero");
        }

        Ok(Self {
            server_addr: env.parse(
                "MISSION_SERVER_ADDR",
                SocketAddr::from(([127, 0, 0, 1], 8090)),
            )?,
            server_url: env.str("MISSION_SERVER_URL", "http://127.0.0.1:8090"),
            offers_path: PathBuf::from(env.str("MISSION_OFFERS_PATH", "./data/offers.csv")),
            report_path: PathBuf::from(
                env.str("MISSION_REPORT_PATH", "./reports/mission-report.txt"),
            ),
            crew_profiles: env.get("MISSION_CREW_PROFILES").map(PathBuf::from),
            rpc_timeout,
            crew: CrewSettings {
                turn_tick: Duration::from_millis(env.parse("MISSION_TURN_TICK_MS", 10)?),
                num_parties,
            },
            broker: BrokerPolicy {
                unavailable_chance,
                rejection_limit: env.parse("BROKER_REJECTION_LIMIT", 3)?,
                cooldown: Duration::from_millis(env.parse("BROKER_COOLDOWN_MS", 10_000)?),
                risk_feed: RiskFeedSettings {
                    max_levels: env.parse("BROKER_MAX_RISK_LEVELS", 7)?,
                    period_unit: Duration::from_millis(
                        env.parse("BROKER_RISK_PERIOD_UNIT_MS", 100)?,
                    ),
                    min_period_factor: env.parse("BROKER_MIN_PERIOD_FACTOR", 10)?,
                },
            },
            orchestrator: OrchestratorSettings {
                requester: env.str("MISSION_REQUESTER", "Michael"),
                broker_name: env.str("MISSION_BROKER_NAME", "Lester"),
                turn_budget: env.parse("MISSION_TURN_BUDGET", 200)?,
                num_parties,
                poll_interval: Duration::from_millis(env.parse("MISSION_POLL_INTERVAL_MS", 1_000)?),
                stall_poll_limit: env.parse("MISSION_STALL_POLL_LIMIT", 30)?,
                negotiation_backoff: Duration::from_millis(
                    env.parse("MISSION_NEGOTIATION_BACKOFF_MS", 2_000)?,
                ),
                max_negotiation_attempts: env.parse("MISSION_MAX_NEGOTIATION_ATTEMPTS", 50)?,
                risk_feed_retries: env.parse("MISSION_RISK_FEED_RETRIES", 3)?,
            },
        })
    }

    /// Timeout for offer requests: the broker's cooldown plus the usual RPC
    /// budget, so a delayed offer is still received
    pub fn offer_timeout(&self) -> Duration {
        self.broker.cooldown + self.rpc_timeout
    }

    /// Crew roster from `MISSION_CREW_PROFILES`, or the built-in pair
    pub fn load_roster(&self) -> anyhow::Result<CrewRoster> {
        let Some(path) = &self.crew_profiles else {
            return Ok(CrewRoster::default());
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read crew profiles {}: {e}", path.display()))?;
        let roster = CrewRoster::from_toml_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid crew profiles {}: {e}", path.display()))?;
        Ok(roster)
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn str(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(val) => val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
            None => Ok(default),
        }
    }
}
