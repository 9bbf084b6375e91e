use std::collections::HashMap;
use std::sync::Arc;

use ractor::{Actor, ActorRef};
use shared_types::Offer;

use crate::actors::broker::{
    BrokerActor, BrokerArguments, BrokerMsg, BrokerPolicy, BROKER_ACTOR_NAME,
};
use crate::actors::crew::{
    crew_actor_name, CrewActor, CrewArguments, CrewMsg, CrewRoster, CrewSettings,
};
use crate::actors::risk_channel::RiskExchange;
use crate::orchestrator::{LocalBrokerClient, LocalCrewClient};
use crate::report::ReportSink;

/// Everything needed to bring up the broker and the crew in one process
#[derive(Clone)]
pub struct AppStateConfig {
    pub roster: CrewRoster,
    pub crew_settings: CrewSettings,
    pub broker_policy: BrokerPolicy,
    pub offers: Vec<Offer>,
    pub report_sink: Option<Arc<dyn ReportSink>>,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    broker: ActorRef<BrokerMsg>,
    crew: HashMap<String, ActorRef<CrewMsg>>,
    crew_names: Vec<String>,
}

impl AppState {
    /// Spawn the broker and one crew actor per roster entry, all sharing one
    /// risk exchange
    pub async fn spawn(config: AppStateConfig) -> Result<Self, String> {
        config.roster.validate().map_err(|e| e.to_string())?;

        let risk_exchange = RiskExchange::new();
        // Suffix keeps names unique in the global registry across instances.
        let instance = ulid::Ulid::new();

        let (broker, _) = Actor::spawn(
            Some(format!("{BROKER_ACTOR_NAME}:{instance}")),
            BrokerActor,
            BrokerArguments {
                offers: config.offers,
                policy: config.broker_policy,
                risk_exchange: risk_exchange.clone(),
                report_sink: config.report_sink,
            },
        )
        .await
        .map_err(|e| e.to_string())?;

        let mut crew = HashMap::new();
        let mut crew_names = Vec::new();
        for profile in config.roster.crew {
            let name = profile.name.clone();
            let spawned = Actor::spawn(
                Some(format!("{}:{instance}", crew_actor_name(&name))),
                CrewActor,
                CrewArguments {
                    profile,
                    settings: config.crew_settings.clone(),
                    risk_exchange: risk_exchange.clone(),
                },
            )
            .await;
            let actor = match spawned {
                Ok((actor, _)) => actor,
                Err(e) => {
                    broker.stop(None);
                    crew.values().for_each(|spawned: &ActorRef<CrewMsg>| spawned.stop(None));
                    return Err(e.to_string());
                }
            };
            crew.insert(name.clone(), actor);
            crew_names.push(name);
        }

        tracing::info!(crew = ?crew_names, "Mission actors started");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                broker,
                crew,
                crew_names,
            }),
        })
    }

    pub fn broker(&self) -> ActorRef<BrokerMsg> {
        self.inner.broker.clone()
    }

    pub fn crew(&self, character: &str) -> Option<ActorRef<CrewMsg>> {
        self.inner.crew.get(character).cloned()
    }

    /// Crew names in roster order (success rate A first)
    pub fn crew_names(&self) -> &[String] {
        &self.inner.crew_names
    }

    pub fn local_broker_client(&self) -> LocalBrokerClient {
        LocalBrokerClient::new(self.broker())
    }

    pub fn local_crew_client(&self, character: &str) -> Option<LocalCrewClient> {
        self.crew(character)
            .map(|actor| LocalCrewClient::new(character, actor))
    }

    pub fn shutdown(&self) {
        for actor in self.inner.crew.values() {
            actor.stop(None);
        }
        self.inner.broker.stop(None);
    }
}
