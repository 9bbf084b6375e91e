//! Remote call surfaces the orchestrator drives
//!
//! `CrewClient` and `BrokerClient` abstract over where the actors live.
//! The `Local*` clients talk to in-process actor refs and wait on push
//! notifications; the HTTP clients in `http_client` poll.

use async_trait::async_trait;
use ractor::{call, ActorRef};
use shared_types::{CrewStatusResponse, Offer, SettleResponse, SettlementRecord};

use crate::actors::broker::{BrokerError, BrokerMsg};
use crate::actors::crew::{CrewError, CrewMsg};
use crate::orchestrator::OrchestratorSettings;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The remote party refused the command
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },
    #[error("risk channel unavailable for {0}")]
    ChannelUnavailable(String),
    /// No progress observed for the whole stall window
    #[error("{character} made no progress on run {run_id}")]
    Stalled { character: String, run_id: String },
    #[error("{character} is not running {run_id}")]
    UnknownRun { character: String, run_id: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<CrewError> for OrchestratorError {
    fn from(err: CrewError) -> Self {
        OrchestratorError::Rejected {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<BrokerError> for OrchestratorError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::ChannelUnavailable(character) => {
                OrchestratorError::ChannelUnavailable(character)
            }
            other => OrchestratorError::Rejected {
                code: other.code().to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
pub trait CrewClient: Send + Sync {
    fn character(&self) -> &str;

    async fn begin_distraction(
        &self,
        run_id: &str,
        required_turns: u32,
    ) -> Result<String, OrchestratorError>;

    async fn begin_heist(
        &self,
        run_id: &str,
        required_turns: u32,
        risk_factor: u8,
        base_loot: i64,
    ) -> Result<String, OrchestratorError>;

    async fn status(&self) -> Result<CrewStatusResponse, OrchestratorError>;

    async fn abort(&self, run_id: &str, reason: &str) -> Result<bool, OrchestratorError>;

    async fn settle(&self, amount: i64) -> Result<SettleResponse, OrchestratorError>;

    /// Poll `status` until the run is terminal.
    ///
    /// Fails with `Stalled` after `stall_poll_limit` consecutive polls with no
    /// visible change; transport errors count as polls without change.
    async fn wait_for_terminal(
        &self,
        run_id: &str,
        settings: &OrchestratorSettings,
    ) -> Result<CrewStatusResponse, OrchestratorError> {
        let mut last_marker = None;
        let mut idle_polls = 0u32;

        loop {
            match self.status().await {
                Ok(status) => {
                    if status.run_id.as_deref() != Some(run_id) {
                        return Err(OrchestratorError::UnknownRun {
                            character: self.character().to_string(),
                            run_id: run_id.to_string(),
                        });
                    }
                    if status.is_terminal() {
                        return Ok(status);
                    }

                    let marker = status.progress_marker();
                    if last_marker == Some(marker) {
                        idle_polls += 1;
                    } else {
                        last_marker = Some(marker);
                        idle_polls = 0;
                    }
                    tracing::debug!(
                        character = %self.character(),
                        run_id = %run_id,
                        turns = status.turns_completed,
                        total = status.total_turns,
                        risk_level = status.risk_level,
                        "Run in progress"
                    );
                }
                Err(err) => {
                    idle_polls += 1;
                    tracing::warn!(
                        character = %self.character(),
                        run_id = %run_id,
                        error = %err,
                        "Status poll failed"
                    );
                }
            }

            if idle_polls >= settings.stall_poll_limit {
                return Err(OrchestratorError::Stalled {
                    character: self.character().to_string(),
                    run_id: run_id.to_string(),
                });
            }
            tokio::time::sleep(settings.poll_interval).await;
        }
    }
}

#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn next_offer(&self, requester: &str) -> Result<Option<Offer>, OrchestratorError>;

    async fn decide(&self, requester: &str, accepted: bool) -> Result<String, OrchestratorError>;

    async fn start_risk_feed(
        &self,
        character: &str,
        risk_factor: u8,
    ) -> Result<(), OrchestratorError>;

    async fn stop_risk_feed(&self, character: &str) -> Result<bool, OrchestratorError>;

    async fn settle(&self, amount: i64) -> Result<SettleResponse, OrchestratorError>;

    async fn record_final_report(
        &self,
        record: &SettlementRecord,
    ) -> Result<String, OrchestratorError>;
}

fn transport<E: std::fmt::Display>(err: E) -> OrchestratorError {
    OrchestratorError::Transport(err.to_string())
}

fn settle_response(result: Result<String, impl std::fmt::Display>) -> SettleResponse {
    match result {
        Ok(message) => SettleResponse {
            accepted: true,
            message,
        },
        Err(err) => SettleResponse {
            accepted: false,
            message: err.to_string(),
        },
    }
}

/// Crew member running in the same process
#[derive(Clone)]
pub struct LocalCrewClient {
    character: String,
    actor: ActorRef<CrewMsg>,
}

impl LocalCrewClient {
    pub fn new(character: impl Into<String>, actor: ActorRef<CrewMsg>) -> Self {
        Self {
            character: character.into(),
            actor,
        }
    }
}

#[async_trait]
impl CrewClient for LocalCrewClient {
    fn character(&self) -> &str {
        &self.character
    }

    async fn begin_distraction(
        &self,
        run_id: &str,
        required_turns: u32,
    ) -> Result<String, OrchestratorError> {
        let result = call!(self.actor, |reply| CrewMsg::BeginDistraction {
            run_id: Some(run_id.to_string()),
            required_turns,
            reply,
        })
        .map_err(transport)?;
        Ok(result?)
    }

    async fn begin_heist(
        &self,
        run_id: &str,
        required_turns: u32,
        risk_factor: u8,
        base_loot: i64,
    ) -> Result<String, OrchestratorError> {
        let result = call!(self.actor, |reply| CrewMsg::BeginHeist {
            run_id: Some(run_id.to_string()),
            required_turns,
            risk_factor,
            base_loot,
            reply,
        })
        .map_err(transport)?;
        Ok(result?)
    }

    async fn status(&self) -> Result<CrewStatusResponse, OrchestratorError> {
        call!(self.actor, |reply| CrewMsg::GetStatus { reply }).map_err(transport)
    }

    async fn abort(&self, run_id: &str, reason: &str) -> Result<bool, OrchestratorError> {
        call!(self.actor, |reply| CrewMsg::Abort {
            run_id: run_id.to_string(),
            reason: reason.to_string(),
            reply,
        })
        .map_err(transport)
    }

    async fn settle(&self, amount: i64) -> Result<SettleResponse, OrchestratorError> {
        let result = call!(self.actor, |reply| CrewMsg::Settle { amount, reply })
            .map_err(transport)?;
        Ok(settle_response(result))
    }

    /// Waits on the run's watch channel instead of polling
    async fn wait_for_terminal(
        &self,
        run_id: &str,
        settings: &OrchestratorSettings,
    ) -> Result<CrewStatusResponse, OrchestratorError> {
        let receiver = call!(self.actor, |reply| CrewMsg::Subscribe {
            run_id: run_id.to_string(),
            reply,
        })
        .map_err(transport)?;
        let Some(mut receiver) = receiver else {
            return Err(OrchestratorError::UnknownRun {
                character: self.character.clone(),
                run_id: run_id.to_string(),
            });
        };

        let stall_timeout = settings.stall_timeout();
        loop {
            let snapshot = receiver.borrow_and_update().clone();
            if snapshot.is_terminal() {
                return Ok(snapshot);
            }

            match tokio::time::timeout(stall_timeout, receiver.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    return Err(OrchestratorError::Transport(format!(
                        "{} stopped publishing run {run_id}",
                        self.character
                    )))
                }
                Err(_) => {
                    return Err(OrchestratorError::Stalled {
                        character: self.character.clone(),
                        run_id: run_id.to_string(),
                    })
                }
            }
        }
    }
}

/// Broker running in the same process
#[derive(Clone)]
pub struct LocalBrokerClient {
    actor: ActorRef<BrokerMsg>,
}

impl LocalBrokerClient {
    pub fn new(actor: ActorRef<BrokerMsg>) -> Self {
        Self { actor }
    }
}

#[async_trait]
impl BrokerClient for LocalBrokerClient {
    async fn next_offer(&self, requester: &str) -> Result<Option<Offer>, OrchestratorError> {
        call!(self.actor, |reply| BrokerMsg::NextOffer {
            requester: requester.to_string(),
            reply,
        })
        .map_err(transport)
    }

    async fn decide(&self, requester: &str, accepted: bool) -> Result<String, OrchestratorError> {
        call!(self.actor, |reply| BrokerMsg::Decide {
            requester: requester.to_string(),
            accepted,
            reply,
        })
        .map_err(transport)
    }

    async fn start_risk_feed(
        &self,
        character: &str,
        risk_factor: u8,
    ) -> Result<(), OrchestratorError> {
        let result = call!(self.actor, |reply| BrokerMsg::StartRiskFeed {
            character: character.to_string(),
            risk_factor,
            reply,
        })
        .map_err(transport)?;
        result.map(|_| ()).map_err(OrchestratorError::from)
    }

    async fn stop_risk_feed(&self, character: &str) -> Result<bool, OrchestratorError> {
        call!(self.actor, |reply| BrokerMsg::StopRiskFeed {
            character: character.to_string(),
            reply,
        })
        .map_err(transport)
    }

    async fn settle(&self, amount: i64) -> Result<SettleResponse, OrchestratorError> {
        let result = call!(self.actor, |reply| BrokerMsg::Settle { amount, reply })
            .map_err(transport)?;
        Ok(settle_response(result))
    }

    async fn record_final_report(
        &self,
        record: &SettlementRecord,
    ) -> Result<String, OrchestratorError> {
        call!(self.actor, |reply| BrokerMsg::RecordFinalReport {
            record: record.clone(),
            reply,
        })
        .map_err(transport)
    }
}
