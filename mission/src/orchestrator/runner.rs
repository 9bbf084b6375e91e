//! MissionOrchestrator - negotiate, distract, heist, settle
//!
//! Phases run strictly one after another. Any failure short-circuits into a
//! failure record; `run` never returns an error, it always produces the
//! mission's `SettlementRecord`, persists it and hands it to the broker.

use std::sync::Arc;

use chrono::Utc;
use shared_types::{
    CrewStatus, CrewStatusResponse, FailureDetail, MissionOutcome, MissionPhase, Offer,
    PaymentAck, SettlementRecord,
};

use crate::orchestrator::clients::{BrokerClient, CrewClient, OrchestratorError};
use crate::orchestrator::policy::{
    accepts_offer, assign_roles, LootSplit, OrchestratorSettings, RoleAssignment,
};
use crate::report::ReportSink;

pub struct MissionOrchestrator {
    settings: OrchestratorSettings,
    broker: Arc<dyn BrokerClient>,
    crew: [Arc<dyn CrewClient>; 2],
    sink: Arc<dyn ReportSink>,
}

fn failure(
    phase: MissionPhase,
    character: Option<&str>,
    reason: impl Into<String>,
    lost_loot: i64,
) -> FailureDetail {
    FailureDetail {
        phase,
        character: character.map(str::to_string),
        reason: reason.into(),
        lost_loot,
    }
}

impl MissionOrchestrator {
    /// `first` and `second` match the offer's success rates A and B
    pub fn new(
        settings: OrchestratorSettings,
        broker: Arc<dyn BrokerClient>,
        first: Arc<dyn CrewClient>,
        second: Arc<dyn CrewClient>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            settings,
            broker,
            crew: [first, second],
            sink,
        }
    }

    pub async fn run(&self) -> SettlementRecord {
        let mission_id = ulid::Ulid::new().to_string();
        tracing::info!(
            mission_id = %mission_id,
            requester = %self.settings.requester,
            "Mission starting"
        );

        let record = self.execute(&mission_id).await;

        match &record.failure {
            None => tracing::info!(
                mission_id = %mission_id,
                total_loot = record.total_loot,
                remainder = record.remainder,
                "Mission accomplished"
            ),
            Some(detail) => tracing::warn!(
                mission_id = %mission_id,
                phase = %detail.phase,
                character = detail.character.as_deref().unwrap_or("-"),
                reason = %detail.reason,
                lost_loot = detail.lost_loot,
                "Mission failed"
            ),
        }

        if let Err(err) = self.sink.write_report(&record).await {
            tracing::warn!(
                mission_id = %mission_id,
                error = %err,
                "Failed to write mission report"
            );
        }
        match self.broker.record_final_report(&record).await {
            Ok(message) => tracing::info!(
                mission_id = %mission_id,
                message = %message,
                "Final report delivered"
            ),
            Err(err) => tracing::warn!(
                mission_id = %mission_id,
                error = %err,
                "Failed to deliver final report"
            ),
        }

        record
    }

    async fn execute(&self, mission_id: &str) -> SettlementRecord {
        let offer = match self.negotiate().await {
            Ok(offer) => offer,
            Err(detail) => return failure_record(mission_id, 0, detail),
        };

        let roles = assign_roles(&offer, self.crew[0].character(), self.crew[1].character());
        tracing::info!(
            mission_id = %mission_id,
            distraction = %roles.distraction,
            heist = %roles.heist,
            "Roles assigned"
        );

        if let Err(detail) = self.run_distraction(mission_id, &offer, &roles).await {
            return failure_record(mission_id, offer.loot, detail);
        }

        let heist = match self.run_heist(mission_id, &offer, &roles).await {
            Ok(status) => status,
            Err(detail) => return failure_record(mission_id, offer.loot, detail),
        };

        self.settle(mission_id, &offer, &heist).await
    }

    async fn negotiate(&self) -> Result<Offer, FailureDetail> {
        let requester = self.settings.requester.as_str();
        let attempts = self.settings.max_negotiation_attempts.max(1);
        tracing::info!(requester = %requester, "{}", MissionPhase::Negotiation);

        for attempt in 1..=attempts {
            match self.broker.next_offer(requester).await {
                Ok(Some(offer)) => {
                    let accepted = accepts_offer(&offer);
                    match self.broker.decide(requester, accepted).await {
                        Ok(message) => {
                            tracing::info!(
                                attempt,
                                loot = offer.loot,
                                success_rate_a = offer.success_rate_a,
                                success_rate_b = offer.success_rate_b,
                                risk_factor = offer.risk_factor,
                                accepted,
                                broker_says = %message,
                                "Offer evaluated"
                            );
                            if accepted {
                                return Ok(offer);
                            }
                        }
                        Err(err) => {
                            tracing::warn!(attempt, error = %err, "Decision not delivered");
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!(attempt, "No offer available");
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "Offer request failed");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.settings.negotiation_backoff).await;
            }
        }

        Err(failure(
            MissionPhase::Negotiation,
            None,
            format!("No acceptable offer after {attempts} attempts"),
            0,
        ))
    }

    async fn run_distraction(
        &self,
        mission_id: &str,
        offer: &Offer,
        roles: &RoleAssignment,
    ) -> Result<(), FailureDetail> {
        let client = self.crew_client(&roles.distraction);
        let character = client.character();
        let turns = self.settings.required_turns(roles.distraction_rate);
        let run_id = format!("{mission_id}-distraction");
        let lost = |reason: String| {
            failure(MissionPhase::Distraction, Some(character), reason, offer.loot)
        };

        tracing::info!(
            mission_id = %mission_id,
            character = %character,
            required_turns = turns,
            "{}", MissionPhase::Distraction
        );

        client
            .begin_distraction(&run_id, turns)
            .await
            .map_err(|err| lost(format!("Could not start the distraction: {err}")))?;

        let status = self.await_run(client, &run_id).await.map_err(lost)?;
        match status.status {
            CrewStatus::Success => Ok(()),
            _ => Err(lost(
                status
                    .failure_reason
                    .unwrap_or_else(|| "Distraction failed".to_string()),
            )),
        }
    }

    async fn run_heist(
        &self,
        mission_id: &str,
        offer: &Offer,
        roles: &RoleAssignment,
    ) -> Result<CrewStatusResponse, FailureDetail> {
        let client = self.crew_client(&roles.heist);
        let character = client.character();
        let turns = self.settings.required_turns(roles.heist_rate);
        let run_id = format!("{mission_id}-heist");
        let lost =
            |reason: String| failure(MissionPhase::Heist, Some(character), reason, offer.loot);

        tracing::info!(
            mission_id = %mission_id,
            character = %character,
            required_turns = turns,
            risk_factor = offer.risk_factor,
            base_loot = offer.loot,
            "{}", MissionPhase::Heist
        );

        client
            .begin_heist(&run_id, turns, offer.risk_factor, offer.loot)
            .await
            .map_err(|err| lost(format!("Could not start the heist: {err}")))?;

        if let Err(err) = self.start_risk_feed(character, offer.risk_factor).await {
            // A run that already finished has released its channel on its own.
            if let Some(status) = finished_run(client, &run_id).await {
                tracing::info!(
                    character = %character,
                    run_id = %run_id,
                    status = ?status.status,
                    "Heist finished before the risk feed started"
                );
                return match status.status {
                    CrewStatus::Success => Ok(status),
                    _ => Err(lost(
                        status
                            .failure_reason
                            .unwrap_or_else(|| "Heist failed".to_string()),
                    )),
                };
            }

            let reason = format!("Could not start the risk feed: {err}");
            if let Err(abort_err) = client.abort(&run_id, &reason).await {
                tracing::warn!(character = %character, error = %abort_err, "Abort failed");
            }
            return Err(lost(reason));
        }

        let result = self.await_run(client, &run_id).await;

        match self.broker.stop_risk_feed(character).await {
            Ok(was_running) => {
                tracing::debug!(character = %character, was_running, "Risk feed stopped")
            }
            Err(err) => {
                tracing::warn!(character = %character, error = %err, "Risk feed stop failed")
            }
        }

        let status = result.map_err(lost)?;
        match status.status {
            CrewStatus::Success => Ok(status),
            _ => Err(lost(
                status
                    .failure_reason
                    .unwrap_or_else(|| "Heist failed".to_string()),
            )),
        }
    }

    async fn start_risk_feed(
        &self,
        character: &str,
        risk_factor: u8,
    ) -> Result<(), OrchestratorError> {
        let attempts = self.settings.risk_feed_retries + 1;
        let mut last_error = OrchestratorError::ChannelUnavailable(character.to_string());

        for attempt in 1..=attempts {
            match self.broker.start_risk_feed(character, risk_factor).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        character = %character,
                        attempt,
                        error = %err,
                        "Risk feed not started"
                    );
                    last_error = err;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        }
        Err(last_error)
    }

    /// Wait for the run to end; a stalled run is aborted before reporting
    async fn await_run(
        &self,
        client: &dyn CrewClient,
        run_id: &str,
    ) -> Result<CrewStatusResponse, String> {
        match client.wait_for_terminal(run_id, &self.settings).await {
            Ok(status) => {
                tracing::info!(
                    character = %client.character(),
                    run_id = %run_id,
                    status = ?status.status,
                    turns = status.turns_completed,
                    risk_level = status.risk_level,
                    "Run finished"
                );
                Ok(status)
            }
            Err(err) => {
                let reason = match &err {
                    OrchestratorError::Stalled { .. } => format!(
                        "No progress for {} polls, run aborted",
                        self.settings.stall_poll_limit
                    ),
                    other => format!("Lost track of the run: {other}"),
                };
                if let Err(abort_err) = client.abort(run_id, &reason).await {
                    tracing::warn!(
                        character = %client.character(),
                        error = %abort_err,
                        "Abort failed"
                    );
                }
                Err(reason)
            }
        }
    }

    async fn settle(
        &self,
        mission_id: &str,
        offer: &Offer,
        heist: &CrewStatusResponse,
    ) -> SettlementRecord {
        let base_loot = offer.loot;
        let bonus_loot = heist.bonus_loot;
        let total_loot = base_loot + bonus_loot;
        let split = LootSplit::compute(
            total_loot,
            self.settings.num_parties,
            &self.settings.requester,
            [self.crew[0].character(), self.crew[1].character()],
            &self.settings.broker_name,
        );

        tracing::info!(
            mission_id = %mission_id,
            base_loot,
            bonus_loot,
            total_loot,
            share = split.share,
            remainder = split.remainder,
            "{}", MissionPhase::Settlement
        );

        let mut payments = Vec::with_capacity(3);
        for client in &self.crew {
            let ack = match client.settle(split.share).await {
                Ok(response) => PaymentAck {
                    party: client.character().to_string(),
                    accepted: response.accepted,
                    message: response.message,
                },
                Err(err) => PaymentAck {
                    party: client.character().to_string(),
                    accepted: false,
                    message: err.to_string(),
                },
            };
            payments.push(ack);
        }

        let broker_ack = match self.broker.settle(split.broker_amount()).await {
            Ok(response) => PaymentAck {
                party: self.settings.broker_name.clone(),
                accepted: response.accepted,
                message: response.message,
            },
            Err(err) => PaymentAck {
                party: self.settings.broker_name.clone(),
                accepted: false,
                message: err.to_string(),
            },
        };
        payments.push(broker_ack);

        for ack in &payments {
            if ack.accepted {
                tracing::info!(party = %ack.party, message = %ack.message, "Payment acknowledged");
            } else {
                tracing::warn!(party = %ack.party, message = %ack.message, "Payment refused");
            }
        }

        SettlementRecord {
            mission_id: mission_id.to_string(),
            outcome: MissionOutcome::Success,
            base_loot,
            bonus_loot,
            total_loot,
            shares: split.shares,
            remainder: split.remainder,
            payments,
            failure: None,
            created_at: Utc::now(),
        }
    }

    fn crew_client(&self, character: &str) -> &dyn CrewClient {
        if self.crew[0].character() == character {
            self.crew[0].as_ref()
        } else {
            self.crew[1].as_ref()
        }
    }
}

/// Terminal status of `run_id`, if the crew member already finished it
async fn finished_run(client: &dyn CrewClient, run_id: &str) -> Option<CrewStatusResponse> {
    match client.status().await {
        Ok(status) if status.run_id.as_deref() == Some(run_id) && status.is_terminal() => {
            Some(status)
        }
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(character = %client.character(), error = %err, "Status check failed");
            None
        }
    }
}

fn failure_record(mission_id: &str, base_loot: i64, detail: FailureDetail) -> SettlementRecord {
    SettlementRecord {
        mission_id: mission_id.to_string(),
        outcome: MissionOutcome::Failed,
        base_loot,
        bonus_loot: 0,
        total_loot: 0,
        shares: Vec::new(),
        remainder: 0,
        payments: Vec::new(),
        failure: Some(detail),
        created_at: Utc::now(),
    }
}
