//! BrokerActor - serves offers, negotiates, and drives risk feeds
//!
//! The BrokerActor is responsible for:
//! - Handing out offers to each requester in sequence
//! - Tracking per-requester negotiation state (cursor, rejections, cooldown)
//! - Starting and stopping risk feeds on the RiskExchange
//! - Accepting its share and keeping a ledger of final reports

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use shared_types::{Offer, SettlementRecord};

use crate::actors::broker::{
    negotiation::OfferDesk,
    protocol::{BrokerError, BrokerMsg},
    risk_feed::{RiskFeedSettings, RiskFeeds},
};
use crate::actors::risk_channel::RiskExchange;
use crate::report::ReportSink;

/// BrokerActor - single instance per server
#[derive(Debug, Default)]
pub struct BrokerActor;

/// Negotiation and feed behaviour of the broker
#[derive(Debug, Clone)]
pub struct BrokerPolicy {
    /// Probability that a NextOffer call finds no work at all
    pub unavailable_chance: f64,
    /// Consecutive rejections that earn a cooldown
    pub rejection_limit: u32,
    /// Delay served before the next offer once the limit is hit
    pub cooldown: Duration,
    pub risk_feed: RiskFeedSettings,
}

impl Default for BrokerPolicy {
    fn default() -> Self {
        Self {
            unavailable_chance: 0.1,
            rejection_limit: 3,
            cooldown: Duration::from_secs(10),
            risk_feed: RiskFeedSettings::default(),
        }
    }
}

/// Final reports kept in the ledger; older ones are dropped first
pub const REPORT_LEDGER_LIMIT: usize = 100;

/// Arguments for spawning BrokerActor
#[derive(Clone)]
pub struct BrokerArguments {
    pub offers: Vec<Offer>,
    pub policy: BrokerPolicy,
    pub risk_exchange: RiskExchange,
    /// Optional destination for final reports besides the in-memory ledger
    pub report_sink: Option<Arc<dyn ReportSink>>,
}

/// Internal state for BrokerActor
pub struct BrokerState {
    policy: BrokerPolicy,
    desk: OfferDesk,
    feeds: RiskFeeds,
    reports: VecDeque<SettlementRecord>,
    report_sink: Option<Arc<dyn ReportSink>>,
}

#[async_trait]
impl Actor for BrokerActor {
    type Msg = BrokerMsg;
    type State = BrokerState;
    type Arguments = BrokerArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let desk = OfferDesk::new(args.offers, args.policy.rejection_limit);
        if desk.is_empty() {
            tracing::warn!(actor_id = %myself.get_id(), "BrokerActor starting without offers");
        } else {
            tracing::info!(
                actor_id = %myself.get_id(),
                offers = desk.len(),
                "BrokerActor starting"
            );
        }

        Ok(BrokerState {
            desk,
            feeds: RiskFeeds::new(args.risk_exchange, args.policy.risk_feed.clone()),
            policy: args.policy,
            reports: VecDeque::new(),
            report_sink: args.report_sink,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            BrokerMsg::NextOffer { requester, reply } => {
                if rand::rng().random_bool(state.policy.unavailable_chance.clamp(0.0, 1.0)) {
                    tracing::info!(requester = %requester, "No work available right now");
                    let _ = reply.send(None);
                    return Ok(());
                }

                let served = state.desk.next_offer(&requester);
                let Some(offer) = served.offer else {
                    tracing::info!(requester = %requester, "Offer sequence exhausted");
                    let _ = reply.send(None);
                    return Ok(());
                };

                tracing::info!(
                    requester = %requester,
                    offer = served.position,
                    loot = offer.loot,
                    success_rate_a = offer.success_rate_a,
                    success_rate_b = offer.success_rate_b,
                    risk_factor = offer.risk_factor,
                    "Serving offer"
                );

                if served.cooldown_due {
                    // Delay the reply only; the mailbox keeps serving others.
                    let cooldown = state.policy.cooldown;
                    tracing::info!(
                        requester = %requester,
                        cooldown_ms = cooldown.as_millis() as u64,
                        "Too many rejections, making the requester wait"
                    );
                    tokio::spawn(async move {
                        tokio::time::sleep(cooldown).await;
                        let _ = reply.send(Some(offer));
                    });
                } else {
                    let _ = reply.send(Some(offer));
                }
            }
            BrokerMsg::Decide {
                requester,
                accepted,
                reply,
            } => {
                let message = state.desk.decide(&requester, accepted);
                let _ = reply.send(message.to_string());
            }
            BrokerMsg::StartRiskFeed {
                character,
                risk_factor,
                reply,
            } => {
                let result = match state.feeds.start(&character, risk_factor).await {
                    Some(period) => {
                        tracing::info!(
                            character = %character,
                            risk_factor,
                            period_ms = period.as_millis() as u64,
                            "Risk feed started"
                        );
                        Ok(period)
                    }
                    None => {
                        tracing::warn!(character = %character, "Risk channel unavailable");
                        Err(BrokerError::ChannelUnavailable(character))
                    }
                };
                let _ = reply.send(result);
            }
            BrokerMsg::StopRiskFeed { character, reply } => {
                let was_running = state.feeds.stop(&character);
                tracing::debug!(character = %character, was_running, "Risk feed stop requested");
                let _ = reply.send(was_running);
            }
            BrokerMsg::Settle { amount, reply } => {
                let result = if amount > 0 {
                    tracing::info!(amount, "Broker payment accepted");
                    Ok("Pleasure doing business with you.".to_string())
                } else {
                    tracing::warn!(amount, "Broker payment rejected");
                    Err(BrokerError::PaymentRejected(amount))
                };
                let _ = reply.send(result);
            }
            BrokerMsg::RecordFinalReport { record, reply } => {
                tracing::info!(
                    mission_id = %record.mission_id,
                    outcome = ?record.outcome,
                    total_loot = record.total_loot,
                    shares = record.shares.len(),
                    "Final report received"
                );

                if let Some(sink) = state.report_sink.clone() {
                    let forwarded = record.clone();
                    tokio::spawn(async move {
                        if let Err(err) = sink.write_report(&forwarded).await {
                            tracing::warn!(
                                mission_id = %forwarded.mission_id,
                                error = %err,
                                "Failed to persist final report"
                            );
                        }
                    });
                }

                let message = format!("Report for mission {} filed.", record.mission_id);
                if state.reports.len() == REPORT_LEDGER_LIMIT {
                    state.reports.pop_front();
                }
                state.reports.push_back(record);
                let _ = reply.send(message);
            }
            BrokerMsg::GetReports { reply } => {
                let _ = reply.send(state.reports.iter().cloned().collect());
            }
            BrokerMsg::GetNegotiation { requester, reply } => {
                let _ = reply.send(state.desk.state(&requester));
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.feeds.stop_all();
        tracing::info!(actor_id = %myself.get_id(), "BrokerActor stopped");
        Ok(())
    }
}
