//! CrewActor - runs one character's mission runs
//!
//! The CrewActor is responsible for:
//! - Starting distraction and heist runs (one pending run at a time)
//! - Driving the progress ticker and the risk consumer for the active run
//! - Serializing every run mutation through its own mailbox
//! - Answering status, loot and settlement requests

use async_trait::async_trait;
use rand::Rng;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use shared_types::{CrewStatusResponse, RunOutcome, RunPhase};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::actors::crew::{
    profile::CrewProfile,
    protocol::{CrewError, CrewMsg},
    state::{MissionRun, RunEvent, Transition},
};
use crate::actors::risk_channel::{RiskExchange, RiskInbox};

/// Runs kept queryable per actor, the latest included; older ones are dropped
pub const RUN_HISTORY_LIMIT: usize = 16;

/// CrewActor - one instance per character
#[derive(Debug, Default)]
pub struct CrewActor;

/// Timing and settlement settings shared by all crew actors
#[derive(Debug, Clone)]
pub struct CrewSettings {
    /// Interval between two turns of work
    pub turn_tick: Duration,
    /// Number of parties the proceeds are split between
    pub num_parties: i64,
}

impl Default for CrewSettings {
    fn default() -> Self {
        Self {
            turn_tick: Duration::from_millis(10),
            num_parties: 4,
        }
    }
}

/// Arguments for spawning CrewActor
#[derive(Clone)]
pub struct CrewArguments {
    pub profile: CrewProfile,
    pub settings: CrewSettings,
    pub risk_exchange: RiskExchange,
}

struct RunSlot {
    run: MissionRun,
    notifier: watch::Sender<CrewStatusResponse>,
}

/// Background tasks feeding the active run
struct RunActivities {
    run_id: String,
    ticker: JoinHandle<()>,
    risk_forwarder: Option<JoinHandle<()>>,
}

/// Internal state for CrewActor
pub struct CrewState {
    profile: CrewProfile,
    settings: CrewSettings,
    risk_exchange: RiskExchange,
    runs: HashMap<String, RunSlot>,
    /// Run ids oldest first
    run_order: VecDeque<String>,
    latest_run: Option<String>,
    activities: Option<RunActivities>,
}

impl CrewState {
    fn latest(&self) -> Option<&MissionRun> {
        self.latest_run
            .as_ref()
            .and_then(|run_id| self.runs.get(run_id))
            .map(|slot| &slot.run)
    }

    fn pending_run_id(&self) -> Option<String> {
        self.latest()
            .filter(|run| !run.is_terminal())
            .map(|run| run.run_id.clone())
    }
}

enum RunRequest {
    Distraction,
    Heist { risk_factor: u8, base_loot: i64 },
}

#[async_trait]
impl Actor for CrewActor {
    type Msg = CrewMsg;
    type State = CrewState;
    type Arguments = CrewArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            character = %args.profile.name,
            "CrewActor starting"
        );

        Ok(CrewState {
            profile: args.profile,
            settings: args.settings,
            risk_exchange: args.risk_exchange,
            runs: HashMap::new(),
            run_order: VecDeque::new(),
            latest_run: None,
            activities: None,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CrewMsg::BeginDistraction {
                run_id,
                required_turns,
                reply,
            } => {
                let result = self
                    .begin_run(myself, state, run_id, required_turns, RunRequest::Distraction)
                    .await;
                let _ = reply.send(result);
            }
            CrewMsg::BeginHeist {
                run_id,
                required_turns,
                risk_factor,
                base_loot,
                reply,
            } => {
                let request = RunRequest::Heist {
                    risk_factor,
                    base_loot,
                };
                let result = self
                    .begin_run(myself, state, run_id, required_turns, request)
                    .await;
                let _ = reply.send(result);
            }
            CrewMsg::GetStatus { reply } => {
                let status = state
                    .latest()
                    .map(|run| run.snapshot(&state.profile.name))
                    .unwrap_or_else(|| CrewStatusResponse::waiting(state.profile.name.clone()));
                let _ = reply.send(status);
            }
            CrewMsg::GetRunStatus { run_id, reply } => {
                let status = state
                    .runs
                    .get(&run_id)
                    .map(|slot| slot.run.snapshot(&state.profile.name));
                let _ = reply.send(status);
            }
            CrewMsg::Subscribe { run_id, reply } => {
                let receiver = state.runs.get(&run_id).map(|slot| slot.notifier.subscribe());
                let _ = reply.send(receiver);
            }
            CrewMsg::Abort {
                run_id,
                reason,
                reply,
            } => {
                let transition = self
                    .apply_event(state, &run_id, RunEvent::Abort(reason))
                    .await;
                let _ = reply.send(transition.is_terminal());
            }
            CrewMsg::Settle { amount, reply } => {
                let result = settle(state, amount);
                match &result {
                    Ok(message) => tracing::info!(
                        character = %state.profile.name,
                        amount,
                        message = %message,
                        "Payment accepted"
                    ),
                    Err(err) => tracing::warn!(
                        character = %state.profile.name,
                        amount,
                        error = %err,
                        "Payment rejected"
                    ),
                }
                let _ = reply.send(result);
            }
            CrewMsg::GetFinalLoot { reply } => {
                let _ = reply.send(final_loot(state));
            }
            CrewMsg::Tick { run_id } => {
                self.apply_event(state, &run_id, RunEvent::Tick).await;
            }
            CrewMsg::RiskLevel { run_id, level } => {
                self.apply_event(state, &run_id, RunEvent::Risk(level)).await;
            }
            CrewMsg::RiskChannelClosed { run_id } => {
                self.apply_event(state, &run_id, RunEvent::RiskChannelClosed)
                    .await;
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        stop_activities(state).await;
        tracing::info!(
            actor_id = %myself.get_id(),
            character = %state.profile.name,
            "CrewActor stopped"
        );
        Ok(())
    }
}

impl CrewActor {
    async fn begin_run(
        &self,
        myself: ActorRef<CrewMsg>,
        state: &mut CrewState,
        run_id: Option<String>,
        required_turns: u32,
        request: RunRequest,
    ) -> Result<String, CrewError> {
        if required_turns == 0 {
            return Err(CrewError::InvalidRequest(
                "required_turns must be greater than zero".to_string(),
            ));
        }
        if let Some(active) = state.pending_run_id() {
            return Err(CrewError::AlreadyBusy(active));
        }

        let run_id = run_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| ulid::Ulid::new().to_string());
        if state.runs.contains_key(&run_id) {
            return Err(CrewError::DuplicateRun(run_id));
        }

        // Leftovers of a previous run never outlive the start of the next one.
        stop_activities(state).await;

        let run = match request {
            RunRequest::Distraction => {
                tracing::info!(
                    character = %state.profile.name,
                    run_id = %run_id,
                    required_turns,
                    "Starting distraction"
                );
                MissionRun::distraction(run_id.clone(), required_turns)
            }
            RunRequest::Heist {
                risk_factor,
                base_loot,
            } => {
                tracing::info!(
                    character = %state.profile.name,
                    run_id = %run_id,
                    required_turns,
                    risk_factor,
                    base_loot,
                    "Starting heist"
                );
                MissionRun::heist(run_id.clone(), required_turns, base_loot)
            }
        };

        let phase = run.phase;
        let (notifier, _) = watch::channel(run.snapshot(&state.profile.name));
        state.runs.insert(run_id.clone(), RunSlot { run, notifier });
        state.run_order.push_back(run_id.clone());
        state.latest_run = Some(run_id.clone());
        prune_history(state);

        let risk_forwarder = match phase {
            RunPhase::Heist => {
                let inbox = state
                    .risk_exchange
                    .attach(&state.profile.name, &run_id)
                    .await;
                Some(spawn_risk_forwarder(myself.clone(), run_id.clone(), inbox))
            }
            RunPhase::Distraction => None,
        };
        let ticker = spawn_ticker(myself, run_id.clone(), state.settings.turn_tick);

        state.activities = Some(RunActivities {
            run_id: run_id.clone(),
            ticker,
            risk_forwarder,
        });

        Ok(run_id)
    }

    async fn apply_event(
        &self,
        state: &mut CrewState,
        run_id: &str,
        event: RunEvent,
    ) -> Transition {
        let Some(slot) = state.runs.get_mut(run_id) else {
            tracing::debug!(run_id = %run_id, "Event for unknown run dropped");
            return Transition::Ignored;
        };

        let transition = slot.run.apply(event, &state.profile, |chance| {
            rand::rng().random_bool(chance)
        });
        if transition == Transition::Ignored {
            return transition;
        }
        slot.notifier
            .send_replace(slot.run.snapshot(&state.profile.name));

        let character = &state.profile.name;
        match &transition {
            Transition::Progressed => {
                tracing::trace!(
                    character = %character,
                    run_id = %run_id,
                    turns = slot.run.completed_turns,
                    risk_level = slot.run.risk_level,
                    "Run progressed"
                );
            }
            Transition::AbilityActivated => {
                tracing::info!(
                    character = %character,
                    run_id = %run_id,
                    risk_level = slot.run.risk_level,
                    ability = %state.profile.ability_label,
                    "Ability activated"
                );
            }
            Transition::Succeeded => {
                tracing::info!(
                    character = %character,
                    run_id = %run_id,
                    phase = %slot.run.phase,
                    bonus_loot = slot.run.bonus_loot,
                    final_loot = slot.run.final_loot,
                    "Run completed successfully"
                );
            }
            Transition::Failed(reason) => {
                tracing::warn!(
                    character = %character,
                    run_id = %run_id,
                    phase = %slot.run.phase,
                    turns = slot.run.completed_turns,
                    risk_level = slot.run.risk_level,
                    reason = %reason,
                    "Run failed"
                );
            }
            Transition::Ignored => {}
        }

        if transition.is_terminal()
            && state
                .activities
                .as_ref()
                .is_some_and(|activities| activities.run_id == run_id)
        {
            stop_activities(state).await;
        }

        transition
    }
}

/// Only the latest run can be pending, so everything pruned is terminal.
fn prune_history(state: &mut CrewState) {
    while state.run_order.len() > RUN_HISTORY_LIMIT {
        if let Some(oldest) = state.run_order.pop_front() {
            state.runs.remove(&oldest);
            tracing::debug!(character = %state.profile.name, run_id = %oldest, "Run forgotten");
        }
    }
}

fn spawn_ticker(myself: ActorRef<CrewMsg>, run_id: String, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let tick = CrewMsg::Tick {
                run_id: run_id.clone(),
            };
            if myself.cast(tick).is_err() {
                break;
            }
        }
    })
}

fn spawn_risk_forwarder(
    myself: ActorRef<CrewMsg>,
    run_id: String,
    mut inbox: RiskInbox,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = inbox.recv().await {
            tracing::debug!(
                character = %inbox.character(),
                run_id = %run_id,
                level = signal.level,
                seq = signal.seq,
                "Risk level received"
            );
            let message = CrewMsg::RiskLevel {
                run_id: run_id.clone(),
                level: signal.level,
            };
            if myself.cast(message).is_err() {
                return;
            }
        }
        let _ = myself.cast(CrewMsg::RiskChannelClosed { run_id });
    })
}

async fn stop_activities(state: &mut CrewState) {
    let Some(activities) = state.activities.take() else {
        return;
    };
    activities.ticker.abort();
    if let Some(forwarder) = activities.risk_forwarder {
        forwarder.abort();
        state
            .risk_exchange
            .detach(&state.profile.name, &activities.run_id)
            .await;
    }
}

fn settle(state: &CrewState, amount: i64) -> Result<String, CrewError> {
    let run = state
        .latest()
        .ok_or_else(|| CrewError::NotReady("no mission run yet".to_string()))?;

    match run.outcome {
        RunOutcome::Pending => {
            return Err(CrewError::NotReady(format!(
                "run {} is still in progress",
                run.run_id
            )))
        }
        RunOutcome::Failed => {
            return Err(CrewError::NotReady(format!("run {} failed", run.run_id)))
        }
        RunOutcome::Success => {}
    }

    // A distraction-only run carries no loot and any payment is welcome.
    if run.final_loot > 0 {
        let expected = run.final_loot / state.settings.num_parties;
        if amount != expected {
            return Err(CrewError::AmountMismatch {
                expected,
                received: amount,
            });
        }
    }

    Ok(state.profile.payment_ack.clone())
}

fn final_loot(state: &CrewState) -> Result<i64, CrewError> {
    match state.latest() {
        Some(run) if run.phase == RunPhase::Heist && run.outcome == RunOutcome::Success => {
            Ok(run.final_loot)
        }
        _ => Err(CrewError::NotReady(format!(
            "{} has not completed a heist successfully",
            state.profile.name
        ))),
    }
}
