//! Crew run state machine
//!
//! `MissionRun::apply` is the only place a run changes. The crew actor feeds
//! it ticks, risk levels and teardown events one at a time from its mailbox,
//! so a run never sees two writers and every snapshot is consistent.
//!
//! ## State Machine
//!
//! ```text
//! Pending ──(completed == required)──> Success
//!    │
//!    └──(mishap | risk ≥ ceiling | channel closed | abort)──> Failed
//! ```

use chrono::{DateTime, Utc};
use shared_types::{CrewStatusResponse, RunOutcome, RunPhase};

use super::profile::CrewProfile;

/// Input to the run state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// One turn of work elapsed
    Tick,
    /// A risk level arrived from the risk channel
    Risk(u32),
    /// The risk channel went away while the run was consuming it
    RiskChannelClosed,
    /// The run was cancelled from outside
    Abort(String),
}

/// What an event did to the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// No field changed (terminal run, stale risk level, wrong phase)
    Ignored,
    Progressed,
    AbilityActivated,
    Succeeded,
    Failed(String),
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Succeeded | Transition::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionRun {
    pub run_id: String,
    pub phase: RunPhase,
    pub outcome: RunOutcome,
    pub required_turns: u32,
    pub completed_turns: u32,
    pub risk_level: u32,
    pub ability_active: bool,
    pub base_loot: i64,
    pub bonus_loot: i64,
    pub final_loot: i64,
    pub failure_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MissionRun {
    pub fn distraction(run_id: impl Into<String>, required_turns: u32) -> Self {
        Self::new(run_id.into(), RunPhase::Distraction, required_turns, 0)
    }

    pub fn heist(run_id: impl Into<String>, required_turns: u32, base_loot: i64) -> Self {
        Self::new(run_id.into(), RunPhase::Heist, required_turns, base_loot)
    }

    fn new(run_id: String, phase: RunPhase, required_turns: u32, base_loot: i64) -> Self {
        Self {
            run_id,
            phase,
            outcome: RunOutcome::Pending,
            required_turns,
            completed_turns: 0,
            risk_level: 0,
            ability_active: false,
            base_loot,
            bonus_loot: 0,
            final_loot: base_loot,
            failure_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// Apply one event. `roll` is asked for the distraction mishap with the
    /// profile's chance and is only called at the halfway turn.
    pub fn apply<R>(&mut self, event: RunEvent, profile: &CrewProfile, roll: R) -> Transition
    where
        R: FnOnce(f64) -> bool,
    {
        if self.is_terminal() {
            return Transition::Ignored;
        }

        match event {
            RunEvent::Tick => self.on_tick(profile, roll),
            RunEvent::Risk(level) => self.on_risk(level, profile),
            RunEvent::RiskChannelClosed => match self.phase {
                RunPhase::Heist => self.fail("Risk channel closed during the heist".to_string()),
                RunPhase::Distraction => Transition::Ignored,
            },
            RunEvent::Abort(reason) => self.fail(reason),
        }
    }

    fn on_tick<R>(&mut self, profile: &CrewProfile, roll: R) -> Transition
    where
        R: FnOnce(f64) -> bool,
    {
        if self.completed_turns < self.required_turns {
            self.completed_turns += 1;
        }

        match self.phase {
            RunPhase::Distraction => {
                let halfway = self.required_turns / 2;
                if self.completed_turns == halfway && roll(profile.mishap_chance) {
                    return self.fail(profile.mishap_reason.clone());
                }
            }
            RunPhase::Heist => {
                if self.ability_active {
                    self.bonus_loot += profile.bonus_per_tick;
                    self.final_loot = self.base_loot + self.bonus_loot;
                }
            }
        }

        if self.completed_turns == self.required_turns {
            self.final_loot = self.base_loot + self.bonus_loot;
            self.outcome = RunOutcome::Success;
            self.finished_at = Some(Utc::now());
            return Transition::Succeeded;
        }

        Transition::Progressed
    }

    fn on_risk(&mut self, level: u32, profile: &CrewProfile) -> Transition {
        if self.phase != RunPhase::Heist || level <= self.risk_level {
            // Distraction runs have no risk feed; lower or repeated levels
            // are late deliveries and carry no new information.
            return Transition::Ignored;
        }
        self.risk_level = level;

        let mut transition = Transition::Progressed;
        if !self.ability_active && profile.triggers_ability(level) {
            self.ability_active = true;
            transition = Transition::AbilityActivated;
        }

        let ceiling = profile.failure_ceiling_for(self.ability_active);
        if level >= ceiling {
            return self.fail(format!("Too many wanted stars ({level}/{ceiling})"));
        }

        transition
    }

    fn fail(&mut self, reason: String) -> Transition {
        self.outcome = RunOutcome::Failed;
        self.failure_reason = Some(reason.clone());
        self.finished_at = Some(Utc::now());
        Transition::Failed(reason)
    }

    pub fn snapshot(&self, character: &str) -> CrewStatusResponse {
        CrewStatusResponse {
            character: character.to_string(),
            run_id: Some(self.run_id.clone()),
            phase: Some(self.phase),
            status: self.outcome.into(),
            turns_completed: self.completed_turns,
            total_turns: self.required_turns,
            risk_level: self.risk_level,
            bonus_loot: self.bonus_loot,
            final_loot: self.final_loot,
            ability_active: self.ability_active,
            failure_reason: self.failure_reason.clone(),
        }
    }
}
