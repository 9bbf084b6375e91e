//! Orchestrator policy - pure decisions taken during a mission
//!
//! Everything here is deterministic so the runner can stay focused on
//! sequencing remote calls.

use std::time::Duration;

use shared_types::{Offer, PartyRole, PartyShare};

/// Knobs of the mission flow
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Name the orchestrator negotiates and gets paid under
    pub requester: String,
    /// Party name the broker is paid under
    pub broker_name: String,
    /// Turns needed for a run are `turn_budget - success_rate`
    pub turn_budget: u32,
    /// Parties the total loot is split between
    pub num_parties: i64,
    /// Status polling interval for remote crew members
    pub poll_interval: Duration,
    /// Polls without any change before a run counts as stalled
    pub stall_poll_limit: u32,
    /// Pause after a rejected or missing offer
    pub negotiation_backoff: Duration,
    pub max_negotiation_attempts: u32,
    /// Extra StartRiskFeed attempts when the channel is not ready yet
    pub risk_feed_retries: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            requester: "Michael".to_string(),
            broker_name: "Lester".to_string(),
            turn_budget: 200,
            num_parties: 4,
            poll_interval: Duration::from_secs(1),
            stall_poll_limit: 30,
            negotiation_backoff: Duration::from_secs(2),
            max_negotiation_attempts: 50,
            risk_feed_retries: 3,
        }
    }
}

impl OrchestratorSettings {
    /// Longest time a wait may go without observing any progress
    pub fn stall_timeout(&self) -> Duration {
        self.poll_interval * self.stall_poll_limit.max(1)
    }

    pub fn required_turns(&self, success_rate: u8) -> u32 {
        self.turn_budget
            .saturating_sub(u32::from(success_rate))
            .max(1)
    }
}

/// Accept a job when at least one crew member is confident and the police
/// risk is tolerable
pub fn accepts_offer(offer: &Offer) -> bool {
    (offer.success_rate_a > 50 || offer.success_rate_b > 50) && offer.risk_factor < 80
}

/// Who does what for an accepted offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub distraction: String,
    pub distraction_rate: u8,
    pub heist: String,
    pub heist_rate: u8,
}

/// The crew member with the higher success rate runs the distraction; ties
/// go to the second member
pub fn assign_roles(offer: &Offer, first: &str, second: &str) -> RoleAssignment {
    if offer.success_rate_a > offer.success_rate_b {
        RoleAssignment {
            distraction: first.to_string(),
            distraction_rate: offer.success_rate_a,
            heist: second.to_string(),
            heist_rate: offer.success_rate_b,
        }
    } else {
        RoleAssignment {
            distraction: second.to_string(),
            distraction_rate: offer.success_rate_b,
            heist: first.to_string(),
            heist_rate: offer.success_rate_a,
        }
    }
}

/// Equal split of a total between parties; the broker also takes the remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootSplit {
    pub share: i64,
    pub remainder: i64,
    pub shares: Vec<PartyShare>,
}

impl LootSplit {
    pub fn compute(
        total: i64,
        num_parties: i64,
        orchestrator: &str,
        crew: [&str; 2],
        broker: &str,
    ) -> Self {
        let parties = num_parties.max(1);
        let share = total / parties;
        let remainder = total % parties;

        let mut shares = vec![PartyShare {
            party: orchestrator.to_string(),
            role: PartyRole::Orchestrator,
            amount: share,
        }];
        shares.extend(crew.iter().map(|name| PartyShare {
            party: (*name).to_string(),
            role: PartyRole::Crew,
            amount: share,
        }));
        shares.push(PartyShare {
            party: broker.to_string(),
            role: PartyRole::Broker,
            amount: share + remainder,
        });

        Self {
            share,
            remainder,
            shares,
        }
    }

    pub fn broker_amount(&self) -> i64 {
        self.share + self.remainder
    }
}
