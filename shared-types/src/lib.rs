//! Shared types between the mission server and its clients
//!
//! These types are used by both:
//! - the crew and broker actors (server side)
//! - the orchestrator's HTTP clients
//!
//! Serializable with serde for JSON over HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Offers and Negotiation
// ============================================================================

/// A job offer as served by the broker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Offer {
    /// Base loot of the job
    pub loot: i64,
    /// Success rate (0-100) of the first crew member
    pub success_rate_a: u8,
    /// Success rate (0-100) of the second crew member
    pub success_rate_b: u8,
    /// Police risk factor (0-100)
    pub risk_factor: u8,
}

/// Wire shape of `NextOffer`; `has_offer = false` means "no offer"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OfferResponse {
    pub has_offer: bool,
    pub loot: i64,
    pub success_rate_a: u8,
    pub success_rate_b: u8,
    pub risk_factor: u8,
}

impl From<Option<Offer>> for OfferResponse {
    fn from(offer: Option<Offer>) -> Self {
        match offer {
            Some(offer) => Self {
                has_offer: true,
                loot: offer.loot,
                success_rate_a: offer.success_rate_a,
                success_rate_b: offer.success_rate_b,
                risk_factor: offer.risk_factor,
            },
            None => Self::default(),
        }
    }
}

impl OfferResponse {
    pub fn into_offer(self) -> Option<Offer> {
        self.has_offer.then_some(Offer {
            loot: self.loot,
            success_rate_a: self.success_rate_a,
            success_rate_b: self.success_rate_b,
            risk_factor: self.risk_factor,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextOfferQuery {
    pub requester: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub requester: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFeedRequest {
    pub character: String,
    pub risk_factor: u8,
}

/// Generic accepted/message reply (risk feeds, payments)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckResponse {
    pub accepted: bool,
    pub message: String,
}

// ============================================================================
// Crew Runs
// ============================================================================

/// Phase of a single crew run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Distraction,
    Heist,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Distraction => write!(f, "distraction"),
            RunPhase::Heist => write!(f, "heist"),
        }
    }
}

/// Outcome of a single crew run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Pending,
    Success,
    Failed,
}

impl RunOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunOutcome::Pending)
    }
}

/// Externally visible crew status; `Waiting` before any run was started
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CrewStatus {
    Waiting,
    Working,
    Success,
    Failed,
}

impl From<RunOutcome> for CrewStatus {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Pending => CrewStatus::Working,
            RunOutcome::Success => CrewStatus::Success,
            RunOutcome::Failed => CrewStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginDistractionRequest {
    #[serde(default)]
    pub run_id: Option<String>,
    pub required_turns: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginHeistRequest {
    #[serde(default)]
    pub run_id: Option<String>,
    pub required_turns: u32,
    pub risk_factor: u8,
    pub base_loot: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BeginResponse {
    pub accepted: bool,
    pub message: String,
    pub run_id: Option<String>,
}

/// Consistent snapshot of a crew member's latest run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrewStatusResponse {
    pub character: String,
    pub run_id: Option<String>,
    pub phase: Option<RunPhase>,
    pub status: CrewStatus,
    pub turns_completed: u32,
    pub total_turns: u32,
    pub risk_level: u32,
    pub bonus_loot: i64,
    pub final_loot: i64,
    pub ability_active: bool,
    pub failure_reason: Option<String>,
}

impl CrewStatusResponse {
    /// Status of an actor that has never been given a run
    pub fn waiting(character: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            run_id: None,
            phase: None,
            status: CrewStatus::Waiting,
            turns_completed: 0,
            total_turns: 0,
            risk_level: 0,
            bonus_loot: 0,
            final_loot: 0,
            ability_active: false,
            failure_reason: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, CrewStatus::Success | CrewStatus::Failed)
    }

    /// Fields whose change counts as progress when watching for stalls
    pub fn progress_marker(&self) -> (u32, u32, i64) {
        (self.turns_completed, self.risk_level, self.bonus_loot)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortRequest {
    pub run_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleRequest {
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettleResponse {
    pub accepted: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalLootResponse {
    pub character: String,
    pub final_loot: i64,
}

// ============================================================================
// Settlement
// ============================================================================

/// Mission-level phase, used to tag where a mission failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    Negotiation,
    Distraction,
    Heist,
    Settlement,
}

impl std::fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionPhase::Negotiation => write!(f, "Phase 1: Negotiation"),
            MissionPhase::Distraction => write!(f, "Phase 2: Distraction"),
            MissionPhase::Heist => write!(f, "Phase 3: Heist"),
            MissionPhase::Settlement => write!(f, "Phase 4: Settlement"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Orchestrator,
    Crew,
    Broker,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartyShare {
    pub party: String,
    pub role: PartyRole,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentAck {
    pub party: String,
    pub accepted: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureDetail {
    pub phase: MissionPhase,
    pub character: Option<String>,
    pub reason: String,
    pub lost_loot: i64,
}

/// Final record of one mission, built once at the end of the run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementRecord {
    pub mission_id: String,
    pub outcome: MissionOutcome,
    pub base_loot: i64,
    pub bonus_loot: i64,
    pub total_loot: i64,
    pub shares: Vec<PartyShare>,
    /// Part of `total_loot` that went to the broker on top of its even share
    pub remainder: i64,
    pub payments: Vec<PaymentAck>,
    pub failure: Option<FailureDetail>,
    pub created_at: DateTime<Utc>,
}

impl SettlementRecord {
    pub fn share_for(&self, party: &str) -> Option<i64> {
        self.shares
            .iter()
            .find(|share| share.party == party)
            .map(|share| share.amount)
    }

    pub fn shares_total(&self) -> i64 {
        self.shares.iter().map(|share| share.amount).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportAck {
    pub message: String,
}

/// Machine-readable error body returned by the HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
