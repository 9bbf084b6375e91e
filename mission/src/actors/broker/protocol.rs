//! BrokerActor message protocol

use ractor::RpcReplyPort;
use shared_types::{Offer, SettlementRecord};

use crate::actors::broker::negotiation::NegotiationState;

/// Messages handled by BrokerActor
#[derive(Debug)]
pub enum BrokerMsg {
    /// Next offer for `requester`, `None` if unavailable or exhausted
    NextOffer {
        requester: String,
        reply: RpcReplyPort<Option<Offer>>,
    },
    /// Accept or reject the requester's current offer
    Decide {
        requester: String,
        accepted: bool,
        reply: RpcReplyPort<String>,
    },
    /// Begin publishing risk levels to `character`; replies with the period
    StartRiskFeed {
        character: String,
        risk_factor: u8,
        reply: RpcReplyPort<Result<std::time::Duration, BrokerError>>,
    },
    /// Stop a running feed; replies whether one was running
    StopRiskFeed {
        character: String,
        reply: RpcReplyPort<bool>,
    },
    /// Receive the broker's share
    Settle {
        amount: i64,
        reply: RpcReplyPort<Result<String, BrokerError>>,
    },
    /// Final mission report from the orchestrator
    RecordFinalReport {
        record: SettlementRecord,
        reply: RpcReplyPort<String>,
    },
    /// Reports received so far, oldest first
    GetReports {
        reply: RpcReplyPort<Vec<SettlementRecord>>,
    },
    GetNegotiation {
        requester: String,
        reply: RpcReplyPort<Option<NegotiationState>>,
    },
}

/// Errors returned by BrokerActor commands
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Nobody is listening on the character's risk channel
    #[error("risk channel unavailable for {0}")]
    ChannelUnavailable(String),
    #[error("payment of ${0} rejected")]
    PaymentRejected(i64),
}

impl BrokerError {
    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::ChannelUnavailable(_) => "CHANNEL_UNAVAILABLE",
            BrokerError::PaymentRejected(_) => "PAYMENT_REJECTED",
        }
    }
}
