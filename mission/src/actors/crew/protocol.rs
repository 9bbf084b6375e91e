//! CrewActor message protocol
//!
//! Defines the messages that can be sent to a CrewActor and the error type
//! returned by its commands.

use ractor::RpcReplyPort;
use shared_types::CrewStatusResponse;
use tokio::sync::watch;

/// Messages handled by CrewActor
#[derive(Debug)]
pub enum CrewMsg {
    /// Start a distraction run; replies with the run id
    BeginDistraction {
        run_id: Option<String>,
        required_turns: u32,
        reply: RpcReplyPort<Result<String, CrewError>>,
    },
    /// Start a heist run; replies with the run id
    BeginHeist {
        run_id: Option<String>,
        required_turns: u32,
        risk_factor: u8,
        base_loot: i64,
        reply: RpcReplyPort<Result<String, CrewError>>,
    },
    /// Snapshot of the latest run (`waiting` if none)
    GetStatus {
        reply: RpcReplyPort<CrewStatusResponse>,
    },
    /// Snapshot of a specific run
    GetRunStatus {
        run_id: String,
        reply: RpcReplyPort<Option<CrewStatusResponse>>,
    },
    /// Push notifications for every change of a run
    Subscribe {
        run_id: String,
        reply: RpcReplyPort<Option<watch::Receiver<CrewStatusResponse>>>,
    },
    /// Fail a pending run from outside; replies whether it was pending
    Abort {
        run_id: String,
        reason: String,
        reply: RpcReplyPort<bool>,
    },
    /// Receive a share of the proceeds
    Settle {
        amount: i64,
        reply: RpcReplyPort<Result<String, CrewError>>,
    },
    /// Final loot of the latest successful heist
    GetFinalLoot {
        reply: RpcReplyPort<Result<i64, CrewError>>,
    },
    /// Progress ticker (internal)
    Tick { run_id: String },
    /// Risk level forwarded from the risk channel (internal)
    RiskLevel { run_id: String, level: u32 },
    /// Risk channel torn down (internal)
    RiskChannelClosed { run_id: String },
}

/// Errors returned by CrewActor commands
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CrewError {
    /// A run is already pending on this actor
    #[error("already busy with run {0}")]
    AlreadyBusy(String),
    /// No successful run to settle or read loot from
    #[error("not ready: {0}")]
    NotReady(String),
    /// Settlement amount does not match the expected share
    #[error("expected ${expected}, received ${received}")]
    AmountMismatch { expected: i64, received: i64 },
    /// Invalid command parameters
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A run with this id already exists
    #[error("run already exists: {0}")]
    DuplicateRun(String),
}

impl CrewError {
    pub fn code(&self) -> &'static str {
        match self {
            CrewError::AlreadyBusy(_) => "ALREADY_BUSY",
            CrewError::NotReady(_) => "NOT_READY",
            CrewError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            CrewError::InvalidRequest(_) => "INVALID_REQUEST",
            CrewError::DuplicateRun(_) => "DUPLICATE_RUN",
        }
    }
}
