//! BrokerActor - offer negotiation and risk feeds
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ractor::Actor;
//! use crate::actors::broker::{BrokerActor, BrokerArguments, BrokerPolicy};
//!
//! let args = BrokerArguments {
//!     offers,
//!     policy: BrokerPolicy::default(),
//!     risk_exchange: exchange.clone(),
//!     report_sink: None,
//! };
//!
//! let (broker_ref, _handle) =
//!     Actor::spawn(Some(BROKER_ACTOR_NAME.into()), BrokerActor, args).await?;
//! ```

pub mod actor;
pub mod negotiation;
pub mod protocol;
pub mod risk_feed;

pub use actor::{BrokerActor, BrokerArguments, BrokerPolicy, BrokerState, REPORT_LEDGER_LIMIT};
pub use negotiation::{NegotiationState, OfferDesk};
pub use protocol::{BrokerError, BrokerMsg};
pub use risk_feed::{publish_period, RiskFeedSettings};

pub const BROKER_ACTOR_NAME: &str = "broker";
