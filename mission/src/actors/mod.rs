pub mod broker;
pub mod crew;
pub mod risk_channel;

pub use broker::{BrokerActor, BrokerArguments, BrokerMsg, BrokerPolicy};
pub use crew::{CrewActor, CrewArguments, CrewMsg, CrewProfile, CrewSettings};
pub use risk_channel::{RiskExchange, RiskInbox, RiskSignal};
