//! Orchestrator - drives one mission end to end
//!
//! ## Usage
//!
//! ```rust,ignore
//! let orchestrator = MissionOrchestrator::new(settings, broker, franklin, trevor, sink);
//! let record = orchestrator.run().await;
//! ```

pub mod clients;
pub mod http_client;
pub mod policy;
pub mod runner;

pub use clients::{BrokerClient, CrewClient, LocalBrokerClient, LocalCrewClient, OrchestratorError};
pub use http_client::{build_http_client, HttpBrokerClient, HttpCrewClient};
pub use policy::{accepts_offer, assign_roles, LootSplit, OrchestratorSettings, RoleAssignment};
pub use runner::MissionOrchestrator;
