//! CrewActor - one character's side of the mission
//!
//! Each crew member runs the same state machine, parameterized by its
//! `CrewProfile`:
//! - Distraction runs tick toward `required_turns` and may hit a mishap at
//!   the halfway turn
//! - Heist runs additionally consume the character's risk channel, latch the
//!   ability and fail once the risk ceiling is reached
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ractor::Actor;
//! use crate::actors::crew::{CrewActor, CrewArguments, CrewProfile, CrewSettings};
//!
//! let args = CrewArguments {
//!     profile: CrewProfile::franklin(),
//!     settings: CrewSettings::default(),
//!     risk_exchange: exchange.clone(),
//! };
//!
//! let (crew_ref, _handle) =
//!     Actor::spawn(Some("crew:Franklin".into()), CrewActor, args).await?;
//! ```

pub mod actor;
pub mod profile;
pub mod protocol;
pub mod state;

pub use actor::{CrewActor, CrewArguments, CrewSettings, CrewState, RUN_HISTORY_LIMIT};
pub use profile::{CrewProfile, CrewRoster, RosterError};
pub use protocol::{CrewError, CrewMsg};

pub fn crew_actor_name(character: &str) -> String {
    format!("crew:{character}")
}
