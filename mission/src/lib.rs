//! Crew mission simulator - actor-based mission server and orchestrator
//!
//! The server side hosts one broker actor and one actor per crew member,
//! connected by an in-process risk exchange. The orchestrator negotiates a
//! job, sequences the distraction and heist runs, and settles the proceeds,
//! either in-process or against the HTTP API.

pub mod actors;
pub mod api;
pub mod app_state;
pub mod config;
pub mod offers;
pub mod orchestrator;
pub mod report;
