//! Interactive terminal orchestrator for concurrent LLM agents and a
//! sandboxed tool layer.

pub mod agents;
pub mod ai;
pub mod approval;
pub mod config;
pub mod context;
pub mod error;
pub mod hud;
pub mod logging;
pub mod orchestrator;
pub mod queue;
pub mod safety;
pub mod token;
pub mod tools;

pub use error::{OrchestratorError, Result};
