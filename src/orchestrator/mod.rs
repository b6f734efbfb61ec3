//! Generation orchestrator module - retry state machine and its states

pub mod runner;
pub mod state;

pub use runner::Orchestrator;
pub use state::{OrchestratorState, Phase, RetryPolicy};
