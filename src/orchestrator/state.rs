//! Observable states of a generation run

use crate::client::GenerationResult;
use crate::config::GenerationConfig;
use crate::error::GenerationError;

/// What a running generation is doing right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// A client call is in flight
    Attempting,
    /// The previous attempt failed; waiting `backoff_ms` before the next one
    BackingOff(GenerationError),
}

/// Lifecycle of one generation.
///
/// `Idle -> Running -> (Aborted | Succeeded | Failed)`. Attempt numbers only
/// ever increase while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Running {
        attempt: u32,
        backoff_ms: u64,
        phase: Phase,
    },
    Aborted,
    Succeeded(GenerationResult),
    Failed(GenerationError),
}

impl OrchestratorState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted | Self::Succeeded(_) | Self::Failed(_))
    }

    /// Status line shown to the user on entering this state.
    ///
    /// `None` means the previous status line stays in place: a retry attempt
    /// keeps showing the "retrying" message until it resolves.
    pub fn status_message(&self) -> Option<String> {
        match self {
            Self::Idle => None,
            Self::Running {
                attempt: 1,
                phase: Phase::Attempting,
                ..
            } => Some("Generating…".to_string()),
            Self::Running {
                phase: Phase::Attempting,
                ..
            } => None,
            Self::Running {
                backoff_ms,
                phase: Phase::BackingOff(err),
                ..
            } => Some(format!("Error: {}. Retrying in {}ms…", failure_text(err), backoff_ms)),
            Self::Aborted => Some("Aborted".to_string()),
            Self::Succeeded(_) => Some("Done".to_string()),
            Self::Failed(_) => Some("Failed after retries".to_string()),
        }
    }

    /// Error line shown alongside the status, if any
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Failed(err) => {
                let message = err.to_string();
                Some(if message.is_empty() {
                    "Generation failed".to_string()
                } else {
                    message
                })
            }
            _ => None,
        }
    }
}

fn failure_text(err: &GenerationError) -> String {
    let message = err.to_string();
    if message.is_empty() {
        "Failed".to_string()
    } else {
        message
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay inserted after a failed `attempt` (1-based)
    pub fn backoff_after(&self, attempt: u32) -> u64 {
        self.initial_backoff_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(63))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for RetryPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff_ms: config.initial_backoff_ms,
        }
    }
}
