//! Retry/backoff state machine driving a single generation

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::client::{GenerationClient, GenerationRequest, GenerationResult};
use crate::error::{AppError, GenerationError, Result};
use crate::orchestrator::state::{OrchestratorState, Phase, RetryPolicy};
use crate::timer::{self, Clock};

/// Runs one generation to completion with bounded retries.
///
/// An orchestrator is single-use: it leaves `Idle` exactly once. Start every
/// new generation on a fresh instance.
pub struct Orchestrator {
    client: Arc<dyn GenerationClient>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    token: CancellationToken,
    state: RwLock<OrchestratorState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<OrchestratorState>>>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn GenerationClient>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            client,
            clock,
            policy,
            token: CancellationToken::new(),
            state: RwLock::new(OrchestratorState::Idle),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> OrchestratorState {
        self.state.read().clone()
    }

    /// Receive every transition made after this call, in order
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OrchestratorState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Begin the generation on a background task.
    ///
    /// The state is `Running` by the time this returns, so a `cancel()`
    /// issued right after always takes effect. Fails with
    /// [`AppError::InvalidState`] unless the orchestrator is still idle.
    pub fn start(self: &Arc<Self>, request: GenerationRequest) -> Result<JoinHandle<OrchestratorState>> {
        self.begin()?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.drive(request).await }))
    }

    /// Run the generation on the current task and return its terminal state
    pub async fn run(&self, request: GenerationRequest) -> Result<OrchestratorState> {
        self.begin()?;
        Ok(self.drive(request).await)
    }

    /// Request cancellation of the running generation.
    ///
    /// Has no effect before `start()` or after a terminal state.
    pub fn cancel(&self) {
        let state = self.state.read();
        if state.is_running() {
            info!("Cancelling generation");
            self.token.cancel();
        } else {
            debug!(state = ?*state, "Ignoring cancel outside a running generation");
        }
    }

    /// Terminal state as a result
    pub fn outcome(&self) -> Result<GenerationResult> {
        match self.state() {
            OrchestratorState::Succeeded(result) => Ok(result),
            OrchestratorState::Aborted => Err(AppError::Generation(GenerationError::Aborted)),
            OrchestratorState::Failed(source) => Err(AppError::ExhaustedRetries {
                attempts: self.policy.max_attempts,
                source,
            }),
            state => Err(AppError::InvalidState(format!(
                "generation has not finished: {:?}",
                state
            ))),
        }
    }

    fn begin(&self) -> Result<()> {
        let mut state = self.state.write();
        if !matches!(*state, OrchestratorState::Idle) {
            return Err(AppError::InvalidState(
                "orchestrator already started; use a fresh instance".to_string(),
            ));
        }

        let running = OrchestratorState::Running {
            attempt: 1,
            backoff_ms: self.policy.backoff_after(1),
            phase: Phase::Attempting,
        };
        *state = running.clone();
        self.publish(running);
        Ok(())
    }

    fn transition(&self, next: OrchestratorState) {
        let mut state = self.state.write();
        *state = next.clone();
        self.publish(next);
    }

    fn publish(&self, state: OrchestratorState) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(state.clone()).is_ok());
    }

    async fn drive(&self, request: GenerationRequest) -> OrchestratorState {
        let mut attempt = 1;

        let terminal = loop {
            if self.token.is_cancelled() {
                break OrchestratorState::Aborted;
            }

            debug!(client = %self.client.name(), attempt, "Starting attempt");

            match self.client.generate(&request, &self.token).await {
                Ok(result) => {
                    info!(id = %result.id, attempt, "Generation succeeded");
                    break OrchestratorState::Succeeded(result);
                }
                Err(GenerationError::Aborted) => break OrchestratorState::Aborted,
                Err(err) => {
                    if attempt >= self.policy.max_attempts {
                        warn!(attempt, error = %err, "Giving up after final attempt");
                        break OrchestratorState::Failed(err);
                    }

                    let backoff_ms = self.policy.backoff_after(attempt);
                    warn!(attempt, backoff_ms, error = %err, "Attempt failed, backing off");
                    self.transition(OrchestratorState::Running {
                        attempt,
                        backoff_ms,
                        phase: Phase::BackingOff(err),
                    });

                    let delay = Duration::from_millis(backoff_ms);
                    if timer::wait(delay, &self.token, self.clock.as_ref()).await.is_err() {
                        break OrchestratorState::Aborted;
                    }

                    attempt += 1;
                    self.transition(OrchestratorState::Running {
                        attempt,
                        backoff_ms: self.policy.backoff_after(attempt),
                        phase: Phase::Attempting,
                    });
                }
            }
        };

        if matches!(terminal, OrchestratorState::Aborted) {
            info!(attempt, "Generation aborted");
        }
        self.transition(terminal.clone());
        terminal
    }
}
