//! Studio session: the working state behind the generate form

use chrono::Local;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::{GenerationClient, GenerationRequest, SimulatedClient, Style};
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::history::{FileStore, HistoryCache, HistoryEntry};
use crate::orchestrator::{Orchestrator, OrchestratorState, RetryPolicy};
use crate::preparation::{self, PrepareOptions, PreparedImage, RawImage};
use crate::timer::{Clock, TokioClock};

type Slot = Arc<Mutex<Option<Arc<Orchestrator>>>>;

/// Read-only digest of the working state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSummary {
    /// Trimmed prompt, or `(no prompt)`
    pub prompt: String,
    pub style: Style,
    pub has_image: bool,
    pub ready: bool,
}

/// Cancels whichever generation the session is running
#[derive(Clone)]
pub struct AbortHandle {
    slot: Slot,
}

impl AbortHandle {
    pub fn abort(&self) {
        if let Some(orchestrator) = self.slot.lock().as_ref() {
            orchestrator.cancel();
        }
    }
}

/// Empties the session's orchestrator slot when a generation ends, including
/// when the `generate` future is dropped before completing
struct RunGuard {
    slot: Slot,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(orchestrator) = self.slot.lock().take() {
            orchestrator.cancel();
        }
    }
}

/// Image, prompt and style being edited, plus the status the user sees
pub struct Studio {
    client: Arc<dyn GenerationClient>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    prepare_options: PrepareOptions,
    history: HistoryCache,
    image: Option<PreparedImage>,
    prompt: String,
    style: Style,
    status: String,
    error: String,
    status_log: Vec<String>,
    current: Slot,
}

impl Studio {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        clock: Arc<dyn Clock>,
        history: HistoryCache,
        settings: &Settings,
    ) -> Self {
        Self {
            client,
            clock,
            policy: RetryPolicy::from(&settings.generation),
            prepare_options: PrepareOptions::from(&settings.preparation),
            history,
            image: None,
            prompt: String::new(),
            style: Style::default(),
            status: String::new(),
            error: String::new(),
            status_log: Vec::new(),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Session over the simulated service with history stored on disk
    pub fn from_settings(settings: &Settings) -> Self {
        let client = Arc::new(SimulatedClient::new(&settings.simulator));
        let store = Arc::new(FileStore::new(&settings.storage.base_path));
        let history = HistoryCache::from_config(store, &settings.storage);
        Self::new(client, Arc::new(TokioClock), history, settings)
    }

    /// Load persisted history into the session
    pub async fn load_history(&mut self) -> &[HistoryEntry] {
        self.history.load().await;
        self.history.entries()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn image(&self) -> Option<&PreparedImage> {
        self.image.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    /// Status lines set since the latest generation started, oldest first
    pub fn status_log(&self) -> &[String] {
        &self.status_log
    }

    pub fn is_generating(&self) -> bool {
        self.current.lock().is_some()
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn set_prepare_options(&mut self, options: PrepareOptions) {
        self.prepare_options = options;
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            slot: self.current.clone(),
        }
    }

    /// Cancel the running generation, if any
    pub fn abort(&self) {
        self.abort_handle().abort();
    }

    pub fn can_generate(&self) -> bool {
        self.image.is_some() && !self.prompt.trim().is_empty() && !self.is_generating()
    }

    pub fn live_summary(&self) -> LiveSummary {
        let trimmed = self.prompt.trim();
        LiveSummary {
            prompt: if trimmed.is_empty() {
                "(no prompt)".to_string()
            } else {
                trimmed.to_string()
            },
            style: self.style,
            has_image: self.image.is_some(),
            ready: self.image.is_some() && !trimmed.is_empty(),
        }
    }

    /// Replace the working image with a freshly prepared one.
    ///
    /// Any previous image, status and error are cleared first, so a failure
    /// leaves the session without an image.
    pub async fn select_image(&mut self, raw: RawImage) -> Result<&PreparedImage> {
        self.status.clear();
        self.error.clear();
        self.image = None;

        if let Err(e) = preparation::validate_file_name(&raw.name) {
            self.error = e.to_string();
            return Err(e);
        }

        let prepared = match preparation::prepare_in_background(raw, self.prepare_options.clone()).await {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!(error = %e, "Image preparation failed");
                self.error = "Failed to load image.".to_string();
                return Err(e);
            }
        };

        Ok(self.image.insert(prepared))
    }

    /// Run one generation on a fresh orchestrator and record its result.
    ///
    /// Returns the terminal state; `Aborted` and `Failed` are outcomes, not
    /// errors. Errors only when the form is not ready.
    ///
    /// Dropping the returned future cancels the running generation and frees
    /// the session for the next one.
    pub async fn generate(&mut self) -> Result<OrchestratorState> {
        if self.is_generating() {
            return Err(AppError::InvalidState(
                "a generation is already running".to_string(),
            ));
        }
        let image = match (&self.image, self.prompt.trim().is_empty()) {
            (Some(image), false) => image.clone(),
            _ => {
                return Err(AppError::Validation(
                    "Select an image and enter a prompt first.".to_string(),
                ))
            }
        };

        self.error.clear();
        self.status_log.clear();
        let request = GenerationRequest::new(image, &self.prompt, self.style);
        info!(style = %request.style, "Generating");

        let orchestrator = Arc::new(Orchestrator::new(
            self.client.clone(),
            self.clock.clone(),
            self.policy,
        ));
        let mut transitions = orchestrator.subscribe();
        *self.current.lock() = Some(orchestrator.clone());
        let guard = RunGuard {
            slot: self.current.clone(),
        };

        let handle = orchestrator.start(request)?;

        while let Some(state) = transitions.recv().await {
            let terminal = state.is_terminal();
            self.apply(&state);
            if terminal {
                break;
            }
        }

        let outcome = handle
            .await
            .map_err(|e| AppError::Internal(format!("Generation task failed: {}", e)));
        drop(guard);
        let final_state = outcome?;

        if let OrchestratorState::Succeeded(result) = &final_state {
            self.history.record(HistoryEntry::from(result)).await;
        }

        Ok(final_state)
    }

    /// Load a history entry back into the form; history itself is unchanged
    pub fn restore_from_history(&mut self, entry: &HistoryEntry) {
        let work = self.history.restore(entry);
        self.image = Some(work.image);
        self.prompt = work.prompt;
        self.style = work.style;
        self.error.clear();

        let when = entry.created_at.with_timezone(&Local);
        self.set_status(format!("Restored item from {}", when.format("%Y-%m-%d %H:%M:%S")));
    }

    fn apply(&mut self, state: &OrchestratorState) {
        if let Some(status) = state.status_message() {
            self.set_status(status);
        }
        if let Some(error) = state.error_message() {
            self.error = error;
        }
    }

    fn set_status(&mut self, status: String) {
        debug!(status = %status, "Status");
        self.status_log.push(status.clone());
        self.status = status;
    }
}
