//! Cancellable delays over an injectable clock

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::cancel::CancellationToken;
use crate::error::GenerationError;

/// Source of timed waits
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that records every requested delay instead of waiting for it.
///
/// A stalled clock never completes its sleeps, which holds the caller inside
/// the wait until it is cancelled.
#[derive(Debug, Clone, Default)]
pub struct RecordingClock {
    delays: Arc<Mutex<Vec<Duration>>>,
    stalled: bool,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stalled() -> Self {
        Self {
            delays: Arc::default(),
            stalled: true,
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    pub fn delays_ms(&self) -> Vec<u64> {
        self.delays
            .lock()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
        if self.stalled {
            std::future::pending::<()>().await;
        }
        tokio::task::yield_now().await;
    }
}

/// Wait for `duration`, failing with [`GenerationError::Aborted`] as soon as
/// `token` is cancelled.
pub async fn wait(
    duration: Duration,
    token: &CancellationToken,
    clock: &dyn Clock,
) -> Result<(), GenerationError> {
    if token.is_cancelled() {
        return Err(GenerationError::Aborted);
    }

    trace!(delay_ms = duration.as_millis() as u64, "Waiting");

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(GenerationError::Aborted),
        _ = clock.sleep(duration) => Ok(()),
    }
}
