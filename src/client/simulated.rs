//! Simulated generation service with artificial latency and overload failures

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::client::traits::{GenerationClient, GenerationRequest, GenerationResult};
use crate::config::SimulatorConfig;
use crate::error::GenerationError;
use crate::timer::{self, Clock, TokioClock};

/// Stand-in for the remote service: waits, then either fails as overloaded
/// or echoes the submitted image back as the result
pub struct SimulatedClient {
    name: String,
    min_latency_ms: u64,
    max_latency_ms: u64,
    failure_rate: f64,
    rng: Mutex<StdRng>,
    clock: Arc<dyn Clock>,
}

impl SimulatedClient {
    /// Create a simulated client from configuration
    pub fn new(config: &SimulatorConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a simulated client that waits on the given clock
    pub fn with_clock(config: &SimulatorConfig, clock: Arc<dyn Clock>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            name: "simulated".to_string(),
            min_latency_ms: config.min_latency_ms,
            max_latency_ms: config.max_latency_ms,
            failure_rate: config.failure_rate,
            rng: Mutex::new(rng),
            clock,
        }
    }

    fn next_latency(&self) -> Duration {
        let ms = if self.max_latency_ms > self.min_latency_ms {
            self.rng
                .lock()
                .gen_range(self.min_latency_ms..self.max_latency_ms)
        } else {
            self.min_latency_ms
        };
        Duration::from_millis(ms)
    }

    fn should_fail(&self) -> bool {
        self.rng.lock().gen::<f64>() < self.failure_rate
    }
}

#[async_trait]
impl GenerationClient for SimulatedClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        let latency = self.next_latency();
        debug!(
            client = %self.name,
            latency_ms = latency.as_millis() as u64,
            style = %request.style,
            "Simulating generation"
        );

        timer::wait(latency, cancel, self.clock.as_ref()).await?;

        if cancel.is_cancelled() {
            return Err(GenerationError::Aborted);
        }

        if self.should_fail() {
            warn!(client = %self.name, "Simulated overload");
            return Err(GenerationError::overloaded());
        }

        Ok(GenerationResult {
            id: Uuid::new_v4().to_string(),
            image_url: request.image.data_url.clone(),
            prompt: request.prompt.clone(),
            style: request.style,
            created_at: Utc::now(),
        })
    }
}
