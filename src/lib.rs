//! Prompt-driven image generation workflow
//!
//! Prepares a user image (downscaling oversized files), submits it with a
//! prompt and style to a generation service through a retrying, cancellable
//! orchestrator, and keeps the last few results as a persisted history.

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod preparation;
pub mod session;
pub mod timer;

pub use cancel::CancellationToken;
pub use error::{AppError, GenerationError, Result};
pub use session::{AbortHandle, LiveSummary, Studio};
