//! Common error types for the studio workflow

use thiserror::Error;

/// Code attached to overload failures reported by the generation service
pub const MODEL_OVERLOADED: &str = "MODEL_OVERLOADED";

/// Classified failure of a single generation attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Cancellation was requested
    #[error("Aborted")]
    Aborted,

    /// Temporary failure such as an overloaded model; safe to retry
    #[error("{message}")]
    Transient {
        message: String,
        code: Option<String>,
    },

    /// Anything else; retried like a transient failure
    #[error("{0}")]
    Unknown(String),
}

impl GenerationError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            code: None,
        }
    }

    pub fn overloaded() -> Self {
        Self::Transient {
            message: "Model overloaded".to_string(),
            code: Some(MODEL_OVERLOADED.to_string()),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Every failure except cancellation is worth another attempt
    pub fn is_retryable(&self) -> bool {
        !self.is_aborted()
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Transient { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Generation failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        source: GenerationError,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Decode(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
