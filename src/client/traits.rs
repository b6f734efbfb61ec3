//! Common traits and types for the generation service

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cancel::CancellationToken;
use crate::error::{AppError, GenerationError};
use crate::preparation::PreparedImage;

/// Visual style applied to a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Style {
    #[default]
    Editorial,
    Streetwear,
    Vintage,
    Minimal,
    Futuristic,
}

impl Style {
    pub const ALL: [Style; 5] = [
        Style::Editorial,
        Style::Streetwear,
        Style::Vintage,
        Style::Minimal,
        Style::Futuristic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Editorial => "Editorial",
            Style::Streetwear => "Streetwear",
            Style::Vintage => "Vintage",
            Style::Minimal => "Minimal",
            Style::Futuristic => "Futuristic",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Style::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("Unknown style: {}", s)))
    }
}

/// Request to generate an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub image: PreparedImage,
    /// Trimmed, non-empty prompt
    pub prompt: String,
    pub style: Style,
}

impl GenerationRequest {
    pub fn new(image: PreparedImage, prompt: impl AsRef<str>, style: Style) -> Self {
        Self {
            image,
            prompt: prompt.as_ref().trim().to_string(),
            style,
        }
    }
}

/// Successful generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub id: String,
    /// Reference to the generated image
    pub image_url: String,
    pub prompt: String,
    pub style: Style,
    pub created_at: DateTime<Utc>,
}

/// Trait for image generation services.
///
/// Implementations must watch `cancel` during any internal waiting and fail
/// with [`GenerationError::Aborted`] once it fires. Attempts are assumed to
/// be independent, so a failed call must be safe to repeat.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Get the client name
    fn name(&self) -> &str;

    /// Generate an image from a request
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError>;
}
