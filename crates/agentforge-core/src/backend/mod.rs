//! Generative backend seam
//!
//! A backend receives a rendered prompt plus the JSON schema of the expected
//! output and returns a JSON value, or a distinguishable failure. It is
//! called exactly once per operation and never retried.

pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::contracts::Operation;
use crate::flows::template::RenderedPrompt;

pub use openai::OpenAiBackend;

/// Everything a backend needs for one generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub operation: Operation,
    pub prompt: RenderedPrompt,
    /// JSON schema object describing the required output
    pub output_schema: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed backend output: {0}")]
    MalformedOutput(String),

    #[error("Backend configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else if err.is_decode() {
            BackendError::MalformedOutput(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// External generative-text service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value, BackendError>;
}
