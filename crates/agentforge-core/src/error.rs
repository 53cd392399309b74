//! Crate-level error type
//!
//! Errors raised while wiring AgentForge together (config, telemetry,
//! backend construction, file uploads). Action outcomes never use this type;
//! they are reported as [`crate::contracts::ActionResult`] values.

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::engine::ValidationFailure;
use crate::telemetry::TelemetryError;
use crate::upload::UploadError;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}

impl ForgeError {
    /// Whether the error was caused by caller-supplied input or files
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ForgeError::Config(_) | ForgeError::Upload(_) | ForgeError::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
