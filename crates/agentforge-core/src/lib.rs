//! AgentForge Core
//!
//! The request/response contract between an agent-building UI and a
//! generative-text backend: configure a chatbot persona, generate its
//! description, test whether candidate replies stay in scope, and answer
//! questions from the agent's training text.
//!
//! ## Architecture
//!
//! 1. **Contracts** (`contracts/`): wire shapes, the uniform action result
//!    and the declarative input schemas.
//! 2. **Engine** (`engine/`): interprets the schemas and narrows raw input
//!    into typed requests, collecting every field violation.
//! 3. **Flows** (`flows/`): prompt templates and the four generative
//!    operations, one backend call each.
//! 4. **Backend** (`backend/`): the `GenerativeBackend` seam and an
//!    OpenAI-compatible HTTP implementation.
//! 5. **Actions** (`actions`): validate, generate, and convert every outcome
//!    into an `ActionResult` with a fixed message on failure.
//! 6. **Session** (`session`): explicit per-user state with a chat
//!    transcript that rolls back failed turns.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentforge_core::{build_actions, ForgeConfig, MetricsRegistry};
//! use agentforge_core::contracts::AnswerQuestionInput;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ForgeConfig::load(None)?;
//!     let metrics = MetricsRegistry::new()?;
//!     let actions = build_actions(&config, metrics.actions())?;
//!
//!     let input = AnswerQuestionInput {
//!         context_data: "We ship within 3-5 business days.".to_string(),
//!         question: "How fast is shipping?".to_string(),
//!     };
//!     let result = actions.answer_from_context(&input, &CancellationToken::new()).await;
//!     println!("{}", serde_json::to_string(&result)?);
//!     Ok(())
//! }
//! ```

#[path = "../contracts/mod.rs"]
pub mod contracts;

pub mod actions;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod session;
pub mod telemetry;
pub mod upload;

use std::sync::Arc;

pub use actions::ForgeActions;
pub use backend::{BackendError, GenerationRequest, GenerativeBackend, OpenAiBackend};
pub use config::{BackendConfig, ConfigError, ForgeConfig, LoggingConfig, ServerConfig};
pub use contracts::ActionResult;
pub use engine::{FieldViolation, Validate, ValidationFailure, ViolationCode};
pub use error::ForgeError;
pub use flows::{FlowError, GenerativeFlows};
pub use session::{AgentSession, SessionError, SessionSnapshot, Transcript};
pub use telemetry::{init_tracing, ActionMetrics, LogFormat, MetricsRegistry, TelemetryError};
pub use upload::{AgentForm, TrainingSource, UploadError, UploadedFile};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the action layer on the configured OpenAI-compatible backend
pub fn build_actions(
    config: &ForgeConfig,
    metrics: Arc<ActionMetrics>,
) -> Result<ForgeActions, ForgeError> {
    let backend = OpenAiBackend::new(&config.backend)?;
    tracing::info!(
        base_url = %config.backend.base_url,
        model = %config.backend.model,
        "Generative backend configured"
    );
    Ok(ForgeActions::new(Arc::new(backend), metrics))
}
