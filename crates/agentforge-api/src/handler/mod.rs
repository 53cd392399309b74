//! HTTP handler for AgentForge
//!
//! Shared state, error responses and request/response bodies for the axum
//! router defined in [`routes`].

pub mod routes;
pub mod sessions;

pub use routes::create_router;
pub use sessions::SessionStore;

use agentforge_core::contracts::{ActionResult, ForgedAgent};
use agentforge_core::{build_actions, ForgeActions, ForgeConfig, ForgeError, MetricsRegistry};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Application state
pub struct AppState {
    pub actions: ForgeActions,
    pub sessions: SessionStore,
    pub metrics: Arc<MetricsRegistry>,
    pub started_at: Instant,
}

impl AppState {
    /// `actions` should record into `metrics.actions()` so `/metrics` sees them
    pub fn new(actions: ForgeActions, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            actions,
            sessions: SessionStore::new(),
            metrics,
            started_at: Instant::now(),
        }
    }

    /// Wire the configured backend into a fresh metrics registry
    pub fn from_config(config: &ForgeConfig) -> Result<Self, ForgeError> {
        let metrics = Arc::new(MetricsRegistry::new()?);
        let actions = build_actions(config, metrics.actions())?;
        Ok(Self::new(actions, metrics))
    }
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl ApiError {
    pub fn session_not_found(id: Uuid) -> Self {
        ApiError::NotFound(format!("Session '{}' not found", id))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::InternalError(msg) => {
                msg
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error_code().to_string(),
            message: self.message().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
}

/// Response to session creation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub result: ActionResult<ForgedAgent>,
}

#[derive(Debug, Deserialize)]
pub struct SessionChatRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScopeRequest {
    pub prompt: String,
    pub agent_response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_responses() {
        let error = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.error_code(), "BAD_REQUEST");

        let error = ApiError::session_not_found(Uuid::nil());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            error.message(),
            "Session '00000000-0000-0000-0000-000000000000' not found"
        );
    }

    #[test]
    fn test_scope_request_is_camel_case() {
        let request: SessionScopeRequest =
            serde_json::from_str(r#"{"prompt":"p","agentResponse":"r"}"#).unwrap();
        assert_eq!(request.agent_response, "r");
    }
}
