//! Route definitions for AgentForge
//!
//! - GET /health - Health check
//! - GET /metrics - Prometheus metrics
//! - POST /api/v1/agents/forge - Generate an agent description
//! - POST /api/v1/scope/evaluate - Judge a hypothetical response
//! - POST /api/v1/answer - Answer a question from context data
//! - POST /api/v1/chat - Single chat turn against context data
//! - /api/v1/sessions/... - Session-scoped forging, chat and scope testing
//!
//! Action routes answer HTTP 200 with an `ActionResult` body whether the
//! action succeeded or not. Dropping the connection drops the handler
//! future, which cancels the generative call with it.
//!
//! Session routes run the call and the session bookkeeping in a spawned
//! task. A dropped request only cancels the call; the task still records
//! the outcome, so a cancelled turn is rolled back and status flags clear.

use agentforge_core::contracts::{
    ActionResult, AgentDescription, Answer, AnswerQuestionInput, ChatTurnInput,
    EvaluateScopeInput, ForgeAgentInput, ForgedAgent, ScopeAnalysis,
};
use agentforge_core::{AgentSession, SessionSnapshot};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::{
    ApiError, AppState, CreateSessionResponse, HealthResponse, SessionChatRequest,
    SessionScopeRequest,
};

type Payload<T> = Result<Json<T>, JsonRejection>;

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        // Stateless actions
        .route("/api/v1/agents/forge", post(forge_agent))
        .route("/api/v1/scope/evaluate", post(evaluate_scope))
        .route("/api/v1/answer", post(answer_from_context))
        .route("/api/v1/chat", post(chat_turn))
        // Sessions
        .route("/api/v1/sessions", post(create_session))
        .route("/api/v1/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/v1/sessions/:id/forge", post(reforge_session))
        .route("/api/v1/sessions/:id/chat", post(session_chat))
        .route("/api/v1/sessions/:id/scope", post(session_scope))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: agentforge_core::VERSION.to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_sessions: state.sessions.len().await,
    })
}

/// GET /metrics
async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let body = state.metrics.encode_text().map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        ApiError::InternalError("Failed to encode metrics".to_string())
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// POST /api/v1/agents/forge
async fn forge_agent(
    State(state): State<Arc<AppState>>,
    payload: Payload<ForgeAgentInput>,
) -> Result<Json<ActionResult<AgentDescription>>, ApiError> {
    let Json(input) = payload?;
    let result = state
        .actions
        .forge_agent(&input, &CancellationToken::new())
        .await;
    Ok(Json(result))
}

/// POST /api/v1/scope/evaluate
async fn evaluate_scope(
    State(state): State<Arc<AppState>>,
    payload: Payload<EvaluateScopeInput>,
) -> Result<Json<ActionResult<ScopeAnalysis>>, ApiError> {
    let Json(input) = payload?;
    let result = state
        .actions
        .evaluate_scope(&input, &CancellationToken::new())
        .await;
    Ok(Json(result))
}

/// POST /api/v1/answer
async fn answer_from_context(
    State(state): State<Arc<AppState>>,
    payload: Payload<AnswerQuestionInput>,
) -> Result<Json<ActionResult<Answer>>, ApiError> {
    let Json(input) = payload?;
    let result = state
        .actions
        .answer_from_context(&input, &CancellationToken::new())
        .await;
    Ok(Json(result))
}

/// POST /api/v1/chat
async fn chat_turn(
    State(state): State<Arc<AppState>>,
    payload: Payload<ChatTurnInput>,
) -> Result<Json<ActionResult<Answer>>, ApiError> {
    let Json(input) = payload?;
    let result = state
        .actions
        .chat_turn(&input, &CancellationToken::new())
        .await;
    Ok(Json(result))
}

/// POST /api/v1/sessions
///
/// Creates a session and forges its first agent. The session is kept even
/// when forging fails so the caller can retry on it.
async fn create_session(
    State(state): State<Arc<AppState>>,
    payload: Payload<ForgeAgentInput>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let Json(input) = payload?;

    let mut session = AgentSession::new();
    let result = session.forge(&state.actions, &input).await;
    let (session_id, _) = state.sessions.insert(session).await;

    tracing::info!(
        session_id = %session_id,
        success = result.is_success(),
        "Session created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id, result }),
    ))
}

/// GET /api/v1/sessions/:id
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| ApiError::session_not_found(id))?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// DELETE /api/v1/sessions/:id
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&id).await {
        tracing::info!(session_id = %id, "Session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::session_not_found(id))
    }
}

/// POST /api/v1/sessions/:id/forge
async fn reforge_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Payload<ForgeAgentInput>,
) -> Result<Json<ActionResult<ForgedAgent>>, ApiError> {
    let Json(input) = payload?;
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| ApiError::session_not_found(id))?;

    let cancel = session.lock().await.begin_forge();
    let guard = cancel.clone().drop_guard();
    let actions = state.actions.clone();
    let task = tokio::spawn(async move {
        let result = actions.forge_agent_profile(&input, &cancel).await;
        session.lock().await.finish_forge(&result);
        result
    });

    let result = task.await.map_err(session_task_failed)?;
    guard.disarm();
    Ok(Json(result))
}

/// POST /api/v1/sessions/:id/chat
async fn session_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Payload<SessionChatRequest>,
) -> Result<Json<ActionResult<Answer>>, ApiError> {
    let Json(request) = payload?;
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| ApiError::session_not_found(id))?;

    let turn = match session.lock().await.begin_chat_turn(&request.question) {
        Ok(turn) => turn,
        Err(e) => return Ok(Json(ActionResult::failure(e.to_string()))),
    };

    let guard = turn.cancel.clone().drop_guard();
    let actions = state.actions.clone();
    let task = tokio::spawn(async move {
        let result = actions.chat_turn(&turn.input, &turn.cancel).await;
        session.lock().await.finish_turn(turn.handle, &result);
        result
    });

    let result = task.await.map_err(session_task_failed)?;
    guard.disarm();
    Ok(Json(result))
}

/// POST /api/v1/sessions/:id/scope
async fn session_scope(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Payload<SessionScopeRequest>,
) -> Result<Json<ActionResult<ScopeAnalysis>>, ApiError> {
    let Json(request) = payload?;
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| ApiError::session_not_found(id))?;

    let pending = match session
        .lock()
        .await
        .begin_scope(&request.prompt, &request.agent_response)
    {
        Ok(pending) => pending,
        Err(e) => return Ok(Json(ActionResult::failure(e.to_string()))),
    };

    let guard = pending.cancel.clone().drop_guard();
    let actions = state.actions.clone();
    let task = tokio::spawn(async move {
        let result = actions.evaluate_scope(&pending.input, &pending.cancel).await;
        session.lock().await.finish_scope(&result);
        result
    });

    let result = task.await.map_err(session_task_failed)?;
    guard.disarm();
    Ok(Json(result))
}

fn session_task_failed(err: tokio::task::JoinError) -> ApiError {
    tracing::error!(error = %err, "Session task failed");
    ApiError::InternalError("Session task failed".to_string())
}
