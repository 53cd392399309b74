//! Per-session agent state
//!
//! An [`AgentSession`] owns what one user interacts with: the forged agent,
//! the chat transcript, the last scope analysis and in-flight status. State
//! is passed explicitly to whoever drives the session, so concurrent
//! sessions never share anything.
//!
//! Generative calls are split into `begin_*` / `finish_*` steps so a caller
//! holding the session behind a lock can release it while the call runs.
//! Turns are not serialized: replies are appended in completion order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::actions::ForgeActions;
use crate::contracts::{
    ActionResult, Answer, ChatMessage, ChatRole, ChatTurnInput, EvaluateScopeInput,
    ForgeAgentInput, ForgedAgent, ScopeAnalysis,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No agent has been forged yet.")]
    NoAgent,
}

/// Identifies the user message of an in-flight turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnHandle {
    user_message_id: u64,
}

impl TurnHandle {
    pub fn message_id(&self) -> u64 {
        self.user_message_id
    }
}

/// Ordered chat transcript with ids that never repeat
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intro(intro: &str) -> Self {
        let mut transcript = Self::new();
        transcript.reset(intro);
        transcript
    }

    /// Replace the contents with a single agent intro message
    ///
    /// Ids continue from where they were, so handles from before the reset
    /// no longer match anything.
    pub fn reset(&mut self, intro: &str) {
        self.messages.clear();
        self.push(ChatRole::Agent, intro.to_string());
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, role: ChatRole, content: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage { id, role, content });
        id
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Append the user's question
    pub fn begin_turn(&mut self, question: &str) -> TurnHandle {
        TurnHandle {
            user_message_id: self.push(ChatRole::User, question.to_string()),
        }
    }

    /// Append the agent's reply; ignored if the user message is gone
    pub fn complete_turn(&mut self, handle: TurnHandle, answer: String) -> bool {
        if self.position(handle.user_message_id).is_none() {
            return false;
        }
        self.push(ChatRole::Agent, answer);
        true
    }

    /// Remove exactly the user message of a failed turn
    pub fn rollback_turn(&mut self, handle: TurnHandle) -> bool {
        match self.position(handle.user_message_id) {
            Some(index) => {
                self.messages.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub forging: bool,
    pub analyzing: bool,
    pub pending_turns: usize,
}

/// A chat turn whose user message is already in the transcript
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub handle: TurnHandle,
    pub input: ChatTurnInput,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct PendingScope {
    pub input: EvaluateScopeInput,
    pub cancel: CancellationToken,
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub agent: Option<ForgedAgent>,
    pub transcript: Vec<ChatMessage>,
    pub analysis: Option<ScopeAnalysis>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct AgentSession {
    id: Uuid,
    agent: Option<ForgedAgent>,
    transcript: Transcript,
    analysis: Option<ScopeAnalysis>,
    status: SessionStatus,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
}

impl Default for AgentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            agent: None,
            transcript: Transcript::new(),
            analysis: None,
            status: SessionStatus::default(),
            cancel: CancellationToken::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn agent(&self) -> Option<&ForgedAgent> {
        self.agent.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn analysis(&self) -> Option<&ScopeAnalysis> {
        self.analysis.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clear the current agent and mark a forge as running
    pub fn begin_forge(&mut self) -> CancellationToken {
        self.agent = None;
        self.analysis = None;
        self.transcript.clear();
        self.status.forging = true;
        self.cancel.child_token()
    }

    /// Store a successful forge and start a fresh transcript with the intro
    pub fn finish_forge(&mut self, result: &ActionResult<ForgedAgent>) {
        self.status.forging = false;
        if let Some(agent) = result.data() {
            self.transcript.reset(&agent.profile.introductory_message);
            self.agent = Some(agent.clone());
            tracing::info!(
                session_id = %self.id,
                agent_name = %agent.profile.agent_name,
                "Agent forged"
            );
        }
    }

    /// Append the question and hand back what the chat action needs
    pub fn begin_chat_turn(&mut self, question: &str) -> Result<PendingTurn, SessionError> {
        let agent = self.agent.as_ref().ok_or(SessionError::NoAgent)?;
        let input = ChatTurnInput {
            context_data: agent.training.as_str().to_string(),
            question: question.to_string(),
        };

        let handle = self.transcript.begin_turn(question);
        self.status.pending_turns += 1;

        Ok(PendingTurn {
            handle,
            input,
            cancel: self.cancel.child_token(),
        })
    }

    /// Append the reply on success, roll back the question on failure
    pub fn finish_turn(&mut self, handle: TurnHandle, result: &ActionResult<Answer>) {
        self.status.pending_turns = self.status.pending_turns.saturating_sub(1);
        match result {
            ActionResult::Success(answer) => {
                if !self.transcript.complete_turn(handle, answer.answer.clone()) {
                    tracing::debug!(
                        session_id = %self.id,
                        message_id = handle.message_id(),
                        "Dropping reply for a turn no longer in the transcript"
                    );
                }
            }
            ActionResult::Failure(_) => {
                self.transcript.rollback_turn(handle);
            }
        }
    }

    /// Build a scope test from the forged profile's parameters summary
    pub fn begin_scope(
        &mut self,
        prompt: &str,
        agent_response: &str,
    ) -> Result<PendingScope, SessionError> {
        let agent = self.agent.as_ref().ok_or(SessionError::NoAgent)?;
        let input = EvaluateScopeInput {
            parameters: agent.profile.parameters_summary(),
            prompt: prompt.to_string(),
            agent_response: agent_response.to_string(),
        };

        self.status.analyzing = true;
        Ok(PendingScope {
            input,
            cancel: self.cancel.child_token(),
        })
    }

    pub fn finish_scope(&mut self, result: &ActionResult<ScopeAnalysis>) {
        self.status.analyzing = false;
        if let Some(analysis) = result.data() {
            self.analysis = Some(analysis.clone());
        }
    }

    /// Forge an agent in one call
    pub async fn forge(
        &mut self,
        actions: &ForgeActions,
        input: &ForgeAgentInput,
    ) -> ActionResult<ForgedAgent> {
        let cancel = self.begin_forge();
        let result = actions.forge_agent_profile(input, &cancel).await;
        self.finish_forge(&result);
        result
    }

    /// Run a full chat turn in one call
    pub async fn chat(&mut self, actions: &ForgeActions, question: &str) -> ActionResult<Answer> {
        let turn = match self.begin_chat_turn(question) {
            Ok(turn) => turn,
            Err(e) => return ActionResult::failure(e.to_string()),
        };
        let result = actions.chat_turn(&turn.input, &turn.cancel).await;
        self.finish_turn(turn.handle, &result);
        result
    }

    pub async fn evaluate_scope(
        &mut self,
        actions: &ForgeActions,
        prompt: &str,
        agent_response: &str,
    ) -> ActionResult<ScopeAnalysis> {
        let pending = match self.begin_scope(prompt, agent_response) {
            Ok(pending) => pending,
            Err(e) => return ActionResult::failure(e.to_string()),
        };
        let result = actions.evaluate_scope(&pending.input, &pending.cancel).await;
        self.finish_scope(&result);
        result
    }

    /// Cancel every in-flight call started from this session
    pub fn close(&self) {
        self.cancel.cancel();
        tracing::debug!(session_id = %self.id, "Session closed");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            agent: self.agent.clone(),
            transcript: self.transcript.messages().to_vec(),
            analysis: self.analysis.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockGenerativeBackend};
    use crate::contracts::ChatRole;
    use crate::telemetry::ActionMetrics;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn forge_input() -> ForgeAgentInput {
        ForgeAgentInput {
            agent_name: "Helper".to_string(),
            avatar: None,
            introductory_message: "Hi there, I can help!".to_string(),
            uploaded_data: "Shipping takes 3-5 business days.".to_string(),
            tone: "friendly".to_string(),
            response_length: "short".to_string(),
            areas_of_expertise: "shipping questions".to_string(),
            knowledge_boundaries: "no legal advice".to_string(),
        }
    }

    fn actions(mock: MockGenerativeBackend) -> ForgeActions {
        ForgeActions::new(Arc::new(mock), Arc::new(ActionMetrics::detached().unwrap()))
    }

    /// Backend that forges, then answers every chat turn, failing each `fail_every`-th one
    fn scripted(fail_every: usize) -> MockGenerativeBackend {
        let calls = AtomicUsize::new(0);
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().returning(move |req| {
            if req.operation == crate::contracts::Operation::GenerateAgentDescription {
                return Ok(json!({"agentDescription": "A shipping helper."}));
            }
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if fail_every > 0 && n % fail_every == 0 {
                Err(BackendError::Transport("reset".to_string()))
            } else {
                Ok(json!({"answer": format!("answer {}", n)}))
            }
        });
        mock
    }

    #[test]
    fn test_transcript_turns() {
        let mut transcript = Transcript::with_intro("Hello!");
        let first = transcript.begin_turn("Q1");
        assert!(transcript.complete_turn(first, "A1".to_string()));

        let second = transcript.begin_turn("Q2");
        assert!(transcript.rollback_turn(second));
        assert!(!transcript.complete_turn(second, "late".to_string()));

        let contents: Vec<_> = transcript
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            contents,
            vec![
                (ChatRole::Agent, "Hello!"),
                (ChatRole::User, "Q1"),
                (ChatRole::Agent, "A1"),
            ]
        );
    }

    #[test]
    fn test_reset_invalidates_old_handles() {
        let mut transcript = Transcript::with_intro("Hello!");
        let stale = transcript.begin_turn("Q");
        transcript.reset("New agent here.");

        assert!(!transcript.complete_turn(stale, "A".to_string()));
        assert_eq!(transcript.len(), 1);
        assert!(transcript.messages()[0].id > stale.message_id());
    }

    #[tokio::test]
    async fn test_chat_requires_agent() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().times(0);
        let actions = actions(mock);

        let mut session = AgentSession::new();
        let result = session.chat(&actions, "Hello?").await;
        assert_eq!(result.error(), Some("No agent has been forged yet."));
        assert!(session.transcript().is_empty());

        let scope = session.evaluate_scope(&actions, "p", "r").await;
        assert_eq!(scope.error(), Some("No agent has been forged yet."));
    }

    #[tokio::test]
    async fn test_forge_resets_transcript_to_intro() {
        let actions = actions(scripted(0));
        let mut session = AgentSession::new();

        let forged = session.forge(&actions, &forge_input()).await;
        assert!(forged.is_success());

        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::Agent);
        assert_eq!(messages[0].content, "Hi there, I can help!");
        assert!(!session.status().forging);
    }

    #[tokio::test]
    async fn test_transcript_length_after_mixed_turns() {
        // every third chat call fails
        let actions = actions(scripted(3));
        let mut session = AgentSession::new();
        session.forge(&actions, &forge_input()).await;

        let mut successes = 0;
        for i in 0..7 {
            let result = session.chat(&actions, &format!("question {}", i)).await;
            if result.is_success() {
                successes += 1;
            }
            assert_eq!(session.transcript().len(), 1 + 2 * successes);
        }
        assert_eq!(successes, 5);

        let roles: Vec<_> = session.transcript().messages().iter().map(|m| m.role).collect();
        for (i, role) in roles.iter().enumerate() {
            let expected = if i % 2 == 0 { ChatRole::Agent } else { ChatRole::User };
            assert_eq!(*role, expected);
        }
        assert_eq!(session.status().pending_turns, 0);
    }

    #[tokio::test]
    async fn test_chat_uses_training_as_context() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate()
            .withf(|req| req.operation == crate::contracts::Operation::GenerateAgentDescription)
            .returning(|_| Ok(json!({"agentDescription": "desc"})));
        mock.expect_generate()
            .withf(|req| {
                req.operation == crate::contracts::Operation::ChatTurn
                    && req.prompt.text().contains("Shipping takes 3-5 business days.")
            })
            .returning(|_| Ok(json!({"answer": "3-5 days."})));
        let actions = actions(mock);

        let mut session = AgentSession::new();
        session.forge(&actions, &forge_input()).await;
        let answer = session.chat(&actions, "How long is shipping?").await;
        assert_eq!(answer.data().unwrap().answer, "3-5 days.");
    }

    #[tokio::test]
    async fn test_scope_uses_parameters_summary() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate()
            .withf(|req| req.operation == crate::contracts::Operation::GenerateAgentDescription)
            .returning(|_| Ok(json!({"agentDescription": "desc"})));
        mock.expect_generate()
            .withf(|req| {
                req.prompt.text().contains(
                    "Parameters: Tone: friendly, Response Length: short, Expertise: shipping questions, Boundaries: no legal advice\n",
                )
            })
            .returning(|_| Ok(json!({"shouldLimit": true, "reason": "Off topic."})));
        let actions = actions(mock);

        let mut session = AgentSession::new();
        session.forge(&actions, &forge_input()).await;
        let analysis = session
            .evaluate_scope(&actions, "What is your return policy?", "I only do shipping.")
            .await;
        assert!(analysis.data().unwrap().should_limit);
        assert_eq!(session.analysis().unwrap().reason, "Off topic.");
        assert!(!session.status().analyzing);
    }

    #[tokio::test]
    async fn test_close_cancels_turns() {
        let actions = actions(scripted(0));
        let mut session = AgentSession::new();
        session.forge(&actions, &forge_input()).await;

        let turn = session.begin_chat_turn("Still there?").unwrap();
        session.close();
        assert!(turn.cancel.is_cancelled());

        let result = actions.chat_turn(&turn.input, &turn.cancel).await;
        session.finish_turn(turn.handle, &result);
        assert_eq!(result.error(), Some("Request was cancelled."));
        assert_eq!(session.transcript().len(), 1);
        assert!(session.is_closed());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let session = AgentSession::new();
        let value = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(value["status"]["pendingTurns"], 0);
        assert!(value["agent"].is_null());
        assert!(value["createdAt"].is_string());
    }
}
