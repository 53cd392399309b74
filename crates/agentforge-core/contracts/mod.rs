//! AgentForge Contracts
//!
//! Wire shapes shared by the action layer, the generative operations and
//! every outer surface (HTTP, CLI). Raw caller input arrives as the
//! `*Input` structs below; validation narrows them into the typed request
//! values in this module before anything reaches the generative backend.

mod schemas;

pub use schemas::*;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The four generative operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GenerateAgentDescription,
    EvaluateResponseScope,
    AnswerFromContext,
    ChatTurn,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GenerateAgentDescription => "generate_agent_description",
            Operation::EvaluateResponseScope => "evaluate_response_scope",
            Operation::AnswerFromContext => "answer_from_context",
            Operation::ChatTurn => "chat_turn",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired length of the agent's replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ResponseLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseLength::Short => "short",
            ResponseLength::Medium => "medium",
            ResponseLength::Long => "long",
        }
    }
}

impl fmt::Display for ResponseLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(ResponseLength::Short),
            "medium" => Ok(ResponseLength::Medium),
            "long" => Ok(ResponseLength::Long),
            other => Err(format!("unknown response length '{}'", other)),
        }
    }
}

/// Raw agent-creation input as submitted by the caller
///
/// `avatar` is an image data URI (`data:image/png;base64,...`) and
/// `uploaded_data` is the training text that becomes the agent's context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeAgentInput {
    pub agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub introductory_message: String,
    pub uploaded_data: String,
    pub tone: String,
    #[serde(default = "default_response_length")]
    pub response_length: String,
    pub areas_of_expertise: String,
    pub knowledge_boundaries: String,
}

fn default_response_length() -> String {
    ResponseLength::default().as_str().to_string()
}

/// Validated persona configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub agent_name: String,
    pub introductory_message: String,
    pub tone: String,
    pub response_length: ResponseLength,
    pub areas_of_expertise: String,
    pub knowledge_boundaries: String,
}

impl AgentProfile {
    /// One-line parameter summary used when judging response scope
    pub fn parameters_summary(&self) -> String {
        format!(
            "Tone: {}, Response Length: {}, Expertise: {}, Boundaries: {}",
            self.tone, self.response_length, self.areas_of_expertise, self.knowledge_boundaries
        )
    }
}

/// Avatar image that passed MIME and size checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarImage {
    pub data_uri: String,
    pub mime_type: String,
    pub byte_len: usize,
}

/// Training text fed verbatim into every question for an agent. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TrainingContext(String);

impl TrainingContext {
    /// Returns `None` for empty or whitespace-only text
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Agent-creation request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ForgeAgentRequest {
    pub profile: AgentProfile,
    pub avatar: Option<AvatarImage>,
    pub training: TrainingContext,
}

/// Raw response-scope test input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateScopeInput {
    pub parameters: String,
    pub prompt: String,
    pub agent_response: String,
}

/// Raw single-shot context question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerQuestionInput {
    pub context_data: String,
    pub question: String,
}

/// Raw chat turn; `context_data` may be empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnInput {
    #[serde(default)]
    pub context_data: String,
    pub question: String,
}

/// Output of `generate_agent_description`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescription {
    pub agent_description: String,
}

/// Output of `evaluate_response_scope`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeAnalysis {
    pub should_limit: bool,
    pub reason: String,
}

/// Output of `answer_from_context` and `chat_turn`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

/// A persona whose description has been generated
///
/// Immutable once built; re-forging replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgedAgent {
    pub profile: AgentProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AvatarImage>,
    pub training: TrainingContext,
    pub description: String,
    pub forged_at: DateTime<Utc>,
}

impl ForgedAgent {
    pub fn new(request: ForgeAgentRequest, description: AgentDescription) -> Self {
        Self {
            profile: request.profile,
            avatar: request.avatar,
            training: request.training,
            description: description.agent_description,
            forged_at: Utc::now(),
        }
    }
}

/// Author of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Agent,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: ChatRole,
    pub content: String,
}

/// Uniform outcome of every action
///
/// Serializes as `{"success":true,"data":...}` or
/// `{"success":false,"error":"..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult<T> {
    Success(T),
    Failure(String),
}

impl<T> ActionResult<T> {
    pub fn success(data: T) -> Self {
        ActionResult::Success(data)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ActionResult::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ActionResult::Success(data) => Some(data),
            ActionResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ActionResult::Success(_) => None,
            ActionResult::Failure(message) => Some(message),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionResult<U> {
        match self {
            ActionResult::Success(data) => ActionResult::Success(f(data)),
            ActionResult::Failure(message) => ActionResult::Failure(message),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            ActionResult::Success(data) => Ok(data),
            ActionResult::Failure(message) => Err(message),
        }
    }
}

impl<T: Serialize> Serialize for ActionResult<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ActionResult", 2)?;
        match self {
            ActionResult::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            ActionResult::Failure(message) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", message)?;
            }
        }
        state.end()
    }
}
