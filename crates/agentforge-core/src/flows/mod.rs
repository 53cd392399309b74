//! Generative operations
//!
//! Each operation renders its prompt template from already-validated input,
//! makes exactly one backend call with the declared output schema, and
//! decodes the result into its typed output. Operations hold no state.

pub mod prompts;
pub mod template;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, GenerationRequest, GenerativeBackend};
use crate::contracts::{
    AgentDescription, Answer, AnswerQuestionInput, ChatTurnInput, EvaluateScopeInput,
    ForgeAgentRequest, Operation, ScopeAnalysis,
};
use crate::engine::Validated;
use template::{PromptTemplate, TemplateError};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Output does not match schema: {0}")]
    InvalidOutput(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl FlowError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlowError::Cancelled)
    }
}

/// Declared output shape of an operation
pub trait OutputShape: DeserializeOwned {
    /// JSON schema sent to the backend
    fn output_schema() -> Value;

    /// Checks serde cannot express
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("'{}' is empty", field))
    } else {
        Ok(())
    }
}

impl OutputShape for AgentDescription {
    fn output_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "agentDescription": {
                    "type": "string",
                    "description": "A description of the AI agent."
                }
            },
            "required": ["agentDescription"]
        })
    }

    fn check(&self) -> Result<(), String> {
        non_empty("agentDescription", &self.agent_description)
    }
}

impl OutputShape for ScopeAnalysis {
    fn output_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "shouldLimit": {
                    "type": "boolean",
                    "description": "Whether the agent response should be limited."
                },
                "reason": {
                    "type": "string",
                    "description": "The reason for limiting or not limiting the response."
                }
            },
            "required": ["shouldLimit", "reason"]
        })
    }

    fn check(&self) -> Result<(), String> {
        non_empty("reason", &self.reason)
    }
}

impl OutputShape for Answer {
    fn output_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The answer to the user's question."
                }
            },
            "required": ["answer"]
        })
    }

    fn check(&self) -> Result<(), String> {
        non_empty("answer", &self.answer)
    }
}

/// The four operations bound to one backend
#[derive(Clone)]
pub struct GenerativeFlows {
    backend: Arc<dyn GenerativeBackend>,
}

impl GenerativeFlows {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    pub async fn generate_agent_description(
        &self,
        request: &ForgeAgentRequest,
        cancel: &CancellationToken,
    ) -> Result<AgentDescription, FlowError> {
        let profile = &request.profile;
        let avatar = request
            .avatar
            .as_ref()
            .map(|a| a.data_uri.as_str())
            .unwrap_or_default();

        self.run(
            Operation::GenerateAgentDescription,
            &prompts::AGENT_DESCRIPTION,
            &[
                ("uploadedData", request.training.as_str()),
                ("tone", profile.tone.as_str()),
                ("responseLength", profile.response_length.as_str()),
                ("areasOfExpertise", profile.areas_of_expertise.as_str()),
                ("knowledgeBoundaries", profile.knowledge_boundaries.as_str()),
                ("agentName", profile.agent_name.as_str()),
                ("avatar", avatar),
                ("introductoryMessage", profile.introductory_message.as_str()),
            ],
            cancel,
        )
        .await
    }

    pub async fn evaluate_response_scope(
        &self,
        input: &Validated<EvaluateScopeInput>,
        cancel: &CancellationToken,
    ) -> Result<ScopeAnalysis, FlowError> {
        self.run(
            Operation::EvaluateResponseScope,
            &prompts::RESPONSE_SCOPE,
            &[
                ("parameters", input.parameters.as_str()),
                ("prompt", input.prompt.as_str()),
                ("agentResponse", input.agent_response.as_str()),
            ],
            cancel,
        )
        .await
    }

    pub async fn answer_from_context(
        &self,
        input: &Validated<AnswerQuestionInput>,
        cancel: &CancellationToken,
    ) -> Result<Answer, FlowError> {
        self.run(
            Operation::AnswerFromContext,
            &prompts::CONTEXT_ANSWER,
            &[
                ("contextData", input.context_data.as_str()),
                ("question", input.question.as_str()),
            ],
            cancel,
        )
        .await
    }

    pub async fn chat_turn(
        &self,
        input: &Validated<ChatTurnInput>,
        cancel: &CancellationToken,
    ) -> Result<Answer, FlowError> {
        self.run(
            Operation::ChatTurn,
            &prompts::CHAT_TURN,
            &[
                ("contextData", input.context_data.as_str()),
                ("question", input.question.as_str()),
            ],
            cancel,
        )
        .await
    }

    async fn run<T: OutputShape>(
        &self,
        operation: Operation,
        template: &PromptTemplate,
        vars: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T, FlowError> {
        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }

        let request = GenerationRequest {
            operation,
            prompt: template.render(vars)?,
            output_schema: T::output_schema(),
        };

        // Dropping the backend future on cancellation aborts the request
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FlowError::Cancelled),
            result = self.backend.generate(&request) => result?,
        };

        let output: T = serde_json::from_value(raw)
            .map_err(|e| FlowError::InvalidOutput(e.to_string()))?;
        output.check().map_err(FlowError::InvalidOutput)?;
        Ok(output)
    }
}
