//! Action layer
//!
//! The only boundary that turns errors into values. Each action validates
//! raw input, runs the matching generative operation and returns an
//! [`ActionResult`] carrying either the output or a fixed message. The
//! underlying cause of a failure is logged, never returned.

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::backend::GenerativeBackend;
use crate::contracts::{
    ActionResult, AgentDescription, Answer, AnswerQuestionInput, ChatTurnInput,
    EvaluateScopeInput, ForgeAgentInput, ForgedAgent, Operation, ScopeAnalysis,
};
use crate::engine::{Validate, ValidationFailure};
use crate::flows::{FlowError, GenerativeFlows};
use crate::telemetry::{ActionMetrics, ActionOutcome};
use crate::upload::{AgentForm, UploadError};

pub const INVALID_FIELDS: &str = "Invalid fields.";
pub const FORGE_FAILED: &str = "Failed to generate agent. Please try again.";
pub const SCOPE_FAILED: &str = "Failed to analyze response. Please try again.";
pub const ANSWER_FAILED: &str = "Failed to answer question. Please try again.";
pub const CHAT_FAILED: &str = "Failed to get a response from the agent. Please try again.";
pub const CANCELLED: &str = "Request was cancelled.";
pub const AVATAR_UNREADABLE: &str = "Could not process avatar image.";
pub const TRAINING_FILE_UNREADABLE: &str = "Could not read training data file.";

/// Entry point for every caller-facing operation
#[derive(Clone)]
pub struct ForgeActions {
    flows: GenerativeFlows,
    metrics: Arc<ActionMetrics>,
}

impl ForgeActions {
    pub fn new(backend: Arc<dyn GenerativeBackend>, metrics: Arc<ActionMetrics>) -> Self {
        Self {
            flows: GenerativeFlows::new(backend),
            metrics,
        }
    }

    pub fn metrics(&self) -> &ActionMetrics {
        &self.metrics
    }

    /// Generate a description for the configured persona
    pub async fn forge_agent(
        &self,
        input: &ForgeAgentInput,
        cancel: &CancellationToken,
    ) -> ActionResult<AgentDescription> {
        self.forge_agent_profile(input, cancel)
            .await
            .map(|agent| AgentDescription {
                agent_description: agent.description,
            })
    }

    /// Same as [`forge_agent`](Self::forge_agent) but keeps the validated
    /// profile, avatar and training context alongside the description
    pub async fn forge_agent_profile(
        &self,
        input: &ForgeAgentInput,
        cancel: &CancellationToken,
    ) -> ActionResult<ForgedAgent> {
        let operation = Operation::GenerateAgentDescription;
        let request = match input.validate() {
            Ok(request) => request,
            Err(failure) => return self.reject(operation, &failure),
        };

        let description = self
            .run(
                operation,
                FORGE_FAILED,
                self.flows.generate_agent_description(&request, cancel),
            )
            .await;

        description.map(|description| ForgedAgent::new(request, description))
    }

    /// Validate a submitted form, convert its uploads, then forge
    ///
    /// Upload conversion failures are reported before any generative call.
    pub async fn forge_agent_from_form(
        &self,
        form: &AgentForm,
        cancel: &CancellationToken,
    ) -> ActionResult<ForgedAgent> {
        let operation = Operation::GenerateAgentDescription;
        let validated = match form.validate() {
            Ok(validated) => validated,
            Err(failure) => return self.reject(operation, &failure),
        };

        let input = match validated.into_forge_input() {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(
                    operation = %operation,
                    error = %e,
                    "Failed to convert uploaded files"
                );
                self.metrics.record_outcome(operation, ActionOutcome::Failed);
                return ActionResult::failure(upload_message(&e));
            }
        };

        self.forge_agent_profile(&input, cancel).await
    }

    /// Judge whether a hypothetical response stays within the declared parameters
    pub async fn evaluate_scope(
        &self,
        input: &EvaluateScopeInput,
        cancel: &CancellationToken,
    ) -> ActionResult<ScopeAnalysis> {
        let operation = Operation::EvaluateResponseScope;
        let validated = match input.validate() {
            Ok(validated) => validated,
            Err(failure) => return self.reject(operation, &failure),
        };

        self.run(
            operation,
            SCOPE_FAILED,
            self.flows.evaluate_response_scope(&validated, cancel),
        )
        .await
    }

    pub async fn answer_from_context(
        &self,
        input: &AnswerQuestionInput,
        cancel: &CancellationToken,
    ) -> ActionResult<Answer> {
        let operation = Operation::AnswerFromContext;
        let validated = match input.validate() {
            Ok(validated) => validated,
            Err(failure) => return self.reject(operation, &failure),
        };

        self.run(
            operation,
            ANSWER_FAILED,
            self.flows.answer_from_context(&validated, cancel),
        )
        .await
    }

    pub async fn chat_turn(
        &self,
        input: &ChatTurnInput,
        cancel: &CancellationToken,
    ) -> ActionResult<Answer> {
        let operation = Operation::ChatTurn;
        let validated = match input.validate() {
            Ok(validated) => validated,
            Err(failure) => return self.reject(operation, &failure),
        };

        self.run(operation, CHAT_FAILED, self.flows.chat_turn(&validated, cancel))
            .await
    }

    fn reject<T>(&self, operation: Operation, failure: &ValidationFailure) -> ActionResult<T> {
        tracing::warn!(
            operation = %operation,
            schema = failure.schema,
            violations = %failure.summary(),
            "Rejected invalid input"
        );
        self.metrics.record_outcome(operation, ActionOutcome::Invalid);
        ActionResult::failure(INVALID_FIELDS)
    }

    async fn run<T, F>(
        &self,
        operation: Operation,
        failure_message: &'static str,
        call: F,
    ) -> ActionResult<T>
    where
        F: Future<Output = Result<T, FlowError>>,
    {
        let timer = self.metrics.start_generation(operation);
        let result = call.await;
        let duration_ms = timer.elapsed_ms();
        drop(timer);

        match result {
            Ok(data) => {
                tracing::info!(operation = %operation, duration_ms, "Action completed");
                self.metrics.record_outcome(operation, ActionOutcome::Success);
                ActionResult::success(data)
            }
            Err(FlowError::Cancelled) => {
                tracing::info!(operation = %operation, duration_ms, "Action cancelled");
                self.metrics.record_outcome(operation, ActionOutcome::Cancelled);
                ActionResult::failure(CANCELLED)
            }
            Err(e) => {
                tracing::error!(
                    operation = %operation,
                    error = %e,
                    duration_ms,
                    "Action failed"
                );
                self.metrics.record_outcome(operation, ActionOutcome::Failed);
                ActionResult::failure(failure_message)
            }
        }
    }
}

fn upload_message(err: &UploadError) -> &'static str {
    match err {
        UploadError::UnreadableImage { .. } => AVATAR_UNREADABLE,
        UploadError::NotUtf8 { .. } | UploadError::Read { .. } => TRAINING_FILE_UNREADABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockGenerativeBackend};
    use crate::upload::{TrainingSource, UploadedFile};
    use serde_json::json;

    fn actions(mock: MockGenerativeBackend) -> ForgeActions {
        ForgeActions::new(Arc::new(mock), Arc::new(ActionMetrics::detached().unwrap()))
    }

    fn forge_input() -> ForgeAgentInput {
        ForgeAgentInput {
            agent_name: "Helper".to_string(),
            avatar: None,
            introductory_message: "Hi there, I can help!".to_string(),
            uploaded_data: "We sell refurbished laptops and offer a one-year warranty on all of them."
                .to_string(),
            tone: "friendly".to_string(),
            response_length: "short".to_string(),
            areas_of_expertise: "laptop support".to_string(),
            knowledge_boundaries: "no legal or medical advice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_forge_agent_success() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(json!({"agentDescription": "Helper is a friendly laptop expert."})));
        let actions = actions(mock);

        let result = actions
            .forge_agent(&forge_input(), &CancellationToken::new())
            .await;
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": true, "data": {"agentDescription": "Helper is a friendly laptop expert."}})
        );
        assert_eq!(
            actions
                .metrics()
                .outcome_count(Operation::GenerateAgentDescription, ActionOutcome::Success),
            1
        );
    }

    #[tokio::test]
    async fn test_forge_agent_profile_keeps_request() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate()
            .returning(|_| Ok(json!({"agentDescription": "A helper."})));

        let agent = actions(mock)
            .forge_agent_profile(&forge_input(), &CancellationToken::new())
            .await
            .into_result()
            .unwrap();
        assert_eq!(agent.profile.agent_name, "Helper");
        assert_eq!(agent.description, "A helper.");
        assert!(agent.training.as_str().starts_with("We sell"));
    }

    #[tokio::test]
    async fn test_invalid_input_never_calls_backend() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().times(0);
        let actions = actions(mock);

        let input = ForgeAgentInput {
            introductory_message: "Hi!!!".to_string(),
            ..forge_input()
        };
        let result = actions.forge_agent(&input, &CancellationToken::new()).await;
        assert_eq!(result, ActionResult::failure("Invalid fields."));

        let scope = actions
            .evaluate_scope(&EvaluateScopeInput::default(), &CancellationToken::new())
            .await;
        assert_eq!(scope.error(), Some(INVALID_FIELDS));

        let answer = actions
            .answer_from_context(
                &AnswerQuestionInput {
                    context_data: String::new(),
                    question: "Why?".to_string(),
                },
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(answer.error(), Some(INVALID_FIELDS));

        assert_eq!(
            actions
                .metrics()
                .outcome_count(Operation::GenerateAgentDescription, ActionOutcome::Invalid),
            1
        );
    }

    #[tokio::test]
    async fn test_backend_failure_messages() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate()
            .returning(|_| Err(BackendError::Transport("connection refused".to_string())));
        let actions = actions(mock);
        let cancel = CancellationToken::new();

        let forge = actions.forge_agent(&forge_input(), &cancel).await;
        assert_eq!(forge.error(), Some(FORGE_FAILED));

        let scope = actions
            .evaluate_scope(
                &EvaluateScopeInput {
                    parameters: "Tone: friendly".to_string(),
                    prompt: "What is your return policy?".to_string(),
                    agent_response: "I cannot discuss that.".to_string(),
                },
                &cancel,
            )
            .await;
        assert_eq!(scope.error(), Some(SCOPE_FAILED));

        let answer = actions
            .answer_from_context(
                &AnswerQuestionInput {
                    context_data: "ctx".to_string(),
                    question: "q?".to_string(),
                },
                &cancel,
            )
            .await;
        assert_eq!(answer.error(), Some(ANSWER_FAILED));

        let chat = actions
            .chat_turn(
                &ChatTurnInput {
                    context_data: String::new(),
                    question: "Hello?".to_string(),
                },
                &cancel,
            )
            .await;
        assert_eq!(chat.error(), Some(CHAT_FAILED));

        assert_eq!(
            actions
                .metrics()
                .outcome_count(Operation::ChatTurn, ActionOutcome::Failed),
            1
        );
        assert_eq!(actions.metrics().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_answer_is_deterministic_with_deterministic_backend() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate()
            .times(2)
            .returning(|req| Ok(json!({"answer": format!("echo: {}", req.prompt.text().len())})));
        let actions = actions(mock);

        let input = AnswerQuestionInput {
            context_data: "Store hours are 9 to 5.".to_string(),
            question: "When are you open?".to_string(),
        };
        let cancel = CancellationToken::new();
        let first = actions.answer_from_context(&input, &cancel).await;
        let second = actions.answer_from_context(&input, &cancel).await;
        assert!(first.is_success());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_scope_is_deterministic_with_deterministic_backend() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().times(2).returning(|req| {
            let off_topic = req.prompt.text().contains("return policy");
            Ok(json!({
                "shouldLimit": off_topic,
                "reason": format!("Judged {} prompt characters.", req.prompt.text().len())
            }))
        });
        let actions = actions(mock);

        let input = EvaluateScopeInput {
            parameters: "Tone: friendly, Expertise: laptop support".to_string(),
            prompt: "What is your return policy?".to_string(),
            agent_response: "I can only help with laptops.".to_string(),
        };
        let cancel = CancellationToken::new();
        let first = actions
            .evaluate_scope(&input, &cancel)
            .await
            .into_result()
            .unwrap();
        let second = actions
            .evaluate_scope(&input.clone(), &cancel)
            .await
            .into_result()
            .unwrap();

        assert!(first.should_limit);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().times(0);
        let actions = actions(mock);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = actions
            .chat_turn(
                &ChatTurnInput {
                    context_data: "ctx".to_string(),
                    question: "Hello?".to_string(),
                },
                &cancel,
            )
            .await;

        assert_eq!(result.error(), Some(CANCELLED));
        assert_eq!(
            actions
                .metrics()
                .outcome_count(Operation::ChatTurn, ActionOutcome::Cancelled),
            1
        );
    }

    fn form() -> AgentForm {
        let input = forge_input();
        AgentForm {
            agent_name: input.agent_name,
            avatar: None,
            introductory_message: input.introductory_message,
            tone: input.tone,
            response_length: input.response_length,
            areas_of_expertise: input.areas_of_expertise,
            knowledge_boundaries: input.knowledge_boundaries,
            training: TrainingSource::Pasted(input.uploaded_data),
        }
    }

    #[tokio::test]
    async fn test_form_upload_failures_skip_backend() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().times(0);
        let actions = actions(mock);
        let cancel = CancellationToken::new();

        let mut bad_avatar = form();
        bad_avatar.avatar = Some(UploadedFile::new("me.jpg", "image/jpeg", b"plain text".to_vec()));
        let result = actions.forge_agent_from_form(&bad_avatar, &cancel).await;
        assert_eq!(result.error(), Some(AVATAR_UNREADABLE));

        let mut bad_training = form();
        bad_training.training =
            TrainingSource::Uploaded(UploadedFile::new("notes.txt", "text/plain", vec![0xc3, 0x28]));
        let result = actions.forge_agent_from_form(&bad_training, &cancel).await;
        assert_eq!(result.error(), Some(TRAINING_FILE_UNREADABLE));

        let mut too_short = form();
        too_short.training = TrainingSource::Pasted("short".to_string());
        let result = actions.forge_agent_from_form(&too_short, &cancel).await;
        assert_eq!(result.error(), Some(INVALID_FIELDS));
    }

    #[tokio::test]
    async fn test_form_uploaded_training_reaches_prompt() {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate()
            .withf(|req| req.prompt.text().contains("Uploaded Data: FAQ: we open at nine."))
            .times(1)
            .returning(|_| Ok(json!({"agentDescription": "FAQ bot."})));

        let mut uploaded = form();
        uploaded.training = TrainingSource::Uploaded(UploadedFile::new(
            "faq.txt",
            "text/plain",
            b"FAQ: we open at nine.".to_vec(),
        ));

        let agent = actions(mock)
            .forge_agent_from_form(&uploaded, &CancellationToken::new())
            .await
            .into_result()
            .unwrap();
        assert_eq!(agent.training.as_str(), "FAQ: we open at nine.");
    }
}
