//! Validation Engine
//!
//! Narrows raw caller input into typed requests. Every check of a schema is
//! run and all violations are collected; the engine never fails fast and
//! never panics on caller data.

pub mod rules;

use serde::Serialize;
use std::ops::Deref;
use thiserror::Error;

use crate::contracts::{
    AgentProfile, AnswerQuestionInput, AvatarImage, ChatTurnInput, EvaluateScopeInput,
    FilePolicy, ForgeAgentInput, ForgeAgentRequest, InputSchema, ResponseLength,
    TrainingContext, AGENT_PROFILE_SCHEMA, ANSWER_QUESTION_SCHEMA, AVATAR_POLICY,
    CHAT_TURN_SCHEMA, EVALUATE_SCOPE_SCHEMA, FORGE_AGENT_SCHEMA,
};

pub use rules::{FieldViolation, ViolationCode};

/// Input rejected by a schema
///
/// Displays as the generic caller-facing message; the individual violations
/// are kept for logs and for surfaces that want field-level detail.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("Invalid fields.")]
pub struct ValidationFailure {
    pub schema: &'static str,
    pub violations: Vec<FieldViolation>,
}

impl ValidationFailure {
    pub fn new(schema: &'static str, violations: Vec<FieldViolation>) -> Self {
        Self { schema, violations }
    }

    /// Names of the offending fields, in reporting order, without duplicates
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for violation in &self.violations {
            if !fields.contains(&violation.field.as_str()) {
                fields.push(&violation.field);
            }
        }
        fields
    }

    pub fn has(&self, field: &str, code: ViolationCode) -> bool {
        self.violations
            .iter()
            .any(|v| v.field == field && v.code == code)
    }

    /// Compact one-line summary for logs
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}:{}", v.field, v.code))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Collects violations across one or more schemas
#[derive(Debug)]
pub struct Validator {
    schema: &'static str,
    violations: Vec<FieldViolation>,
}

impl Validator {
    pub fn new(schema: &'static str) -> Self {
        Self {
            schema,
            violations: Vec::new(),
        }
    }

    /// Check `value` against the rule `schema` declares for `field`
    ///
    /// Fields the schema does not declare are accepted unchecked.
    pub fn text(&mut self, schema: &InputSchema, field: &str, value: &str) -> &mut Self {
        if let Some(rule) = schema.rule(field) {
            self.violations.extend(rules::check_text(rule, value));
        }
        self
    }

    /// Same as [`text`](Self::text), reporting whether the value passed
    pub fn text_passes(&mut self, schema: &InputSchema, field: &str, value: &str) -> bool {
        let before = self.violations.len();
        self.text(schema, field, value);
        self.violations.len() == before
    }

    /// Check an in-memory file, or its absence, against a policy
    pub fn file(&mut self, policy: &FilePolicy, file: Option<(&str, usize)>) -> &mut Self {
        match file {
            Some((mime_type, byte_len)) => {
                self.violations
                    .extend(rules::check_file(policy, mime_type, byte_len));
            }
            None if policy.required => self.violations.push(rules::missing_file(policy)),
            None => {}
        }
        self
    }

    /// Check an optional data URI; a blank value counts as absent
    pub fn data_uri(&mut self, policy: &FilePolicy, uri: Option<&str>) -> Option<AvatarImage> {
        match uri.filter(|u| !u.trim().is_empty()) {
            Some(uri) => match rules::check_data_uri(policy, uri) {
                Ok(image) => Some(image),
                Err(violations) => {
                    self.violations.extend(violations);
                    None
                }
            },
            None => {
                if policy.required {
                    self.violations.push(rules::missing_file(policy));
                }
                None
            }
        }
    }

    pub fn push(&mut self, violation: FieldViolation) -> &mut Self {
        self.violations.push(violation);
        self
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn finish(self) -> Result<(), ValidationFailure> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure::new(self.schema, self.violations))
        }
    }
}

/// Input that passed its schema
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T>(T);

impl<T> Validated<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Validated<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Schema validation for a raw input type
pub trait Validate {
    type Output;

    fn validate(&self) -> Result<Self::Output, ValidationFailure>;
}

/// Check the six persona fields shared by the action input and the form
pub(crate) fn check_profile(v: &mut Validator, fields: &[(&str, &str)]) {
    for (field, value) in fields {
        v.text(&AGENT_PROFILE_SCHEMA, field, value);
    }
}

fn profile_fields(input: &ForgeAgentInput) -> [(&'static str, &str); 6] {
    [
        ("agentName", input.agent_name.as_str()),
        ("introductoryMessage", input.introductory_message.as_str()),
        ("tone", input.tone.as_str()),
        ("responseLength", input.response_length.as_str()),
        ("areasOfExpertise", input.areas_of_expertise.as_str()),
        ("knowledgeBoundaries", input.knowledge_boundaries.as_str()),
    ]
}

impl Validate for ForgeAgentInput {
    type Output = ForgeAgentRequest;

    fn validate(&self) -> Result<ForgeAgentRequest, ValidationFailure> {
        let mut v = Validator::new(FORGE_AGENT_SCHEMA.id);
        check_profile(&mut v, &profile_fields(self));
        v.text(&FORGE_AGENT_SCHEMA, "uploadedData", &self.uploaded_data);
        let avatar = match self.avatar.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() && !v.text_passes(&FORGE_AGENT_SCHEMA, "avatar", uri) => {
                None
            }
            uri => v.data_uri(&AVATAR_POLICY, uri),
        };
        v.finish()?;

        let response_length = self.response_length.parse::<ResponseLength>().map_err(|e| {
            ValidationFailure::new(
                FORGE_AGENT_SCHEMA.id,
                vec![FieldViolation::new(
                    "responseLength",
                    ViolationCode::NotAllowed,
                    e,
                )],
            )
        })?;
        let training = TrainingContext::new(self.uploaded_data.clone()).ok_or_else(|| {
            ValidationFailure::new(
                FORGE_AGENT_SCHEMA.id,
                vec![FieldViolation::new(
                    "uploadedData",
                    ViolationCode::Required,
                    "Training data is required.",
                )],
            )
        })?;

        Ok(ForgeAgentRequest {
            profile: AgentProfile {
                agent_name: self.agent_name.clone(),
                introductory_message: self.introductory_message.clone(),
                tone: self.tone.clone(),
                response_length,
                areas_of_expertise: self.areas_of_expertise.clone(),
                knowledge_boundaries: self.knowledge_boundaries.clone(),
            },
            avatar,
            training,
        })
    }
}

impl Validate for EvaluateScopeInput {
    type Output = Validated<EvaluateScopeInput>;

    fn validate(&self) -> Result<Self::Output, ValidationFailure> {
        let schema = &EVALUATE_SCOPE_SCHEMA;
        let mut v = Validator::new(schema.id);
        v.text(schema, "parameters", &self.parameters)
            .text(schema, "prompt", &self.prompt)
            .text(schema, "agentResponse", &self.agent_response);
        v.finish()?;
        Ok(Validated::new(self.clone()))
    }
}

impl Validate for AnswerQuestionInput {
    type Output = Validated<AnswerQuestionInput>;

    fn validate(&self) -> Result<Self::Output, ValidationFailure> {
        let schema = &ANSWER_QUESTION_SCHEMA;
        let mut v = Validator::new(schema.id);
        v.text(schema, "contextData", &self.context_data)
            .text(schema, "question", &self.question);
        v.finish()?;
        Ok(Validated::new(self.clone()))
    }
}

impl Validate for ChatTurnInput {
    type Output = Validated<ChatTurnInput>;

    fn validate(&self) -> Result<Self::Output, ValidationFailure> {
        let schema = &CHAT_TURN_SCHEMA;
        let mut v = Validator::new(schema.id);
        v.text(schema, "contextData", &self.context_data)
            .text(schema, "question", &self.question);
        v.finish()?;
        Ok(Validated::new(self.clone()))
    }
}
