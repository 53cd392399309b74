//! Declarative input schemas
//!
//! Each operation's acceptable input shape expressed as field rules and file
//! policies. The validation engine interprets these tables; nothing here
//! performs any checking itself.

use serde::Serialize;

/// Upload size ceiling shared by avatar and training files (5 MiB)
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

pub const ACCEPTED_TEXT_TYPES: &[&str] = &["text/plain"];

pub const RESPONSE_LENGTHS: &[&str] = &["short", "medium", "long"];

/// A single constraint on a text field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldConstraint {
    /// Must contain at least one non-whitespace character
    Required,
    MinChars(usize),
    MaxChars(usize),
    StartsWith(&'static str),
    /// Case-insensitive membership in a closed set
    OneOf(&'static [&'static str]),
}

/// Rules attached to one named text field
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldRule {
    /// Wire name of the field (camelCase)
    pub field: &'static str,
    /// Human-readable label used in violation messages
    pub label: &'static str,
    pub constraints: &'static [FieldConstraint],
}

/// MIME and size policy for a file-like field
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FilePolicy {
    pub field: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub max_bytes: usize,
    pub accepted_mime_types: &'static [&'static str],
}

/// Full input schema for one operation
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InputSchema {
    pub id: &'static str,
    pub fields: &'static [FieldRule],
    pub files: &'static [FilePolicy],
}

impl InputSchema {
    /// Look up the rule for a field, if the schema declares one
    pub fn rule(&self, field: &str) -> Option<&'static FieldRule> {
        self.fields.iter().find(|rule| rule.field == field)
    }

    pub fn file_policy(&self, field: &str) -> Option<&'static FilePolicy> {
        self.files.iter().find(|policy| policy.field == field)
    }
}

use FieldConstraint::*;

const AGENT_PROFILE_FIELDS: &[FieldRule] = &[
    FieldRule {
        field: "agentName",
        label: "Agent name",
        constraints: &[Required, MinChars(2), MaxChars(50)],
    },
    FieldRule {
        field: "introductoryMessage",
        label: "Introductory message",
        constraints: &[Required, MinChars(10), MaxChars(500)],
    },
    FieldRule {
        field: "tone",
        label: "Tone",
        constraints: &[Required, MinChars(3), MaxChars(100)],
    },
    FieldRule {
        field: "responseLength",
        label: "Response length",
        constraints: &[Required, OneOf(RESPONSE_LENGTHS)],
    },
    FieldRule {
        field: "areasOfExpertise",
        label: "Areas of expertise",
        constraints: &[Required, MinChars(10), MaxChars(1000)],
    },
    FieldRule {
        field: "knowledgeBoundaries",
        label: "Knowledge boundaries",
        constraints: &[Required, MinChars(10), MaxChars(1000)],
    },
];

/// Persona fields common to the form and the forge action
pub static AGENT_PROFILE_SCHEMA: InputSchema = InputSchema {
    id: "agent-profile",
    fields: AGENT_PROFILE_FIELDS,
    files: &[],
};

/// Extra fields checked by the forge action on top of the profile
///
/// A present avatar must carry the `data:image/` prefix before its data URI
/// is decoded and checked against `AVATAR_POLICY`.
pub static FORGE_AGENT_SCHEMA: InputSchema = InputSchema {
    id: "forge-agent",
    fields: &[
        FieldRule {
            field: "uploadedData",
            label: "Training data",
            constraints: &[Required],
        },
        FieldRule {
            field: "avatar",
            label: "Avatar",
            constraints: &[StartsWith("data:image/")],
        },
    ],
    files: &[AVATAR_POLICY],
};

pub const AVATAR_POLICY: FilePolicy = FilePolicy {
    field: "avatar",
    label: "Avatar",
    required: false,
    max_bytes: MAX_FILE_SIZE,
    accepted_mime_types: ACCEPTED_IMAGE_TYPES,
};

pub const TRAINING_FILE_POLICY: FilePolicy = FilePolicy {
    field: "uploadedData",
    label: "Training data file",
    required: true,
    max_bytes: MAX_FILE_SIZE,
    accepted_mime_types: ACCEPTED_TEXT_TYPES,
};

/// Form-level extras: pasted training text bounds plus upload policies
pub static AGENT_FORM_SCHEMA: InputSchema = InputSchema {
    id: "agent-form",
    fields: &[FieldRule {
        field: "uploadedData",
        label: "Training data",
        constraints: &[Required, MinChars(50), MaxChars(5000)],
    }],
    files: &[AVATAR_POLICY, TRAINING_FILE_POLICY],
};

pub static EVALUATE_SCOPE_SCHEMA: InputSchema = InputSchema {
    id: "evaluate-scope",
    fields: &[
        FieldRule {
            field: "parameters",
            label: "Parameters",
            constraints: &[Required],
        },
        FieldRule {
            field: "prompt",
            label: "Prompt",
            constraints: &[Required, MaxChars(1000)],
        },
        FieldRule {
            field: "agentResponse",
            label: "Agent response",
            constraints: &[Required, MaxChars(2000)],
        },
    ],
    files: &[],
};

pub static ANSWER_QUESTION_SCHEMA: InputSchema = InputSchema {
    id: "answer-question",
    fields: &[
        FieldRule {
            field: "contextData",
            label: "Context data",
            constraints: &[Required],
        },
        FieldRule {
            field: "question",
            label: "Question",
            constraints: &[Required],
        },
    ],
    files: &[],
};

pub static CHAT_TURN_SCHEMA: InputSchema = InputSchema {
    id: "chat-turn",
    fields: &[
        FieldRule {
            field: "contextData",
            label: "Context data",
            constraints: &[],
        },
        FieldRule {
            field: "question",
            label: "Question",
            constraints: &[Required, MaxChars(2000)],
        },
    ],
    files: &[],
};
