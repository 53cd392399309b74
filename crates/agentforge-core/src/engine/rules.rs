//! Constraint evaluation
//!
//! Pure functions that interpret the declarative tables in `contracts`
//! against concrete values and produce field violations.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::contracts::{AvatarImage, FieldConstraint, FieldRule, FilePolicy};

/// Machine-readable violation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    Required,
    TooShort,
    TooLong,
    InvalidPrefix,
    NotAllowed,
    InvalidMimeType,
    FileTooLarge,
    InvalidDataUri,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::Required => "REQUIRED",
            ViolationCode::TooShort => "TOO_SHORT",
            ViolationCode::TooLong => "TOO_LONG",
            ViolationCode::InvalidPrefix => "INVALID_PREFIX",
            ViolationCode::NotAllowed => "NOT_ALLOWED",
            ViolationCode::InvalidMimeType => "INVALID_MIME_TYPE",
            ViolationCode::FileTooLarge => "FILE_TOO_LARGE",
            ViolationCode::InvalidDataUri => "INVALID_DATA_URI",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub code: ViolationCode,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.field, self.message)
    }
}

/// Length in Unicode scalar values
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Evaluate every constraint of `rule` against `value`
///
/// A blank value on a required field reports `REQUIRED` only; the remaining
/// constraints are skipped. A blank value on an optional field is accepted.
pub fn check_text(rule: &FieldRule, value: &str) -> Vec<FieldViolation> {
    let required = rule.constraints.contains(&FieldConstraint::Required);

    if value.trim().is_empty() {
        if required {
            return vec![FieldViolation::new(
                rule.field,
                ViolationCode::Required,
                format!("{} is required.", rule.label),
            )];
        }
        return Vec::new();
    }

    let len = char_len(value);
    let mut violations = Vec::new();

    for constraint in rule.constraints {
        match *constraint {
            FieldConstraint::Required => {}
            FieldConstraint::MinChars(min) if len < min => {
                violations.push(FieldViolation::new(
                    rule.field,
                    ViolationCode::TooShort,
                    format!("{} must be at least {} characters.", rule.label, min),
                ));
            }
            FieldConstraint::MaxChars(max) if len > max => {
                violations.push(FieldViolation::new(
                    rule.field,
                    ViolationCode::TooLong,
                    format!("{} is too long.", rule.label),
                ));
            }
            FieldConstraint::StartsWith(prefix) if !value.starts_with(prefix) => {
                violations.push(FieldViolation::new(
                    rule.field,
                    ViolationCode::InvalidPrefix,
                    format!("{} must start with '{}'.", rule.label, prefix),
                ));
            }
            FieldConstraint::OneOf(allowed) => {
                let candidate = value.trim();
                if !allowed.iter().any(|a| a.eq_ignore_ascii_case(candidate)) {
                    violations.push(FieldViolation::new(
                        rule.field,
                        ViolationCode::NotAllowed,
                        format!("{} must be one of: {}.", rule.label, allowed.join(", ")),
                    ));
                }
            }
            _ => {}
        }
    }

    violations
}

fn size_label(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Check a file's declared MIME type and size against a policy
pub fn check_file(policy: &FilePolicy, mime_type: &str, byte_len: usize) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if !policy
        .accepted_mime_types
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(mime_type.trim()))
    {
        violations.push(FieldViolation::new(
            policy.field,
            ViolationCode::InvalidMimeType,
            format!(
                "{} type '{}' is not supported. Accepted types: {}.",
                policy.label,
                mime_type,
                policy.accepted_mime_types.join(", ")
            ),
        ));
    }

    if byte_len > policy.max_bytes {
        violations.push(FieldViolation::new(
            policy.field,
            ViolationCode::FileTooLarge,
            format!("Max file size is {}.", size_label(policy.max_bytes)),
        ));
    }

    violations
}

/// Report a missing required file
pub fn missing_file(policy: &FilePolicy) -> FieldViolation {
    FieldViolation::new(
        policy.field,
        ViolationCode::Required,
        format!("{} is required.", policy.label),
    )
}

/// Parse and check a `data:<mime>;base64,<payload>` URI
///
/// The payload is decoded to measure its real size; the decoded bytes are
/// not retained.
pub fn check_data_uri(policy: &FilePolicy, uri: &str) -> Result<AvatarImage, Vec<FieldViolation>> {
    let invalid = |detail: &str| {
        vec![FieldViolation::new(
            policy.field,
            ViolationCode::InvalidDataUri,
            format!("{} must be a base64 data URI ({}).", policy.label, detail),
        )]
    };

    let uri = uri.trim();
    let Some(rest) = uri.strip_prefix("data:") else {
        return Err(invalid("missing 'data:' scheme"));
    };
    let Some((mime_type, payload)) = rest.split_once(";base64,") else {
        return Err(invalid("missing ';base64,' marker"));
    };

    let bytes = match STANDARD.decode(payload) {
        Ok(bytes) => bytes,
        Err(_) => return Err(invalid("payload is not valid base64")),
    };

    let violations = check_file(policy, mime_type, bytes.len());
    if !violations.is_empty() {
        return Err(violations);
    }

    Ok(AvatarImage {
        data_uri: uri.to_string(),
        mime_type: mime_type.to_ascii_lowercase(),
        byte_len: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{AGENT_PROFILE_SCHEMA, AVATAR_POLICY, MAX_FILE_SIZE};

    fn rule(field: &str) -> &'static FieldRule {
        AGENT_PROFILE_SCHEMA.rule(field).unwrap()
    }

    #[test]
    fn test_blank_required_reports_only_required() {
        let violations = check_text(rule("agentName"), "   ");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::Required);
        assert_eq!(violations[0].message, "Agent name is required.");
    }

    #[test]
    fn test_length_bounds() {
        let short = check_text(rule("introductoryMessage"), "Hello");
        assert_eq!(short[0].code, ViolationCode::TooShort);
        assert_eq!(
            short[0].message,
            "Introductory message must be at least 10 characters."
        );

        let long = check_text(rule("agentName"), &"x".repeat(51));
        assert_eq!(long[0].code, ViolationCode::TooLong);
        assert_eq!(long[0].message, "Agent name is too long.");

        assert!(check_text(rule("agentName"), &"x".repeat(50)).is_empty());
    }

    #[test]
    fn test_lengths_count_scalar_values() {
        // 2 scalars, 8 bytes
        assert!(check_text(rule("agentName"), "🤖🤖").is_empty());
        assert_eq!(char_len("héllo"), 5);
    }

    #[test]
    fn test_one_of_is_case_insensitive() {
        assert!(check_text(rule("responseLength"), "Long").is_empty());
        let violations = check_text(rule("responseLength"), "huge");
        assert_eq!(violations[0].code, ViolationCode::NotAllowed);
    }

    #[test]
    fn test_starts_with() {
        static PREFIXED: FieldRule = FieldRule {
            field: "url",
            label: "URL",
            constraints: &[FieldConstraint::StartsWith("https://")],
        };
        assert!(check_text(&PREFIXED, "https://example.com").is_empty());
        assert_eq!(
            check_text(&PREFIXED, "ftp://example.com")[0].code,
            ViolationCode::InvalidPrefix
        );
        // optional and blank
        assert!(check_text(&PREFIXED, "").is_empty());
    }

    #[test]
    fn test_check_file() {
        assert!(check_file(&AVATAR_POLICY, "image/png", 1024).is_empty());

        let violations = check_file(&AVATAR_POLICY, "image/gif", MAX_FILE_SIZE + 1);
        let codes: Vec<_> = violations.iter().map(|v| v.code).collect();
        assert_eq!(
            codes,
            vec![ViolationCode::InvalidMimeType, ViolationCode::FileTooLarge]
        );
        assert_eq!(violations[1].message, "Max file size is 5MB.");
    }

    #[test]
    fn test_data_uri_accepted() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode([0u8; 16]));
        let avatar = check_data_uri(&AVATAR_POLICY, &uri).unwrap();
        assert_eq!(avatar.mime_type, "image/png");
        assert_eq!(avatar.byte_len, 16);
        assert_eq!(avatar.data_uri, uri);
    }

    #[test]
    fn test_data_uri_rejections() {
        let not_uri = check_data_uri(&AVATAR_POLICY, "https://example.com/a.png").unwrap_err();
        assert_eq!(not_uri[0].code, ViolationCode::InvalidDataUri);

        let no_marker = check_data_uri(&AVATAR_POLICY, "data:image/png,abcd").unwrap_err();
        assert_eq!(no_marker[0].code, ViolationCode::InvalidDataUri);

        let bad_b64 = check_data_uri(&AVATAR_POLICY, "data:image/png;base64,@@@").unwrap_err();
        assert_eq!(bad_b64[0].code, ViolationCode::InvalidDataUri);

        let wrong_type = format!("data:image/gif;base64,{}", STANDARD.encode(b"GIF89a"));
        let wrong_type = check_data_uri(&AVATAR_POLICY, &wrong_type).unwrap_err();
        assert_eq!(wrong_type[0].code, ViolationCode::InvalidMimeType);
    }

    #[test]
    fn test_data_uri_too_large() {
        let payload = STANDARD.encode(vec![0u8; MAX_FILE_SIZE + 1]);
        let uri = format!("data:image/jpeg;base64,{}", payload);
        let violations = check_data_uri(&AVATAR_POLICY, &uri).unwrap_err();
        assert_eq!(violations[0].code, ViolationCode::FileTooLarge);
    }
}
