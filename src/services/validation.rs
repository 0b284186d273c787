//! Field rules for an incoming submission.
//!
//! Every rule runs on every call, so a request that breaks several rules gets
//! one message per rule, always in the order name, email, message.

use regex::Regex;
use std::sync::LazyLock;

pub const NAME_REQUIRED: &str = "Name is required";
pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "Email must be valid";
pub const MESSAGE_TOO_SHORT: &str = "Message must be at least 20 characters";

/// Minimum trimmed message length, counted in characters.
pub const MIN_MESSAGE_LEN: usize = 20;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// The raw text fields as they arrived in the form.
#[derive(Debug, Default, Clone)]
pub struct SubmissionFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

/// Check the three text fields and return every failed rule's message.
///
/// The email pattern is matched against the untrimmed value, and only when
/// the trimmed value is non-empty.
pub fn validate(fields: &SubmissionFields) -> Vec<String> {
    let mut errors = Vec::new();

    if is_blank(fields.name.as_deref()) {
        errors.push(NAME_REQUIRED.to_string());
    }

    match fields.email.as_deref() {
        Some(email) if !email.trim().is_empty() => {
            if !is_valid_email(email) {
                errors.push(EMAIL_INVALID.to_string());
            }
        }
        _ => errors.push(EMAIL_REQUIRED.to_string()),
    }

    let message_len = fields
        .message
        .as_deref()
        .map(|m| m.trim().chars().count())
        .unwrap_or(0);
    if message_len < MIN_MESSAGE_LEN {
        errors.push(MESSAGE_TOO_SHORT.to_string());
    }

    errors
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}
