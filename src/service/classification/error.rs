//! Error types for ticket classification

use thiserror::Error;

use crate::model::{MAX_MESSAGE_CHARS, MIN_MESSAGE_CHARS};

/// Caller-supplied message is unusable; reported to the client, never retried
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Message must not be empty")]
    Empty,

    #[error("Message must be at least {min} characters long (got {0})", min = MIN_MESSAGE_CHARS)]
    TooShort(usize),

    #[error("Message must be at most {max} characters long (got {0})", max = MAX_MESSAGE_CHARS)]
    TooLong(usize),
}

/// No single JSON object could be decoded from a model reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} (raw: {raw_excerpt:?})")]
pub struct ParseError {
    pub reason: String,
    /// Offending reply, truncated for logging
    pub raw_excerpt: String,
}

/// One field of a decoded payload that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

/// A decoded payload violated the classification schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Schema validation failed: {}", join_violations(.violations))]
pub struct SchemaError {
    /// Every violated field, in field order
    pub violations: Vec<FieldViolation>,
}

impl SchemaError {
    /// Names of the violated fields, without duplicates
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = Vec::new();
        for violation in &self.violations {
            if !fields.contains(&violation.field) {
                fields.push(violation.field);
            }
        }
        fields
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a single attempt failed; always attempt-local
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("Provider timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Provider call failed: {0}")]
    Provider(String),
}

/// Errors surfaced by the classification service
///
/// Attempt failures never appear here; they end in the fallback verdict instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClassificationError {
    #[error(transparent)]
    Input(#[from] InputError),
}
