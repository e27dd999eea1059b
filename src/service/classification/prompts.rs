//! Prompts for ticket classification

use std::sync::LazyLock;

use crate::model::{
    CategorySet, ClassificationPayload, MAX_MESSAGE_CHARS, MIN_MESSAGE_CHARS, PromptTemplate,
    Sentiment, Urgency,
};
use crate::service::classification::error::{AttemptError, InputError};
use crate::service::llm::LlmRequest;

/// Version of the built-in template seeded on first start
pub const DEFAULT_TEMPLATE_VERSION: &str = "v1";

/// System prompt for ticket classification
pub const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"You are a support-ticket triage assistant. You read a single customer message and classify it.

## Rules

1. Use only the allowed values you are given, spelled exactly as listed.
2. Urgency reflects business impact: Critical for outages, data loss or security incidents; High when the customer is blocked; Medium for ordinary requests; Low for questions and minor issues.
3. Sentiment reflects the customer's tone, not the severity of the problem.
4. Confidence is your own certainty in the whole classification, between 0.0 and 1.0.
5. Reply with exactly one JSON object. No markdown, no explanations.
"#;

/// Built-in classification template
///
/// Placeholders: `{{categories}}`, `{{urgencies}}`, `{{sentiments}}`, `{{schema}}`,
/// `{{message}}`.
pub const DEFAULT_TEMPLATE_TEXT: &str = r#"Classify the following support ticket.

## Allowed values
- category: one of [{{categories}}]
- urgency: one of [{{urgencies}}]
- sentiment: one of [{{sentiments}}]
- confidence: a number between 0.0 and 1.0

## Response schema
{{schema}}

## Ticket
{{message}}

Return a single JSON object with the keys category, urgency, sentiment and confidence."#;

static RESPONSE_SCHEMA: LazyLock<String> = LazyLock::new(|| {
    serde_json::to_string_pretty(&schemars::schema_for!(ClassificationPayload))
        .unwrap_or_default()
});

/// What went wrong in the previous attempt, fed into the next prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryHint {
    /// Reply decoded but these fields were missing or invalid
    InvalidFields(Vec<String>),
    /// Reply contained no usable JSON object
    Unparseable,
    /// No reply arrived (timeout or provider failure)
    NoReply,
}

impl From<&AttemptError> for RetryHint {
    fn from(error: &AttemptError) -> Self {
        match error {
            AttemptError::Schema(e) => {
                RetryHint::InvalidFields(e.fields().into_iter().map(str::to_string).collect())
            }
            AttemptError::Parse(_) => RetryHint::Unparseable,
            AttemptError::ProviderTimeout(_) | AttemptError::Provider(_) => RetryHint::NoReply,
        }
    }
}

/// Trim and length-check a ticket message
pub fn validate_message(message: &str) -> Result<&str, InputError> {
    let trimmed = message.trim();
    let length = trimmed.chars().count();

    if length == 0 {
        return Err(InputError::Empty);
    }
    if length < MIN_MESSAGE_CHARS {
        return Err(InputError::TooShort(length));
    }
    if length > MAX_MESSAGE_CHARS {
        return Err(InputError::TooLong(length));
    }

    Ok(trimmed)
}

/// Build the outbound request for one attempt
pub fn format_request(
    message: &str,
    template: &PromptTemplate,
    categories: &CategorySet,
    hint: Option<&RetryHint>,
) -> Result<LlmRequest, InputError> {
    let message = validate_message(message)?;

    let urgencies: Vec<&str> = Urgency::ALL.iter().map(Urgency::as_str).collect();
    let sentiments: Vec<&str> = Sentiment::ALL.iter().map(Sentiment::as_str).collect();

    let mut prompt = template
        .template_text
        .replace("{{categories}}", &categories.names().join(", "))
        .replace("{{urgencies}}", &urgencies.join(", "))
        .replace("{{sentiments}}", &sentiments.join(", "))
        .replace("{{schema}}", &RESPONSE_SCHEMA)
        .replace("{{message}}", message);

    if let Some(hint) = hint {
        prompt.push_str("\n\n");
        prompt.push_str(&build_clarification(hint));
    }

    Ok(LlmRequest {
        preamble: CLASSIFICATION_SYSTEM_PROMPT.to_string(),
        prompt,
        message: message.to_string(),
        template_version: template.version.clone(),
    })
}

fn build_clarification(hint: &RetryHint) -> String {
    let detail = match hint {
        RetryHint::InvalidFields(fields) => format!(
            "Your previous reply was rejected. These fields were missing or invalid: {}. \
             Use only the allowed values listed above.",
            fields.join(", ")
        ),
        RetryHint::Unparseable => {
            "Your previous reply did not contain a single valid JSON object.".to_string()
        }
        RetryHint::NoReply => "Your previous attempt did not return a reply in time.".to_string(),
    };

    format!(
        "## Clarification\n{}\nRespond with exactly one JSON object and no other text.",
        detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn template() -> PromptTemplate {
        PromptTemplate {
            version: DEFAULT_TEMPLATE_VERSION.to_string(),
            template_text: DEFAULT_TEMPLATE_TEXT.to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rejects_empty_and_short_messages() {
        let categories = CategorySet::default();
        assert_eq!(
            format_request("   ", &template(), &categories, None).unwrap_err(),
            InputError::Empty
        );
        assert_eq!(
            format_request("  help me  ", &template(), &categories, None).unwrap_err(),
            InputError::TooShort(7)
        );
    }

    #[test]
    fn test_rejects_overlong_messages() {
        let message = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(
            validate_message(&message).unwrap_err(),
            InputError::TooLong(MAX_MESSAGE_CHARS + 1)
        );
    }

    #[test]
    fn test_minimum_length_counts_characters() {
        assert!(validate_message("ünïcödé!!!").is_ok());
        assert!(validate_message("exactly10!").is_ok());
    }

    #[test]
    fn test_renders_placeholders() {
        let request = format_request(
            "  My invoice shows the wrong amount  ",
            &template(),
            &CategorySet::default(),
            None,
        )
        .unwrap();

        assert_eq!(request.message, "My invoice shows the wrong amount");
        assert_eq!(request.template_version, DEFAULT_TEMPLATE_VERSION);
        assert!(request.prompt.contains("My invoice shows the wrong amount"));
        assert!(request.prompt.contains("Technical Issue, Billing"));
        assert!(request.prompt.contains("Low, Medium, High, Critical"));
        assert!(request.prompt.contains("Positive, Neutral, Negative"));
        assert!(!request.prompt.contains("{{"));
        assert!(!request.prompt.contains("Clarification"));
    }

    #[test]
    fn test_is_deterministic() {
        let categories = CategorySet::default();
        let first = format_request("The app is slow today", &template(), &categories, None);
        let second = format_request("The app is slow today", &template(), &categories, None);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_hint_names_violated_fields() {
        let hint = RetryHint::InvalidFields(vec!["category".to_string(), "confidence".to_string()]);
        let request = format_request(
            "The app is slow today",
            &template(),
            &CategorySet::default(),
            Some(&hint),
        )
        .unwrap();

        assert!(request.prompt.contains("## Clarification"));
        assert!(request.prompt.contains("category, confidence"));
    }

    #[test]
    fn test_hint_from_schema_error() {
        use crate::service::classification::error::{FieldViolation, SchemaError};

        let error = AttemptError::Schema(SchemaError {
            violations: vec![
                FieldViolation {
                    field: "urgency",
                    message: "missing".to_string(),
                },
                FieldViolation {
                    field: "sentiment",
                    message: "not allowed".to_string(),
                },
            ],
        });

        assert_eq!(
            RetryHint::from(&error),
            RetryHint::InvalidFields(vec!["urgency".to_string(), "sentiment".to_string()])
        );
        assert_eq!(
            RetryHint::from(&AttemptError::ProviderTimeout(10)),
            RetryHint::NoReply
        );
    }
}
