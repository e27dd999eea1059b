//! Bounded call-parse-validate loop
//!
//! Attempts run strictly one after another. Every failure mode of a single attempt
//! (unparseable reply, schema violation, timeout, provider error) is retried until
//! `max_attempts` is reached, after which the fallback verdict is produced.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::model::{
    AttemptOutcome, CategorySet, Classification, ClassificationAttempt, ClassifierConfig,
    PromptTemplate,
};
use crate::service::classification::error::{AttemptError, InputError};
use crate::service::classification::parser::{RAW_EXCERPT_LIMIT, parse_response, truncate_for_log};
use crate::service::classification::prompts::{RetryHint, format_request, validate_message};
use crate::service::classification::validation::validate_payload;
use crate::service::llm::CompletionProvider;

/// Position of the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Running the given 1-based attempt
    Attempting(u32),
    Succeeded,
    Exhausted,
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting(1)
    }

    /// Move to the next state after an attempt finished
    ///
    /// Terminal states are absorbing.
    pub fn next(self, attempt_succeeded: bool, max_attempts: u32) -> Self {
        match self {
            RetryState::Attempting(_) if attempt_succeeded => RetryState::Succeeded,
            RetryState::Attempting(n) if n < max_attempts => RetryState::Attempting(n + 1),
            RetryState::Attempting(_) => RetryState::Exhausted,
            terminal => terminal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            call_timeout: Duration::from_secs(config.call_timeout_seconds),
        }
    }
}

/// Result of a full retry loop
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    /// Always `Succeeded` or `Exhausted`
    pub state: RetryState,
    pub classification: Classification,
    pub attempts: Vec<ClassificationAttempt>,
}

impl ClassificationOutcome {
    /// Raw reply of the deciding attempt, or of the last attempt that produced text
    pub fn raw_response(&self) -> Option<&str> {
        self.attempts
            .iter()
            .rev()
            .map(|a| a.raw_response.as_str())
            .find(|raw| !raw.is_empty())
    }
}

/// Drives attempts against a completion provider
pub struct RetryController<'a> {
    provider: &'a dyn CompletionProvider,
    policy: RetryPolicy,
}

impl<'a> RetryController<'a> {
    pub fn new(provider: &'a dyn CompletionProvider, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Classify a message, retrying until success or exhaustion
    ///
    /// Only an unusable message is an error; it is reported before any provider call.
    pub async fn run(
        &self,
        message: &str,
        template: &PromptTemplate,
        categories: &CategorySet,
    ) -> Result<ClassificationOutcome, InputError> {
        validate_message(message)?;

        let model_version = format!("{}/{}", self.provider.descriptor(), template.version);
        let mut state = RetryState::start();
        let mut attempts = Vec::new();
        let mut hint: Option<RetryHint> = None;

        while let RetryState::Attempting(attempt_number) = state {
            let request = format_request(message, template, categories, hint.as_ref())?;
            let start_time = Instant::now();

            let (raw_response, parsed_payload, verdict) =
                match tokio::time::timeout(self.policy.call_timeout, self.provider.complete(&request))
                    .await
                {
                    Err(_) => (
                        String::new(),
                        None,
                        Err(AttemptError::ProviderTimeout(self.policy.call_timeout.as_secs())),
                    ),
                    Ok(Err(e)) => (String::new(), None, Err(AttemptError::Provider(e.to_string()))),
                    Ok(Ok(raw)) => {
                        let (parsed, verdict) = evaluate_reply(&raw, categories, &model_version);
                        (raw, parsed, verdict)
                    }
                };

            let raw_excerpt = truncate_for_log(&raw_response, RAW_EXCERPT_LIMIT);

            let mut attempt = ClassificationAttempt {
                attempt_number,
                raw_response,
                parsed_payload,
                validation_errors: Vec::new(),
                outcome: AttemptOutcome::Succeeded,
                elapsed_ms: start_time.elapsed().as_millis(),
            };

            match verdict {
                Ok(classification) => {
                    tracing::info!(
                        attempt = attempt.attempt_number,
                        outcome = ?attempt.outcome,
                        elapsed_ms = attempt.elapsed_ms,
                        raw = %raw_excerpt,
                        "Classification attempt succeeded"
                    );
                    attempts.push(attempt);
                    return Ok(ClassificationOutcome {
                        state: state.next(true, self.policy.max_attempts),
                        classification,
                        attempts,
                    });
                }
                Err(error) => {
                    attempt.outcome = outcome_of(&error);
                    if let AttemptError::Schema(schema) = &error {
                        attempt.validation_errors = schema
                            .violations
                            .iter()
                            .map(|v| format!("{}: {}", v.field, v.message))
                            .collect();
                    }

                    tracing::warn!(
                        attempt = attempt.attempt_number,
                        max_attempts = self.policy.max_attempts,
                        outcome = ?attempt.outcome,
                        elapsed_ms = attempt.elapsed_ms,
                        raw = %raw_excerpt,
                        error = %error,
                        "Classification attempt failed"
                    );

                    hint = Some(RetryHint::from(&error));
                    attempts.push(attempt);
                    state = state.next(false, self.policy.max_attempts);
                }
            }
        }

        tracing::warn!(
            attempts = attempts.len(),
            model_version = %model_version,
            "Classification retries exhausted, using fallback verdict"
        );

        Ok(ClassificationOutcome {
            state,
            classification: Classification::fallback(&model_version),
            attempts,
        })
    }
}

fn evaluate_reply(
    raw: &str,
    categories: &CategorySet,
    model_version: &str,
) -> (Option<Map<String, Value>>, Result<Classification, AttemptError>) {
    let payload = match parse_response(raw) {
        Ok(payload) => payload,
        Err(e) => return (None, Err(e.into())),
    };
    let verdict = validate_payload(&payload, categories, model_version).map_err(AttemptError::from);
    (Some(payload), verdict)
}

fn outcome_of(error: &AttemptError) -> AttemptOutcome {
    match error {
        AttemptError::Parse(_) => AttemptOutcome::ParseError,
        AttemptError::Schema(_) => AttemptOutcome::SchemaError,
        AttemptError::ProviderTimeout(_) => AttemptOutcome::Timeout,
        AttemptError::Provider(_) => AttemptOutcome::ProviderError,
    }
}
