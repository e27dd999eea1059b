//! Ticket classification service
//!
//! Runs the retry loop against the configured provider, then the guardrail layer.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::model::{CategorySet, Classification, ClassifierConfig, GuardrailConfig, PromptTemplate};
use crate::service::llm::CompletionProvider;

pub mod error;
pub mod guardrails;
pub mod parser;
pub mod prompts;
pub mod retry;
pub mod validation;

pub use error::{ClassificationError, InputError};
pub use guardrails::{AppliedOverride, GuardrailLayer};
pub use retry::{RetryController, RetryPolicy, RetryState};

/// Final result of classifying one message
#[derive(Debug, Clone)]
pub struct ClassifiedMessage {
    /// Trimmed message that was classified
    pub message: String,
    pub classification: Classification,
    pub state: RetryState,
    pub raw_response: Option<String>,
    pub attempts: u32,
    pub overrides: Vec<AppliedOverride>,
}

/// Service classifying support messages
pub struct ClassificationService {
    provider: Arc<dyn CompletionProvider>,
    policy: RetryPolicy,
    categories: CategorySet,
    guardrails: GuardrailLayer,
    template: RwLock<Arc<PromptTemplate>>,
}

impl ClassificationService {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        config: &ClassifierConfig,
        guardrails: &GuardrailConfig,
        categories: CategorySet,
        template: PromptTemplate,
    ) -> Self {
        tracing::info!(
            provider = %provider.descriptor(),
            template_version = %template.version,
            max_attempts = config.max_attempts,
            confidence_threshold = config.confidence_threshold,
            "Classification service initialized"
        );

        let guardrails = GuardrailLayer::new(guardrails, config.confidence_threshold);
        tracing::debug!(rules = ?guardrails.rule_ids(), "Guardrail rules loaded");

        Self {
            provider,
            policy: RetryPolicy::from_config(config),
            categories,
            guardrails,
            template: RwLock::new(Arc::new(template)),
        }
    }

    /// Classify a message and apply guardrails
    pub async fn classify(&self, message: &str) -> Result<ClassifiedMessage, ClassificationError> {
        let start_time = Instant::now();
        let template = self.active_template().await;

        let outcome = RetryController::new(self.provider.as_ref(), self.policy)
            .run(message, &template, &self.categories)
            .await?;

        let message = message.trim();
        let raw_response = outcome.raw_response().map(str::to_string);
        let (classification, overrides) = self.guardrails.apply(message, outcome.classification);

        for applied in &overrides {
            tracing::info!(rule = applied.id, reason = %applied.reason, "Override applied");
        }

        tracing::info!(
            category = %classification.category,
            urgency = %classification.urgency,
            sentiment = %classification.sentiment,
            confidence = classification.confidence,
            model_version = %classification.model_version,
            state = ?outcome.state,
            attempts = outcome.attempts.len(),
            elapsed_ms = start_time.elapsed().as_millis(),
            "Message classified"
        );

        Ok(ClassifiedMessage {
            message: message.to_string(),
            classification,
            state: outcome.state,
            raw_response,
            attempts: outcome.attempts.len() as u32,
            overrides,
        })
    }

    pub async fn active_template(&self) -> Arc<PromptTemplate> {
        self.template.read().await.clone()
    }

    /// Swap the template used by subsequent classifications
    pub async fn set_active_template(&self, template: PromptTemplate) {
        let version = template.version.clone();
        *self.template.write().await = Arc::new(template);
        tracing::info!(template_version = %version, "Active prompt template switched");
    }

    pub fn provider_descriptor(&self) -> &str {
        self.provider.descriptor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FALLBACK_CATEGORY, Sentiment, Urgency};
    use crate::service::classification::guardrails::{KeywordUrgencyElevation, PendingManualReview};
    use crate::service::classification::retry::tests::{ScriptedProvider, template};
    use crate::service::keyword::KeywordClassifier;

    fn service(provider: Arc<dyn CompletionProvider>) -> ClassificationService {
        ClassificationService::new(
            provider,
            &ClassifierConfig::default(),
            &GuardrailConfig::default(),
            CategorySet::default(),
            template(),
        )
    }

    #[tokio::test]
    async fn test_urgent_message_is_elevated_to_critical() {
        let provider = Arc::new(ScriptedProvider::replies(&[
            r#"{"category": "Technical Issue", "urgency": "High", "sentiment": "Negative", "confidence": 0.85}"#,
        ]));
        let result = service(provider)
            .classify("URGENT: production database is down, nobody can log in")
            .await
            .unwrap();

        assert_eq!(result.state, RetryState::Succeeded);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.classification.category.as_str(), "Technical Issue");
        assert_eq!(result.classification.urgency, Urgency::Critical);
        assert_eq!(
            result.classification.overrides_applied,
            vec![KeywordUrgencyElevation::ID]
        );
        assert_eq!(result.classification.model_version, "scripted/test-model/v1");
    }

    #[tokio::test]
    async fn test_outage_report_is_critical_without_review() {
        let provider = Arc::new(ScriptedProvider::replies(&[
            r#"{"category": "Technical Issue", "urgency": "High", "sentiment": "Negative", "confidence": 0.92}"#,
        ]));
        let result = service(provider)
            .classify("URGENT! Our production server crashed and 1000 customers can't access the website!")
            .await
            .unwrap();

        let classification = &result.classification;
        assert_eq!(result.state, RetryState::Succeeded);
        assert_eq!(result.attempts, 1);
        assert_eq!(classification.category.as_str(), "Technical Issue");
        assert_eq!(classification.urgency, Urgency::Critical);
        assert_eq!(classification.sentiment, Sentiment::Negative);
        assert_eq!(classification.confidence, 0.92);
        assert_eq!(classification.overrides_applied, vec!["keyword_urgency_elevation"]);
        assert!(
            !classification
                .overrides_applied
                .iter()
                .any(|id| id == PendingManualReview::ID)
        );
        assert_eq!(result.overrides.len(), 1);
        assert!(result.overrides[0].reason.contains("from High to Critical"));
    }

    #[tokio::test]
    async fn test_prose_replies_fall_back() {
        let provider = Arc::new(ScriptedProvider::replies(&[
            "This looks like a billing problem to me.",
            "Sorry, I can only answer in prose.",
        ]));
        let result = service(provider)
            .classify("Why was I charged twice this month?")
            .await
            .unwrap();

        let classification = &result.classification;
        assert_eq!(result.state, RetryState::Exhausted);
        assert_eq!(result.attempts, 2);
        assert_eq!(classification.category.as_str(), FALLBACK_CATEGORY);
        assert_eq!(classification.urgency, Urgency::Medium);
        assert_eq!(classification.sentiment, Sentiment::Neutral);
        assert_eq!(classification.confidence, 0.0);
        assert!(classification.model_version.starts_with("fallback/"));
        // Zero confidence always needs a human
        assert_eq!(classification.overrides_applied, vec![PendingManualReview::ID]);
        assert_eq!(
            result.raw_response.as_deref(),
            Some("Sorry, I can only answer in prose.")
        );
    }

    #[tokio::test]
    async fn test_input_error_surfaces() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let err = service(provider).classify("   ").await.unwrap_err();
        assert!(matches!(err, ClassificationError::Input(InputError::Empty)));
    }

    #[tokio::test]
    async fn test_template_switch_changes_model_version() {
        let service = service(Arc::new(KeywordClassifier::new()));
        let mut next = template();
        next.version = "v2".to_string();
        service.set_active_template(next).await;

        let result = service
            .classify("I was charged twice on my invoice, please refund")
            .await
            .unwrap();
        assert_eq!(result.state, RetryState::Succeeded);
        assert_eq!(
            result.classification.model_version,
            "mock/keyword-classifier-v1/v2"
        );
        assert_eq!(result.classification.category.as_str(), "Billing");
        assert_eq!(service.active_template().await.version, "v2");
    }
}
