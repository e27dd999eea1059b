//! Offline keyword classifier
//!
//! Answers like a model would (a JSON object), so it can stand in for a real provider
//! in local runs without API keys.

use async_trait::async_trait;

use crate::model::{FALLBACK_CATEGORY, Sentiment, Urgency};
use crate::service::llm::{CompletionProvider, LlmRequest, ProviderError};

const DESCRIPTOR: &str = "mock/keyword-classifier-v1";

/// Category keyword table, first-listed category wins ties
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Technical Issue",
        &["crash", "error", "bug", "not working", "broken", "failed", "freeze", "slow"],
    ),
    (
        "Billing",
        &["payment", "invoice", "charge", "refund", "subscription", "price", "cost", "billing"],
    ),
    (
        "Feature Request",
        &["feature", "add", "improve", "enhancement", "suggestion", "would like", "could you"],
    ),
    (
        "Account",
        &["login", "password", "access", "account", "register", "sign in", "authentication"],
    ),
    (
        "Bug Report",
        &["unexpected", "wrong", "incorrect", "issue", "problem", "glitch"],
    ),
];

/// Checked in order, first match wins
const URGENCY_KEYWORDS: &[(Urgency, &[&str])] = &[
    (
        Urgency::Critical,
        &["urgent", "critical", "immediately", "emergency", "asap", "production down", "can't work"],
    ),
    (
        Urgency::High,
        &["important", "soon", "quickly", "priority", "blocking", "cannot"],
    ),
    (Urgency::Medium, &["would like", "should", "need", "help"]),
    (Urgency::Low, &["whenever", "eventually", "minor", "small", "question"]),
];

const SENTIMENT_KEYWORDS: &[(Sentiment, &[&str])] = &[
    (
        Sentiment::Negative,
        &["frustrated", "angry", "terrible", "awful", "hate", "worst", "broken", "useless"],
    ),
    (
        Sentiment::Positive,
        &["thank", "great", "love", "excellent", "wonderful", "appreciate", "good"],
    ),
];

/// Deterministic classifier scoring keyword hits
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn classify_category(message: &str) -> &'static str {
        let mut best: Option<(&'static str, usize)> = None;
        for (category, keywords) in CATEGORY_KEYWORDS {
            let score = keywords.iter().filter(|k| message.contains(*k)).count();
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((*category, score));
            }
        }
        best.map(|(category, _)| category).unwrap_or(FALLBACK_CATEGORY)
    }

    fn classify_urgency(message: &str) -> Urgency {
        URGENCY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| message.contains(k)))
            .map(|(urgency, _)| *urgency)
            .unwrap_or(Urgency::Medium)
    }

    fn detect_sentiment(message: &str) -> Sentiment {
        SENTIMENT_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| message.contains(k)))
            .map(|(sentiment, _)| *sentiment)
            .unwrap_or(Sentiment::Neutral)
    }

    /// Longer messages and more keyword hits raise confidence, capped at 0.95
    fn confidence(message: &str, category: &str) -> f64 {
        let mut confidence = 0.5;
        confidence += (message.chars().count() as f64 / 500.0).min(0.2);

        let matches = CATEGORY_KEYWORDS
            .iter()
            .flat_map(|(_, keywords)| keywords.iter())
            .filter(|k| message.contains(*k))
            .count();
        confidence += (matches as f64 * 0.05).min(0.2);

        if category != FALLBACK_CATEGORY {
            confidence += 0.1;
        }

        (confidence.min(0.95) * 1000.0).round() / 1000.0
    }
}

#[async_trait]
impl CompletionProvider for KeywordClassifier {
    fn descriptor(&self) -> &str {
        DESCRIPTOR
    }

    async fn complete(&self, request: &LlmRequest) -> Result<String, ProviderError> {
        let message = request.message.to_lowercase();
        let category = Self::classify_category(&message);
        let urgency = Self::classify_urgency(&message);
        let sentiment = Self::detect_sentiment(&message);
        let confidence = Self::confidence(&message, category);

        tracing::debug!(
            category = category,
            urgency = %urgency,
            sentiment = %sentiment,
            confidence = confidence,
            "Keyword classifier produced verdict"
        );

        Ok(serde_json::json!({
            "category": category,
            "urgency": urgency.as_str(),
            "sentiment": sentiment.as_str(),
            "confidence": confidence,
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str) -> LlmRequest {
        LlmRequest {
            preamble: String::new(),
            prompt: String::new(),
            message: message.to_string(),
            template_version: "v1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reply_is_json_object() {
        let reply = KeywordClassifier::new()
            .complete(&request("I was charged twice on my invoice, please refund"))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["category"], "Billing");
        assert!(value["confidence"].as_f64().unwrap() <= 0.95);
    }

    #[test]
    fn test_defaults_without_keywords() {
        assert_eq!(KeywordClassifier::classify_category("hello there"), FALLBACK_CATEGORY);
        assert_eq!(KeywordClassifier::classify_urgency("hello there"), Urgency::Medium);
        assert_eq!(KeywordClassifier::detect_sentiment("hello there"), Sentiment::Neutral);
    }

    #[test]
    fn test_urgency_first_match_wins() {
        assert_eq!(
            KeywordClassifier::classify_urgency("urgent, this is blocking us"),
            Urgency::Critical
        );
        assert_eq!(
            KeywordClassifier::classify_urgency("minor question whenever"),
            Urgency::Low
        );
    }

    #[test]
    fn test_confidence_is_capped() {
        let long = "crash error bug broken failed freeze slow ".repeat(40);
        let confidence = KeywordClassifier::confidence(&long, "Technical Issue");
        assert_eq!(confidence, 0.95);
    }
}
