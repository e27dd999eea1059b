//! Deterministic business rules applied after classification
//!
//! Rules run in a fixed order. A rule that fires appends its identifier to
//! `overrides_applied` and may only raise urgency, never lower it.

use crate::model::{Classification, GuardrailConfig, Sentiment, Urgency};

/// Words that cancel a keyword when they come right before it
const NEGATIONS: &[&str] = &["not", "no", "never", "isn't", "wasn't", "aren't"];

/// Audit record for a rule that fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOverride {
    pub id: &'static str,
    pub reason: String,
}

/// A single guardrail rule
pub trait GuardrailRule: Send + Sync {
    fn id(&self) -> &'static str;

    /// Apply the rule, returning the reason when it fired
    ///
    /// `message` is already lower-cased.
    fn apply(&self, message: &str, classification: &mut Classification) -> Option<String>;
}

/// Raises urgency to a floor when the message contains configured keywords
pub struct KeywordUrgencyElevation {
    critical_keywords: Vec<String>,
    high_keywords: Vec<String>,
}

impl KeywordUrgencyElevation {
    pub const ID: &'static str = "keyword_urgency_elevation";

    pub fn new(config: &GuardrailConfig) -> Self {
        let normalize = |keywords: &[String]| -> Vec<String> {
            keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        };
        Self {
            critical_keywords: normalize(&config.critical_keywords),
            high_keywords: normalize(&config.high_keywords),
        }
    }

    fn floor_for<'k>(&'k self, message: &str) -> Option<(Urgency, &'k str)> {
        let tiers = [
            (Urgency::Critical, &self.critical_keywords),
            (Urgency::High, &self.high_keywords),
        ];
        tiers.into_iter().find_map(|(floor, keywords)| {
            keywords
                .iter()
                .find(|k| mentions(message, k))
                .map(|k| (floor, k.as_str()))
        })
    }
}

impl GuardrailRule for KeywordUrgencyElevation {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn apply(&self, message: &str, classification: &mut Classification) -> Option<String> {
        let (floor, keyword) = self.floor_for(message)?;
        if floor <= classification.urgency {
            return None;
        }

        let reason = format!(
            "keyword '{}' raised urgency from {} to {}",
            keyword, classification.urgency, floor
        );
        classification.urgency = floor;
        Some(reason)
    }
}

/// True when `keyword` occurs as whole words and the preceding word is not a negation
fn mentions(message: &str, keyword: &str) -> bool {
    message.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before = message[..start].chars().next_back();
        let after = message[end..].chars().next();
        let whole_word =
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric);
        whole_word && !is_negated(&message[..start])
    })
}

fn is_negated(prefix: &str) -> bool {
    prefix
        .split_whitespace()
        .next_back()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .is_some_and(|word| NEGATIONS.contains(&word))
}

/// Unhappy customers are never left at Low urgency
pub struct NegativeSentimentFloor;

impl NegativeSentimentFloor {
    pub const ID: &'static str = "negative_sentiment_floor";
}

impl GuardrailRule for NegativeSentimentFloor {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn apply(&self, _message: &str, classification: &mut Classification) -> Option<String> {
        if classification.sentiment != Sentiment::Negative || classification.urgency != Urgency::Low
        {
            return None;
        }
        classification.urgency = Urgency::Medium;
        Some("negative sentiment raised urgency from Low to Medium".to_string())
    }
}

/// Marks low-confidence verdicts for a human; changes no field
pub struct PendingManualReview {
    threshold: f64,
}

impl PendingManualReview {
    pub const ID: &'static str = "pending_manual_review";

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl GuardrailRule for PendingManualReview {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn apply(&self, _message: &str, classification: &mut Classification) -> Option<String> {
        (classification.confidence < self.threshold).then(|| {
            format!(
                "confidence {} is below threshold {}",
                classification.confidence, self.threshold
            )
        })
    }
}

/// Ordered rule set
pub struct GuardrailLayer {
    rules: Vec<Box<dyn GuardrailRule>>,
}

impl GuardrailLayer {
    /// Build the standard rule set; the manual-review marker always runs last
    pub fn new(config: &GuardrailConfig, confidence_threshold: f64) -> Self {
        Self {
            rules: vec![
                Box::new(KeywordUrgencyElevation::new(config)),
                Box::new(NegativeSentimentFloor),
                Box::new(PendingManualReview::new(confidence_threshold)),
            ],
        }
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Run every rule in order
    pub fn apply(
        &self,
        message: &str,
        mut classification: Classification,
    ) -> (Classification, Vec<AppliedOverride>) {
        let message = message.to_lowercase();
        let mut applied = Vec::new();

        for rule in &self.rules {
            let before = classification.urgency;
            let Some(reason) = rule.apply(&message, &mut classification) else {
                continue;
            };

            if classification.urgency < before {
                tracing::warn!(rule = rule.id(), "Guardrail tried to lower urgency, ignoring");
                classification.urgency = before;
            }

            tracing::debug!(rule = rule.id(), reason = %reason, "Guardrail applied");
            classification.overrides_applied.push(rule.id().to_string());
            applied.push(AppliedOverride {
                id: rule.id(),
                reason,
            });
        }

        (classification, applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn classification(urgency: Urgency, sentiment: Sentiment, confidence: f64) -> Classification {
        Classification {
            category: Category::fallback(),
            urgency,
            sentiment,
            confidence,
            model_version: "test/model/v1".to_string(),
            overrides_applied: Vec::new(),
        }
    }

    fn layer() -> GuardrailLayer {
        GuardrailLayer::new(&GuardrailConfig::default(), 0.6)
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(
            layer().rule_ids(),
            vec![
                KeywordUrgencyElevation::ID,
                NegativeSentimentFloor::ID,
                PendingManualReview::ID
            ]
        );
    }

    #[test]
    fn test_urgency_never_decreases() {
        let messages = [
            "URGENT: production down for everyone",
            "this is blocking our release",
            "a small question about exports",
        ];
        for message in messages {
            for urgency in Urgency::ALL {
                for sentiment in [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative] {
                    for confidence in [0.0, 0.59, 0.6, 1.0] {
                        let (result, _) =
                            layer().apply(message, classification(urgency, sentiment, confidence));
                        assert!(result.urgency >= urgency, "{} {}", message, urgency);
                    }
                }
            }
        }
    }

    #[test]
    fn test_critical_keyword_elevates_high() {
        let (result, applied) = layer().apply(
            "URGENT: the production database is down",
            classification(Urgency::High, Sentiment::Negative, 0.9),
        );
        assert_eq!(result.urgency, Urgency::Critical);
        assert_eq!(result.overrides_applied, vec![KeywordUrgencyElevation::ID]);
        assert!(applied[0].reason.contains("'urgent'"));
    }

    #[test]
    fn test_high_keyword_floor() {
        let (result, _) = layer().apply(
            "The export is blocking our team",
            classification(Urgency::Low, Sentiment::Neutral, 0.9),
        );
        assert_eq!(result.urgency, Urgency::High);

        // Already at or above the floor: rule does not fire
        let (result, applied) = layer().apply(
            "The export is blocking our team",
            classification(Urgency::Critical, Sentiment::Neutral, 0.9),
        );
        assert_eq!(result.urgency, Urgency::Critical);
        assert!(applied.is_empty());
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        for message in [
            "Please set prioritycode to 3 on the export",
            "Our blockchain integration has a question",
            "The emergencyexit field is missing from the report",
        ] {
            let (result, applied) =
                layer().apply(message, classification(Urgency::Low, Sentiment::Neutral, 0.9));
            assert_eq!(result.urgency, Urgency::Low, "{}", message);
            assert!(applied.is_empty(), "{}", message);
        }

        let (result, _) = layer().apply(
            "URGENT!!! the site crashed.",
            classification(Urgency::Low, Sentiment::Neutral, 0.9),
        );
        assert_eq!(result.urgency, Urgency::Critical);
    }

    #[test]
    fn test_negated_keyword_does_not_elevate() {
        for message in [
            "This is not urgent, just curious about invoices",
            "No emergency here, the export is a bit slow",
            "It isn't urgent at all",
        ] {
            let (result, applied) =
                layer().apply(message, classification(Urgency::Low, Sentiment::Neutral, 0.9));
            assert_eq!(result.urgency, Urgency::Low, "{}", message);
            assert!(applied.is_empty(), "{}", message);
        }

        // A later plain mention still counts
        let (result, _) = layer().apply(
            "Not urgent for me, but the server crashed for my team",
            classification(Urgency::Low, Sentiment::Neutral, 0.9),
        );
        assert_eq!(result.urgency, Urgency::Critical);

        // "not" inside a keyword is part of the keyword
        let (result, _) = layer().apply(
            "The login page is not working",
            classification(Urgency::Low, Sentiment::Neutral, 0.9),
        );
        assert_eq!(result.urgency, Urgency::High);
    }

    #[test]
    fn test_negative_sentiment_floor() {
        let (result, _) = layer().apply(
            "I am unhappy with the export format",
            classification(Urgency::Low, Sentiment::Negative, 0.9),
        );
        assert_eq!(result.urgency, Urgency::Medium);
        assert_eq!(result.overrides_applied, vec![NegativeSentimentFloor::ID]);
    }

    #[test]
    fn test_manual_review_fires_below_threshold_only() {
        for confidence in [0.0, 0.3, 0.599] {
            let (result, _) = layer().apply(
                "A question about exports",
                classification(Urgency::Medium, Sentiment::Neutral, confidence),
            );
            assert_eq!(result.overrides_applied, vec![PendingManualReview::ID]);
            assert_eq!(result.urgency, Urgency::Medium);
            assert_eq!(result.confidence, confidence);
        }

        for confidence in [0.6, 0.61, 1.0] {
            let (result, _) = layer().apply(
                "A question about exports",
                classification(Urgency::Medium, Sentiment::Neutral, confidence),
            );
            assert!(result.overrides_applied.is_empty());
        }
    }

    #[test]
    fn test_manual_review_is_last_and_deterministic() {
        let input = classification(Urgency::Low, Sentiment::Negative, 0.2);
        let message = "Everything crashed and I am furious";
        let (first, _) = layer().apply(message, input.clone());
        let (second, _) = layer().apply(message, input);

        assert_eq!(
            first.overrides_applied,
            vec![KeywordUrgencyElevation::ID, PendingManualReview::ID]
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_keywords() {
        let config = GuardrailConfig {
            critical_keywords: vec!["  Meltdown ".to_string()],
            high_keywords: Vec::new(),
        };
        let layer = GuardrailLayer::new(&config, 0.6);
        let (result, _) = layer.apply(
            "total MELTDOWN in the warehouse",
            classification(Urgency::Low, Sentiment::Neutral, 0.9),
        );
        assert_eq!(result.urgency, Urgency::Critical);

        let (result, _) = layer.apply(
            "URGENT: please help",
            classification(Urgency::Low, Sentiment::Neutral, 0.9),
        );
        assert_eq!(result.urgency, Urgency::Low);
    }
}
