use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use super::config::ConfigError;

/// Category used by the fallback classification; every category set must contain it
pub const FALLBACK_CATEGORY: &str = "General Inquiry";

/// Prefix marking a `model_version` produced by the exhausted-retry fallback
pub const FALLBACK_MODEL_VERSION_PREFIX: &str = "fallback/";

/// Default allowed categories
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Technical Issue",
    "Billing",
    "Feature Request",
    "Account",
    "Bug Report",
    FALLBACK_CATEGORY,
];

/// Ticket urgency, ordered `Low < Medium < High < Critical`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    JsonSchema,
)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [
        Urgency::Low,
        Urgency::Medium,
        Urgency::High,
        Urgency::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "Low",
            Urgency::Medium => "Medium",
            Urgency::High => "High",
            Urgency::Critical => "Critical",
        }
    }

    /// Exact, case-sensitive lookup
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.as_str() == value)
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, JsonSchema,
)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category name that is a member of the configured [`CategorySet`]
///
/// Only obtainable through [`CategorySet::resolve`], the fallback constructor,
/// or when loading rows that were validated on write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fallback() -> Self {
        Self(FALLBACK_CATEGORY.to_string())
    }

    /// Rebuild a category from storage; rows are only written with validated categories
    pub(crate) fn from_persisted(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The allowed-category enumeration
#[derive(Debug, Clone)]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    /// Build a category set, rejecting empty names, duplicates, and sets without the
    /// fallback category
    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut categories: Vec<Category> = Vec::new();

        for name in names {
            let name = name.into();
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::Invalid(
                    "category names must not be empty".to_string(),
                ));
            }
            if categories.iter().any(|c| c.as_str() == trimmed) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate category '{}'",
                    trimmed
                )));
            }
            categories.push(Category(trimmed.to_string()));
        }

        if !categories.iter().any(|c| c.as_str() == FALLBACK_CATEGORY) {
            return Err(ConfigError::Invalid(format!(
                "category set must contain the fallback category '{}'",
                FALLBACK_CATEGORY
            )));
        }

        Ok(Self { categories })
    }

    /// Exact lookup; unknown or differently-cased names are not corrected
    pub fn resolve(&self, name: &str) -> Option<Category> {
        self.categories.iter().find(|c| c.as_str() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.categories.iter().map(Category::as_str).collect()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|c| Category(c.to_string()))
                .collect(),
        }
    }
}

/// Final classification verdict attached to a ticket
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Classification {
    pub category: Category,
    pub urgency: Urgency,
    pub sentiment: Sentiment,
    /// Confidence in [0, 1], rounded to 3 decimals
    pub confidence: f64,
    /// `<provider>/<model>/<template version>`, prefixed with `fallback/` on fallback
    pub model_version: String,
    /// Identifiers of guardrail rules that fired, in execution order
    pub overrides_applied: Vec<String>,
}

impl Classification {
    /// The deterministic verdict used once every attempt has failed
    pub fn fallback(model_version: &str) -> Self {
        Self {
            category: Category::fallback(),
            urgency: Urgency::Medium,
            sentiment: Sentiment::Neutral,
            confidence: 0.0,
            model_version: format!("{}{}", FALLBACK_MODEL_VERSION_PREFIX, model_version),
            overrides_applied: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.model_version.starts_with(FALLBACK_MODEL_VERSION_PREFIX)
    }
}

/// Shape of the JSON object the model is asked to return
///
/// Only used to render the response schema into the prompt; replies are validated
/// field by field rather than deserialized into this type.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationPayload {
    /// One of the allowed category names, verbatim
    pub category: String,
    pub urgency: Urgency,
    pub sentiment: Sentiment,
    /// Confidence between 0.0 and 1.0
    pub confidence: f64,
}

/// How a single classification attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    ParseError,
    SchemaError,
    Timeout,
    ProviderError,
}

/// Transient record of one call-parse-validate attempt
#[derive(Debug, Clone)]
pub struct ClassificationAttempt {
    /// 1-based
    pub attempt_number: u32,
    pub raw_response: String,
    pub parsed_payload: Option<serde_json::Map<String, serde_json::Value>>,
    pub validation_errors: Vec<String>,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_ordering() {
        assert!(Urgency::Low < Urgency::Medium);
        assert!(Urgency::Medium < Urgency::High);
        assert!(Urgency::High < Urgency::Critical);
    }

    #[test]
    fn test_urgency_parse_is_exact() {
        assert_eq!(Urgency::parse("High"), Some(Urgency::High));
        assert_eq!(Urgency::parse("high"), None);
        assert_eq!(Urgency::parse("Severe"), None);
    }

    #[test]
    fn test_category_set_requires_fallback() {
        let err = CategorySet::new(vec!["Billing", "Account"]).unwrap_err();
        assert!(err.to_string().contains(FALLBACK_CATEGORY));
    }

    #[test]
    fn test_category_set_rejects_duplicates() {
        let err = CategorySet::new(vec!["Billing", "Billing", FALLBACK_CATEGORY]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_category_resolve_does_not_correct() {
        let set = CategorySet::default();
        assert!(set.resolve("Billing").is_some());
        assert!(set.resolve("billing").is_none());
        assert!(set.resolve("Payments").is_none());
    }

    #[test]
    fn test_fallback_classification() {
        let fallback = Classification::fallback("openai/gpt-4o-mini/v1");
        assert_eq!(fallback.category.as_str(), FALLBACK_CATEGORY);
        assert_eq!(fallback.urgency, Urgency::Medium);
        assert_eq!(fallback.sentiment, Sentiment::Neutral);
        assert_eq!(fallback.confidence, 0.0);
        assert_eq!(fallback.model_version, "fallback/openai/gpt-4o-mini/v1");
        assert!(fallback.is_fallback());
    }
}
