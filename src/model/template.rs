use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A versioned prompt template
///
/// Text is never changed once stored; new versions are appended and one of them
/// is marked active.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PromptTemplate {
    pub version: String,
    pub template_text: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
