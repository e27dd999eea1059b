use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::classification::Classification;

/// Minimum length of a ticket message, counted in characters after trimming
pub const MIN_MESSAGE_CHARS: usize = 10;

/// Maximum length of a ticket message, counted in characters after trimming
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// A submitted support message together with its classification
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Ticket {
    pub id: i64,
    pub user_message: String,
    #[serde(flatten)]
    pub classification: Classification,
    /// Raw model reply behind the verdict (last failing reply on fallback)
    pub ai_raw_response: Option<String>,
    /// Number of LLM attempts performed
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// A classified ticket that has not been written yet
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user_message: String,
    pub classification: Classification,
    pub ai_raw_response: Option<String>,
    pub attempts: i32,
}
