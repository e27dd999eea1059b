//! Database models for tickets and prompt templates

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::model::{Category, Classification, PromptTemplate, Sentiment, Ticket, Urgency};

/// Database representation of a classified ticket
#[derive(Debug, Clone, FromRow)]
pub struct TicketRow {
    pub id: i64,
    pub user_message: String,
    pub category: String,
    pub urgency: String,
    pub sentiment: String,
    pub confidence: f64,
    pub model_version: String,
    pub overrides_applied: serde_json::Value,
    pub ai_raw_response: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

impl TicketRow {
    /// Convert database row to domain model
    pub fn into_domain(self) -> Result<Ticket, String> {
        let urgency = Urgency::parse(&self.urgency)
            .ok_or_else(|| format!("Invalid urgency '{}' for ticket {}", self.urgency, self.id))?;
        let sentiment = Sentiment::parse(&self.sentiment).ok_or_else(|| {
            format!("Invalid sentiment '{}' for ticket {}", self.sentiment, self.id)
        })?;
        let overrides_applied: Vec<String> = serde_json::from_value(self.overrides_applied)
            .map_err(|e| format!("Invalid overrides_applied for ticket {}: {}", self.id, e))?;

        Ok(Ticket {
            id: self.id,
            user_message: self.user_message,
            classification: Classification {
                category: Category::from_persisted(self.category),
                urgency,
                sentiment,
                confidence: self.confidence,
                model_version: self.model_version,
                overrides_applied,
            },
            ai_raw_response: self.ai_raw_response,
            attempts: self.attempts,
            created_at: self.created_at,
        })
    }
}

/// Database representation of a prompt template
#[derive(Debug, Clone, FromRow)]
pub struct PromptTemplateRow {
    pub version: String,
    pub template_text: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PromptTemplateRow> for PromptTemplate {
    fn from(row: PromptTemplateRow) -> Self {
        PromptTemplate {
            version: row.version,
            template_text: row.template_text,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Query parameters for listing tickets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTicketsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub category: Option<String>,
    pub urgency: Option<Urgency>,
    pub min_confidence: Option<f64>,
}

/// Paginated response for tickets
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedTickets {
    pub tickets: Vec<Ticket>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub total_pages: u32,
}

/// Aggregate figures over all stored tickets
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct TicketStats {
    pub total_tickets: i64,
    pub by_category: BTreeMap<String, i64>,
    pub by_urgency: BTreeMap<String, i64>,
    /// Mean confidence, 0 when there are no tickets
    pub avg_confidence: f64,
    /// Tickets classified by the exhausted-retry fallback
    pub fallback_count: i64,
    /// Tickets flagged for manual review
    pub pending_review_count: i64,
}
