//! Repository for ticket database operations

use sqlx::PgPool;

use super::DbError;
use super::models::{ListTicketsQuery, PaginatedTickets, TicketRow, TicketStats};
use crate::model::{FALLBACK_MODEL_VERSION_PREFIX, NewTicket, Ticket};
use crate::service::classification::guardrails::PendingManualReview;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Bind value for a dynamic filter
#[derive(Debug, Clone)]
enum FilterParam {
    Text(String),
    Float(f64),
}

/// Repository for ticket operations
#[derive(Clone)]
pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a fully classified ticket in a single statement
    pub async fn insert(&self, ticket: NewTicket) -> Result<Ticket, DbError> {
        let classification = &ticket.classification;
        let overrides_json = serde_json::to_value(&classification.overrides_applied)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let row: TicketRow = sqlx::query_as(
            r#"
            INSERT INTO tickets (
                user_message, category, urgency, sentiment, confidence,
                model_version, overrides_applied, ai_raw_response, attempts
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&ticket.user_message)
        .bind(classification.category.as_str())
        .bind(classification.urgency.as_str())
        .bind(classification.sentiment.as_str())
        .bind(classification.confidence)
        .bind(&classification.model_version)
        .bind(&overrides_json)
        .bind(&ticket.ai_raw_response)
        .bind(ticket.attempts)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = row.id, "Inserted ticket");

        row.into_domain().map_err(DbError::Serialization)
    }

    /// Get a ticket by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Ticket, DbError> {
        let row: TicketRow = sqlx::query_as(
            r#"
            SELECT * FROM tickets WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("ticket {}", id)))?;

        row.into_domain().map_err(DbError::Serialization)
    }

    /// Delete a ticket by ID
    /// Returns true if the ticket was deleted, false if it didn't exist
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM tickets WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::debug!(id = id, "Deleted ticket");
        }

        Ok(deleted)
    }

    /// List tickets with pagination and filters, newest first
    pub async fn list(&self, query: ListTicketsQuery) -> Result<PaginatedTickets, DbError> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1) as i64 * page_size as i64;

        let (where_clause, params) = build_filters(&query);

        // Get total count
        let count_query = format!("SELECT COUNT(*) as count FROM tickets {}", where_clause);

        let total_count: i64 = {
            let mut q = sqlx::query_scalar(&count_query);
            for param in &params {
                q = match param {
                    FilterParam::Text(value) => q.bind(value),
                    FilterParam::Float(value) => q.bind(value),
                };
            }
            q.fetch_one(&self.pool).await?
        };

        // Get tickets
        let select_query = format!(
            r#"
            SELECT * FROM tickets
            {}
            ORDER BY created_at DESC, id DESC
            LIMIT {} OFFSET {}
            "#,
            where_clause, page_size, offset
        );

        let rows: Vec<TicketRow> = {
            let mut q = sqlx::query_as(&select_query);
            for param in &params {
                q = match param {
                    FilterParam::Text(value) => q.bind(value),
                    FilterParam::Float(value) => q.bind(value),
                };
            }
            q.fetch_all(&self.pool).await?
        };

        let (tickets, skipped) = rows_into_tickets(rows);
        if skipped > 0 {
            tracing::warn!(
                page = page,
                skipped = skipped,
                total_count = total_count,
                "Page is short by unreadable rows that total_count still includes"
            );
        }

        let total_pages = ((total_count as f64) / (page_size as f64)).ceil() as u32;

        Ok(PaginatedTickets {
            tickets,
            page,
            page_size,
            total_count,
            total_pages,
        })
    }

    /// Aggregate statistics over all tickets
    pub async fn stats(&self) -> Result<TicketStats, DbError> {
        let (total_tickets, avg_confidence): (i64, Option<f64>) =
            sqlx::query_as("SELECT COUNT(*), AVG(confidence) FROM tickets")
                .fetch_one(&self.pool)
                .await?;

        let by_category: Vec<(String, i64)> =
            sqlx::query_as("SELECT category, COUNT(*) FROM tickets GROUP BY category")
                .fetch_all(&self.pool)
                .await?;

        let by_urgency: Vec<(String, i64)> =
            sqlx::query_as("SELECT urgency, COUNT(*) FROM tickets GROUP BY urgency")
                .fetch_all(&self.pool)
                .await?;

        let fallback_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE model_version LIKE $1")
                .bind(format!("{}%", FALLBACK_MODEL_VERSION_PREFIX))
                .fetch_one(&self.pool)
                .await?;

        let pending_review_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE overrides_applied @> $1")
                .bind(pending_review_filter())
                .fetch_one(&self.pool)
                .await?;

        Ok(TicketStats {
            total_tickets,
            by_category: by_category.into_iter().collect(),
            by_urgency: by_urgency.into_iter().collect(),
            avg_confidence: avg_confidence
                .map(|avg| (avg * 1000.0).round() / 1000.0)
                .unwrap_or(0.0),
            fallback_count,
            pending_review_count,
        })
    }
}

/// JSONB containment value matching tickets marked for manual review
fn pending_review_filter() -> serde_json::Value {
    serde_json::json!([PendingManualReview::ID])
}

/// Convert fetched rows, returning the tickets and how many rows were unreadable
fn rows_into_tickets(rows: Vec<TicketRow>) -> (Vec<Ticket>, usize) {
    let fetched = rows.len();
    let tickets: Vec<Ticket> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            row.into_domain()
                .map_err(|e| tracing::warn!(id = id, error = %e, "Skipping unreadable ticket row"))
                .ok()
        })
        .collect();
    let skipped = fetched - tickets.len();
    (tickets, skipped)
}

fn build_filters(query: &ListTicketsQuery) -> (String, Vec<FilterParam>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(ref category) = query.category {
        params.push(FilterParam::Text(category.clone()));
        conditions.push(format!("category = ${}", params.len()));
    }

    if let Some(urgency) = query.urgency {
        params.push(FilterParam::Text(urgency.as_str().to_string()));
        conditions.push(format!("urgency = ${}", params.len()));
    }

    if let Some(min_confidence) = query.min_confidence {
        params.push(FilterParam::Float(min_confidence));
        conditions.push(format!("confidence >= ${}", params.len()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Urgency;
    use chrono::Utc;
    use serde_json::json;

    fn row(id: i64, urgency: &str) -> TicketRow {
        TicketRow {
            id,
            user_message: "Export keeps timing out".to_string(),
            category: "Technical Issue".to_string(),
            urgency: urgency.to_string(),
            sentiment: "Negative".to_string(),
            confidence: 0.4,
            model_version: "openai/gpt-4o-mini/v1".to_string(),
            overrides_applied: json!([PendingManualReview::ID]),
            ai_raw_response: None,
            attempts: 2,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_pending_review_filter_uses_rule_id() {
        assert_eq!(pending_review_filter(), json!(["pending_manual_review"]));
        // The stored marker written by the guardrail is matched by containment
        let stored = row(1, "High").overrides_applied;
        assert!(
            stored
                .as_array()
                .unwrap()
                .contains(&pending_review_filter()[0])
        );
    }

    #[test]
    fn test_unreadable_rows_are_counted() {
        let rows = vec![row(1, "High"), row(2, "Whenever"), row(3, "Low")];
        let (tickets, skipped) = rows_into_tickets(rows);

        assert_eq!(skipped, 1);
        let ids: Vec<i64> = tickets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let (tickets, skipped) = rows_into_tickets(vec![row(4, "Medium")]);
        assert_eq!(skipped, 0);
        assert_eq!(tickets.len(), 1);
    }

    #[test]
    fn test_no_filters() {
        let (where_clause, params) = build_filters(&ListTicketsQuery::default());
        assert!(where_clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_filters_are_numbered_in_order() {
        let query = ListTicketsQuery {
            category: Some("Billing".to_string()),
            urgency: Some(Urgency::High),
            min_confidence: Some(0.5),
            ..Default::default()
        };
        let (where_clause, params) = build_filters(&query);
        assert_eq!(
            where_clause,
            "WHERE category = $1 AND urgency = $2 AND confidence >= $3"
        );
        assert_eq!(params.len(), 3);
        assert!(matches!(&params[1], FilterParam::Text(u) if u == "High"));
    }

    #[test]
    fn test_single_filter_starts_at_one() {
        let query = ListTicketsQuery {
            min_confidence: Some(0.75),
            ..Default::default()
        };
        let (where_clause, _) = build_filters(&query);
        assert_eq!(where_clause, "WHERE confidence >= $1");
    }
}
