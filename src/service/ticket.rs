//! Ticket submission and retrieval

use std::sync::Arc;

use crate::db::DbError;
use crate::db::models::{ListTicketsQuery, PaginatedTickets, TicketStats};
use crate::db::repository::TicketRepository;
use crate::model::{NewTicket, Ticket};
use crate::service::classification::{ClassificationError, ClassificationService};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TicketServiceError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("Database error: {0}")]
    DbError(#[from] DbError),
}

/// Service classifying and storing tickets
pub struct TicketService {
    classifier: Arc<ClassificationService>,
    repository: TicketRepository,
}

impl TicketService {
    pub fn new(classifier: Arc<ClassificationService>, repository: TicketRepository) -> Self {
        Self {
            classifier,
            repository,
        }
    }

    /// Classify a message and store it as a new ticket
    ///
    /// The row is written once, after classification finished.
    pub async fn submit(&self, user_message: &str) -> Result<Ticket, TicketServiceError> {
        let classified = self.classifier.classify(user_message).await?;
        tracing::debug!(
            state = ?classified.state,
            overrides = classified.overrides.len(),
            "Classification finished, storing ticket"
        );

        let ticket = self
            .repository
            .insert(NewTicket {
                user_message: classified.message,
                classification: classified.classification,
                ai_raw_response: classified.raw_response,
                attempts: classified.attempts as i32,
            })
            .await?;

        tracing::info!(
            id = ticket.id,
            category = %ticket.classification.category,
            urgency = %ticket.classification.urgency,
            fallback = ticket.classification.is_fallback(),
            overrides = ?ticket.classification.overrides_applied,
            "Ticket created"
        );

        Ok(ticket)
    }

    pub async fn get(&self, id: i64) -> Result<Ticket, TicketServiceError> {
        Ok(self.repository.get_by_id(id).await?)
    }

    pub async fn list(&self, query: ListTicketsQuery) -> Result<PaginatedTickets, TicketServiceError> {
        Ok(self.repository.list(query).await?)
    }

    pub async fn stats(&self) -> Result<TicketStats, TicketServiceError> {
        Ok(self.repository.stats().await?)
    }

    /// Returns true if the ticket was deleted, false if it didn't exist
    pub async fn delete(&self, id: i64) -> Result<bool, TicketServiceError> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            tracing::info!(id = id, "Ticket deleted");
        }
        Ok(deleted)
    }
}
