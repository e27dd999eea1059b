//! Repository for prompt template versions

use sqlx::PgPool;

use super::DbError;
use super::models::PromptTemplateRow;
use crate::model::PromptTemplate;

#[derive(Clone)]
pub struct PromptTemplateRepository {
    pool: PgPool,
}

impl PromptTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The currently active template, if any
    pub async fn get_active(&self) -> Result<Option<PromptTemplate>, DbError> {
        let row: Option<PromptTemplateRow> =
            sqlx::query_as("SELECT * FROM prompt_templates WHERE is_active LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(PromptTemplate::from))
    }

    /// All versions, newest first
    pub async fn list(&self) -> Result<Vec<PromptTemplate>, DbError> {
        let rows: Vec<PromptTemplateRow> =
            sqlx::query_as("SELECT * FROM prompt_templates ORDER BY created_at DESC, version DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(PromptTemplate::from).collect())
    }

    /// Append a new, inactive version; existing versions are never overwritten
    pub async fn insert(&self, version: &str, template_text: &str) -> Result<PromptTemplate, DbError> {
        let row: Option<PromptTemplateRow> = sqlx::query_as(
            r#"
            INSERT INTO prompt_templates (version, template_text, is_active)
            VALUES ($1, $2, FALSE)
            ON CONFLICT (version) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(version)
        .bind(template_text)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| DbError::Conflict(format!("prompt template {}", version)))?;
        tracing::debug!(version = %version, "Inserted prompt template");

        Ok(row.into())
    }

    /// Make `version` the only active template
    pub async fn activate(&self, version: &str) -> Result<PromptTemplate, DbError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> =
            sqlx::query_as("SELECT version FROM prompt_templates WHERE version = $1 FOR UPDATE")
                .bind(version)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(DbError::NotFound(format!("prompt template {}", version)));
        }

        sqlx::query("UPDATE prompt_templates SET is_active = FALSE WHERE is_active AND version <> $1")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        let row: PromptTemplateRow = sqlx::query_as(
            "UPDATE prompt_templates SET is_active = TRUE WHERE version = $1 RETURNING *",
        )
        .bind(version)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(version = %version, "Activated prompt template");

        Ok(row.into())
    }
}
