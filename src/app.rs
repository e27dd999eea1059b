//! Application state and service initialization
//!
//! This module centralizes service initialization and dependency injection.

use std::sync::Arc;

use sqlx::PgPool;

use crate::db::repository::TicketRepository;
use crate::db::templates::PromptTemplateRepository;
use crate::model::Config;
use crate::service::template::bootstrap_template;
use crate::service::{ClassificationService, PromptTemplateService, TicketService, build_provider};

/// Application state containing all services and shared resources
pub struct AppState {
    /// Database connection pool
    pub db_pool: PgPool,
    /// Classification pipeline, shared with the template service
    pub classification_service: Arc<ClassificationService>,
    pub ticket_service: Arc<TicketService>,
    pub template_service: Arc<PromptTemplateService>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Configuration validation
    /// 2. Database connection and schema initialization
    /// 3. Active prompt template loading (seeding the built-in one if needed)
    /// 4. Completion provider and service construction
    pub async fn new(config: Config) -> Result<Self, AppError> {
        config
            .validate()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;
        let categories = config
            .classifier
            .category_set()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;

        // Initialize PostgreSQL database
        let db_pool = crate::db::create_pool()
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        // Initialize database schema
        crate::db::init_schema(&db_pool)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        let template_repository = PromptTemplateRepository::new(db_pool.clone());
        let template = bootstrap_template(&template_repository)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        let provider = build_provider(&config.classifier)
            .map_err(|e| AppError::Provider(e.to_string()))?;

        let classification_service = Arc::new(ClassificationService::new(
            provider,
            &config.classifier,
            &config.guardrails,
            categories,
            template,
        ));

        let ticket_service = Arc::new(TicketService::new(
            Arc::clone(&classification_service),
            TicketRepository::new(db_pool.clone()),
        ));

        let template_service = Arc::new(PromptTemplateService::new(
            template_repository,
            Arc::clone(&classification_service),
        ));

        Ok(Self {
            db_pool,
            classification_service,
            ticket_service,
            template_service,
        })
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Database initialization failed
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    /// Completion provider could not be built
    #[error("Completion provider initialization failed: {0}")]
    Provider(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
