//! Prompt template versioning
//!
//! Templates are append-only. Activating a version persists the choice and swaps the
//! template used by the classifier for subsequent requests.

use std::sync::Arc;

use crate::db::DbError;
use crate::db::templates::PromptTemplateRepository;
use crate::model::PromptTemplate;
use crate::service::classification::ClassificationService;
use crate::service::classification::prompts::{DEFAULT_TEMPLATE_TEXT, DEFAULT_TEMPLATE_VERSION};

const MAX_VERSION_LEN: usize = 64;

/// Placeholder every template must contain
const MESSAGE_PLACEHOLDER: &str = "{{message}}";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TemplateServiceError {
    #[error("Invalid prompt template: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    DbError(#[from] DbError),
}

/// Load the active template, seeding the built-in version on an empty table
pub async fn bootstrap_template(
    repository: &PromptTemplateRepository,
) -> Result<PromptTemplate, DbError> {
    if let Some(active) = repository.get_active().await? {
        tracing::info!(template_version = %active.version, "Loaded active prompt template");
        return Ok(active);
    }

    match repository
        .insert(DEFAULT_TEMPLATE_VERSION, DEFAULT_TEMPLATE_TEXT)
        .await
    {
        Ok(_) => tracing::info!(
            template_version = DEFAULT_TEMPLATE_VERSION,
            "Seeded built-in prompt template"
        ),
        Err(DbError::Conflict(_)) => {}
        Err(e) => return Err(e),
    }

    repository.activate(DEFAULT_TEMPLATE_VERSION).await
}

/// Check a version label and template text before storing them
pub fn validate_template(version: &str, template_text: &str) -> Result<(), TemplateServiceError> {
    if version.is_empty() || version.len() > MAX_VERSION_LEN {
        return Err(TemplateServiceError::Invalid(format!(
            "version must be 1-{} characters",
            MAX_VERSION_LEN
        )));
    }
    if !version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(TemplateServiceError::Invalid(format!(
            "version '{}' may only contain letters, digits, '.', '-' and '_'",
            version
        )));
    }
    if !template_text.contains(MESSAGE_PLACEHOLDER) {
        return Err(TemplateServiceError::Invalid(format!(
            "template text must contain {}",
            MESSAGE_PLACEHOLDER
        )));
    }
    Ok(())
}

pub struct PromptTemplateService {
    repository: PromptTemplateRepository,
    classifier: Arc<ClassificationService>,
}

impl PromptTemplateService {
    pub fn new(repository: PromptTemplateRepository, classifier: Arc<ClassificationService>) -> Self {
        Self {
            repository,
            classifier,
        }
    }

    pub async fn list(&self) -> Result<Vec<PromptTemplate>, TemplateServiceError> {
        Ok(self.repository.list().await?)
    }

    /// Store a new version, optionally making it active
    pub async fn create(
        &self,
        version: &str,
        template_text: &str,
        activate: bool,
    ) -> Result<PromptTemplate, TemplateServiceError> {
        let version = version.trim();
        validate_template(version, template_text)?;

        let template = self.repository.insert(version, template_text).await?;
        tracing::info!(template_version = %version, "Prompt template created");

        if activate {
            return self.activate(version).await;
        }
        Ok(template)
    }

    pub async fn activate(&self, version: &str) -> Result<PromptTemplate, TemplateServiceError> {
        let template = self.repository.activate(version).await?;
        self.classifier.set_active_template(template.clone()).await;
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_template_is_valid() {
        assert!(validate_template(DEFAULT_TEMPLATE_VERSION, DEFAULT_TEMPLATE_TEXT).is_ok());
    }

    #[test]
    fn test_rejects_bad_versions() {
        let long = "v".repeat(MAX_VERSION_LEN + 1);
        for version in ["", "v 2", "v2/beta", long.as_str()] {
            assert!(
                validate_template(version, DEFAULT_TEMPLATE_TEXT).is_err(),
                "{:?}",
                version
            );
        }
        assert!(validate_template("v2.1-beta_3", DEFAULT_TEMPLATE_TEXT).is_ok());
    }

    #[test]
    fn test_requires_message_placeholder() {
        let err = validate_template("v2", "Classify this ticket please").unwrap_err();
        assert!(err.to_string().contains("{{message}}"));
    }
}
