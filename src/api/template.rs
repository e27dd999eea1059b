//! REST API endpoints for prompt templates

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ErrorResponse};
use crate::model::PromptTemplate;
use crate::service::PromptTemplateService;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    /// Version label, e.g. `v2`; letters, digits, `.`, `-` and `_`
    pub version: String,
    /// Template text; must contain `{{message}}`
    pub template_text: String,
    /// Make the new version active immediately
    #[serde(default)]
    pub activate: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateListResponse {
    pub templates: Vec<PromptTemplate>,
}

/// List every stored template version, newest first
#[utoipa::path(
    get,
    path = "/v1/prompt-templates",
    responses(
        (status = 200, description = "Templates retrieved successfully", body = TemplateListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "prompt-templates"
)]
#[get("/v1/prompt-templates")]
pub async fn list_templates(
    service: web::Data<PromptTemplateService>,
) -> Result<HttpResponse, ApiError> {
    let templates = service.list().await?;
    Ok(HttpResponse::Ok().json(TemplateListResponse { templates }))
}

/// Append a new template version
#[utoipa::path(
    post,
    path = "/v1/prompt-templates",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template stored", body = PromptTemplate),
        (status = 400, description = "Invalid version or template text", body = ErrorResponse),
        (status = 409, description = "Version already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "prompt-templates"
)]
#[post("/v1/prompt-templates")]
pub async fn create_template(
    service: web::Data<PromptTemplateService>,
    body: web::Json<CreateTemplateRequest>,
) -> Result<HttpResponse, ApiError> {
    let template = service
        .create(&body.version, &body.template_text, body.activate)
        .await?;
    Ok(HttpResponse::Created().json(template))
}

/// Make a stored version the active template
#[utoipa::path(
    post,
    path = "/v1/prompt-templates/{version}/activate",
    params(
        ("version" = String, Path, description = "Template version")
    ),
    responses(
        (status = 200, description = "Template activated", body = PromptTemplate),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "prompt-templates"
)]
#[post("/v1/prompt-templates/{version}/activate")]
pub async fn activate_template(
    service: web::Data<PromptTemplateService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let template = service.activate(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(template))
}

/// Configure prompt template routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_templates)
        .service(create_template)
        .service(activate_template);
}
