//! REST API endpoints for tickets

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::health::{DependencyHealth, HealthStatus, ReadinessStatus};
use crate::api::template::{CreateTemplateRequest, TemplateListResponse};
use crate::db::models::{ListTicketsQuery, TicketStats};
use crate::model::{Category, Classification, PromptTemplate, Sentiment, Ticket, Urgency};
use crate::service::TicketService;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_ticket,
        list_tickets,
        ticket_stats,
        get_ticket,
        delete_ticket,
        crate::api::template::list_templates,
        crate::api::template::create_template,
        crate::api::template::activate_template,
        crate::api::health::liveness,
        crate::api::health::readiness,
    ),
    components(schemas(
        CreateTicketRequest,
        TicketListResponse,
        Ticket,
        Classification,
        Category,
        Urgency,
        Sentiment,
        TicketStats,
        PromptTemplate,
        CreateTemplateRequest,
        TemplateListResponse,
        ErrorResponse,
        HealthStatus,
        ReadinessStatus,
        DependencyHealth,
    )),
    tags(
        (name = "tickets", description = "Support ticket classification"),
        (name = "prompt-templates", description = "Versioned classification prompts"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTicketRequest {
    /// Raw customer message, 10 to 5000 characters after trimming
    pub user_message: String,
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListTicketsParams {
    /// Page number (1-indexed, default: 1)
    pub page: Option<u32>,
    /// Page size (default: 20, max: 100)
    pub page_size: Option<u32>,
    /// Filter by exact category name
    pub category: Option<String>,
    /// Filter by urgency (Low, Medium, High, Critical)
    pub urgency: Option<Urgency>,
    /// Only tickets with at least this confidence
    pub min_confidence: Option<f64>,
}

/// Paginated response for tickets
#[derive(Debug, Serialize, ToSchema)]
pub struct TicketListResponse {
    pub tickets: Vec<Ticket>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub total_pages: u32,
}

/// Submit a support message for classification
#[utoipa::path(
    post,
    path = "/v1/tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket classified and stored", body = Ticket),
        (status = 400, description = "Message empty, too short or too long", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "tickets"
)]
#[post("/v1/tickets")]
pub async fn create_ticket(
    service: web::Data<TicketService>,
    body: web::Json<CreateTicketRequest>,
) -> Result<HttpResponse, ApiError> {
    let ticket = service.submit(&body.user_message).await?;
    Ok(HttpResponse::Created().json(ticket))
}

/// List tickets with pagination and filters, newest first
#[utoipa::path(
    get,
    path = "/v1/tickets",
    params(ListTicketsParams),
    responses(
        (status = 200, description = "Tickets retrieved successfully", body = TicketListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "tickets"
)]
#[get("/v1/tickets")]
pub async fn list_tickets(
    service: web::Data<TicketService>,
    query: web::Query<ListTicketsParams>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();

    if let Some(min_confidence) = query.min_confidence
        && !(0.0..=1.0).contains(&min_confidence)
    {
        return Err(ApiError::BadRequest(format!(
            "min_confidence must be within [0, 1], got {}",
            min_confidence
        )));
    }

    let paginated = service
        .list(ListTicketsQuery {
            page: query.page,
            page_size: query.page_size,
            category: query.category,
            urgency: query.urgency,
            min_confidence: query.min_confidence,
        })
        .await?;

    Ok(HttpResponse::Ok().json(TicketListResponse {
        tickets: paginated.tickets,
        page: paginated.page,
        page_size: paginated.page_size,
        total_count: paginated.total_count,
        total_pages: paginated.total_pages,
    }))
}

/// Aggregate statistics over stored tickets
#[utoipa::path(
    get,
    path = "/v1/tickets/stats",
    responses(
        (status = 200, description = "Statistics computed", body = TicketStats),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "tickets"
)]
#[get("/v1/tickets/stats")]
pub async fn ticket_stats(service: web::Data<TicketService>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(service.stats().await?))
}

/// Get a ticket by ID
#[utoipa::path(
    get,
    path = "/v1/tickets/{id}",
    params(
        ("id" = i64, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Ticket retrieved successfully", body = Ticket),
        (status = 404, description = "Ticket not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "tickets"
)]
#[get("/v1/tickets/{id}")]
pub async fn get_ticket(
    service: web::Data<TicketService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let ticket = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ticket))
}

/// Delete a ticket by ID
#[utoipa::path(
    delete,
    path = "/v1/tickets/{id}",
    params(
        ("id" = i64, Path, description = "Ticket ID")
    ),
    responses(
        (status = 204, description = "Ticket deleted successfully"),
        (status = 404, description = "Ticket not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "tickets"
)]
#[actix_web::delete("/v1/tickets/{id}")]
pub async fn delete_ticket(
    service: web::Data<TicketService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    if service.delete(id).await? {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::NotFound(format!("ticket {}", id)))
    }
}

/// Configure ticket routes
///
/// `stats` is registered before `{id}` so it is not captured as an ID.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_ticket)
        .service(list_tickets)
        .service(ticket_stats)
        .service(get_ticket)
        .service(delete_ticket);
}
