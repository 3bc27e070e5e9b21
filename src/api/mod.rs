//! HTTP boundary: request DTOs, the current-actor extractor and the router.
//!
//! Authentication itself lives outside this service; the gateway forwards
//! the resolved actor in the `x-actor-id` header.

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use validator::Validate;

use crate::domain::ticket::{ClaimType, ResolutionType, Ticket, TicketStatus};
use crate::engine::{
    Actor, AfterSalesEngine, ApproveCommand, Command, InspectCommand, SubmitAttachment,
    SubmitCommand, TicketDetail,
};
use crate::error::EngineError;
use crate::store::tickets::TicketFilter;

#[derive(Clone)]
pub struct AppState {
    pub engine: AfterSalesEngine,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async {
                Json(serde_json::json!({"status": "healthy", "service": "optica-aftersales"}))
            }),
        )
        .route("/api/v1/aftersales/tickets", get(list_tickets).post(submit))
        .route("/api/v1/aftersales/tickets/:id", get(get_ticket))
        .route("/api/v1/aftersales/tickets/:id/approve", post(approve))
        .route("/api/v1/aftersales/tickets/:id/receive", post(receive))
        .route("/api/v1/aftersales/tickets/:id/inspect", post(inspect))
        .route("/api/v1/aftersales/tickets/:id/reject", post(reject))
        .route("/api/v1/aftersales/tickets/:id/close", post(close))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Actor identity resolved by the upstream gateway.
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = EngineError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-actor-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                EngineError::Validation("missing or malformed x-actor-id header".to_string())
            })?;
        Ok(CurrentActor(Actor { id }))
    }
}

fn validated<T: Validate>(req: T) -> Result<T, EngineError> {
    req.validate()
        .map_err(|e| EngineError::Validation(e.to_string()))?;
    Ok(req)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    pub order_id: Uuid,
    pub order_item_id: Option<Uuid>,
    pub claim_type: ClaimType,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    #[validate(length(max = 500))]
    pub requested_action: Option<String>,
    #[validate(range(min = 1))]
    pub refund_amount: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRequest>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentRequest {
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproveRequest {
    pub resolution_type: ResolutionType,
    #[validate(range(min = 1))]
    pub refund_amount: Option<i64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InspectRequest {
    pub is_accepted: bool,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub customer_id: Option<Uuid>,
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

/// Widened before multiplying so an adversarial `page` cannot overflow u32.
fn page_offset(page: u32, per_page: u32) -> i64 {
    (page as i64 - 1) * per_page as i64
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn submit(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<TicketDetail>), EngineError> {
    let req = validated(req)?;
    let detail = s
        .engine
        .execute(
            actor,
            Command::Submit(SubmitCommand {
                order_id: req.order_id,
                order_item_id: req.order_item_id,
                claim_type: req.claim_type,
                reason: req.reason,
                requested_action: req.requested_action,
                refund_amount: req.refund_amount,
                attachments: req
                    .attachments
                    .into_iter()
                    .map(|a| SubmitAttachment {
                        file_name: a.file_name,
                        url: a.url,
                    })
                    .collect(),
            }),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_ticket(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, EngineError> {
    Ok(Json(s.engine.ticket_detail(id).await?))
}

async fn list_tickets(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<Ticket>>, EngineError> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let filter = TicketFilter {
        customer_id: p.customer_id,
        status: p.status,
        limit: per_page as i64,
        offset: page_offset(page, per_page),
    };
    let data = s.engine.list_tickets(&filter).await?;
    let total = s.engine.count_tickets(&filter).await?;
    Ok(Json(PaginatedResponse { data, total, page }))
}

async fn approve(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<TicketDetail>, EngineError> {
    let req = validated(req)?;
    let detail = s
        .engine
        .execute(
            actor,
            Command::Approve(ApproveCommand {
                ticket_id: id,
                resolution_type: req.resolution_type,
                refund_amount: req.refund_amount,
                notes: req.notes,
            }),
        )
        .await?;
    Ok(Json(detail))
}

async fn receive(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, EngineError> {
    let detail = s
        .engine
        .execute(actor, Command::Receive { ticket_id: id })
        .await?;
    Ok(Json(detail))
}

async fn inspect(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(req): Json<InspectRequest>,
) -> Result<Json<TicketDetail>, EngineError> {
    let req = validated(req)?;
    let detail = s
        .engine
        .execute(
            actor,
            Command::Inspect(InspectCommand {
                ticket_id: id,
                accepted: req.is_accepted,
                notes: req.notes,
            }),
        )
        .await?;
    Ok(Json(detail))
}

async fn reject(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<TicketDetail>, EngineError> {
    let req = validated(req)?;
    let detail = s
        .engine
        .execute(
            actor,
            Command::Reject {
                ticket_id: id,
                reason: req.reason,
            },
        )
        .await?;
    Ok(Json(detail))
}

async fn close(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, EngineError> {
    let detail = s
        .engine
        .execute(actor, Command::Close { ticket_id: id })
        .await?;
    Ok(Json(detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_is_zero_based() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
    }

    #[test]
    fn page_offset_survives_extreme_pages() {
        assert_eq!(
            page_offset(u32::MAX, 100),
            (u32::MAX as i64 - 1) * 100
        );
    }
}
