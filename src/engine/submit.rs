//! Submit: a customer opens a claim against a delivered order.
//!
//! Policy violations do not abort the request. The ticket is still created,
//! forced to `rejected` with the violation text recorded, so every claim
//! attempt leaves an auditable trail.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::ticket::{ClaimType, TicketStatus};
use crate::error::{EngineError, Result};
use crate::store::{orders, policies, tickets};

use super::{load_detail, Actor, AfterSalesEngine, TicketDetail};

#[derive(Debug)]
pub struct SubmitCommand {
    pub order_id: Uuid,
    /// None claims the whole order.
    pub order_item_id: Option<Uuid>,
    pub claim_type: ClaimType,
    pub reason: String,
    pub requested_action: Option<String>,
    pub refund_amount: Option<i64>,
    pub attachments: Vec<SubmitAttachment>,
}

#[derive(Debug)]
pub struct SubmitAttachment {
    pub file_name: String,
    pub url: String,
}

impl AfterSalesEngine {
    pub(super) async fn submit(&self, actor: Actor, cmd: SubmitCommand) -> Result<TicketDetail> {
        let mut tx = self.pool().begin().await?;

        let order = orders::fetch_order(&mut tx, cmd.order_id)
            .await?
            .filter(|o| o.customer_id == actor.id)
            .ok_or(EngineError::NotFound("order"))?;
        if !matches!(order.status.as_str(), "delivered" | "completed") {
            return Err(EngineError::InvalidState(format!(
                "order {} is {}; claims require a delivered order",
                order.order_number, order.status
            )));
        }

        let scoped = match cmd.order_item_id {
            Some(item_id) => {
                let item = orders::fetch_item(&mut tx, item_id)
                    .await?
                    .filter(|i| i.order_id == order.id)
                    .ok_or_else(|| {
                        EngineError::Validation(
                            "order item does not belong to the given order".to_string(),
                        )
                    })?;
                vec![item]
            }
            None => orders::fetch_items(&mut tx, order.id).await?,
        };

        // No silent fallback: a missing policy row is a service-level outage.
        let policy = policies::active_policy(&mut tx, cmd.claim_type)
            .await?
            .ok_or(EngineError::PolicyUnavailable(cmd.claim_type))?;

        let delivered_at = orders::delivered_at(&mut tx, order.id).await?;
        let customized = scoped.iter().any(|i| i.customized);
        let violation = policy.evaluate(cmd.claim_type, delivered_at, customized, Utc::now());

        if tickets::open_duplicate_exists(&mut tx, order.id, cmd.order_item_id, cmd.claim_type)
            .await?
        {
            return Err(EngineError::Conflict(format!(
                "an open {} ticket already exists for this order item",
                cmd.claim_type
            )));
        }

        let status = if violation.is_some() {
            TicketStatus::Rejected
        } else {
            TicketStatus::Pending
        };
        let ticket = tickets::insert(
            &mut tx,
            &tickets::NewTicket {
                order_id: order.id,
                order_item_id: cmd.order_item_id,
                customer_id: actor.id,
                claim_type: cmd.claim_type,
                status,
                reason: cmd.reason,
                requested_action: cmd.requested_action,
                refund_amount: cmd.refund_amount,
                evidence_required: policy.evidence_required,
                policy_violation: violation,
                resolved_at: (status == TicketStatus::Rejected).then(Utc::now),
            },
        )
        .await?;

        let new_attachments: Vec<_> = cmd
            .attachments
            .into_iter()
            .map(|a| {
                let extension = a
                    .file_name
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_ascii_lowercase())
                    .unwrap_or_default();
                tickets::NewAttachment {
                    file_name: a.file_name,
                    url: a.url,
                    extension,
                }
            })
            .collect();
        tickets::insert_attachments(&mut tx, ticket.id, &new_attachments).await?;

        let detail = load_detail(&mut tx, ticket).await?;
        tx.commit().await?;

        tracing::info!(
            ticket = %detail.ticket.ticket_number,
            claim = %detail.ticket.claim_type,
            status = %detail.ticket.status,
            "ticket submitted"
        );
        self.publish_event("submitted", &detail).await;
        Ok(detail)
    }
}
