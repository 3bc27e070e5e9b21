//! Approve: sales staff assign a resolution type to a pending ticket.
//!
//! Runs serializable with the ticket row locked for the whole transaction,
//! so two concurrent approvals cannot both observe `pending`. The loser
//! either blocks and re-reads a non-pending status, or aborts with a
//! serialization failure and is retried from scratch.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::ticket::{ResolutionType, TicketStatus};
use crate::error::{EngineError, Result};
use crate::store::retry::{with_txn_retry, RetryConfig};
use crate::store::{refunds, tickets};

use super::{load_detail, Actor, AfterSalesEngine, TicketDetail};

#[derive(Debug)]
pub struct ApproveCommand {
    pub ticket_id: Uuid,
    pub resolution_type: ResolutionType,
    /// Required for `refund_only`.
    pub refund_amount: Option<i64>,
    pub notes: Option<String>,
}

impl AfterSalesEngine {
    pub(super) async fn approve(&self, actor: Actor, cmd: ApproveCommand) -> Result<TicketDetail> {
        let detail =
            with_txn_retry(&RetryConfig::default(), || self.approve_once(actor, &cmd)).await?;
        self.publish_event("approved", &detail).await;
        Ok(detail)
    }

    async fn approve_once(&self, actor: Actor, cmd: &ApproveCommand) -> Result<TicketDetail> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let ticket = tickets::lock(&mut tx, cmd.ticket_id).await?;
        ticket.ensure_status(&[TicketStatus::Pending], "approve")?;
        ticket.ensure_compatible(cmd.resolution_type)?;

        let (status, refund_amount, resolved_at) = match cmd.resolution_type {
            ResolutionType::RefundOnly => {
                let amount = cmd.refund_amount.ok_or_else(|| {
                    EngineError::Validation(
                        "refund amount is required for a refund_only resolution".to_string(),
                    )
                })?;
                let payment = refunds::lock_latest_completed_payment(&mut tx, ticket.order_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::InvalidState(format!(
                            "order for ticket {} has no completed payment",
                            ticket.ticket_number
                        ))
                    })?;
                let already_refunded = refunds::refunded_total(&mut tx, payment.id).await?;
                // At approval the cap breach is a request problem, not a
                // race: the staff member asked for more than remains.
                payment
                    .check_refund_cap(already_refunded, amount)
                    .map_err(|e| match e {
                        EngineError::Conflict(msg) => EngineError::Validation(msg),
                        other => other,
                    })?;
                refunds::insert_refund(&mut tx, payment.id, ticket.id, amount).await?;
                (TicketStatus::Resolved, Some(amount), Some(Utc::now()))
            }
            // Goods-handling paths defer all stock and refund effects to
            // Inspect; the ticket just moves to in_progress.
            ResolutionType::ReturnAndRefund
            | ResolutionType::WarrantyRepair
            | ResolutionType::WarrantyReplace => (TicketStatus::InProgress, None, None),
        };

        tickets::apply_approval(
            &mut tx,
            ticket.id,
            cmd.resolution_type,
            status,
            actor.id,
            cmd.notes.as_deref(),
            refund_amount,
            resolved_at,
        )
        .await?;

        let updated = tickets::fetch(&mut tx, ticket.id).await?;
        let detail = load_detail(&mut tx, updated).await?;
        tx.commit().await?;

        tracing::info!(
            ticket = %detail.ticket.ticket_number,
            resolution = %cmd.resolution_type,
            status = %detail.ticket.status,
            "ticket approved"
        );
        Ok(detail)
    }
}
