//! Inspect: the core reconciliation step. Operations staff accept or reject
//! received goods; acceptance dispatches on the resolution type to the stock
//! and refund ledgers.
//!
//! Runs repeatable-read. The ticket row is locked first, then the stock row
//! of every scoped variant (in sorted variant order), then the payment row
//! when a refund is due, so overlapping inspections serialize instead of
//! reading stale counters.

use uuid::Uuid;

use crate::domain::stock::InventoryTxnType;
use crate::domain::ticket::{ResolutionType, Ticket, TicketStatus};
use crate::error::{EngineError, Result};
use crate::store::retry::{with_txn_retry, RetryConfig};
use crate::store::{refunds, stock, tickets};

use super::{load_detail, scoped_items, Actor, AfterSalesEngine, TicketDetail};

#[derive(Debug)]
pub struct InspectCommand {
    pub ticket_id: Uuid,
    pub accepted: bool,
    pub notes: Option<String>,
}

impl AfterSalesEngine {
    pub(super) async fn inspect(&self, actor: Actor, cmd: InspectCommand) -> Result<TicketDetail> {
        let detail =
            with_txn_retry(&RetryConfig::default(), || self.inspect_once(actor, &cmd)).await?;
        self.publish_event("inspected", &detail).await;
        Ok(detail)
    }

    async fn inspect_once(&self, actor: Actor, cmd: &InspectCommand) -> Result<TicketDetail> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let ticket = tickets::lock(&mut tx, cmd.ticket_id).await?;
        let resolution = ticket.ensure_goods_handling("inspect")?;
        ticket.ensure_received()?;

        let (status, refund_amount) = if cmd.accepted {
            let amount = self
                .apply_acceptance(&mut tx, &ticket, resolution)
                .await?;
            (TicketStatus::Resolved, amount)
        } else {
            // Rejected goods never return to saleable inventory; no stock or
            // refund effects.
            (TicketStatus::Rejected, None)
        };

        tickets::finalize(
            &mut tx,
            ticket.id,
            status,
            Some(actor.id),
            cmd.notes.as_deref(),
            refund_amount,
        )
        .await?;

        let updated = tickets::fetch(&mut tx, ticket.id).await?;
        let detail = load_detail(&mut tx, updated).await?;
        tx.commit().await?;

        tracing::info!(
            ticket = %detail.ticket.ticket_number,
            accepted = cmd.accepted,
            resolution = %resolution,
            "ticket inspected"
        );
        Ok(detail)
    }

    /// Stock and refund side effects of an accepted inspection. Returns the
    /// refund amount stamped on the ticket, if any.
    async fn apply_acceptance(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket: &Ticket,
        resolution: ResolutionType,
    ) -> Result<Option<i64>> {
        let mut items = scoped_items(tx, ticket).await?;
        if items.is_empty() {
            return Err(EngineError::Conflict(format!(
                "ticket {} has no order items in scope",
                ticket.ticket_number
            )));
        }
        // Deterministic lock order across concurrent inspections.
        items.sort_by_key(|i| i.product_variant_id);

        match resolution {
            ResolutionType::ReturnAndRefund => {
                for item in &items {
                    let mut level = lock_required(tx, item.product_variant_id).await?;
                    level.receive_return(item.quantity)?;
                    stock::save_level(tx, &level).await?;
                    stock::append_txn(
                        tx,
                        item.product_variant_id,
                        InventoryTxnType::Inbound,
                        item.quantity,
                        ticket.id,
                        &format!("Customer return accepted (ticket {})", ticket.ticket_number),
                    )
                    .await?;
                }

                let payment = refunds::lock_latest_completed_payment(tx, ticket.order_id)
                    .await?
                    .ok_or(EngineError::NotFound("completed payment"))?;
                let amount = ticket
                    .refund_amount
                    .unwrap_or_else(|| items.iter().map(|i| i.line_total).sum());
                let already_refunded = refunds::refunded_total(tx, payment.id).await?;
                payment.check_refund_cap(already_refunded, amount)?;
                refunds::insert_refund(tx, payment.id, ticket.id, amount).await?;
                Ok(Some(amount))
            }
            ResolutionType::WarrantyReplace => {
                for item in &items {
                    let mut level = lock_required(tx, item.product_variant_id).await?;
                    level.issue_replacement(item.quantity)?;
                    stock::save_level(tx, &level).await?;
                    stock::append_txn(
                        tx,
                        item.product_variant_id,
                        InventoryTxnType::Outbound,
                        item.quantity,
                        ticket.id,
                        &format!("Warranty replacement issued (ticket {})", ticket.ticket_number),
                    )
                    .await?;
                }
                Ok(None)
            }
            // Repair touches neither ledger; the ticket simply resolves.
            ResolutionType::WarrantyRepair => Ok(None),
            ResolutionType::RefundOnly => unreachable!("filtered by ensure_goods_handling"),
        }
    }
}

async fn lock_required(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    variant_id: Uuid,
) -> Result<crate::domain::stock::StockLevel> {
    stock::lock_level(tx, variant_id).await?.ok_or_else(|| {
        EngineError::Conflict(format!("no stock record for variant {variant_id}"))
    })
}
