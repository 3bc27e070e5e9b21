//! Reject: the direct staff path that short-circuits a pending or
//! in-progress ticket without stock or refund effects.

use uuid::Uuid;

use crate::domain::ticket::TicketStatus;
use crate::error::Result;
use crate::store::tickets;

use super::{load_detail, Actor, AfterSalesEngine, TicketDetail};

impl AfterSalesEngine {
    pub(super) async fn reject(
        &self,
        actor: Actor,
        ticket_id: Uuid,
        reason: String,
    ) -> Result<TicketDetail> {
        let mut tx = self.pool().begin().await?;

        let ticket = tickets::lock(&mut tx, ticket_id).await?;
        ticket.ensure_status(&[TicketStatus::Pending, TicketStatus::InProgress], "reject")?;

        tickets::finalize(
            &mut tx,
            ticket.id,
            TicketStatus::Rejected,
            Some(actor.id),
            Some(&reason),
            None,
        )
        .await?;

        let updated = tickets::fetch(&mut tx, ticket.id).await?;
        let detail = load_detail(&mut tx, updated).await?;
        tx.commit().await?;

        tracing::info!(
            ticket = %detail.ticket.ticket_number,
            staff = %actor.id,
            "ticket rejected"
        );
        self.publish_event("rejected", &detail).await;
        Ok(detail)
    }
}
