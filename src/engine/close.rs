//! Close: a customer withdraws a claim that is still pending.

use uuid::Uuid;

use crate::domain::ticket::TicketStatus;
use crate::error::{EngineError, Result};
use crate::store::tickets;

use super::{load_detail, Actor, AfterSalesEngine, TicketDetail};

impl AfterSalesEngine {
    pub(super) async fn close(&self, actor: Actor, ticket_id: Uuid) -> Result<TicketDetail> {
        let mut tx = self.pool().begin().await?;

        let ticket = tickets::lock(&mut tx, ticket_id).await?;
        if ticket.customer_id != actor.id {
            return Err(EngineError::NotFound("ticket"));
        }
        ticket.ensure_status(&[TicketStatus::Pending], "close")?;

        tickets::finalize(&mut tx, ticket.id, TicketStatus::Closed, None, None, None).await?;

        let updated = tickets::fetch(&mut tx, ticket.id).await?;
        let detail = load_detail(&mut tx, updated).await?;
        tx.commit().await?;

        tracing::info!(ticket = %detail.ticket.ticket_number, "ticket closed by customer");
        self.publish_event("closed", &detail).await;
        Ok(detail)
    }
}
