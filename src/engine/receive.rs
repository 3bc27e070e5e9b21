//! Receive: operations staff record physical receipt of returned goods.
//! Inspect refuses to run until this gate has passed.

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::store::tickets;

use super::{load_detail, Actor, AfterSalesEngine, TicketDetail};

impl AfterSalesEngine {
    pub(super) async fn receive(&self, actor: Actor, ticket_id: Uuid) -> Result<TicketDetail> {
        let mut tx = self.pool().begin().await?;

        let ticket = tickets::lock(&mut tx, ticket_id).await?;
        ticket.ensure_goods_handling("receive")?;
        ticket.ensure_not_received()?;

        tickets::mark_received(&mut tx, ticket.id, Utc::now()).await?;

        let updated = tickets::fetch(&mut tx, ticket.id).await?;
        let detail = load_detail(&mut tx, updated).await?;
        tx.commit().await?;

        tracing::info!(
            ticket = %detail.ticket.ticket_number,
            staff = %actor.id,
            "goods received"
        );
        self.publish_event("received", &detail).await;
        Ok(detail)
    }
}
