//! The after-sales resolution engine.
//!
//! The five operations (plus the customer-side close) are a tagged union of
//! commands dispatched through one component, so the claim/resolution
//! compatibility matrix and the terminal-state guard live in exactly one
//! place. Each handler is a bounded database transaction; Approve and
//! Inspect additionally run behind the serialization-retry boundary in
//! [`crate::store::retry`].

mod approve;
mod close;
mod inspect;
mod receive;
mod reject;
mod submit;

pub use approve::ApproveCommand;
pub use inspect::InspectCommand;
pub use submit::{SubmitAttachment, SubmitCommand};

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::ticket::{Ticket, TicketAttachment};
use crate::error::Result;
use crate::store::{orders, tickets};

/// The authenticated caller, resolved by the outer HTTP boundary. Customer
/// ids and staff ids share one identifier space.
#[derive(Clone, Copy, Debug)]
pub struct Actor {
    pub id: Uuid,
}

/// One of the engine's mutating operations.
#[derive(Debug)]
pub enum Command {
    Submit(SubmitCommand),
    Approve(ApproveCommand),
    Receive { ticket_id: Uuid },
    Inspect(InspectCommand),
    Reject { ticket_id: Uuid, reason: String },
    Close { ticket_id: Uuid },
}

/// Ticket detail projection returned by every command and by the read API.
#[derive(Clone, Debug, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub attachments: Vec<TicketAttachment>,
    /// The order line(s) the ticket applies to; all lines for an order-wide
    /// claim.
    pub items: Vec<orders::OrderItem>,
}

#[derive(Clone)]
pub struct AfterSalesEngine {
    pool: PgPool,
    events: Option<async_nats::Client>,
}

impl AfterSalesEngine {
    pub fn new(pool: PgPool, events: Option<async_nats::Client>) -> Self {
        Self { pool, events }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[tracing::instrument(skip(self, command), fields(actor = %actor.id))]
    pub async fn execute(&self, actor: Actor, command: Command) -> Result<TicketDetail> {
        match command {
            Command::Submit(cmd) => self.submit(actor, cmd).await,
            Command::Approve(cmd) => self.approve(actor, cmd).await,
            Command::Receive { ticket_id } => self.receive(actor, ticket_id).await,
            Command::Inspect(cmd) => self.inspect(actor, cmd).await,
            Command::Reject { ticket_id, reason } => self.reject(actor, ticket_id, reason).await,
            Command::Close { ticket_id } => self.close(actor, ticket_id).await,
        }
    }

    /// Read-only detail projection.
    pub async fn ticket_detail(&self, ticket_id: Uuid) -> Result<TicketDetail> {
        let mut tx = self.pool.begin().await?;
        let ticket = tickets::fetch(&mut tx, ticket_id).await?;
        let detail = load_detail(&mut tx, ticket).await?;
        tx.commit().await?;
        Ok(detail)
    }

    pub async fn list_tickets(&self, filter: &tickets::TicketFilter) -> Result<Vec<Ticket>> {
        tickets::list(&self.pool, filter).await
    }

    pub async fn count_tickets(&self, filter: &tickets::TicketFilter) -> Result<i64> {
        tickets::count(&self.pool, filter).await
    }

    /// Best-effort event publication after commit. Failures are logged, never
    /// surfaced: the durable state has already been committed.
    pub(crate) async fn publish_event(&self, event: &str, detail: &TicketDetail) {
        let Some(client) = &self.events else { return };
        let subject = format!("aftersales.ticket.{event}");
        match serde_json::to_vec(detail) {
            Ok(payload) => {
                if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                    tracing::warn!(subject, error = %e, "event publish failed");
                }
            }
            Err(e) => tracing::warn!(subject, error = %e, "event serialization failed"),
        }
    }
}

/// Assembles the detail projection inside the caller's transaction so it
/// reflects the state being committed.
pub(crate) async fn load_detail(
    tx: &mut Transaction<'_, Postgres>,
    ticket: Ticket,
) -> Result<TicketDetail> {
    let attachments = tickets::attachments(tx, ticket.id).await?;
    let items = scoped_items(tx, &ticket).await?;
    Ok(TicketDetail {
        ticket,
        attachments,
        items,
    })
}

/// The order line(s) in scope: the referenced item, or every item of the
/// order for a whole-order claim.
pub(crate) async fn scoped_items(
    tx: &mut Transaction<'_, Postgres>,
    ticket: &Ticket,
) -> Result<Vec<orders::OrderItem>> {
    match ticket.order_item_id {
        Some(item_id) => Ok(orders::fetch_item(tx, item_id).await?.into_iter().collect()),
        None => orders::fetch_items(tx, ticket.order_id).await,
    }
}
