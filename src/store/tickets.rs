//! Ticket and attachment persistence, including the exclusive ticket lock
//! every mutating command takes first.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::ticket::{
    ClaimType, ResolutionType, Ticket, TicketAttachment, TicketStatus,
};
use crate::error::{EngineError, Result};

const TICKET_COLUMNS: &str =
    "id, ticket_number, order_id, order_item_id, customer_id, assigned_staff_id,
     claim_type, status, reason, requested_action, refund_amount,
     evidence_required, policy_violation, resolution_type, staff_notes,
     received_at, resolved_at, created_at, updated_at";

pub struct NewTicket {
    pub order_id: Uuid,
    pub order_item_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub claim_type: ClaimType,
    pub status: TicketStatus,
    pub reason: String,
    pub requested_action: Option<String>,
    pub refund_amount: Option<i64>,
    pub evidence_required: bool,
    pub policy_violation: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

pub struct NewAttachment {
    pub file_name: String,
    pub url: String,
    pub extension: String,
}

/// Human-facing number derived from the random tail of the v7 id, so it is
/// as collision-free as the id itself. The timestamp-prefixed head would
/// collide for tickets created in the same millisecond.
fn ticket_number_for(id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("AS-{}", hex[20..].to_uppercase())
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, new: &NewTicket) -> Result<Ticket> {
    let id = Uuid::now_v7();
    let number = ticket_number_for(id);
    let ticket = sqlx::query_as::<_, Ticket>(&format!(
        "INSERT INTO aftersales_tickets
             (id, ticket_number, order_id, order_item_id, customer_id, claim_type,
              status, reason, requested_action, refund_amount, evidence_required,
              policy_violation, resolved_at, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
         RETURNING {TICKET_COLUMNS}"
    ))
    .bind(id)
    .bind(&number)
    .bind(new.order_id)
    .bind(new.order_item_id)
    .bind(new.customer_id)
    .bind(new.claim_type)
    .bind(new.status)
    .bind(&new.reason)
    .bind(&new.requested_action)
    .bind(new.refund_amount)
    .bind(new.evidence_required)
    .bind(&new.policy_violation)
    .bind(new.resolved_at)
    .fetch_one(&mut **tx)
    .await?;
    Ok(ticket)
}

pub async fn insert_attachments(
    tx: &mut Transaction<'_, Postgres>,
    ticket_id: Uuid,
    attachments: &[NewAttachment],
) -> Result<()> {
    for attachment in attachments {
        sqlx::query(
            "INSERT INTO ticket_attachments (id, ticket_id, file_name, url, extension)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::now_v7())
        .bind(ticket_id)
        .bind(&attachment.file_name)
        .bind(&attachment.url)
        .bind(&attachment.extension)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// True when an open (non-terminal) ticket already exists for the same
/// order + item + claim type.
pub async fn open_duplicate_exists(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    order_item_id: Option<Uuid>,
    claim: ClaimType,
) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM aftersales_tickets
         WHERE order_id = $1
           AND order_item_id IS NOT DISTINCT FROM $2
           AND claim_type = $3
           AND status NOT IN ('resolved', 'rejected', 'closed')",
    )
    .bind(order_id)
    .bind(order_item_id)
    .bind(claim)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count > 0)
}

/// Loads the ticket under an exclusive row lock; the lock is held until the
/// surrounding transaction commits or rolls back.
pub async fn lock(tx: &mut Transaction<'_, Postgres>, ticket_id: Uuid) -> Result<Ticket> {
    sqlx::query_as::<_, Ticket>(&format!(
        "SELECT {TICKET_COLUMNS} FROM aftersales_tickets WHERE id = $1 FOR UPDATE"
    ))
    .bind(ticket_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EngineError::NotFound("ticket"))
}

pub async fn fetch(tx: &mut Transaction<'_, Postgres>, ticket_id: Uuid) -> Result<Ticket> {
    sqlx::query_as::<_, Ticket>(&format!(
        "SELECT {TICKET_COLUMNS} FROM aftersales_tickets WHERE id = $1"
    ))
    .bind(ticket_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EngineError::NotFound("ticket"))
}

pub async fn attachments(
    tx: &mut Transaction<'_, Postgres>,
    ticket_id: Uuid,
) -> Result<Vec<TicketAttachment>> {
    let rows = sqlx::query_as::<_, TicketAttachment>(
        "SELECT id, ticket_id, file_name, url, extension
         FROM ticket_attachments WHERE ticket_id = $1 ORDER BY file_name",
    )
    .bind(ticket_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

/// Approval update covering both branches: RefundOnly resolves immediately,
/// the goods-handling paths move to in_progress.
#[allow(clippy::too_many_arguments)]
pub async fn apply_approval(
    tx: &mut Transaction<'_, Postgres>,
    ticket_id: Uuid,
    resolution: ResolutionType,
    status: TicketStatus,
    staff_id: Uuid,
    notes: Option<&str>,
    refund_amount: Option<i64>,
    resolved_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        "UPDATE aftersales_tickets
         SET resolution_type = $2, status = $3, assigned_staff_id = $4,
             staff_notes = COALESCE($5, staff_notes),
             refund_amount = COALESCE($6, refund_amount),
             resolved_at = $7, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(ticket_id)
    .bind(resolution)
    .bind(status)
    .bind(staff_id)
    .bind(notes)
    .bind(refund_amount)
    .bind(resolved_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn mark_received(
    tx: &mut Transaction<'_, Postgres>,
    ticket_id: Uuid,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE aftersales_tickets SET received_at = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(ticket_id)
    .bind(at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Moves the ticket into a terminal state. Used by Inspect, Reject and Close.
pub async fn finalize(
    tx: &mut Transaction<'_, Postgres>,
    ticket_id: Uuid,
    status: TicketStatus,
    staff_id: Option<Uuid>,
    notes: Option<&str>,
    refund_amount: Option<i64>,
) -> Result<()> {
    debug_assert!(status.is_terminal());
    sqlx::query(
        "UPDATE aftersales_tickets
         SET status = $2,
             assigned_staff_id = COALESCE($3, assigned_staff_id),
             staff_notes = COALESCE($4, staff_notes),
             refund_amount = COALESCE($5, refund_amount),
             resolved_at = NOW(), updated_at = NOW()
         WHERE id = $1",
    )
    .bind(ticket_id)
    .bind(status)
    .bind(staff_id)
    .bind(notes)
    .bind(refund_amount)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub struct TicketFilter {
    pub customer_id: Option<Uuid>,
    pub status: Option<TicketStatus>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn count(pool: &PgPool, filter: &TicketFilter) -> Result<i64> {
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM aftersales_tickets
         WHERE ($1::uuid IS NULL OR customer_id = $1)
           AND ($2::ticket_status IS NULL OR status = $2)",
    )
    .bind(filter.customer_id)
    .bind(filter.status)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

pub async fn list(pool: &PgPool, filter: &TicketFilter) -> Result<Vec<Ticket>> {
    let rows = sqlx::query_as::<_, Ticket>(&format!(
        "SELECT {TICKET_COLUMNS} FROM aftersales_tickets
         WHERE ($1::uuid IS NULL OR customer_id = $1)
           AND ($2::ticket_status IS NULL OR status = $2)
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(filter.customer_id)
    .bind(filter.status)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_number_takes_the_id_tail() {
        let id = Uuid::from_u128(0x1111_2222_3333_4444_5555_6666_7777_8888);
        assert_eq!(ticket_number_for(id), "AS-666677778888");
    }

    #[test]
    fn distinct_ids_give_distinct_numbers() {
        assert_ne!(
            ticket_number_for(Uuid::from_u128(1)),
            ticket_number_for(Uuid::from_u128(2))
        );
    }
}
