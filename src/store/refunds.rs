//! Payment lookup and refund ledger persistence.
//!
//! The payment row is locked before the cumulative-refund total is read so
//! concurrent cap checks serialize on it.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::refund::{Payment, Refund};
use crate::error::Result;

/// Latest completed payment for an order, locked `FOR UPDATE`.
pub async fn lock_latest_completed_payment(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT id, order_id, amount, status, created_at
         FROM payments
         WHERE order_id = $1 AND status = 'completed'
         ORDER BY created_at DESC
         LIMIT 1
         FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(payment)
}

/// Sum of refunds counting against the cap, read under the payment lock.
pub async fn refunded_total(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
) -> Result<i64> {
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0)
         FROM refunds
         WHERE payment_id = $1 AND status != 'rejected'",
    )
    .bind(payment_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(total)
}

/// Inserts a pending refund linked to the ticket that produced it.
pub async fn insert_refund(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
    ticket_id: Uuid,
    amount: i64,
) -> Result<Refund> {
    let refund = sqlx::query_as::<_, Refund>(
        "INSERT INTO refunds (id, payment_id, ticket_id, amount, status, created_at)
         VALUES ($1, $2, $3, $4, 'pending', NOW())
         RETURNING id, payment_id, ticket_id, amount, status, created_at",
    )
    .bind(Uuid::now_v7())
    .bind(payment_id)
    .bind(ticket_id)
    .bind(amount)
    .fetch_one(&mut **tx)
    .await?;
    Ok(refund)
}
