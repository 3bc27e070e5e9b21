//! Stock ledger persistence: exclusive row locks, counter updates and the
//! append-only audit transaction log.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::stock::{InventoryTxnType, StockLevel};
use crate::error::Result;

/// Loads one stock row under `FOR UPDATE`. Callers lock variants in sorted
/// order so two inspections over overlapping sets cannot deadlock each other.
pub async fn lock_level(
    tx: &mut Transaction<'_, Postgres>,
    variant_id: Uuid,
) -> Result<Option<StockLevel>> {
    let level = sqlx::query_as::<_, StockLevel>(
        "SELECT product_variant_id, quantity_on_hand, quantity_reserved
         FROM stock_levels WHERE product_variant_id = $1
         FOR UPDATE",
    )
    .bind(variant_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(level)
}

/// Writes back counters mutated in memory on a previously locked row.
pub async fn save_level(tx: &mut Transaction<'_, Postgres>, level: &StockLevel) -> Result<()> {
    sqlx::query(
        "UPDATE stock_levels
         SET quantity_on_hand = $2, quantity_reserved = $3, updated_at = NOW()
         WHERE product_variant_id = $1",
    )
    .bind(level.product_variant_id)
    .bind(level.quantity_on_hand)
    .bind(level.quantity_reserved)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Appends one audit row; every quantity change made by the engine carries
/// the ticket id as its reference.
pub async fn append_txn(
    tx: &mut Transaction<'_, Postgres>,
    variant_id: Uuid,
    txn_type: InventoryTxnType,
    quantity: i32,
    ticket_id: Uuid,
    note: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO inventory_transactions
             (id, product_variant_id, txn_type, quantity, reference_type, reference_id, note, created_at)
         VALUES ($1, $2, $3, $4, 'return', $5, $6, NOW())",
    )
    .bind(Uuid::now_v7())
    .bind(variant_id)
    .bind(txn_type)
    .bind(quantity)
    .bind(ticket_id)
    .bind(note)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
