//! Read-side access to orders owned by the storefront service.
//!
//! The engine never mutates these tables; all reads here are snapshot reads
//! without locks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::Result;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: String,
    pub currency: String,
    pub total: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_variant_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
    pub customized: bool,
}

pub async fn fetch_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT id, order_number, customer_id, status, currency, total
         FROM orders WHERE id = $1",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(order)
}

pub async fn fetch_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_variant_id, name, sku, quantity,
                unit_price, line_total, customized
         FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(items)
}

pub async fn fetch_item(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
) -> Result<Option<OrderItem>> {
    let item = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_variant_id, name, sku, quantity,
                unit_price, line_total, customized
         FROM order_items WHERE id = $1",
    )
    .bind(item_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(item)
}

/// Most recent transition into `delivered` from the order's status audit
/// trail. `None` means delivery cannot be verified.
pub async fn delivered_at(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Option<DateTime<Utc>>> {
    let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
        "SELECT changed_at FROM order_status_history
         WHERE order_id = $1 AND status = 'delivered'
         ORDER BY changed_at DESC LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|(t,)| t))
}
