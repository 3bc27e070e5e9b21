//! Data access over PostgreSQL.
//!
//! Every mutating function takes a `Transaction<'_, Postgres>` so a command
//! handler owns the transaction boundary; an uncommitted transaction rolls
//! back on drop, which is also the cancellation path.

pub mod orders;
pub mod policies;
pub mod refunds;
pub mod retry;
pub mod stock;
pub mod tickets;
