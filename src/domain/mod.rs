//! Pure domain types and invariants for the after-sales engine.
//!
//! Nothing in this module performs I/O; every rule here is enforced again at
//! the storage boundary by the command handlers in [`crate::engine`].

pub mod policy;
pub mod refund;
pub mod stock;
pub mod ticket;
