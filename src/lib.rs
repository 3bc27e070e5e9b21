//! Optica After-Sales
//!
//! The after-sales resolution engine for the Optica eyewear store: it turns
//! customer return/warranty/refund claims into ticket state transitions,
//! stock ledger adjustments and refund postings that never double-apply,
//! double-refund, or race against concurrent staff actions.
//!
//! ## Modules
//!
//! - [`domain`] - Pure domain types: ticket state machine, policy windows,
//!   stock arithmetic, refund cap
//! - [`store`] - PostgreSQL access with explicit row locks and the
//!   serialization-retry boundary
//! - [`engine`] - The command handlers (Submit, Approve, Receive, Inspect,
//!   Reject, Close), each a bounded transaction
//! - [`api`] - REST routes and request DTOs
//! - [`error`] - Error taxonomy and HTTP mapping

pub mod api;
pub mod domain;
pub mod engine;
pub mod error;
pub mod store;

pub use engine::{Actor, AfterSalesEngine, Command, TicketDetail};
pub use error::{EngineError, Result};
