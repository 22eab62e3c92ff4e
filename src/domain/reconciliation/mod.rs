//! Reconciliation domain module - the core state machine driver.
//!
//! Reconciliation is the act of applying a verification verdict to
//! advance (or safely no-op) an order's state, exactly once per
//! settled transaction.

mod engine;
mod errors;
mod outcome;

pub use engine::ReconciliationEngine;
pub use errors::ReconcileError;
pub use outcome::ReconcileOutcome;
