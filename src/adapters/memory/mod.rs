//! In-memory adapter implementations.
//!
//! Full-fidelity stand-ins for the durable backends, used by tests and
//! the development profile.

mod order_ledger;

pub use order_ledger::InMemoryOrderLedger;
