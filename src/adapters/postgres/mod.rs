//! PostgreSQL adapter implementations.

mod order_ledger;

pub use order_ledger::PostgresOrderLedger;
