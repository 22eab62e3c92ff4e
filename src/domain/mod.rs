//! Domain layer - entities, state machines, and the reconciliation core.

pub mod enrollment;
pub mod foundation;
pub mod order;
pub mod reconciliation;
pub mod verification;
