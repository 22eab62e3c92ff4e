//! Reference allocator port.
//!
//! Issues collision-free external-facing reference tokens used to
//! correlate inbound gateway events to ledger rows.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::ReferenceId;
use crate::domain::order::PaymentMethod;

/// Errors from reference allocation.
#[derive(Debug, Clone, Error)]
pub enum AllocationError {
    /// The identifier space is provably exhausted (internal retries
    /// all collided). Practically never happens; operational alert.
    #[error("reference space exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("storage failure during allocation: {0}")]
    Storage(String),
}

/// Port for allocating externally visible order references.
///
/// Guarantees: no two allocations ever return the same value, even
/// across concurrent callers and process restarts. Implementations
/// retry internally on collision.
#[async_trait]
pub trait ReferenceAllocator: Send + Sync {
    async fn allocate(&self, method: PaymentMethod) -> Result<ReferenceId, AllocationError>;
}
