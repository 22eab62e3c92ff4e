//! Payment verifier port - the per-channel verification contract.
//!
//! One implementation exists per payment channel (hosted checkout,
//! payment link, in-app purchase), selected by [`PaymentMethod`]. The
//! reconciliation engine depends only on this contract and never
//! branches on gateway identity.
//!
//! Verifier calls may block on external services; they are always made
//! *before* any per-order exclusivity is acquired so a slow remote
//! call cannot hold a lock.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::order::PaymentMethod;
use crate::domain::verification::VerifiedEvent;

/// Errors for payloads that cannot be tied to any order at all.
///
/// A payload that fails signature verification or cannot be parsed is
/// untrusted input; nothing in the ledger may be touched on its
/// account. Definitive negatives about a *resolvable* order are
/// expressed as [`Verdict::Invalid`](crate::domain::verification::Verdict)
/// instead.
#[derive(Debug, Clone, Error)]
pub enum VerifierError {
    #[error("signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Port for verifying raw inbound confirmation payloads.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// The payment channel this verifier handles.
    fn method(&self) -> PaymentMethod;

    /// Verifies a raw payload and produces a verdict plus order
    /// resolution. Remote failures surface as a Transient verdict,
    /// never as an error.
    async fn verify(&self, raw_payload: &[u8]) -> Result<VerifiedEvent, VerifierError>;
}
