//! In-app purchase adapter.

mod receipt_verifier;

pub use receipt_verifier::{IapReceiptVerifier, ReceiptVerifierConfig};
