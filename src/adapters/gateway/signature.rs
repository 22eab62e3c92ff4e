//! HMAC-SHA256 signing shared by the gateway verifiers.
//!
//! # Security
//!
//! - Constant-time comparison to prevent timing attacks
//! - Secrets handled via `secrecy::SecretString`

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a provided signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Signature is not valid lowercase hex.
    MalformedHex,
    /// Signature does not match the payload.
    Mismatch,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedHex => write!(f, "signature is not valid hex"),
            Self::Mismatch => write!(f, "signature does not match payload"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// A webhook signing secret plus the operations performed with it.
#[derive(Clone)]
pub struct SignatureKey {
    secret: SecretString,
}

impl SignatureKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
        }
    }

    pub fn from_secret(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Computes the hex-encoded HMAC-SHA256 of `message`.
    pub fn sign(&self, message: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verifies a hex-encoded signature against `message` in constant
    /// time.
    pub fn verify(&self, message: &[u8], provided_hex: &str) -> Result<(), SignatureError> {
        let provided = hex::decode(provided_hex).map_err(|_| SignatureError::MalformedHex)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(message);
        let expected = mac.finalize().into_bytes();

        if expected.as_slice().ct_eq(provided.as_slice()).unwrap_u8() != 1 {
            return Err(SignatureError::Mismatch);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SignatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureKey").finish_non_exhaustive()
    }
}
