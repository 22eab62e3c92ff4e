//! Random reference allocator.
//!
//! Issues channel-prefixed tokens of the form `ord_3f9a1c2e` or
//! `link_3f9a1c2e`: eight hex characters drawn from a fresh UUID. The
//! ledger is consulted before a token is handed out, and the unique
//! constraint on the reference column backstops the residual race
//! between check and insert.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::foundation::ReferenceId;
use crate::domain::order::PaymentMethod;
use crate::ports::{AllocationError, OrderLedger, ReferenceAllocator};

use std::sync::Arc;

const MAX_ATTEMPTS: u32 = 8;
const TOKEN_BYTES: usize = 4;

pub struct RandomReferenceAllocator {
    ledger: Arc<dyn OrderLedger>,
}

impl RandomReferenceAllocator {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        Self { ledger }
    }

    fn prefix(method: PaymentMethod) -> &'static str {
        match method {
            PaymentMethod::GatewayCheckout => "ord_",
            PaymentMethod::PaymentLink => "link_",
            // In-app purchases normally carry no reference; a token is
            // still issued if one is requested.
            PaymentMethod::InAppPurchase => "iap_",
        }
    }

    fn candidate(method: PaymentMethod) -> ReferenceId {
        let uuid = Uuid::new_v4();
        let token = hex::encode(&uuid.as_bytes()[..TOKEN_BYTES]);
        ReferenceId::new(format!("{}{}", Self::prefix(method), token))
            .expect("prefixed token is never empty")
    }
}

#[async_trait]
impl ReferenceAllocator for RandomReferenceAllocator {
    async fn allocate(&self, method: PaymentMethod) -> Result<ReferenceId, AllocationError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = Self::candidate(method);

            let taken = self
                .ledger
                .find_by_reference(&candidate)
                .await
                .map_err(|e| AllocationError::Storage(e.to_string()))?
                .is_some();

            if !taken {
                return Ok(candidate);
            }
            tracing::debug!(
                reference = %candidate,
                attempt,
                "reference collision, drawing again"
            );
        }

        tracing::error!(attempts = MAX_ATTEMPTS, "reference space exhausted");
        Err(AllocationError::Exhausted {
            attempts: MAX_ATTEMPTS,
        })
    }
}
