//! Order status state machine.
//!
//! Defines all payment order states and the only legal transitions
//! between them. Every status mutation in the system goes through this
//! table; an illegal transition is reported as a stale no-op by the
//! ledger, never applied.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a payment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Purchase intent recorded, no payment activity yet.
    Created,

    /// A payment link was generated and dispatch to the user was
    /// attempted. Link flows only.
    LinkRequested,

    /// A valid verdict was applied. Terminal for fulfillment purposes;
    /// only a refund can move the order further.
    Paid,

    /// Gateway reported failure or verification was confirmed invalid.
    Failed,

    /// A refund event was reconciled against a paid order.
    Refunded,

    /// The payment link went unused past its expiry.
    LinkExpired,
}

impl OrderStatus {
    /// Returns true if a valid payment verdict may still be applied.
    pub fn accepts_payment(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::LinkRequested)
    }

    /// States from which the Paid transition is legal.
    pub fn payable_states() -> &'static [OrderStatus] {
        &[OrderStatus::Created, OrderStatus::LinkRequested]
    }

    /// Stable string form used in persistence and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::LinkRequested => "LINK_REQUESTED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::LinkExpired => "LINK_EXPIRED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for OrderStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Created, LinkRequested)
                | (Created, Paid)
                | (Created, Failed)
                | (LinkRequested, Paid)
                | (LinkRequested, Failed)
                | (LinkRequested, LinkExpired)
                | (Paid, Refunded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use OrderStatus::*;
        match self {
            Created => vec![LinkRequested, Paid, Failed],
            LinkRequested => vec![Paid, Failed, LinkExpired],
            Paid => vec![Refunded],
            Failed => vec![],
            Refunded => vec![],
            LinkExpired => vec![],
        }
    }
}
