//! CreateOrderHandler - Command handler for starting a purchase.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::foundation::{CourseId, Timestamp, UserId};
use crate::domain::order::{OrderStatus, PaymentMethod, PaymentOrder, PlanType};
use crate::ports::{
    AllocationError, CheckoutGateway, CheckoutOrderRequest, GatewayError, LedgerError,
    Notification, NotificationDispatcher, OrderLedger, PaymentLinkRequest, ReferenceAllocator,
};

/// Retries of the allocate+insert pair on a reference collision that
/// slipped past the allocator's own check.
const INSERT_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum CreateOrderError {
    /// In-app purchase orders are created by receipt submission, not
    /// up front.
    #[error("orders cannot be created up front for {0}")]
    UnsupportedMethod(PaymentMethod),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Command to start a purchase over checkout or a payment link.
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub plan_type: PlanType,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
}

/// Result of successful order creation.
#[derive(Debug, Clone)]
pub struct CreateOrderResult {
    pub order: PaymentOrder,
    /// Gateway-side checkout order id, for the hosted-checkout flow.
    pub gateway_order_id: Option<String>,
    /// Short URL of the provisioned link, for the link flow.
    pub link_url: Option<String>,
}

/// Handler for starting a purchase.
///
/// Allocates the external reference, persists the order, and
/// provisions the gateway-side artifact for the chosen channel. For
/// the link flow the order additionally moves to LinkRequested with
/// its expiry recorded, and the user is notified.
pub struct CreateOrderHandler {
    ledger: Arc<dyn OrderLedger>,
    allocator: Arc<dyn ReferenceAllocator>,
    gateway: Arc<dyn CheckoutGateway>,
    notifications: Arc<dyn NotificationDispatcher>,
    link_ttl_days: i64,
}

impl CreateOrderHandler {
    pub fn new(
        ledger: Arc<dyn OrderLedger>,
        allocator: Arc<dyn ReferenceAllocator>,
        gateway: Arc<dyn CheckoutGateway>,
        notifications: Arc<dyn NotificationDispatcher>,
        link_ttl_days: i64,
    ) -> Self {
        Self {
            ledger,
            allocator,
            gateway,
            notifications,
            link_ttl_days,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateOrderCommand,
    ) -> Result<CreateOrderResult, CreateOrderError> {
        if !cmd.payment_method.allocates_reference() {
            return Err(CreateOrderError::UnsupportedMethod(cmd.payment_method));
        }

        // 1. Allocate a reference and persist the order. The unique
        //    index is the final arbiter; collide and draw again.
        let order = self.insert_with_fresh_reference(&cmd).await?;

        // 2. Provision the gateway-side artifact for the channel.
        match cmd.payment_method {
            PaymentMethod::GatewayCheckout => self.provision_checkout(order).await,
            PaymentMethod::PaymentLink => self.provision_link(order).await,
            PaymentMethod::InAppPurchase => {
                Err(CreateOrderError::UnsupportedMethod(cmd.payment_method))
            }
        }
    }

    async fn insert_with_fresh_reference(
        &self,
        cmd: &CreateOrderCommand,
    ) -> Result<PaymentOrder, CreateOrderError> {
        let mut last_collision = None;
        for _ in 0..INSERT_ATTEMPTS {
            let reference = self.allocator.allocate(cmd.payment_method).await?;
            let order = PaymentOrder::new(
                cmd.user_id.clone(),
                cmd.course_id,
                cmd.plan_type,
                cmd.amount,
                cmd.currency.clone(),
                cmd.payment_method,
                Some(reference),
            );

            match self.ledger.insert(order.clone()).await {
                Ok(()) => {
                    tracing::info!(
                        order_id = %order.order_id,
                        method = %cmd.payment_method,
                        "order created"
                    );
                    return Ok(order);
                }
                Err(LedgerError::DuplicateReference(reference)) => {
                    tracing::debug!(%reference, "reference raced, reallocating");
                    last_collision = Some(LedgerError::DuplicateReference(reference));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_collision
            .unwrap_or_else(|| LedgerError::Storage("insert retries exhausted".to_string()))
            .into())
    }

    /// Marks an order whose gateway artifact could not be provisioned
    /// as Failed. The caller surfaces the original gateway error; a
    /// ledger failure here is logged and swallowed because it must not
    /// mask the cause.
    async fn fail_unprovisioned(
        &self,
        order: &PaymentOrder,
        cause: GatewayError,
    ) -> CreateOrderError {
        tracing::warn!(order_id = %order.order_id, error = %cause, "gateway provisioning failed");
        match self
            .ledger
            .transition(&order.order_id, &[OrderStatus::Created], OrderStatus::Failed)
            .await
        {
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    order_id = %order.order_id,
                    error = %e,
                    "could not mark unprovisioned order as failed"
                );
            }
        }
        cause.into()
    }

    async fn provision_checkout(
        &self,
        order: PaymentOrder,
    ) -> Result<CreateOrderResult, CreateOrderError> {
        let reference = order
            .reference_id
            .clone()
            .ok_or_else(|| LedgerError::Storage("checkout order missing reference".to_string()))?;

        let provisioned = self
            .gateway
            .create_checkout_order(CheckoutOrderRequest {
                reference,
                amount: order.amount,
                currency: order.currency.clone(),
            })
            .await;
        let gateway_order = match provisioned {
            Ok(gateway_order) => gateway_order,
            Err(e) => return Err(self.fail_unprovisioned(&order, e).await),
        };

        Ok(CreateOrderResult {
            order,
            gateway_order_id: Some(gateway_order.gateway_order_id),
            link_url: None,
        })
    }

    async fn provision_link(
        &self,
        order: PaymentOrder,
    ) -> Result<CreateOrderResult, CreateOrderError> {
        let reference = order
            .reference_id
            .clone()
            .ok_or_else(|| LedgerError::Storage("link order missing reference".to_string()))?;
        let expires_at = Timestamp::now().add_days(self.link_ttl_days);

        let provisioned = self
            .gateway
            .create_payment_link(PaymentLinkRequest {
                reference: reference.clone(),
                amount: order.amount,
                currency: order.currency.clone(),
                description: format!("Course access ({})", order.plan_type),
                expires_at,
            })
            .await;
        let link = match provisioned {
            Ok(link) => link,
            Err(e) => return Err(self.fail_unprovisioned(&order, e).await),
        };

        // Dispatch was attempted; the order leaves Created even if the
        // notification itself fails downstream.
        let order = match self
            .ledger
            .mark_link_requested(&order.order_id, expires_at)
            .await?
        {
            crate::ports::TransitionOutcome::Applied(order) => order,
            crate::ports::TransitionOutcome::Stale { current } => {
                // Only reachable if something else raced the fresh order.
                tracing::warn!(
                    order_id = %order.order_id,
                    %current,
                    "fresh link order not in Created"
                );
                order
            }
        };

        if let Err(reason) = self
            .notifications
            .dispatch(Notification::PaymentLinkIssued {
                user_id: order.user_id.clone(),
                reference,
                link_url: link.url.clone(),
                amount: order.amount,
                currency: order.currency.clone(),
                plan_type: order.plan_type,
                expires_at,
            })
            .await
        {
            tracing::warn!(order_id = %order.order_id, %reason, "link notification failed");
        }

        Ok(CreateOrderResult {
            order,
            gateway_order_id: None,
            link_url: Some(link.url),
        })
    }
}
