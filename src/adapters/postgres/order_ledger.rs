//! PostgreSQL implementation of the order ledger.
//!
//! Per-order exclusivity comes from row-level locks: every write path
//! re-reads the order under `SELECT ... FOR UPDATE` inside a
//! transaction, so concurrent workers serialize on the row rather
//! than on anything in-process. The unique indexes on `reference_id`,
//! `gateway_transaction_id` and `enrollments.source_order_id` backstop
//! the same invariants declaratively.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE payment_orders (
//!     id UUID PRIMARY KEY,
//!     reference_id TEXT UNIQUE,
//!     user_id TEXT NOT NULL,
//!     course_id UUID NOT NULL,
//!     plan_type TEXT NOT NULL,
//!     amount NUMERIC(12, 2) NOT NULL,
//!     currency TEXT NOT NULL,
//!     payment_method TEXT NOT NULL,
//!     gateway_transaction_id TEXT UNIQUE,
//!     status TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     paid_at TIMESTAMPTZ,
//!     expires_at TIMESTAMPTZ
//! );
//!
//! CREATE TABLE enrollments (
//!     id UUID PRIMARY KEY,
//!     user_id TEXT NOT NULL,
//!     course_id UUID NOT NULL,
//!     plan_type TEXT NOT NULL,
//!     granted_at TIMESTAMPTZ NOT NULL,
//!     access_until TIMESTAMPTZ,
//!     source_order_id UUID NOT NULL UNIQUE REFERENCES payment_orders (id)
//! );
//!
//! CREATE TABLE iap_receipts (
//!     order_id UUID PRIMARY KEY REFERENCES payment_orders (id),
//!     raw_payload TEXT NOT NULL,
//!     verification_response JSONB NOT NULL,
//!     is_valid BOOLEAN NOT NULL,
//!     environment TEXT NOT NULL,
//!     verified_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::enrollment::{Enrollment, NewEnrollment};
use crate::domain::foundation::{
    CourseId, EnrollmentId, OrderId, ReferenceId, StateMachine, Timestamp, TransactionId, UserId,
};
use crate::domain::order::{
    OrderStatus, PaymentMethod, PaymentOrder, PlanType, Receipt, ReceiptEnvironment,
};
use crate::ports::{GrantOutcome, LedgerError, OrderLedger, PaidCompletion, TransitionOutcome};

/// PostgreSQL implementation of the OrderLedger port.
pub struct PostgresOrderLedger {
    pool: PgPool,
}

impl PostgresOrderLedger {
    /// Creates a new PostgresOrderLedger with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment order.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    reference_id: Option<String>,
    user_id: String,
    course_id: Uuid,
    plan_type: String,
    amount: Decimal,
    currency: String,
    payment_method: String,
    gateway_transaction_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for PaymentOrder {
    type Error = LedgerError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(PaymentOrder {
            order_id: OrderId::from_uuid(row.id),
            reference_id: row
                .reference_id
                .map(ReferenceId::new)
                .transpose()
                .map_err(|e| LedgerError::Storage(format!("invalid reference_id: {e}")))?,
            user_id: UserId::new(row.user_id)
                .map_err(|e| LedgerError::Storage(format!("invalid user_id: {e}")))?,
            course_id: CourseId::from_uuid(row.course_id),
            plan_type: parse_plan_type(&row.plan_type)?,
            amount: row.amount,
            currency: row.currency,
            payment_method: parse_payment_method(&row.payment_method)?,
            gateway_transaction_id: row
                .gateway_transaction_id
                .map(TransactionId::new)
                .transpose()
                .map_err(|e| LedgerError::Storage(format!("invalid transaction_id: {e}")))?,
            status: parse_status(&row.status)?,
            created_at: Timestamp::from_datetime(row.created_at),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            expires_at: row.expires_at.map(Timestamp::from_datetime),
        })
    }
}

/// Database row representation of an enrollment.
#[derive(Debug, sqlx::FromRow)]
struct EnrollmentRow {
    id: Uuid,
    user_id: String,
    course_id: Uuid,
    plan_type: String,
    granted_at: DateTime<Utc>,
    access_until: Option<DateTime<Utc>>,
    source_order_id: Uuid,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = LedgerError;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        Ok(Enrollment {
            enrollment_id: EnrollmentId::from_uuid(row.id),
            user_id: UserId::new(row.user_id)
                .map_err(|e| LedgerError::Storage(format!("invalid user_id: {e}")))?,
            course_id: CourseId::from_uuid(row.course_id),
            plan_type: parse_plan_type(&row.plan_type)?,
            granted_at: Timestamp::from_datetime(row.granted_at),
            access_until: row.access_until.map(Timestamp::from_datetime),
            source_order_id: OrderId::from_uuid(row.source_order_id),
        })
    }
}

/// Database row representation of a receipt audit record.
#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    order_id: Uuid,
    raw_payload: String,
    verification_response: serde_json::Value,
    is_valid: bool,
    environment: String,
    verified_at: DateTime<Utc>,
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = LedgerError;

    fn try_from(row: ReceiptRow) -> Result<Self, Self::Error> {
        Ok(Receipt {
            order_id: OrderId::from_uuid(row.order_id),
            raw_payload: row.raw_payload,
            verification_response: row.verification_response,
            is_valid: row.is_valid,
            environment: parse_environment(&row.environment)?,
            verified_at: Timestamp::from_datetime(row.verified_at),
        })
    }
}

fn parse_status(s: &str) -> Result<OrderStatus, LedgerError> {
    match s {
        "CREATED" => Ok(OrderStatus::Created),
        "LINK_REQUESTED" => Ok(OrderStatus::LinkRequested),
        "PAID" => Ok(OrderStatus::Paid),
        "FAILED" => Ok(OrderStatus::Failed),
        "REFUNDED" => Ok(OrderStatus::Refunded),
        "LINK_EXPIRED" => Ok(OrderStatus::LinkExpired),
        _ => Err(LedgerError::Storage(format!("invalid status value: {s}"))),
    }
}

fn parse_payment_method(s: &str) -> Result<PaymentMethod, LedgerError> {
    match s {
        "GATEWAY_CHECKOUT" => Ok(PaymentMethod::GatewayCheckout),
        "PAYMENT_LINK" => Ok(PaymentMethod::PaymentLink),
        "IN_APP_PURCHASE" => Ok(PaymentMethod::InAppPurchase),
        _ => Err(LedgerError::Storage(format!(
            "invalid payment method value: {s}"
        ))),
    }
}

fn parse_plan_type(s: &str) -> Result<PlanType, LedgerError> {
    s.parse()
        .map_err(|e: String| LedgerError::Storage(format!("invalid plan type value: {e}")))
}

fn parse_environment(s: &str) -> Result<ReceiptEnvironment, LedgerError> {
    match s {
        "PRODUCTION" => Ok(ReceiptEnvironment::Production),
        "SANDBOX" => Ok(ReceiptEnvironment::Sandbox),
        _ => Err(LedgerError::Storage(format!(
            "invalid environment value: {s}"
        ))),
    }
}

fn storage_error(e: sqlx::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

fn violates_unique(e: &sqlx::Error, column: &str) -> bool {
    e.as_database_error()
        .and_then(|db| db.constraint())
        .is_some_and(|c| c.contains(column))
}

/// How an incoming transaction relates to an order that is already
/// Paid when locked. Paid rows reached through the order id rather
/// than the transaction index can still carry the incoming id: two
/// workers that both passed the index check serialize on the row, and
/// the loser re-reads it after the winner's commit.
#[derive(Debug, PartialEq)]
enum SettledDisposition {
    /// Same transaction redelivered; resolves idempotently.
    Duplicate,
    /// Paid under a different transaction id; integrity conflict.
    Conflict(TransactionId),
    /// Paid with no recorded transaction id; left for manual review.
    Unbound,
}

fn settled_disposition(
    existing: Option<&TransactionId>,
    incoming: &TransactionId,
) -> SettledDisposition {
    match existing {
        Some(existing) if existing == incoming => SettledDisposition::Duplicate,
        Some(existing) => SettledDisposition::Conflict(existing.clone()),
        None => SettledDisposition::Unbound,
    }
}

const SELECT_ORDER: &str = r#"
    SELECT id, reference_id, user_id, course_id, plan_type, amount, currency,
           payment_method, gateway_transaction_id, status, created_at, paid_at, expires_at
    FROM payment_orders
"#;

impl PostgresOrderLedger {
    async fn fetch_order_for_update(
        conn: &mut PgConnection,
        order_id: &OrderId,
    ) -> Result<Option<PaymentOrder>, LedgerError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("{SELECT_ORDER} WHERE id = $1 FOR UPDATE"))
                .bind(order_id.as_uuid())
                .fetch_optional(conn)
                .await
                .map_err(storage_error)?;
        row.map(PaymentOrder::try_from).transpose()
    }

    async fn fetch_order_by_transaction_for_update(
        conn: &mut PgConnection,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentOrder>, LedgerError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "{SELECT_ORDER} WHERE gateway_transaction_id = $1 FOR UPDATE"
        ))
        .bind(transaction_id.as_str())
        .fetch_optional(conn)
        .await
        .map_err(storage_error)?;
        row.map(PaymentOrder::try_from).transpose()
    }

    /// Idempotent grant keyed on `source_order_id`, runnable inside an
    /// enclosing transaction.
    async fn grant_on(
        conn: &mut PgConnection,
        enrollment: NewEnrollment,
    ) -> Result<GrantOutcome, LedgerError> {
        let candidate = enrollment.into_enrollment();

        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (id, user_id, course_id, plan_type, granted_at, access_until, source_order_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_order_id) DO NOTHING
            "#,
        )
        .bind(candidate.enrollment_id.as_uuid())
        .bind(candidate.user_id.as_str())
        .bind(candidate.course_id.as_uuid())
        .bind(candidate.plan_type.as_str())
        .bind(candidate.granted_at.as_datetime())
        .bind(candidate.access_until.map(|t| *t.as_datetime()))
        .bind(candidate.source_order_id.as_uuid())
        .execute(&mut *conn)
        .await
        .map_err(storage_error)?;

        if inserted.rows_affected() == 1 {
            return Ok(GrantOutcome::Granted(candidate));
        }

        let existing = Self::find_enrollment_on(conn, &candidate.source_order_id)
            .await?
            .ok_or_else(|| {
                LedgerError::Storage("enrollment vanished between insert and read".to_string())
            })?;
        Ok(GrantOutcome::Existing(existing))
    }

    async fn find_enrollment_on(
        conn: &mut PgConnection,
        order_id: &OrderId,
    ) -> Result<Option<Enrollment>, LedgerError> {
        let row: Option<EnrollmentRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, course_id, plan_type, granted_at, access_until, source_order_id
            FROM enrollments
            WHERE source_order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(conn)
        .await
        .map_err(storage_error)?;
        row.map(Enrollment::try_from).transpose()
    }

    async fn apply_status(
        conn: &mut PgConnection,
        order: &PaymentOrder,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE payment_orders
            SET status = $2, gateway_transaction_id = $3, paid_at = $4, expires_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order.order_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.gateway_transaction_id.as_ref().map(|t| t.as_str()))
        .bind(order.paid_at.map(|t| *t.as_datetime()))
        .bind(order.expires_at.map(|t| *t.as_datetime()))
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Resolves a transaction already bound to some order, granting
    /// idempotently when that order is Paid. `None` means the
    /// transaction index matched nothing.
    async fn settle_by_transaction(
        conn: &mut PgConnection,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaidCompletion>, LedgerError> {
        let Some(winner) =
            Self::fetch_order_by_transaction_for_update(conn, transaction_id).await?
        else {
            return Ok(None);
        };

        if winner.status != OrderStatus::Paid {
            return Ok(Some(PaidCompletion::Stale {
                current: winner.status,
            }));
        }

        let grant = Self::grant_on(
            conn,
            NewEnrollment {
                user_id: winner.user_id.clone(),
                course_id: winner.course_id,
                plan_type: winner.plan_type,
                source_order_id: winner.order_id,
            },
        )
        .await?;
        Ok(Some(PaidCompletion::AlreadyPaid {
            order: winner,
            enrollment: grant.into_enrollment(),
        }))
    }
}

#[async_trait]
impl OrderLedger for PostgresOrderLedger {
    async fn insert(&self, order: PaymentOrder) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_orders (
                id, reference_id, user_id, course_id, plan_type, amount, currency,
                payment_method, gateway_transaction_id, status, created_at, paid_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.order_id.as_uuid())
        .bind(order.reference_id.as_ref().map(|r| r.as_str()))
        .bind(order.user_id.as_str())
        .bind(order.course_id.as_uuid())
        .bind(order.plan_type.as_str())
        .bind(order.amount)
        .bind(&order.currency)
        .bind(order.payment_method.as_str())
        .bind(order.gateway_transaction_id.as_ref().map(|t| t.as_str()))
        .bind(order.status.as_str())
        .bind(order.created_at.as_datetime())
        .bind(order.paid_at.map(|t| *t.as_datetime()))
        .bind(order.expires_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if violates_unique(&e, "reference_id") {
                    // Reference uniqueness is the allocator's retry signal.
                    if let Some(reference) = order.reference_id {
                        return Err(LedgerError::DuplicateReference(reference));
                    }
                }
                Err(storage_error(e))
            }
        }
    }

    async fn find_by_id(&self, order_id: &OrderId) -> Result<Option<PaymentOrder>, LedgerError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.map(PaymentOrder::try_from).transpose()
    }

    async fn find_by_reference(
        &self,
        reference: &ReferenceId,
    ) -> Result<Option<PaymentOrder>, LedgerError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("{SELECT_ORDER} WHERE reference_id = $1"))
                .bind(reference.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;
        row.map(PaymentOrder::try_from).transpose()
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentOrder>, LedgerError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("{SELECT_ORDER} WHERE gateway_transaction_id = $1"))
                .bind(transaction_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;
        row.map(PaymentOrder::try_from).transpose()
    }

    async fn complete_payment(
        &self,
        order_id: &OrderId,
        transaction_id: TransactionId,
        paid_at: Timestamp,
        enrollment: NewEnrollment,
    ) -> Result<PaidCompletion, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // Settled-transaction re-check under lock: the fast path the
        // engine ran before calling us is not authoritative.
        if let Some(settled) = Self::settle_by_transaction(&mut tx, &transaction_id).await? {
            tx.commit().await.map_err(storage_error)?;
            return Ok(settled);
        }

        let mut order = Self::fetch_order_for_update(&mut tx, order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(*order_id))?;

        if order.status == OrderStatus::Paid {
            // The row settled between the index check and this lock.
            return match settled_disposition(order.gateway_transaction_id.as_ref(), &transaction_id)
            {
                SettledDisposition::Duplicate => {
                    let grant = Self::grant_on(&mut tx, enrollment).await?;
                    tx.commit().await.map_err(storage_error)?;
                    Ok(PaidCompletion::AlreadyPaid {
                        order,
                        enrollment: grant.into_enrollment(),
                    })
                }
                SettledDisposition::Conflict(existing) => {
                    Ok(PaidCompletion::Conflict { existing })
                }
                SettledDisposition::Unbound => Ok(PaidCompletion::Stale {
                    current: order.status,
                }),
            };
        }

        if !order.status.accepts_payment() {
            return Ok(PaidCompletion::Stale {
                current: order.status,
            });
        }

        order
            .mark_paid(transaction_id.clone(), paid_at)
            .map_err(|e| LedgerError::Storage(format!("illegal paid transition: {e}")))?;
        if let Err(e) = Self::apply_status(&mut tx, &order).await {
            if violates_unique(&e, "gateway_transaction_id") {
                // Lost to a concurrent worker settling the same
                // transaction on another order (asserted receipt
                // resubmission). Its commit released our blocked
                // update, so a fresh read resolves it.
                drop(tx);
                let mut retry = self.pool.begin().await.map_err(storage_error)?;
                if let Some(settled) =
                    Self::settle_by_transaction(&mut retry, &transaction_id).await?
                {
                    retry.commit().await.map_err(storage_error)?;
                    return Ok(settled);
                }
                return Err(LedgerError::Storage(
                    "transaction settled concurrently but no longer visible".to_string(),
                ));
            }
            return Err(storage_error(e));
        }

        let grant = Self::grant_on(&mut tx, enrollment).await?;
        tx.commit().await.map_err(storage_error)?;

        Ok(PaidCompletion::Completed {
            order,
            enrollment: grant.into_enrollment(),
        })
    }

    async fn transition(
        &self,
        order_id: &OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<TransitionOutcome, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let mut order = Self::fetch_order_for_update(&mut tx, order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(*order_id))?;

        if !allowed_from.contains(&order.status) {
            return Ok(TransitionOutcome::Stale {
                current: order.status,
            });
        }

        let next = order
            .status
            .transition_to(to)
            .map_err(|e| LedgerError::Storage(format!("illegal transition: {e}")))?;
        order.status = next;
        Self::apply_status(&mut tx, &order).await.map_err(storage_error)?;
        tx.commit().await.map_err(storage_error)?;

        Ok(TransitionOutcome::Applied(order))
    }

    async fn mark_link_requested(
        &self,
        order_id: &OrderId,
        expires_at: Timestamp,
    ) -> Result<TransitionOutcome, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let mut order = Self::fetch_order_for_update(&mut tx, order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(*order_id))?;

        if order.status != OrderStatus::Created {
            return Ok(TransitionOutcome::Stale {
                current: order.status,
            });
        }

        order
            .mark_link_requested(expires_at)
            .map_err(|e| LedgerError::Storage(format!("illegal transition: {e}")))?;
        Self::apply_status(&mut tx, &order).await.map_err(storage_error)?;
        tx.commit().await.map_err(storage_error)?;

        Ok(TransitionOutcome::Applied(order))
    }

    async fn grant_enrollment(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<GrantOutcome, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        Self::grant_on(&mut conn, enrollment).await
    }

    async fn find_enrollment_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Enrollment>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        Self::find_enrollment_on(&mut conn, order_id).await
    }

    async fn save_receipt(&self, receipt: Receipt) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO iap_receipts (
                order_id, raw_payload, verification_response, is_valid, environment, verified_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id) DO UPDATE
            SET verification_response = EXCLUDED.verification_response,
                is_valid = EXCLUDED.is_valid,
                environment = EXCLUDED.environment,
                verified_at = EXCLUDED.verified_at
            "#,
        )
        .bind(receipt.order_id.as_uuid())
        .bind(&receipt.raw_payload)
        .bind(&receipt.verification_response)
        .bind(receipt.is_valid)
        .bind(receipt.environment.as_str())
        .bind(receipt.verified_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn find_receipt(&self, order_id: &OrderId) -> Result<Option<Receipt>, LedgerError> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            r#"
            SELECT order_id, raw_payload, verification_response, is_valid, environment, verified_at
            FROM iap_receipts
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(Receipt::try_from).transpose()
    }

    async fn expired_link_candidates(
        &self,
        now: Timestamp,
    ) -> Result<Vec<PaymentOrder>, LedgerError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "{SELECT_ORDER} WHERE status = 'LINK_REQUESTED' AND expires_at < $1"
        ))
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.into_iter().map(PaymentOrder::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redelivered_transaction_on_a_paid_row_is_a_duplicate() {
        let incoming = TransactionId::new("pay_1").unwrap();
        let recorded = TransactionId::new("pay_1").unwrap();
        assert_eq!(
            settled_disposition(Some(&recorded), &incoming),
            SettledDisposition::Duplicate
        );
    }

    #[test]
    fn different_transaction_on_a_paid_row_is_a_conflict() {
        let incoming = TransactionId::new("pay_2").unwrap();
        let recorded = TransactionId::new("pay_1").unwrap();
        assert_eq!(
            settled_disposition(Some(&recorded), &incoming),
            SettledDisposition::Conflict(recorded.clone())
        );
    }

    #[test]
    fn paid_row_without_a_transaction_is_unbound() {
        let incoming = TransactionId::new("pay_1").unwrap();
        assert_eq!(
            settled_disposition(None, &incoming),
            SettledDisposition::Unbound
        );
    }

    #[test]
    fn non_database_errors_never_match_a_constraint() {
        assert!(!violates_unique(
            &sqlx::Error::RowNotFound,
            "gateway_transaction_id"
        ));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OrderStatus::Created,
            OrderStatus::LinkRequested,
            OrderStatus::Paid,
            OrderStatus::Failed,
            OrderStatus::Refunded,
            OrderStatus::LinkExpired,
        ] {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
    }
}
