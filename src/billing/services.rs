//! Reconciliation and payment lifecycle services.
//!
//! These functions drive a [`LedgerStore`] to keep each customer's cached
//! `months_owed` and `payment_status` in step with their payments.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{NewPayment, Payment, PaymentStatus};

use super::calculators::{compute_arrears, months_detail, round_money, Arrears};
use super::store::{LedgerStore, LedgerTx};

/// Billing error types
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Customer {0} not found")]
    CustomerNotFound(Uuid),

    #[error("Payment {0} not found")]
    PaymentNotFound(Uuid),

    #[error("Customer {0} has no install date")]
    MissingInstallDate(Uuid),

    #[error("Invalid payment: {0}")]
    InvalidPayment(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(String),
}

/// Arrears of one customer as persisted by the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerArrears {
    pub customer_id: Uuid,
    pub months_elapsed: i32,
    pub total_months_paid: i32,
    pub months_owed: i32,
    pub payment_status: PaymentStatus,
}

impl CustomerArrears {
    fn new(customer_id: Uuid, arrears: Arrears) -> Self {
        Self {
            customer_id,
            months_elapsed: arrears.months_elapsed,
            total_months_paid: arrears.total_months_paid,
            months_owed: arrears.months_owed,
            payment_status: arrears.payment_status,
        }
    }
}

/// Result of recording a payment
#[derive(Debug, Clone)]
pub struct PaymentRecorded {
    pub payment: Payment,
    pub previous: CustomerArrears,
    pub arrears: CustomerArrears,
}

/// Result of deleting a payment
#[derive(Debug, Clone)]
pub struct PaymentDeleted {
    pub payment: Payment,
    pub arrears: CustomerArrears,
}

/// Counters from a batch sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub updated: usize,
    pub ahead_count: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Recompute and persist a customer's arrears inside a caller-managed transaction.
///
/// Locks the customer row, re-aggregates the paid total and writes the
/// derived fields. A missing install date is an error, which the caller must
/// let abort the transaction.
pub async fn reconcile_in_tx(
    tx: &mut dyn LedgerTx,
    customer_id: Uuid,
    today: NaiveDate,
) -> Result<CustomerArrears, BillingError> {
    let customer = tx
        .lock_customer(customer_id)
        .await?
        .ok_or(BillingError::CustomerNotFound(customer_id))?;

    let install_date = customer
        .install_date
        .ok_or(BillingError::MissingInstallDate(customer_id))?;

    let total_months_paid = tx.total_months_paid(customer_id).await?;
    let arrears = compute_arrears(install_date, today, total_months_paid);

    tx.update_arrears(customer_id, arrears.months_owed, arrears.payment_status)
        .await?;

    debug!(
        "Reconciled customer {}: elapsed={} paid={} owed={} status={}",
        customer_id,
        arrears.months_elapsed,
        arrears.total_months_paid,
        arrears.months_owed,
        arrears.payment_status
    );

    Ok(CustomerArrears::new(customer_id, arrears))
}

/// Reconcile a single customer in its own transaction.
pub async fn reconcile_customer(
    store: &dyn LedgerStore,
    customer_id: Uuid,
    today: NaiveDate,
) -> Result<CustomerArrears, BillingError> {
    let mut tx = store.begin().await?;
    let arrears = reconcile_in_tx(tx.as_mut(), customer_id, today).await?;
    tx.commit().await?;

    Ok(arrears)
}

/// Compute a customer's arrears without writing anything.
pub async fn preview_arrears(
    store: &dyn LedgerStore,
    customer_id: Uuid,
    today: NaiveDate,
) -> Result<CustomerArrears, BillingError> {
    let mut tx = store.begin().await?;

    let customer = tx
        .find_customer(customer_id)
        .await?
        .ok_or(BillingError::CustomerNotFound(customer_id))?;

    let install_date = customer
        .install_date
        .ok_or(BillingError::MissingInstallDate(customer_id))?;

    let total_months_paid = tx.total_months_paid(customer_id).await?;

    Ok(CustomerArrears::new(
        customer_id,
        compute_arrears(install_date, today, total_months_paid),
    ))
}

enum SweepOutcome {
    Updated(CustomerArrears),
    Skipped(&'static str),
}

/// Reconcile every active customer.
///
/// Each customer gets its own transaction, so one bad row never rolls back
/// the others. Customers without an install date are skipped; any other
/// per-customer failure is logged and counted.
pub async fn reconcile_all(
    store: &dyn LedgerStore,
    today: NaiveDate,
) -> Result<SweepSummary, BillingError> {
    let customer_ids = {
        let mut tx = store.begin().await?;
        tx.active_customer_ids().await?
    };

    info!(
        "Starting arrears sweep over {} active customers as of {}",
        customer_ids.len(),
        today
    );

    let mut summary = SweepSummary::default();

    for customer_id in customer_ids {
        match sweep_customer(store, customer_id, today).await {
            Ok(SweepOutcome::Updated(arrears)) => {
                summary.updated += 1;
                if arrears.payment_status == PaymentStatus::Ahead {
                    summary.ahead_count += 1;
                }
            }
            Ok(SweepOutcome::Skipped(reason)) => {
                warn!("Skipping customer {} in sweep: {}", customer_id, reason);
                summary.skipped += 1;
            }
            Err(e) => {
                error!("Failed to reconcile customer {}: {}", customer_id, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Arrears sweep complete: updated={} ahead={} skipped={} failed={}",
        summary.updated, summary.ahead_count, summary.skipped, summary.failed
    );

    Ok(summary)
}

async fn sweep_customer(
    store: &dyn LedgerStore,
    customer_id: Uuid,
    today: NaiveDate,
) -> Result<SweepOutcome, BillingError> {
    let mut tx = store.begin().await?;

    // Status or install date may have changed since the id list was read
    let Some(customer) = tx.lock_customer(customer_id).await? else {
        return Ok(SweepOutcome::Skipped("customer no longer exists"));
    };
    if !customer.is_active() {
        return Ok(SweepOutcome::Skipped("customer is no longer active"));
    }
    if customer.install_date.is_none() {
        return Ok(SweepOutcome::Skipped("no install date"));
    }

    let arrears = reconcile_in_tx(tx.as_mut(), customer_id, today).await?;
    tx.commit().await?;

    Ok(SweepOutcome::Updated(arrears))
}

/// Ten years of service in a single payment
pub const MAX_MONTHS_COVERED: i32 = 120;

fn validate_payment(payment: &NewPayment) -> Result<(), BillingError> {
    if payment.months_covered < 1 {
        return Err(BillingError::InvalidPayment(
            "months_covered must be at least 1".to_string(),
        ));
    }
    if payment.months_covered > MAX_MONTHS_COVERED {
        return Err(BillingError::InvalidPayment(format!(
            "months_covered must be at most {}",
            MAX_MONTHS_COVERED
        )));
    }
    if payment.amount < Decimal::ZERO {
        return Err(BillingError::InvalidPayment(
            "amount must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Record a payment and reconcile its customer in one transaction.
///
/// Nothing is persisted if the customer is unknown or has no install date.
pub async fn record_payment(
    store: &dyn LedgerStore,
    payment: NewPayment,
    today: NaiveDate,
) -> Result<PaymentRecorded, BillingError> {
    validate_payment(&payment)?;

    let payment = NewPayment {
        amount: round_money(payment.amount, 2),
        ..payment
    };
    let customer_id = payment.customer_id;

    let mut tx = store.begin().await?;

    let customer = tx
        .lock_customer(customer_id)
        .await?
        .ok_or(BillingError::CustomerNotFound(customer_id))?;
    let install_date = customer
        .install_date
        .ok_or(BillingError::MissingInstallDate(customer_id))?;

    let paid_before = tx.total_months_paid(customer_id).await?;
    let previous = CustomerArrears::new(
        customer_id,
        compute_arrears(install_date, today, paid_before),
    );

    let detail = months_detail(today, previous.months_owed, payment.months_covered);
    let stored = tx.insert_payment(&payment, &detail).await?;
    let arrears = reconcile_in_tx(tx.as_mut(), customer_id, today).await?;

    tx.commit().await?;

    info!(
        "Recorded payment {} for customer {}: {} month(s) [{}], owed {} -> {}",
        stored.id,
        customer_id,
        stored.months_covered,
        stored.months_detail,
        previous.months_owed,
        arrears.months_owed
    );

    Ok(PaymentRecorded {
        payment: stored,
        previous,
        arrears,
    })
}

/// Delete a payment and reconcile its customer in one transaction.
pub async fn delete_payment(
    store: &dyn LedgerStore,
    payment_id: Uuid,
    today: NaiveDate,
) -> Result<PaymentDeleted, BillingError> {
    let mut tx = store.begin().await?;

    let payment = tx
        .find_payment(payment_id)
        .await?
        .ok_or(BillingError::PaymentNotFound(payment_id))?;

    // Lock the owner before touching its ledger
    tx.lock_customer(payment.customer_id)
        .await?
        .ok_or(BillingError::CustomerNotFound(payment.customer_id))?;

    if !tx.delete_payment(payment_id).await? {
        return Err(BillingError::PaymentNotFound(payment_id));
    }

    let arrears = reconcile_in_tx(tx.as_mut(), payment.customer_id, today).await?;
    tx.commit().await?;

    info!(
        "Deleted payment {} for customer {}, owed now {}",
        payment_id, payment.customer_id, arrears.months_owed
    );

    Ok(PaymentDeleted { payment, arrears })
}
