//! Transactional storage seam for the ledger.
//!
//! The reconciler never reaches for a global pool: callers hand it a
//! [`LedgerTx`] opened from a [`LedgerStore`]. Postgres and in-memory
//! implementations are provided.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Customer, NewPayment, Payment, PaymentStatus};

use super::services::BillingError;

/// Opens ledger transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Begin a new transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, BillingError>;
}

/// One open ledger transaction.
///
/// Dropping a transaction without calling [`LedgerTx::commit`] rolls it back.
#[async_trait]
pub trait LedgerTx: Send {
    /// Read a customer without locking it.
    async fn find_customer(&mut self, customer_id: Uuid) -> Result<Option<Customer>, BillingError>;

    /// Read a customer and hold a row lock on it until the transaction ends.
    async fn lock_customer(&mut self, customer_id: Uuid) -> Result<Option<Customer>, BillingError>;

    /// Sum of `months_covered` over all of the customer's payments.
    async fn total_months_paid(&mut self, customer_id: Uuid) -> Result<i32, BillingError>;

    /// Persist the derived arrears fields.
    async fn update_arrears(
        &mut self,
        customer_id: Uuid,
        months_owed: i32,
        payment_status: PaymentStatus,
    ) -> Result<(), BillingError>;

    async fn insert_payment(
        &mut self,
        payment: &NewPayment,
        months_detail: &str,
    ) -> Result<Payment, BillingError>;

    async fn find_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, BillingError>;

    /// Hard-delete a payment. Returns `false` if no row matched.
    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<bool, BillingError>;

    /// Ids of every customer whose status is `active`.
    async fn active_customer_ids(&mut self) -> Result<Vec<Uuid>, BillingError>;

    async fn commit(self: Box<Self>) -> Result<(), BillingError>;
}
