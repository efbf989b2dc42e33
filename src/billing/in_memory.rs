//! In-memory ledger store
//!
//! Suitable for development and tests. A transaction holds the store's lock
//! for its whole lifetime and works on a private copy of the data, which is
//! published on commit. Transactions are therefore fully serialized, and a
//! dropped transaction leaves no trace.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{Customer, CustomerStatus, NewPayment, Payment, PaymentStatus};

use super::services::BillingError;
use super::store::{LedgerStore, LedgerTx};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    customers: HashMap<Uuid, Customer>,
    payments: HashMap<Uuid, Payment>,
    /// Customers whose arrears writes are rejected
    failing_writes: HashSet<Uuid>,
}

/// In-memory ledger store
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a customer record
    pub async fn insert_customer(&self, customer: Customer) {
        let mut state = self.state.lock().await;
        state.customers.insert(customer.id, customer);
    }

    /// Snapshot of a committed customer record
    pub async fn customer(&self, customer_id: Uuid) -> Option<Customer> {
        self.state.lock().await.customers.get(&customer_id).cloned()
    }

    /// Committed payments of a customer, in creation order
    pub async fn payments_for(&self, customer_id: Uuid) -> Vec<Payment> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        payments
    }

    /// Make every arrears write for this customer fail
    #[cfg(test)]
    pub(crate) async fn fail_writes_for(&self, customer_id: Uuid) {
        self.state.lock().await.failing_writes.insert(customer_id);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, BillingError> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn find_customer(&mut self, customer_id: Uuid) -> Result<Option<Customer>, BillingError> {
        Ok(self.working.customers.get(&customer_id).cloned())
    }

    async fn lock_customer(&mut self, customer_id: Uuid) -> Result<Option<Customer>, BillingError> {
        // The whole store is already locked by this transaction
        self.find_customer(customer_id).await
    }

    async fn total_months_paid(&mut self, customer_id: Uuid) -> Result<i32, BillingError> {
        self.working
            .payments
            .values()
            .filter(|p| p.customer_id == customer_id)
            .try_fold(0i32, |total, p| total.checked_add(p.months_covered))
            .ok_or_else(|| {
                BillingError::Store(format!(
                    "months paid overflow for customer {}",
                    customer_id
                ))
            })
    }

    async fn update_arrears(
        &mut self,
        customer_id: Uuid,
        months_owed: i32,
        payment_status: PaymentStatus,
    ) -> Result<(), BillingError> {
        if self.working.failing_writes.contains(&customer_id) {
            return Err(BillingError::Store(format!(
                "write rejected for customer {}",
                customer_id
            )));
        }

        let customer = self
            .working
            .customers
            .get_mut(&customer_id)
            .ok_or(BillingError::CustomerNotFound(customer_id))?;

        customer.months_owed = months_owed;
        customer.payment_status = payment_status;
        Ok(())
    }

    async fn insert_payment(
        &mut self,
        payment: &NewPayment,
        months_detail: &str,
    ) -> Result<Payment, BillingError> {
        let stored = Payment {
            id: Uuid::new_v4(),
            customer_id: payment.customer_id,
            amount: payment.amount,
            payment_date: payment.payment_date,
            months_covered: payment.months_covered,
            months_detail: months_detail.to_string(),
            created_at: Utc::now(),
        };
        self.working.payments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, BillingError> {
        Ok(self.working.payments.get(&payment_id).cloned())
    }

    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<bool, BillingError> {
        Ok(self.working.payments.remove(&payment_id).is_some())
    }

    async fn active_customer_ids(&mut self) -> Result<Vec<Uuid>, BillingError> {
        let mut active: Vec<&Customer> = self
            .working
            .customers
            .values()
            .filter(|c| c.status == CustomerStatus::Active)
            .collect();
        active.sort_by_key(|c| (c.install_date.is_none(), c.install_date, c.id));
        Ok(active.into_iter().map(|c| c.id).collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), BillingError> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn payment(customer_id: Uuid, months_covered: i32) -> NewPayment {
        NewPayment {
            customer_id,
            amount: dec!(100),
            payment_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            months_covered,
        }
    }

    #[tokio::test]
    async fn test_total_months_paid_sums_customer_only() {
        let ledger = InMemoryLedger::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let mut tx = ledger.begin().await.unwrap();
        tx.insert_payment(&payment(a, 2), "").await.unwrap();
        tx.insert_payment(&payment(a, 3), "").await.unwrap();
        tx.insert_payment(&payment(b, 7), "").await.unwrap();

        assert_eq!(tx.total_months_paid(a).await.unwrap(), 5);
        assert_eq!(tx.total_months_paid(b).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_total_months_paid_overflow_is_an_error() {
        let ledger = InMemoryLedger::new();
        let id = Uuid::new_v4();

        let mut tx = ledger.begin().await.unwrap();
        tx.insert_payment(&payment(id, i32::MAX), "").await.unwrap();
        tx.insert_payment(&payment(id, 1), "").await.unwrap();

        let err = tx.total_months_paid(id).await.unwrap_err();
        assert!(matches!(err, BillingError::Store(_)));
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_no_trace() {
        let ledger = InMemoryLedger::new();
        let id = Uuid::new_v4();

        {
            let mut tx = ledger.begin().await.unwrap();
            tx.insert_payment(&payment(id, 1), "").await.unwrap();
        }

        assert!(ledger.payments_for(id).await.is_empty());
    }
}
