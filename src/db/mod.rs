//! Postgres-backed ledger store

pub mod queries;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::billing::{BillingError, LedgerStore, LedgerTx};
use crate::models::{Customer, NewPayment, Payment, PaymentStatus};

/// Ledger store over a Postgres connection pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, BillingError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }
}

/// An open Postgres transaction. sqlx rolls it back on drop.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_customer(&mut self, customer_id: Uuid) -> Result<Option<Customer>, BillingError> {
        queries::get_customer(&mut self.tx, customer_id).await
    }

    async fn lock_customer(&mut self, customer_id: Uuid) -> Result<Option<Customer>, BillingError> {
        queries::get_customer_for_update(&mut self.tx, customer_id).await
    }

    async fn total_months_paid(&mut self, customer_id: Uuid) -> Result<i32, BillingError> {
        queries::sum_months_paid(&mut self.tx, customer_id).await
    }

    async fn update_arrears(
        &mut self,
        customer_id: Uuid,
        months_owed: i32,
        payment_status: PaymentStatus,
    ) -> Result<(), BillingError> {
        queries::update_customer_arrears(&mut self.tx, customer_id, months_owed, payment_status)
            .await
    }

    async fn insert_payment(
        &mut self,
        payment: &NewPayment,
        months_detail: &str,
    ) -> Result<Payment, BillingError> {
        queries::insert_payment(&mut self.tx, payment, months_detail).await
    }

    async fn find_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, BillingError> {
        queries::get_payment(&mut self.tx, payment_id).await
    }

    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<bool, BillingError> {
        queries::delete_payment(&mut self.tx, payment_id).await
    }

    async fn active_customer_ids(&mut self) -> Result<Vec<Uuid>, BillingError> {
        queries::get_active_customer_ids(&mut self.tx).await
    }

    async fn commit(self: Box<Self>) -> Result<(), BillingError> {
        self.tx.commit().await?;
        Ok(())
    }
}
