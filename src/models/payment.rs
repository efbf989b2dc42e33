//! Payment models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Payment row from `payments`
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub months_covered: i32,
    pub months_detail: String,
    pub created_at: DateTime<Utc>,
}

/// A payment about to be inserted
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub months_covered: i32,
}
