//! Request DTOs for billing API endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Request to record a payment
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub months_covered: i32,
    /// Defaults to the effective date of the request
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Optional point in time for reconciliation endpoints
#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}
