//! Response DTOs for billing API endpoints.

use serde::Serialize;

use crate::models::Payment;

use super::services::{CustomerArrears, PaymentDeleted, PaymentRecorded};

/// Response for a recorded payment
#[derive(Debug, Serialize)]
pub struct PaymentRecordedResponse {
    pub payment: Payment,
    pub previous_months_owed: i32,
    pub arrears: CustomerArrears,
}

impl From<PaymentRecorded> for PaymentRecordedResponse {
    fn from(recorded: PaymentRecorded) -> Self {
        Self {
            payment: recorded.payment,
            previous_months_owed: recorded.previous.months_owed,
            arrears: recorded.arrears,
        }
    }
}

/// Response for a deleted payment
#[derive(Debug, Serialize)]
pub struct PaymentDeletedResponse {
    pub payment: Payment,
    pub arrears: CustomerArrears,
}

impl From<PaymentDeleted> for PaymentDeletedResponse {
    fn from(deleted: PaymentDeleted) -> Self {
        Self {
            payment: deleted.payment,
            arrears: deleted.arrears,
        }
    }
}

/// Generic error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
}
