//! Customer models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Derived label summarizing a customer's months owed.
///
/// Stored as lowercase text in `customers.payment_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Nothing owed, nothing ahead
    Paid,
    /// At most the current month is owed
    Current,
    /// More than one month owed
    Debtor,
    /// Paid in advance
    Ahead,
}

impl PaymentStatus {
    /// Classify a months-owed value.
    ///
    /// Checks run in a fixed order: negative is `Ahead`, zero is `Paid`,
    /// up to one month is `Current`, anything else is `Debtor`.
    pub fn from_months_owed(months_owed: i32) -> Self {
        if months_owed < 0 {
            PaymentStatus::Ahead
        } else if months_owed == 0 {
            PaymentStatus::Paid
        } else if months_owed <= 1 {
            PaymentStatus::Current
        } else {
            PaymentStatus::Debtor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Current => "current",
            PaymentStatus::Debtor => "debtor",
            PaymentStatus::Ahead => "ahead",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service status of a customer account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Suspended,
    Cancelled,
}

/// Customer row from `customers`
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub install_date: Option<NaiveDate>,
    pub months_owed: i32,
    pub payment_status: PaymentStatus,
    pub status: CustomerStatus,
}

impl Customer {
    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_negative_is_ahead() {
        assert_eq!(PaymentStatus::from_months_owed(-1), PaymentStatus::Ahead);
        assert_eq!(PaymentStatus::from_months_owed(-24), PaymentStatus::Ahead);
    }

    #[test]
    fn test_status_zero_is_paid() {
        assert_eq!(PaymentStatus::from_months_owed(0), PaymentStatus::Paid);
    }

    #[test]
    fn test_status_one_is_current() {
        assert_eq!(PaymentStatus::from_months_owed(1), PaymentStatus::Current);
    }

    #[test]
    fn test_status_more_than_one_is_debtor() {
        assert_eq!(PaymentStatus::from_months_owed(2), PaymentStatus::Debtor);
        assert_eq!(PaymentStatus::from_months_owed(36), PaymentStatus::Debtor);
    }

    #[test]
    fn test_status_mapping_is_total() {
        for owed in -50..=50 {
            let status = PaymentStatus::from_months_owed(owed);
            let expected = match owed {
                o if o < 0 => PaymentStatus::Ahead,
                0 => PaymentStatus::Paid,
                1 => PaymentStatus::Current,
                _ => PaymentStatus::Debtor,
            };
            assert_eq!(status, expected, "months_owed = {}", owed);
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Debtor).unwrap(),
            "\"debtor\""
        );
        assert_eq!(PaymentStatus::Ahead.to_string(), "ahead");
    }
}
