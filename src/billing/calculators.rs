//! Core arrears calculation functions.
//!
//! Pure functions for month arithmetic - no database access.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::models::PaymentStatus;

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Payment amounts are stored at two places.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use cable_billing::billing::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Normalize a date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Whole calendar months from the install month to `today`'s month, inclusive.
///
/// Floored at 1 so a customer installed this month (or with a future install
/// date) always owes at least the current month.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use cable_billing::billing::calculators::months_elapsed;
///
/// let install = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let today = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
/// assert_eq!(months_elapsed(install, today), 4);
/// ```
pub fn months_elapsed(install_date: NaiveDate, today: NaiveDate) -> i32 {
    let install = month_start(install_date);
    let today = month_start(today);

    let elapsed = (today.year() - install.year()) * 12
        + (today.month() as i32 - install.month() as i32)
        + 1;

    elapsed.max(1)
}

/// Outcome of the arrears computation for one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrears {
    pub months_elapsed: i32,
    pub total_months_paid: i32,
    /// Negative when the customer has paid ahead
    pub months_owed: i32,
    pub payment_status: PaymentStatus,
}

/// Compute months owed and the derived status.
///
/// `months_owed = months_elapsed - total_months_paid`, which may be negative.
pub fn compute_arrears(install_date: NaiveDate, today: NaiveDate, total_months_paid: i32) -> Arrears {
    let months_elapsed = months_elapsed(install_date, today);
    let months_owed = months_elapsed - total_months_paid;

    Arrears {
        months_elapsed,
        total_months_paid,
        months_owed,
        payment_status: PaymentStatus::from_months_owed(months_owed),
    }
}

const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Calendar months a new payment is considered to cover.
///
/// With `d >= 1` months owed before the payment, coverage starts at the oldest
/// owed month (`today - (d - 1)`). Otherwise it starts at the first month not
/// yet covered, forward of the current month (`today + (1 - d)`). Both cases
/// reduce to shifting the current month by `1 - d`.
pub fn covered_months(
    today: NaiveDate,
    months_owed_before: i32,
    months_covered: i32,
) -> Vec<NaiveDate> {
    let current = month_start(today);
    let offset = 1 - months_owed_before;

    let start = if offset >= 0 {
        current.checked_add_months(Months::new(offset.unsigned_abs()))
    } else {
        current.checked_sub_months(Months::new(offset.unsigned_abs()))
    };

    let Some(start) = start else {
        return vec![];
    };

    // Stops at the first month past chrono's range
    (0..months_covered.max(0) as u32)
        .map_while(|i| start.checked_add_months(Months::new(i)))
        .collect()
}

/// Human-readable label for a month, e.g. `Marzo 2024`.
pub fn month_label(date: NaiveDate) -> String {
    format!("{} {}", MONTH_NAMES[date.month0() as usize], date.year())
}

/// Comma-joined month labels for a payment's `months_detail` field.
///
/// Cosmetic only; the arrears arithmetic never reads it back.
pub fn months_detail(today: NaiveDate, months_owed_before: i32, months_covered: i32) -> String {
    covered_months(today, months_owed_before, months_covered)
        .into_iter()
        .map(month_label)
        .collect::<Vec<_>>()
        .join(", ")
}
