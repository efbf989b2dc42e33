//! Database queries for customers and payments
//!
//! Every query runs on a borrowed connection so callers can keep it inside
//! an open transaction.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::billing::BillingError;
use crate::models::{Customer, CustomerStatus, NewPayment, Payment, PaymentStatus};

/// Get a customer by id
pub async fn get_customer(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> Result<Option<Customer>, BillingError> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, name, install_date, months_owed, payment_status, status
        FROM customers
        WHERE id = $1
        "#,
    )
    .bind(customer_id)
    .fetch_optional(conn)
    .await?;

    Ok(customer)
}

/// Get a customer by id, locking the row until the transaction ends
pub async fn get_customer_for_update(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> Result<Option<Customer>, BillingError> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, name, install_date, months_owed, payment_status, status
        FROM customers
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(customer_id)
    .fetch_optional(conn)
    .await?;

    Ok(customer)
}

/// Sum months covered by all payments of a customer
pub async fn sum_months_paid(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> Result<i32, BillingError> {
    let total: i32 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(months_covered), 0)::INT4
        FROM payments
        WHERE customer_id = $1
        "#,
    )
    .bind(customer_id)
    .fetch_one(conn)
    .await?;

    Ok(total)
}

/// Write the derived arrears fields
pub async fn update_customer_arrears(
    conn: &mut PgConnection,
    customer_id: Uuid,
    months_owed: i32,
    payment_status: PaymentStatus,
) -> Result<(), BillingError> {
    let result = sqlx::query(
        r#"
        UPDATE customers
        SET months_owed = $2, payment_status = $3
        WHERE id = $1
        "#,
    )
    .bind(customer_id)
    .bind(months_owed)
    .bind(payment_status)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(BillingError::CustomerNotFound(customer_id));
    }

    Ok(())
}

/// Insert a payment row
pub async fn insert_payment(
    conn: &mut PgConnection,
    payment: &NewPayment,
    months_detail: &str,
) -> Result<Payment, BillingError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (id, customer_id, amount, payment_date, months_covered, months_detail)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, customer_id, amount, payment_date, months_covered, months_detail, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payment.customer_id)
    .bind(payment.amount)
    .bind(payment.payment_date)
    .bind(payment.months_covered)
    .bind(months_detail)
    .fetch_one(conn)
    .await?;

    Ok(payment)
}

/// Get a payment by id
pub async fn get_payment(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> Result<Option<Payment>, BillingError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, customer_id, amount, payment_date, months_covered, months_detail, created_at
        FROM payments
        WHERE id = $1
        "#,
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;

    Ok(payment)
}

/// Delete a payment row
pub async fn delete_payment(conn: &mut PgConnection, payment_id: Uuid) -> Result<bool, BillingError> {
    let result = sqlx::query(
        r#"
        DELETE FROM payments
        WHERE id = $1
        "#,
    )
    .bind(payment_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Ids of all active customers, oldest installs first
pub async fn get_active_customer_ids(conn: &mut PgConnection) -> Result<Vec<Uuid>, BillingError> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id
        FROM customers
        WHERE status = $1
        ORDER BY install_date NULLS LAST, id
        "#,
    )
    .bind(CustomerStatus::Active)
    .fetch_all(conn)
    .await?;

    Ok(ids)
}
