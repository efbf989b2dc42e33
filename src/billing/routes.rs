//! HTTP handlers for payments and reconciliation

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::error::Result;
use crate::models::NewPayment;
use crate::AppState;

use super::requests::{AsOfQuery, CreatePaymentRequest};
use super::responses::{PaymentDeletedResponse, PaymentRecordedResponse};
use super::services::{self, CustomerArrears, SweepSummary};

/// Billing API routes, mounted under `/api`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers/:id/payments", post(create_payment))
        .route("/customers/:id/arrears", get(get_arrears))
        .route("/customers/:id/reconcile", post(reconcile_customer))
        .route("/payments/:id", delete(delete_payment))
        .route("/reconcile", post(reconcile_all))
        .route("/cache/stats", get(cache_stats))
}

fn effective_date(as_of: Option<NaiveDate>) -> NaiveDate {
    as_of.unwrap_or_else(|| Utc::now().date_naive())
}

/// Record a payment for a customer
async fn create_payment(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentRecordedResponse>)> {
    let today = effective_date(req.as_of);
    let payment = NewPayment {
        customer_id,
        amount: req.amount,
        payment_date: req.payment_date.unwrap_or(today),
        months_covered: req.months_covered,
    };

    let recorded = services::record_payment(state.store.as_ref(), payment, today).await?;
    state.cache.invalidate_customer(customer_id).await;

    Ok((StatusCode::CREATED, Json(recorded.into())))
}

/// Delete a payment
async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<PaymentDeletedResponse>> {
    let today = effective_date(query.as_of);

    let deleted = services::delete_payment(state.store.as_ref(), payment_id, today).await?;
    state.cache.invalidate_customer(deleted.payment.customer_id).await;

    Ok(Json(deleted.into()))
}

/// Current arrears of a customer, without writing
async fn get_arrears(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<CustomerArrears>> {
    let today = effective_date(query.as_of);

    if let Some(cached) = state.cache.get_arrears(customer_id, today).await {
        tracing::debug!("Cache HIT for arrears: {}", customer_id);
        return Ok(Json(cached));
    }

    tracing::debug!("Cache MISS for arrears: {}", customer_id);
    let generation = state.cache.generation();
    let arrears = services::preview_arrears(state.store.as_ref(), customer_id, today).await?;
    state.cache.put_arrears(today, arrears.clone(), generation).await;

    Ok(Json(arrears))
}

/// Recompute and persist one customer's arrears
async fn reconcile_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<CustomerArrears>> {
    let today = effective_date(query.as_of);

    let arrears = services::reconcile_customer(state.store.as_ref(), customer_id, today).await?;
    state.cache.invalidate_customer(customer_id).await;

    Ok(Json(arrears))
}

/// Run the sweep over all active customers
async fn reconcile_all(
    State(state): State<AppState>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<SweepSummary>> {
    let today = effective_date(query.as_of);

    let summary = services::reconcile_all(state.store.as_ref(), today).await?;
    state.cache.record_sweep(summary).await;

    Ok(Json(summary))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::InMemoryLedger;
    use crate::cache::AppCache;
    use crate::models::{Customer, CustomerStatus, PaymentStatus};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn setup(install_date: Option<NaiveDate>) -> (Router, InMemoryLedger, Uuid) {
        let (app, ledger, _, id) = setup_with_cache(install_date).await;
        (app, ledger, id)
    }

    async fn setup_with_cache(
        install_date: Option<NaiveDate>,
    ) -> (Router, InMemoryLedger, AppCache, Uuid) {
        let ledger = InMemoryLedger::new();
        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Cliente".to_string(),
            install_date,
            months_owed: 0,
            payment_status: PaymentStatus::Paid,
            status: CustomerStatus::Active,
        };
        let id = customer.id;
        ledger.insert_customer(customer).await;

        let cache = AppCache::default();
        let state = AppState {
            store: Arc::new(ledger.clone()),
            cache: cache.clone(),
        };
        (crate::app(state), ledger, cache, id)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_payment_returns_arrears() {
        let (app, _, id) = setup(NaiveDate::from_ymd_opt(2024, 1, 1)).await;

        let response = app
            .oneshot(post_json(
                &format!("/api/customers/{}/payments", id),
                serde_json::json!({
                    "amount": "350.00",
                    "months_covered": 4,
                    "as_of": "2024-04-10"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["previous_months_owed"], 4);
        assert_eq!(body["arrears"]["months_owed"], 0);
        assert_eq!(body["arrears"]["payment_status"], "paid");
        assert_eq!(body["payment"]["amount"], "350.00");
        assert_eq!(body["payment"]["payment_date"], "2024-04-10");
    }

    #[tokio::test]
    async fn test_create_payment_without_install_date_is_unprocessable() {
        let (app, ledger, id) = setup(None).await;

        let response = app
            .oneshot(post_json(
                &format!("/api/customers/{}/payments", id),
                serde_json::json!({ "amount": "100", "months_covered": 1 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error_type"], "validation_error");
        assert!(ledger.payments_for(id).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_payment_is_not_found() {
        let (app, _, _) = setup(NaiveDate::from_ymd_opt(2024, 1, 1)).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/payments/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_arrears_reads_without_writing() {
        let (app, ledger, id) = setup(NaiveDate::from_ymd_opt(2024, 1, 1)).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/customers/{}/arrears?as_of=2024-04-01", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["months_owed"], 4);
        assert_eq!(body["payment_status"], "debtor");
        assert_eq!(ledger.customer(id).await.unwrap().months_owed, 0);
    }

    #[tokio::test]
    async fn test_reconcile_all_endpoint() {
        let (app, ledger, id) = setup(NaiveDate::from_ymd_opt(2024, 1, 1)).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/reconcile?as_of=2024-04-01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["updated"], 1);
        assert_eq!(body["ahead_count"], 0);
        assert_eq!(ledger.customer(id).await.unwrap().months_owed, 4);
    }

    fn get_arrears_request(id: Uuid) -> Request<Body> {
        Request::builder()
            .uri(format!("/api/customers/{}/arrears?as_of=2024-04-01", id))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_payment_during_arrears_read_is_not_masked() {
        let (app, ledger, cache, id) = setup_with_cache(NaiveDate::from_ymd_opt(2024, 1, 1)).await;
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        // Read computes its value before the payment lands
        let generation = cache.generation();
        let stale = services::preview_arrears(&ledger, id, today).await.unwrap();
        assert_eq!(stale.months_owed, 4);

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/customers/{}/payments", id),
                serde_json::json!({
                    "amount": "350.00",
                    "months_covered": 4,
                    "as_of": "2024-04-01"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // ...and only then tries to cache it
        cache.put_arrears(today, stale, generation).await;
        assert_eq!(cache.get_arrears(id, today).await, None);

        let response = app.oneshot(get_arrears_request(id)).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["months_owed"], 0);
        assert_eq!(body["payment_status"], "paid");
    }

    #[tokio::test]
    async fn test_get_arrears_is_cached_until_payment() {
        let (app, _, cache, id) = setup_with_cache(NaiveDate::from_ymd_opt(2024, 1, 1)).await;
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        let response = app.clone().oneshot(get_arrears_request(id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache.get_arrears(id, today).await.map(|a| a.months_owed), Some(4));

        app.oneshot(post_json(
            &format!("/api/customers/{}/payments", id),
            serde_json::json!({ "amount": "90", "months_covered": 1, "as_of": "2024-04-01" }),
        ))
        .await
        .unwrap();

        assert_eq!(cache.get_arrears(id, today).await, None);
    }
}
