//! In-memory caching using moka
//!
//! Caches read-only arrears lookups per customer. Entries are dropped whenever
//! the customer's payments change and after every sweep.
//!
//! Every invalidation bumps a generation counter. A lookup computed before an
//! invalidation carries the older generation and is never stored, so a slow
//! read cannot put pre-payment arrears back into the cache.

use chrono::NaiveDate;
use moka::future::Cache;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::billing::calculators::month_start;
use crate::billing::{CustomerArrears, SweepSummary};

const LAST_SWEEP_KEY: &str = "last_sweep";

/// Arrears computed for a specific month
#[derive(Debug, Clone)]
pub struct CachedArrears {
    pub month: NaiveDate,
    pub arrears: CustomerArrears,
}

/// Application cache
#[derive(Clone)]
pub struct AppCache {
    /// Arrears lookups (customer_id -> CachedArrears)
    pub arrears: Cache<Uuid, Arc<CachedArrears>>,
    /// Outcome of the most recent sweep (singleton)
    pub last_sweep: Cache<String, Arc<SweepSummary>>,
    /// Bumped before every invalidation
    generation: Arc<AtomicU64>,
}

impl AppCache {
    /// Create a new cache instance with the given arrears TTL
    pub fn new(arrears_ttl: Duration) -> Self {
        Self {
            // Arrears: 10k customers, idle entries expire after a quarter of the TTL
            arrears: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(arrears_ttl)
                .time_to_idle(arrears_ttl / 4)
                .build(),

            last_sweep: Cache::builder().max_capacity(1).build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached arrears for a customer, if computed for the same month as `today`
    pub async fn get_arrears(&self, customer_id: Uuid, today: NaiveDate) -> Option<CustomerArrears> {
        let cached = self.arrears.get(&customer_id).await?;
        if cached.month == month_start(today) {
            Some(cached.arrears.clone())
        } else {
            None
        }
    }

    /// Generation to capture before computing a value for [`put_arrears`](Self::put_arrears)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store arrears computed while the cache was at `generation`.
    ///
    /// Dropped if any invalidation happened since. The second check covers an
    /// invalidation racing the insert itself.
    pub async fn put_arrears(&self, today: NaiveDate, arrears: CustomerArrears, generation: u64) {
        if self.generation() != generation {
            tracing::debug!("Stale arrears not cached for customer: {}", arrears.customer_id);
            return;
        }

        let customer_id = arrears.customer_id;
        let entry = CachedArrears {
            month: month_start(today),
            arrears,
        };
        self.arrears.insert(customer_id, Arc::new(entry)).await;

        if self.generation() != generation {
            self.arrears.invalidate(&customer_id).await;
        }
    }

    /// Invalidate a single customer after a payment change
    pub async fn invalidate_customer(&self, customer_id: Uuid) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.arrears.invalidate(&customer_id).await;
        tracing::debug!("Cache invalidated for customer: {}", customer_id);
    }

    /// Record a sweep and drop every arrears entry
    pub async fn record_sweep(&self, summary: SweepSummary) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.arrears.invalidate_all();
        self.last_sweep
            .insert(LAST_SWEEP_KEY.to_string(), Arc::new(summary))
            .await;
        info!("Arrears cache invalidated after sweep");
    }

    /// Get cache statistics for monitoring
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            arrears_size: self.arrears.entry_count(),
            last_sweep: self
                .last_sweep
                .get(LAST_SWEEP_KEY)
                .await
                .map(|s| *s),
        }
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub arrears_size: u64,
    pub last_sweep: Option<SweepSummary>,
}
