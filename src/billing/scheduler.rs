//! Monthly sweep scheduler
//!
//! Fires [`reconcile_all`] on the 1st of every month at a configured UTC hour.
//! An external cron can call `POST /api/reconcile` instead and leave this off.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info};

use crate::cache::AppCache;

use super::services::reconcile_all;
use super::store::LedgerStore;

/// Background task running the arrears sweep once a month
pub struct SweepScheduler {
    store: Arc<dyn LedgerStore>,
    cache: AppCache,
    execution_hour: u32,
}

impl SweepScheduler {
    pub fn new(store: Arc<dyn LedgerStore>, cache: AppCache, execution_hour: u32) -> Self {
        Self {
            store,
            cache,
            execution_hour,
        }
    }

    /// Start the scheduler (runs in background)
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut last: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            let Some(next) = next_run(last, now, self.execution_hour) else {
                error!("Could not compute next sweep time, scheduler stopping");
                return;
            };

            info!("Next arrears sweep scheduled for {} UTC", next.format("%Y-%m-%d %H:%M"));

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            // Dated by the slot so an early wake still sweeps the new month
            match reconcile_all(self.store.as_ref(), next.date_naive()).await {
                Ok(summary) => self.cache.record_sweep(summary).await,
                Err(e) => error!("Arrears sweep failed to start: {}", e),
            }
            last = Some(next);
        }
    }
}

/// Next 1st-of-month at `hour`:00 UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> Option<DateTime<Utc>> {
    let this_month = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?;
    let candidate = Utc.from_utc_datetime(&this_month.and_hms_opt(hour, 0, 0)?);
    if candidate > now {
        return Some(candidate);
    }

    let next_month = this_month.checked_add_months(Months::new(1))?;
    Some(Utc.from_utc_datetime(&next_month.and_hms_opt(hour, 0, 0)?))
}

/// Next sweep slot given the last one that ran.
///
/// Counted from the later of `last` and `now`, so a timer that wakes before
/// its slot cannot schedule the same slot twice.
pub fn next_run(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    hour: u32,
) -> Option<DateTime<Utc>> {
    let from = last.map_or(now, |last| last.max(now));
    next_run_after(from, hour)
}
