use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cable_billing::billing::scheduler::SweepScheduler;
use cable_billing::cache::AppCache;
use cable_billing::config::Config;
use cable_billing::db::PgLedgerStore;
use cable_billing::{app, AppState};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cable_billing=debug,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    info!("Starting cable billing service");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let state = AppState {
        store: Arc::new(PgLedgerStore::new(pool)),
        cache: AppCache::new(config.arrears_cache_ttl),
    };

    if config.sweep_enabled {
        SweepScheduler::new(state.store.clone(), state.cache.clone(), config.sweep_hour_utc).start();
    } else {
        info!("In-process arrears sweep disabled");
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!("Listening on {}", config.bind_address);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
