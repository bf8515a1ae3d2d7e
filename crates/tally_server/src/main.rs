//! tally_server: REST server for the scoring ledger.
//!
//! Reads config from env vars (a `.env` file is honoured):
//!   DATABASE_URL                 : Postgres connection string (unset: in-memory store)
//!   TALLY_DB_POOL_SIZE           : pool size (default: 10)
//!   TALLY_DB_CONNECT_TIMEOUT_SECS: pool acquire timeout (default: 10)
//!   TALLY_BIND_ADDR              : listen address (default: 0.0.0.0:5000)
//!   TALLY_SESSION_TIMEOUT_SECS   : idle session timeout (default: 3600)
//!   TALLY_MAINTENANCE_FILE       : maintenance switch file (default: update.json)

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tally_core::memory::MemoryStores;
use tally_core::{LedgerService, LedgerServiceImpl};
use tally_postgres::{ensure_schema, PgStores};
use tally_server::config::{mask_database_url, MaintenanceSource, ServerConfig};
use tally_server::router::build_router;
use tally_server::session::SessionStore;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tally_server=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    let service: Arc<dyn LedgerService> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.connect_timeout)
                .connect(url)
                .await
                .with_context(|| format!("failed to connect to {}", mask_database_url(url)))?;
            tracing::info!(url = %mask_database_url(url), "Connected to database");

            ensure_schema(&pool).await?;

            let stores = PgStores::new(pool);
            Arc::new(LedgerServiceImpl::new(
                Arc::new(stores.users),
                Arc::new(stores.records),
                Arc::new(stores.audit),
                Arc::new(stores.settings),
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(LedgerServiceImpl::from_stores(Arc::new(MemoryStores::new())))
        }
    };

    service.bootstrap().await?;

    let sessions = Arc::new(SessionStore::new(config.session_timeout));
    let maintenance = MaintenanceSource::new(config.maintenance_file.clone());
    tracing::info!(
        file = %maintenance.path().display(),
        timeout_secs = config.session_timeout.as_secs(),
        "sessions and maintenance switch ready"
    );

    let app = build_router(service, sessions, maintenance);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("tally_server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
