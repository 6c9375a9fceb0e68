use std::{sync::Arc, time::Duration};

use notebox::{
    app_state::{AppState as _, ServiceState},
    cache,
    color_eyre::{self, eyre::WrapErr as _},
    config::{DatabaseConfig, RedisConfig, ServerConfig},
    db::{self, DEFAULT_MIGRATIONS_DIR},
    notes::PgNoteStore,
    server::{app, run_server, shutdown_signal},
};
use tracing::info;

/// How long shutdown waits for handlers to hand their connections back.
const POOL_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Create and run the tokio runtime
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { run_application().await })
}

async fn run_application() -> color_eyre::Result<()> {
    tracing_common::setup_tracing("notebox-server")?;

    let server_config = ServerConfig::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let redis_config = RedisConfig::from_env()?;

    let pool = db::connect(&db_config)
        .await
        .wrap_err("Failed to initialize database")?;

    let report = db::run_migrations(&pool, DEFAULT_MIGRATIONS_DIR)
        .await
        .wrap_err("Failed to run migrations")?;
    info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "Migrations up to date"
    );

    let cache = cache::connect(&redis_config).await;
    let state = ServiceState::new(Arc::new(PgNoteStore::new(pool.clone())), cache);
    info!(version = state.version(), "Starting notebox-server");

    let result = run_server(app(state, &server_config), &server_config, shutdown_signal()).await;

    db::close_pool(&pool, POOL_CLOSE_TIMEOUT).await;

    result
}
