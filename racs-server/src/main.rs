//! RACS orchestrator entry point

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use racs_server::{api, config::Config, db, runtime};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "racs_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RACS orchestrator");

    let config = Config::parse();
    config.validate()?;

    let pool = db::create_pool(&config.database_url())
        .await
        .context("Failed to open database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let state = runtime::start(config.clone(), pool)
        .await
        .context("Failed to start orchestration runtime")?;

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// In-flight stages are lost on shutdown by design; only the last
/// persisted state survives a restart.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown requested");
}
