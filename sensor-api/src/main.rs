use anyhow::Context;
use clap::Parser;
use sensor_api::{config::Config, db, metrics, rest};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting sensor API");
    info!("HTTP server: {}", config.http_addr);
    info!("Database: {}", config.database_url);

    metrics::init_metrics().context("failed to register metrics")?;

    let pool = db::make_pool(&config.database_url, config.max_connections)
        .await
        .context("failed to open database")?;

    let app = rest::create_router(pool.clone());

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Shutting down");
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}
