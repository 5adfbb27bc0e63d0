//! # Learnova API Server
//!
//! Serves the `/api/v1` REST API over a PostgreSQL pool.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/learnova JWT_SECRET=... cargo run -p learnova-api
//! ```

use anyhow::Context;
use learnova_api::{
    app::{build_router, AppState},
    config::Config,
};
use learnova_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, PoolSettings},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnova_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Learnova API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let settings = PoolSettings::new(config.database.url.clone())
        .with_max_connections(config.database.max_connections);
    let pool = create_pool(&settings).await.context("Failed to connect to database")?;

    if config.database.run_migrations {
        run_migrations(&pool).await.context("Failed to run migrations")?;
    }

    let address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind(address.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
