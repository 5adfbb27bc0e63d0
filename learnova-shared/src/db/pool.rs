/// PostgreSQL connection pool management
///
/// Every request handler borrows connections from one shared `PgPool`.
/// The pool is verified with a `SELECT 1` round-trip before it is handed
/// to the server.
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pool sizing and timeouts
///
/// Timeouts are in seconds so they map directly onto environment variables.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// PostgreSQL connection URL
    pub url: String,

    /// Upper bound on open connections (default 10)
    pub max_connections: u32,

    /// Connections kept warm while idle (default 2)
    pub min_connections: u32,

    /// How long a request waits for a free connection (default 30)
    pub acquire_timeout_seconds: u64,

    /// Idle connections are closed after this long (default 10 minutes)
    pub idle_timeout_seconds: Option<u64>,

    /// Connections are recycled after this long (default 30 minutes)
    pub max_lifetime_seconds: Option<u64>,
}

impl PoolSettings {
    /// Settings for `url` with default sizing
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Overrides the connection ceiling
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        // keep the warm floor below the ceiling
        self.min_connections = self.min_connections.min(max_connections);
        self
    }

    fn options(&self) -> PgPoolOptions {
        let mut options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_seconds))
            .test_before_acquire(true);

        if let Some(idle) = self.idle_timeout_seconds {
            options = options.idle_timeout(Duration::from_secs(idle));
        }
        if let Some(lifetime) = self.max_lifetime_seconds {
            options = options.max_lifetime(Duration::from_secs(lifetime));
        }
        options
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}

/// Opens the pool and checks the database answers
///
/// # Errors
///
/// Returns an error if the URL is invalid, the server is unreachable or the
/// health check fails.
pub async fn create_pool(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Opening database pool"
    );

    let pool = settings.options().connect(&settings.url).await?;
    health_check(&pool).await?;

    info!("Database pool ready");
    Ok(pool)
}

/// Builds a pool without opening any connection
///
/// Connections are established on first use. The router tests rely on this
/// to exercise code paths that never reach the database.
pub fn create_lazy_pool(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    debug!("Creating lazy database pool");
    settings.options().connect_lazy(&settings.url)
}

/// Runs `SELECT 1` against the pool
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    let (value,): (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if value == 1 {
        debug!("Database health check passed");
        Ok(())
    } else {
        warn!(value, "Database health check returned unexpected value");
        Err(sqlx::Error::Protocol(
            "Health check returned unexpected value".into(),
        ))
    }
}

/// Snapshot of pool usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub active_connections: usize,
    pub idle_connections: usize,
    pub total_connections: usize,
}

pub fn pool_stats(pool: &PgPool) -> PoolStats {
    let size = pool.size();
    let idle = pool.num_idle() as u32;

    PoolStats {
        active_connections: size.saturating_sub(idle) as usize,
        idle_connections: idle as usize,
        total_connections: size as usize,
    }
}

/// Closes every connection; call on shutdown
pub async fn close_pool(pool: PgPool) {
    info!("Closing database pool");
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_settings_default() {
        let settings = PoolSettings::default();
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.min_connections, 2);
        assert_eq!(settings.acquire_timeout_seconds, 30);
        assert_eq!(settings.idle_timeout_seconds, Some(600));
        assert_eq!(settings.max_lifetime_seconds, Some(1800));
    }

    #[test]
    fn test_pool_settings_new_keeps_url() {
        let settings = PoolSettings::new("postgres://localhost/learnova");
        assert_eq!(settings.url, "postgres://localhost/learnova");
        assert_eq!(settings.max_connections, 10);
    }

    #[test]
    fn test_max_connections_clamps_min() {
        let settings = PoolSettings::new("postgres://localhost/learnova").with_max_connections(1);
        assert_eq!(settings.max_connections, 1);
        assert_eq!(settings.min_connections, 1);
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let settings = PoolSettings::new("postgres://nobody@127.0.0.1:1/none");
        let pool = create_lazy_pool(&settings).expect("lazy pool should build");
        assert!(!pool.is_closed());
    }
}
