/// Database layer for Learnova
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Embedded schema migrations
///
/// Models and their queries live in the crate-level `models` module.
///
/// # Example
///
/// ```no_run
/// use learnova_shared::db::pool::{create_pool, PoolSettings};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = PoolSettings::new(std::env::var("DATABASE_URL")?);
///     let pool = create_pool(&settings).await?;
///     learnova_shared::db::migrations::run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
