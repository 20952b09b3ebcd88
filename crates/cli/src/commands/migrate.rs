//! Database migration command.
//!
//! # Environment Variables
//!
//! - `CHAIRTIME_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)

use tracing::info;

use chairtime_engine::EngineConfig;
use chairtime_engine::store::{PgStore, create_pool};

/// Apply the engine's migrations to the configured database.
///
/// # Errors
///
/// Returns an error if configuration is missing, the connection fails, or a
/// migration fails to apply.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;

    info!("Running migrations...");
    PgStore::new(pool).migrate().await?;

    info!("Migrations complete!");
    Ok(())
}
