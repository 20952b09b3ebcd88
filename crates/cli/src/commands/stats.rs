//! Print a tenant's dashboard snapshot.

use std::sync::Arc;

use chairtime_core::TenantId;
use chairtime_engine::store::{PgStore, create_pool};
use chairtime_engine::{EngineConfig, StatsService, SystemClock};

/// Compute and print the tenant's snapshot for the current local day.
///
/// # Errors
///
/// Returns an error if the tenant id is malformed, the tenant is unknown,
/// or the database cannot be reached.
pub async fn run(tenant: &str) -> Result<(), Box<dyn std::error::Error>> {
    let tenant = TenantId::parse(tenant)?;
    let config = EngineConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;

    let stats = StatsService::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(SystemClock),
        config.default_offset(),
    );
    let snapshot = stats.snapshot(&tenant).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    Ok(())
}
