//! Seed a demo tenant with a service catalogue and a few customers.
//!
//! Intended for local development; running it twice for the same tenant
//! fails on the tenant primary key rather than duplicating the catalogue.

use tracing::info;

use chairtime_core::{Money, TenantId};
use chairtime_engine::EngineConfig;
use chairtime_engine::store::create_pool;

const SERVICES: &[(&str, u32, i32)] = &[
    ("Haircut", 3000, 30),
    ("Beard Trim", 1500, 15),
    ("Cut & Shave", 4000, 45),
];

const CUSTOMERS: &[(&str, Option<&str>)] = &[
    ("Alex Morgan", Some("+1-555-0101")),
    ("Sam Rivera", Some("+1-555-0102")),
    ("Jordan Lee", None),
];

/// Create a tenant and fill it with demo data.
///
/// # Errors
///
/// Returns an error if the tenant id is malformed, configuration is
/// missing, or the inserts fail (including when the tenant already exists).
pub async fn run(
    tenant: &str,
    name: &str,
    utc_offset_minutes: Option<i32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let tenant = TenantId::parse(tenant)?;
    let config = EngineConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;

    info!(tenant = %tenant, "Creating tenant");
    sqlx::query("INSERT INTO tenant (id, name, utc_offset_minutes) VALUES ($1, $2, $3)")
        .bind(tenant.as_str())
        .bind(name)
        .bind(utc_offset_minutes)
        .execute(&pool)
        .await?;

    for (service_name, cents, duration) in SERVICES {
        sqlx::query(
            "INSERT INTO service (tenant_id, name, price, duration_minutes) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(tenant.as_str())
        .bind(service_name)
        .bind(Money::from_cents(*cents))
        .bind(duration)
        .execute(&pool)
        .await?;
        info!(service = service_name, "Created service");
    }

    for (customer_name, phone) in CUSTOMERS {
        sqlx::query("INSERT INTO customer (tenant_id, name, phone) VALUES ($1, $2, $3)")
            .bind(tenant.as_str())
            .bind(customer_name)
            .bind(*phone)
            .execute(&pool)
            .await?;
        info!(customer = customer_name, "Created customer");
    }

    info!(tenant = %tenant, "Seeding complete!");
    Ok(())
}
