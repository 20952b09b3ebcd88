//! `PostgreSQL` entity store.
//!
//! Multi-row mutations (append, move, delete-and-renumber) run inside one
//! transaction that first locks the tenant row with `SELECT ... FOR UPDATE`,
//! which serialises writers per tenant without blocking other tenants.
//! Status changes use compare-and-set updates so a lost update surfaces as
//! `ConcurrencyConflict` instead of silently overwriting.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};

use chairtime_core::{
    AppointmentId, AppointmentStatus, CustomerId, Money, QueueEntryId, QueueStatus, ServiceId,
    TenantId,
};

use crate::clock::DayWindow;
use crate::error::{EngineError, Result};
use crate::models::{
    Appointment, AppointmentUpdate, Customer, NewAppointment, NewQueueEntry, QueueEntry, Service,
    Tenant,
};

use super::{EntityStore, RepositoryError};

/// Embedded migrations for the engine schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL`-backed [`EntityStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if a migration fails to apply.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(RepositoryError::Migration)?;
        Ok(())
    }

    /// Lock the tenant row for the duration of the transaction, serialising
    /// writers per tenant.
    async fn lock_tenant(
        tx: &mut PgTransaction<'_, Postgres>,
        tenant: &TenantId,
    ) -> Result<()> {
        let locked: Option<String> =
            sqlx::query_scalar("SELECT id FROM tenant WHERE id = $1 FOR UPDATE")
                .bind(tenant.as_str())
                .fetch_optional(&mut **tx)
                .await?;
        if locked.is_none() {
            return Err(EngineError::TenantNotFound(tenant.to_string()));
        }
        Ok(())
    }
}

// --- row types ---

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: String,
    name: String,
    utc_offset_minutes: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = RepositoryError;

    fn try_from(row: TenantRow) -> std::result::Result<Self, RepositoryError> {
        Ok(Self {
            id: parse_tenant_id(&row.id)?,
            name: row.name,
            utc_offset_minutes: row.utc_offset_minutes,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    tenant_id: String,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    visit_count: i32,
    preferred_barber: Option<String>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> std::result::Result<Self, RepositoryError> {
        Ok(Self {
            id: CustomerId::new(row.id),
            tenant_id: parse_tenant_id(&row.tenant_id)?,
            name: row.name,
            phone: row.phone,
            email: row.email,
            visit_count: row.visit_count,
            preferred_barber: row.preferred_barber,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: i32,
    tenant_id: String,
    name: String,
    price: Money,
    duration_minutes: i32,
    is_active: bool,
}

impl TryFrom<ServiceRow> for Service {
    type Error = RepositoryError;

    fn try_from(row: ServiceRow) -> std::result::Result<Self, RepositoryError> {
        Ok(Self {
            id: ServiceId::new(row.id),
            tenant_id: parse_tenant_id(&row.tenant_id)?,
            name: row.name,
            price: row.price,
            duration_minutes: row.duration_minutes,
            is_active: row.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    id: i32,
    tenant_id: String,
    customer_id: i32,
    service_id: i32,
    barber: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    notes: Option<String>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = RepositoryError;

    fn try_from(row: AppointmentRow) -> std::result::Result<Self, RepositoryError> {
        Ok(Self {
            id: AppointmentId::new(row.id),
            tenant_id: parse_tenant_id(&row.tenant_id)?,
            customer_id: CustomerId::new(row.customer_id),
            service_id: ServiceId::new(row.service_id),
            barber: row.barber,
            start_time: row.start_time,
            end_time: row.end_time,
            status: parse_status(&row.status)?,
            notes: row.notes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QueueEntryRow {
    id: i32,
    tenant_id: String,
    customer_id: i32,
    service_id: i32,
    barber: Option<String>,
    position: i32,
    status: String,
    estimated_wait_minutes: i32,
    joined_at: DateTime<Utc>,
}

impl TryFrom<QueueEntryRow> for QueueEntry {
    type Error = RepositoryError;

    fn try_from(row: QueueEntryRow) -> std::result::Result<Self, RepositoryError> {
        Ok(Self {
            id: QueueEntryId::new(row.id),
            tenant_id: parse_tenant_id(&row.tenant_id)?,
            customer_id: CustomerId::new(row.customer_id),
            service_id: ServiceId::new(row.service_id),
            barber: row.barber,
            position: row.position,
            status: parse_status(&row.status)?,
            estimated_wait_minutes: row.estimated_wait_minutes,
            joined_at: row.joined_at,
        })
    }
}

fn parse_tenant_id(raw: &str) -> std::result::Result<TenantId, RepositoryError> {
    TenantId::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid tenant id in database: {e}")))
}

fn parse_status<T: std::str::FromStr<Err = String>>(
    raw: &str,
) -> std::result::Result<T, RepositoryError> {
    raw.parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid status in database: {e}")))
}

const SELECT_QUEUE_ENTRY: &str = r#"
    SELECT id, tenant_id, customer_id, service_id, barber, "position",
           status, estimated_wait_minutes, joined_at
    FROM queue_entry
"#;

const SELECT_APPOINTMENT: &str = r"
    SELECT id, tenant_id, customer_id, service_id, barber, start_time,
           end_time, status, notes
    FROM appointment
";

#[async_trait]
impl EntityStore for PgStore {
    async fn tenant(&self, tenant: &TenantId) -> Result<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, utc_offset_minutes, created_at FROM tenant WHERE id = $1",
        )
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Tenant::try_from).transpose()?)
    }

    async fn customer(&self, tenant: &TenantId, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, tenant_id, name, phone, email, visit_count, preferred_barber
             FROM customer WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_str())
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Customer::try_from).transpose()?)
    }

    async fn service(&self, tenant: &TenantId, id: ServiceId) -> Result<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(
            "SELECT id, tenant_id, name, price, duration_minutes, is_active
             FROM service WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.as_str())
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Service::try_from).transpose()?)
    }

    async fn append_queue_entry(
        &self,
        tenant: &TenantId,
        new: NewQueueEntry,
    ) -> Result<QueueEntry> {
        let mut tx = self.pool.begin().await?;
        Self::lock_tenant(&mut tx, tenant).await?;

        // New arrivals join behind the highest live rank. A live count would
        // collide once a mid-line entry completes and leaves a gap.
        let highest: i32 = sqlx::query_scalar(
            r#"SELECT COALESCE(MAX("position"), 0) FROM queue_entry
               WHERE tenant_id = $1 AND status <> 'completed'"#,
        )
        .bind(tenant.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let position = highest.saturating_add(1);

        let row = sqlx::query_as::<_, QueueEntryRow>(
            r#"
            INSERT INTO queue_entry
                (tenant_id, customer_id, service_id, barber, "position",
                 status, estimated_wait_minutes, joined_at)
            VALUES ($1, $2, $3, $4, $5, 'waiting', $6, $7)
            RETURNING id, tenant_id, customer_id, service_id, barber,
                      "position", status, estimated_wait_minutes, joined_at
            "#,
        )
        .bind(tenant.as_str())
        .bind(new.customer_id.as_i32())
        .bind(new.service_id.as_i32())
        .bind(&new.barber)
        .bind(position)
        .bind(new.estimated_wait_minutes)
        .bind(new.joined_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(QueueEntry::try_from(row)?)
    }

    async fn queue_entry(&self, tenant: &TenantId, id: QueueEntryId) -> Result<Option<QueueEntry>> {
        let sql = format!("{SELECT_QUEUE_ENTRY} WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query_as::<_, QueueEntryRow>(&sql)
            .bind(tenant.as_str())
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(QueueEntry::try_from).transpose()?)
    }

    async fn active_queue_entries(&self, tenant: &TenantId) -> Result<Vec<QueueEntry>> {
        let sql = format!(
            r#"{SELECT_QUEUE_ENTRY} WHERE tenant_id = $1 AND status <> 'completed'
               ORDER BY "position" ASC"#
        );
        let rows = sqlx::query_as::<_, QueueEntryRow>(&sql)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Ok(QueueEntry::try_from(row)?))
            .collect()
    }

    async fn waiting_count(&self, tenant: &TenantId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_entry WHERE tenant_id = $1 AND status = 'waiting'",
        )
        .bind(tenant.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn queue_entry_waits(&self, tenant: &TenantId) -> Result<Vec<i32>> {
        let waits: Vec<i32> =
            sqlx::query_scalar("SELECT estimated_wait_minutes FROM queue_entry WHERE tenant_id = $1")
                .bind(tenant.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(waits)
    }

    async fn queue_joined_count(&self, tenant: &TenantId, window: DayWindow) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_entry
             WHERE tenant_id = $1 AND joined_at >= $2 AND joined_at < $3",
        )
        .bind(tenant.as_str())
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn move_queue_entry(
        &self,
        tenant: &TenantId,
        id: QueueEntryId,
        new_position: i32,
    ) -> Result<QueueEntry> {
        let mut tx = self.pool.begin().await?;
        Self::lock_tenant(&mut tx, tenant).await?;

        let sql = format!("{SELECT_QUEUE_ENTRY} WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query_as::<_, QueueEntryRow>(&sql)
            .bind(tenant.as_str())
            .bind(id.as_i32())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))?;
        let entry = QueueEntry::try_from(row)?;
        if entry.status.is_terminal() {
            return Err(EngineError::Validation(
                "completed entries sit outside the ordered line and cannot be repositioned"
                    .to_owned(),
            ));
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_entry WHERE tenant_id = $1 AND status <> 'completed'",
        )
        .bind(tenant.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let count = i32::try_from(active).unwrap_or(i32::MAX);
        if new_position < 1 || new_position > count {
            return Err(EngineError::InvalidPosition {
                given: new_position,
                max: count,
            });
        }

        let old_position = entry.position;
        if new_position < old_position {
            sqlx::query(
                r#"UPDATE queue_entry SET "position" = "position" + 1
                   WHERE tenant_id = $1 AND status <> 'completed'
                     AND "position" >= $2 AND "position" < $3"#,
            )
            .bind(tenant.as_str())
            .bind(new_position)
            .bind(old_position)
            .execute(&mut *tx)
            .await?;
        } else if new_position > old_position {
            sqlx::query(
                r#"UPDATE queue_entry SET "position" = "position" - 1
                   WHERE tenant_id = $1 AND status <> 'completed'
                     AND "position" > $2 AND "position" <= $3"#,
            )
            .bind(tenant.as_str())
            .bind(old_position)
            .bind(new_position)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, QueueEntryRow>(
            r#"UPDATE queue_entry SET "position" = $3 WHERE tenant_id = $1 AND id = $2
               RETURNING id, tenant_id, customer_id, service_id, barber, "position",
                         status, estimated_wait_minutes, joined_at"#,
        )
            .bind(tenant.as_str())
            .bind(id.as_i32())
            .bind(new_position)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(QueueEntry::try_from(row)?)
    }

    async fn update_queue_status(
        &self,
        tenant: &TenantId,
        id: QueueEntryId,
        from: QueueStatus,
        to: QueueStatus,
    ) -> Result<QueueEntry> {
        let row = sqlx::query_as::<_, QueueEntryRow>(
            r#"
            UPDATE queue_entry SET status = $4
            WHERE tenant_id = $1 AND id = $2 AND status = $3
            RETURNING id, tenant_id, customer_id, service_id, barber, "position",
                      status, estimated_wait_minutes, joined_at
            "#,
        )
        .bind(tenant.as_str())
        .bind(id.as_i32())
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(QueueEntry::try_from(row)?),
            None => {
                // Distinguish a missing entry from a lost update.
                let exists = self.queue_entry(tenant, id).await?;
                match exists {
                    Some(_) => Err(EngineError::ConcurrencyConflict),
                    None => Err(EngineError::NotFound(format!("queue entry {id}"))),
                }
            }
        }
    }

    async fn delete_queue_entry(&self, tenant: &TenantId, id: QueueEntryId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_tenant(&mut tx, tenant).await?;

        let row = sqlx::query_as::<_, QueueEntryRow>(
            r#"
            DELETE FROM queue_entry WHERE tenant_id = $1 AND id = $2
            RETURNING id, tenant_id, customer_id, service_id, barber, "position",
                      status, estimated_wait_minutes, joined_at
            "#,
        )
        .bind(tenant.as_str())
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))?;
        let removed = QueueEntry::try_from(row)?;

        if !removed.status.is_terminal() {
            sqlx::query(
                r#"UPDATE queue_entry SET "position" = "position" - 1
                   WHERE tenant_id = $1 AND status <> 'completed' AND "position" > $2"#,
            )
            .bind(tenant.as_str())
            .bind(removed.position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_appointment(
        &self,
        tenant: &TenantId,
        new: NewAppointment,
    ) -> Result<Appointment> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            r"
            INSERT INTO appointment
                (tenant_id, customer_id, service_id, barber, start_time, end_time,
                 status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, 'scheduled', $7)
            RETURNING id, tenant_id, customer_id, service_id, barber, start_time,
                      end_time, status, notes
            ",
        )
        .bind(tenant.as_str())
        .bind(new.customer_id.as_i32())
        .bind(new.service_id.as_i32())
        .bind(&new.barber)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(&new.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(Appointment::try_from(row)?)
    }

    async fn appointment(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
    ) -> Result<Option<Appointment>> {
        let sql = format!("{SELECT_APPOINTMENT} WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(tenant.as_str())
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Appointment::try_from).transpose()?)
    }

    async fn update_appointment(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
        update: AppointmentUpdate,
    ) -> Result<Appointment> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            r"
            UPDATE appointment
            SET service_id = $3, barber = $4, start_time = $5, end_time = $6, notes = $7
            WHERE tenant_id = $1 AND id = $2
            RETURNING id, tenant_id, customer_id, service_id, barber, start_time,
                      end_time, status, notes
            ",
        )
        .bind(tenant.as_str())
        .bind(id.as_i32())
        .bind(update.service_id.as_i32())
        .bind(&update.barber)
        .bind(update.start_time)
        .bind(update.end_time)
        .bind(&update.notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("appointment {id}")))?;
        Ok(Appointment::try_from(row)?)
    }

    async fn update_appointment_status(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            r"
            UPDATE appointment SET status = $4
            WHERE tenant_id = $1 AND id = $2 AND status = $3
            RETURNING id, tenant_id, customer_id, service_id, barber, start_time,
                      end_time, status, notes
            ",
        )
        .bind(tenant.as_str())
        .bind(id.as_i32())
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Appointment::try_from(row)?),
            None => match self.appointment(tenant, id).await? {
                Some(_) => Err(EngineError::ConcurrencyConflict),
                None => Err(EngineError::NotFound(format!("appointment {id}"))),
            },
        }
    }

    async fn appointments_in_window(
        &self,
        tenant: &TenantId,
        window: DayWindow,
    ) -> Result<Vec<Appointment>> {
        let sql = format!(
            "{SELECT_APPOINTMENT} WHERE tenant_id = $1 AND start_time >= $2 AND start_time < $3
             ORDER BY start_time ASC"
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(tenant.as_str())
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Ok(Appointment::try_from(row)?))
            .collect()
    }

    async fn appointment_count(&self, tenant: &TenantId, window: DayWindow) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointment
             WHERE tenant_id = $1 AND start_time >= $2 AND start_time < $3",
        )
        .bind(tenant.as_str())
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn delete_appointment(&self, tenant: &TenantId, id: AppointmentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM appointment WHERE tenant_id = $1 AND id = $2")
            .bind(tenant.as_str())
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("appointment {id}")));
        }
        Ok(())
    }

    async fn revenue_in_window(&self, tenant: &TenantId, window: DayWindow) -> Result<Money> {
        let total: Money = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total), 0)::numeric FROM pos_transaction
             WHERE tenant_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(tenant.as_str())
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
