//! Entity store abstraction and implementations.
//!
//! The engine is a stateless request handler; durability and atomicity of
//! multi-row mutations (position shifts, delete-and-renumber) are the
//! store's job. Both implementations serialise writers per tenant:
//!
//! - [`MemoryStore`] - a per-tenant mutex around the tenant's state, used
//!   by tests and the seed command
//! - [`PgStore`] - `PostgreSQL` via sqlx, locking the tenant row inside a
//!   transaction

use async_trait::async_trait;
use thiserror::Error;

use chairtime_core::{
    AppointmentId, AppointmentStatus, CustomerId, Money, QueueEntryId, QueueStatus, ServiceId,
    TenantId,
};

use crate::clock::DayWindow;
use crate::error::Result;
use crate::models::{
    Appointment, AppointmentUpdate, Customer, NewAppointment, NewQueueEntry, QueueEntry, Service,
    Tenant,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{MIGRATOR, PgStore, create_pool};

/// Errors from the storage backend.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A schema migration failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be interpreted (e.g., an unknown status
    /// string).
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Transactional, tenant-scoped access to the engine's entities.
///
/// Every method is scoped by tenant; cross-tenant access is impossible by
/// construction. Methods that touch more than one row (append with position
/// assignment, move with shift, delete with renumber) are atomic: either the
/// whole mutation applies or none of it does.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Look up a tenant.
    async fn tenant(&self, tenant: &TenantId) -> Result<Option<Tenant>>;

    /// Look up a customer within the tenant.
    async fn customer(&self, tenant: &TenantId, id: CustomerId) -> Result<Option<Customer>>;

    /// Look up a service within the tenant.
    async fn service(&self, tenant: &TenantId, id: ServiceId) -> Result<Option<Service>>;

    // --- walk-in queue ---

    /// Append a new entry at the tail of the tenant's line.
    ///
    /// Assigns `position = (highest non-terminal position) + 1` and status
    /// `waiting` under the tenant's write lock, so the new rank collides
    /// neither with a concurrent append nor with a live entry stranded past
    /// a gap left by a mid-line completion.
    async fn append_queue_entry(&self, tenant: &TenantId, new: NewQueueEntry)
    -> Result<QueueEntry>;

    /// Look up a queue entry within the tenant.
    async fn queue_entry(&self, tenant: &TenantId, id: QueueEntryId) -> Result<Option<QueueEntry>>;

    /// Non-terminal entries ordered by position.
    async fn active_queue_entries(&self, tenant: &TenantId) -> Result<Vec<QueueEntry>>;

    /// Count of entries currently in `waiting`.
    async fn waiting_count(&self, tenant: &TenantId) -> Result<i64>;

    /// Wait estimates of ALL queue entries of the tenant, any status.
    async fn queue_entry_waits(&self, tenant: &TenantId) -> Result<Vec<i32>>;

    /// Count of entries whose `joined_at` falls in the window, any status.
    async fn queue_joined_count(&self, tenant: &TenantId, window: DayWindow) -> Result<i64>;

    /// Move a non-terminal entry to `new_position`, shifting every entry
    /// between the old and new rank by exactly one. Atomic.
    ///
    /// Fails with `NotFound` if the id doesn't resolve in the tenant,
    /// `Validation` if the entry is terminal (outside the dense window), and
    /// `InvalidPosition` if the target is outside `[1, count]`.
    async fn move_queue_entry(
        &self,
        tenant: &TenantId,
        id: QueueEntryId,
        new_position: i32,
    ) -> Result<QueueEntry>;

    /// Compare-and-set status update.
    ///
    /// Fails with `NotFound` if the id doesn't resolve and
    /// `ConcurrencyConflict` if the entry is no longer in `from`.
    async fn update_queue_status(
        &self,
        tenant: &TenantId,
        id: QueueEntryId,
        from: QueueStatus,
        to: QueueStatus,
    ) -> Result<QueueEntry>;

    /// Delete an entry from any state. When the entry was non-terminal,
    /// decrement every higher position by one in the same atomic mutation.
    async fn delete_queue_entry(&self, tenant: &TenantId, id: QueueEntryId) -> Result<()>;

    // --- appointments ---

    /// Persist a new appointment with status `scheduled`.
    async fn insert_appointment(
        &self,
        tenant: &TenantId,
        new: NewAppointment,
    ) -> Result<Appointment>;

    /// Look up an appointment within the tenant.
    async fn appointment(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
    ) -> Result<Option<Appointment>>;

    /// Replace the mutable fields of an appointment.
    async fn update_appointment(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
        update: AppointmentUpdate,
    ) -> Result<Appointment>;

    /// Compare-and-set status update, same contract as
    /// [`Self::update_queue_status`].
    async fn update_appointment_status(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment>;

    /// Appointments with `start_time` in the window, ordered by `start_time`
    /// ascending.
    async fn appointments_in_window(
        &self,
        tenant: &TenantId,
        window: DayWindow,
    ) -> Result<Vec<Appointment>>;

    /// Count of appointments with `start_time` in the window.
    async fn appointment_count(&self, tenant: &TenantId, window: DayWindow) -> Result<i64>;

    /// Hard-delete an appointment at any status.
    async fn delete_appointment(&self, tenant: &TenantId, id: AppointmentId) -> Result<()>;

    // --- transactions ---

    /// Sum of transaction totals with timestamp in the window, regardless
    /// of settlement status.
    async fn revenue_in_window(&self, tenant: &TenantId, window: DayWindow) -> Result<Money>;
}
