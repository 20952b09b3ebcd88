//! Domain types for the scheduling engine.
//!
//! These are validated domain objects, separate from database row types.
//! Customers, services and transactions are created by collaborator CRUD
//! (out of scope here); the engine creates appointments and queue entries
//! and reads the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chairtime_core::{
    AppointmentId, AppointmentStatus, CustomerId, Money, PaymentMethod, QueueEntryId, QueueStatus,
    ServiceId, TenantId, TransactionId, TransactionStatus,
};

/// One shop/business account - the top-level scoping key for everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// External identity-provider subject.
    pub id: TenantId,
    /// Display name of the shop.
    pub name: String,
    /// Shop-local UTC offset in minutes, used for "today" windows.
    /// Falls back to the engine-wide default when absent.
    pub utc_offset_minutes: Option<i32>,
    /// When the tenant was created.
    pub created_at: DateTime<Utc>,
}

/// A customer of one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Unique customer ID.
    pub id: CustomerId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Customer's display name.
    pub name: String,
    /// Contact phone number, if known.
    pub phone: Option<String>,
    /// Contact email, if known.
    pub email: Option<String>,
    /// Completed visits; monotonically non-decreasing, incremented by
    /// business logic outside this engine.
    pub visit_count: i32,
    /// Barber this customer usually asks for.
    pub preferred_barber: Option<String>,
}

/// A service offered by a tenant (e.g., "Haircut", 30 minutes).
///
/// Services are soft-deleted via `is_active` so historical appointments and
/// queue entries stay resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Unique service ID.
    pub id: ServiceId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Service name.
    pub name: String,
    /// Price, fixed-point with 2 fractional digits. Always positive.
    pub price: Money,
    /// Duration in minutes. Always positive.
    pub duration_minutes: i32,
    /// Soft-delete flag; inactive services cannot be newly admitted.
    pub is_active: bool,
}

/// A pre-booked, fixed-time booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    /// Unique appointment ID.
    pub id: AppointmentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Customer being served.
    pub customer_id: CustomerId,
    /// Service booked.
    pub service_id: ServiceId,
    /// Who is serving - a free-text label, not an entity reference.
    pub barber: Option<String>,
    /// Slot start.
    pub start_time: DateTime<Utc>,
    /// Slot end; always `start_time + service duration`, derived by the
    /// scheduler and never independently settable.
    pub end_time: DateTime<Utc>,
    /// Current status.
    pub status: AppointmentStatus,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// A walk-in waiting in the tenant's single ordered line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique queue entry ID.
    pub id: QueueEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Customer waiting.
    pub customer_id: CustomerId,
    /// Service requested.
    pub service_id: ServiceId,
    /// Who is serving - a free-text label.
    pub barber: Option<String>,
    /// Rank in the line. Among non-terminal entries of one tenant these
    /// values are unique and ordered; removal closes the gap it leaves,
    /// completion does not, so the line is exactly `{1..N}` only until a
    /// mid-line completion strands a rank.
    pub position: i32,
    /// Current status.
    pub status: QueueStatus,
    /// Wait estimate in minutes, stamped at admission time and not
    /// recomputed afterwards.
    pub estimated_wait_minutes: i32,
    /// When the customer joined the line.
    pub joined_at: DateTime<Utc>,
}

/// A point-of-sale transaction, read here for revenue aggregation only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID.
    pub id: TransactionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Customer, when known.
    pub customer_id: Option<CustomerId>,
    /// Appointment this paid for, when applicable.
    pub appointment_id: Option<AppointmentId>,
    /// Total charged.
    pub total: Money,
    /// How it was paid.
    pub payment_method: PaymentMethod,
    /// Settlement status.
    pub status: TransactionStatus,
    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
}

/// Input for admitting a queue entry. Position and status are assigned by
/// the store under its tenant lock.
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub customer_id: CustomerId,
    pub service_id: ServiceId,
    pub barber: Option<String>,
    pub estimated_wait_minutes: i32,
    pub joined_at: DateTime<Utc>,
}

/// Input for booking an appointment. Status starts as `scheduled`.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub customer_id: CustomerId,
    pub service_id: ServiceId,
    pub barber: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Partial update for an appointment.
///
/// There is deliberately no `end_time` field: the end is derived from
/// `start_time` and the effective service's duration on every mutation that
/// touches either.
///
/// All fields are set-only: `None` means "keep the current value". A patch
/// cannot clear `barber` or `notes` back to empty; that goes through a
/// deliberate write with the new value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentPatch {
    /// New slot start.
    pub start_time: Option<DateTime<Utc>>,
    /// Switch to a different service (end time follows its duration).
    pub service_id: Option<ServiceId>,
    /// Reassign the serving barber.
    pub barber: Option<String>,
    /// Replace the notes.
    pub notes: Option<String>,
}

impl AppointmentPatch {
    /// Whether the patch carries no changes at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.service_id.is_none()
            && self.barber.is_none()
            && self.notes.is_none()
    }
}

/// Fully-resolved field set the scheduler hands to the store when updating
/// an appointment.
#[derive(Debug, Clone)]
pub struct AppointmentUpdate {
    pub service_id: ServiceId,
    pub barber: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Collaborator-side input for creating a customer (used by seeding/tests).
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub preferred_barber: Option<String>,
}

/// Collaborator-side input for creating a service (used by seeding/tests).
#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub price: Money,
    pub duration_minutes: i32,
}

/// Collaborator-side input for recording a transaction (used by
/// seeding/tests).
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub customer_id: Option<CustomerId>,
    pub appointment_id: Option<AppointmentId>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}
