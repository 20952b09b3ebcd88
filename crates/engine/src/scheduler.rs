//! Appointment booking and lifecycle.

use std::sync::Arc;

use chrono::{Duration, FixedOffset};
use tracing::{info, instrument};

use chairtime_core::{AppointmentId, AppointmentStatus, CustomerId, ServiceId, TenantId};

use crate::clock::{Clock, day_window, offset_from_minutes};
use crate::error::{EngineError, Result};
use crate::models::{Appointment, AppointmentPatch, AppointmentUpdate, NewAppointment, Service};
use crate::store::EntityStore;

/// Parameters for booking an appointment.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    /// Customer to book for.
    pub customer_id: CustomerId,
    /// Service to book.
    pub service_id: ServiceId,
    /// Requested barber, if any.
    pub barber: Option<String>,
    /// Slot start in UTC.
    pub start_time: chrono::DateTime<chrono::Utc>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Fixed-time booking service over an [`EntityStore`].
///
/// The end time of an appointment is never accepted from callers. It is
/// derived as `start_time + service duration` at booking and re-derived on
/// every reschedule that touches the start or the service, so the two can
/// never drift apart.
pub struct AppointmentScheduler<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    default_offset: FixedOffset,
}

impl<S: EntityStore> AppointmentScheduler<S> {
    /// Create a new scheduler.
    ///
    /// `default_offset` is the shop-local UTC offset used for tenants that
    /// have not configured their own.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<dyn Clock>, default_offset: FixedOffset) -> Self {
        Self {
            store,
            clock,
            default_offset,
        }
    }

    async fn resolve_service(&self, tenant: &TenantId, id: ServiceId) -> Result<Service> {
        self.store
            .service(tenant, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("service {id}")))
    }

    /// Book an appointment starting at the requested time.
    ///
    /// Booking does not require the service to be active; front-desk staff
    /// can honour a legacy price for a regular.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the customer or service doesn't resolve within
    /// the tenant.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn book(&self, tenant: &TenantId, request: BookingRequest) -> Result<Appointment> {
        self.store
            .customer(tenant, request.customer_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("customer {}", request.customer_id)))?;
        let service = self.resolve_service(tenant, request.service_id).await?;

        let end_time = request.start_time + Duration::minutes(i64::from(service.duration_minutes));
        let appointment = self
            .store
            .insert_appointment(
                tenant,
                NewAppointment {
                    customer_id: request.customer_id,
                    service_id: request.service_id,
                    barber: request.barber,
                    start_time: request.start_time,
                    end_time,
                    notes: request.notes,
                },
            )
            .await?;
        info!(
            appointment_id = %appointment.id,
            start = %appointment.start_time,
            end = %appointment.end_time,
            "booked appointment"
        );
        Ok(appointment)
    }

    /// Apply a partial update to an appointment.
    ///
    /// When the patch changes `start_time` or `service_id`, the end time is
    /// recomputed from the effective pair. An empty patch is a no-op that
    /// returns the appointment unchanged. Patch fields are set-only: a
    /// `None` for `barber` or `notes` keeps the stored value rather than
    /// clearing it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the appointment or a patched-in service doesn't
    /// resolve within the tenant.
    #[instrument(skip(self, patch), fields(tenant = %tenant))]
    pub async fn reschedule(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
        patch: AppointmentPatch,
    ) -> Result<Appointment> {
        let current = self
            .store
            .appointment(tenant, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("appointment {id}")))?;
        if patch.is_empty() {
            return Ok(current);
        }

        let service_id = patch.service_id.unwrap_or(current.service_id);
        let start_time = patch.start_time.unwrap_or(current.start_time);
        let end_time = if service_id == current.service_id && start_time == current.start_time {
            current.end_time
        } else {
            let service = self.resolve_service(tenant, service_id).await?;
            start_time + Duration::minutes(i64::from(service.duration_minutes))
        };

        let updated = self
            .store
            .update_appointment(
                tenant,
                id,
                AppointmentUpdate {
                    service_id,
                    barber: patch.barber.or(current.barber),
                    start_time,
                    end_time,
                    notes: patch.notes.or(current.notes),
                },
            )
            .await?;
        info!(
            appointment_id = %updated.id,
            start = %updated.start_time,
            end = %updated.end_time,
            "rescheduled appointment"
        );
        Ok(updated)
    }

    /// Move an appointment to a new status along the defined edges:
    /// `scheduled -> in_progress | cancelled`, `in_progress -> completed |
    /// cancelled`.
    ///
    /// The write is compare-and-set against the status observed here.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown appointment, `InvalidTransition`
    /// for an edge outside the state machine, and `ConcurrencyConflict`
    /// when a concurrent update won the race.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn transition(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
        to: AppointmentStatus,
    ) -> Result<Appointment> {
        let current = self
            .store
            .appointment(tenant, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("appointment {id}")))?;
        if !current.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }
        let updated = self
            .store
            .update_appointment_status(tenant, id, current.status, to)
            .await?;
        info!(appointment_id = %updated.id, status = %updated.status, "appointment transitioned");
        Ok(updated)
    }

    /// Appointments starting today in the tenant's local day, ordered by
    /// start time.
    ///
    /// "Today" is the shop-local calendar day: the window runs from local
    /// midnight for 24 hours, evaluated at the tenant's configured UTC
    /// offset (or the engine default).
    ///
    /// # Errors
    ///
    /// Returns `TenantNotFound` for an unknown tenant.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn todays_appointments(&self, tenant: &TenantId) -> Result<Vec<Appointment>> {
        let row = self
            .store
            .tenant(tenant)
            .await?
            .ok_or_else(|| EngineError::TenantNotFound(tenant.to_string()))?;
        let offset = row
            .utc_offset_minutes
            .map_or(self.default_offset, offset_from_minutes);
        let window = day_window(self.clock.now(), offset);
        self.store.appointments_in_window(tenant, window).await
    }

    /// Hard-delete an appointment at any status.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown appointment.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn remove(&self, tenant: &TenantId, id: AppointmentId) -> Result<()> {
        self.store.delete_appointment(tenant, id).await?;
        info!(appointment_id = %id, "removed appointment");
        Ok(())
    }
}
