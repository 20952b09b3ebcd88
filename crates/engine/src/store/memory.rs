//! In-memory entity store.
//!
//! Each tenant's state sits behind its own mutex, giving the
//! single-writer-per-tenant discipline the position invariant needs without
//! blocking unrelated tenants. Used by the test suites and the CLI seed command;
//! production deployments use [`super::PgStore`].

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use chairtime_core::{
    AppointmentId, AppointmentStatus, CustomerId, Money, QueueEntryId, QueueStatus, ServiceId,
    TenantId,
};

use crate::clock::DayWindow;
use crate::error::{EngineError, Result};
use crate::models::{
    Appointment, AppointmentUpdate, Customer, NewAppointment, NewCustomer, NewQueueEntry,
    NewService, NewTransaction, QueueEntry, Service, Tenant, Transaction,
};

use super::EntityStore;

/// Per-tenant state, guarded by one mutex.
#[derive(Debug)]
struct TenantState {
    tenant: Tenant,
    customers: BTreeMap<CustomerId, Customer>,
    services: BTreeMap<ServiceId, Service>,
    queue: BTreeMap<QueueEntryId, QueueEntry>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    transactions: Vec<Transaction>,
    next_id: i32,
}

impl TenantState {
    fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            customers: BTreeMap::new(),
            services: BTreeMap::new(),
            queue: BTreeMap::new(),
            appointments: BTreeMap::new(),
            transactions: Vec::new(),
            next_id: 1,
        }
    }

    fn mint_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn active_count(&self) -> i32 {
        i32::try_from(
            self.queue
                .values()
                .filter(|e| !e.status.is_terminal())
                .count(),
        )
        .unwrap_or(i32::MAX)
    }

    // New arrivals join behind the highest live rank. A live count would
    // collide once a mid-line entry completes and leaves a gap; the two
    // agree whenever the line is dense.
    fn next_position(&self) -> i32 {
        self.queue
            .values()
            .filter(|e| !e.status.is_terminal())
            .map(|e| e.position)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }
}

/// In-memory [`EntityStore`] with per-tenant locking.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tenants: RwLock<HashMap<TenantId, Arc<Mutex<TenantState>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, tenant: &TenantId) -> Result<Arc<Mutex<TenantState>>> {
        self.tenants
            .read()
            .get(tenant)
            .cloned()
            .ok_or_else(|| EngineError::TenantNotFound(tenant.to_string()))
    }

    // --- collaborator-side CRUD (tenants, customers, services, POS) ---
    //
    // These sit outside the `EntityStore` trait: the engine never creates
    // customers, services or transactions. Tests and the seed command do.

    /// Register a tenant.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the tenant already exists.
    pub fn create_tenant(&self, tenant: Tenant) -> Result<Tenant> {
        let mut tenants = self.tenants.write();
        if tenants.contains_key(&tenant.id) {
            return Err(EngineError::Validation(format!(
                "tenant {} already exists",
                tenant.id
            )));
        }
        tenants.insert(
            tenant.id.clone(),
            Arc::new(Mutex::new(TenantState::new(tenant.clone()))),
        );
        Ok(tenant)
    }

    /// Create a customer within a tenant.
    ///
    /// # Errors
    ///
    /// Returns `TenantNotFound` for an unknown tenant and `Validation` for
    /// an empty name.
    pub fn add_customer(&self, tenant: &TenantId, new: NewCustomer) -> Result<Customer> {
        if new.name.trim().is_empty() {
            return Err(EngineError::Validation(
                "customer name is required".to_owned(),
            ));
        }
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let customer = Customer {
            id: CustomerId::new(state.mint_id()),
            tenant_id: tenant.clone(),
            name: new.name,
            phone: new.phone,
            email: new.email,
            visit_count: 0,
            preferred_barber: new.preferred_barber,
        };
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    /// Create a service within a tenant.
    ///
    /// # Errors
    ///
    /// Returns `TenantNotFound` for an unknown tenant and `Validation` for
    /// a non-positive duration or price.
    pub fn add_service(&self, tenant: &TenantId, new: NewService) -> Result<Service> {
        if new.duration_minutes <= 0 {
            return Err(EngineError::Validation(
                "service duration must be a positive number of minutes".to_owned(),
            ));
        }
        if new.price.is_zero() {
            return Err(EngineError::Validation(
                "service price must be positive".to_owned(),
            ));
        }
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let service = Service {
            id: ServiceId::new(state.mint_id()),
            tenant_id: tenant.clone(),
            name: new.name,
            price: new.price,
            duration_minutes: new.duration_minutes,
            is_active: true,
        };
        state.services.insert(service.id, service.clone());
        Ok(service)
    }

    /// Flip a service's soft-delete flag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service doesn't resolve within the tenant.
    pub fn set_service_active(
        &self,
        tenant: &TenantId,
        id: ServiceId,
        active: bool,
    ) -> Result<Service> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let service = state
            .services
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("service {id}")))?;
        service.is_active = active;
        Ok(service.clone())
    }

    /// Record a point-of-sale transaction.
    ///
    /// # Errors
    ///
    /// Returns `TenantNotFound` for an unknown tenant.
    pub fn record_transaction(&self, tenant: &TenantId, new: NewTransaction) -> Result<Transaction> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let transaction = Transaction {
            id: chairtime_core::TransactionId::new(state.mint_id()),
            tenant_id: tenant.clone(),
            customer_id: new.customer_id,
            appointment_id: new.appointment_id,
            total: new.total,
            payment_method: new.payment_method,
            status: new.status,
            created_at: new.created_at,
        };
        state.transactions.push(transaction.clone());
        Ok(transaction)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn tenant(&self, tenant: &TenantId) -> Result<Option<Tenant>> {
        Ok(self
            .tenants
            .read()
            .get(tenant)
            .map(|shard| shard.lock().tenant.clone()))
    }

    async fn customer(&self, tenant: &TenantId, id: CustomerId) -> Result<Option<Customer>> {
        let Ok(shard) = self.shard(tenant) else {
            return Ok(None);
        };
        let state = shard.lock();
        Ok(state.customers.get(&id).cloned())
    }

    async fn service(&self, tenant: &TenantId, id: ServiceId) -> Result<Option<Service>> {
        let Ok(shard) = self.shard(tenant) else {
            return Ok(None);
        };
        let state = shard.lock();
        Ok(state.services.get(&id).cloned())
    }

    async fn append_queue_entry(
        &self,
        tenant: &TenantId,
        new: NewQueueEntry,
    ) -> Result<QueueEntry> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let position = state.next_position();
        let entry = QueueEntry {
            id: QueueEntryId::new(state.mint_id()),
            tenant_id: tenant.clone(),
            customer_id: new.customer_id,
            service_id: new.service_id,
            barber: new.barber,
            position,
            status: QueueStatus::Waiting,
            estimated_wait_minutes: new.estimated_wait_minutes,
            joined_at: new.joined_at,
        };
        state.queue.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn queue_entry(&self, tenant: &TenantId, id: QueueEntryId) -> Result<Option<QueueEntry>> {
        let Ok(shard) = self.shard(tenant) else {
            return Ok(None);
        };
        let state = shard.lock();
        Ok(state.queue.get(&id).cloned())
    }

    async fn active_queue_entries(&self, tenant: &TenantId) -> Result<Vec<QueueEntry>> {
        let shard = self.shard(tenant)?;
        let state = shard.lock();
        let mut entries: Vec<QueueEntry> = state
            .queue
            .values()
            .filter(|e| !e.status.is_terminal())
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.position);
        Ok(entries)
    }

    async fn waiting_count(&self, tenant: &TenantId) -> Result<i64> {
        let shard = self.shard(tenant)?;
        let state = shard.lock();
        let count = state
            .queue
            .values()
            .filter(|e| e.status == QueueStatus::Waiting)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn queue_entry_waits(&self, tenant: &TenantId) -> Result<Vec<i32>> {
        let shard = self.shard(tenant)?;
        let state = shard.lock();
        Ok(state
            .queue
            .values()
            .map(|e| e.estimated_wait_minutes)
            .collect())
    }

    async fn queue_joined_count(&self, tenant: &TenantId, window: DayWindow) -> Result<i64> {
        let shard = self.shard(tenant)?;
        let state = shard.lock();
        let count = state
            .queue
            .values()
            .filter(|e| window.contains(e.joined_at))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn move_queue_entry(
        &self,
        tenant: &TenantId,
        id: QueueEntryId,
        new_position: i32,
    ) -> Result<QueueEntry> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();

        let entry = state
            .queue
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))?;
        if entry.status.is_terminal() {
            return Err(EngineError::Validation(
                "completed entries sit outside the ordered line and cannot be repositioned"
                    .to_owned(),
            ));
        }
        let old_position = entry.position;

        let count = state.active_count();
        if new_position < 1 || new_position > count {
            return Err(EngineError::InvalidPosition {
                given: new_position,
                max: count,
            });
        }

        // Shift everything between the old and new rank by exactly one,
        // then drop the moved entry into the freed slot. All under the
        // tenant lock, so the sequence is never observed mid-shift.
        for other in state.queue.values_mut() {
            if other.status.is_terminal() {
                continue;
            }
            if other.id == id {
                other.position = new_position;
            } else if new_position < old_position
                && other.position >= new_position
                && other.position < old_position
            {
                other.position += 1;
            } else if new_position > old_position
                && other.position > old_position
                && other.position <= new_position
            {
                other.position -= 1;
            }
        }

        state
            .queue
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))
    }

    async fn update_queue_status(
        &self,
        tenant: &TenantId,
        id: QueueEntryId,
        from: QueueStatus,
        to: QueueStatus,
    ) -> Result<QueueEntry> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let entry = state
            .queue
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))?;
        if entry.status != from {
            return Err(EngineError::ConcurrencyConflict);
        }
        entry.status = to;
        Ok(entry.clone())
    }

    async fn delete_queue_entry(&self, tenant: &TenantId, id: QueueEntryId) -> Result<()> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let removed = state
            .queue
            .remove(&id)
            .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))?;

        // Terminal entries are already outside the dense window; removing
        // one never disturbs the live positions.
        if !removed.status.is_terminal() {
            for other in state.queue.values_mut() {
                if !other.status.is_terminal() && other.position > removed.position {
                    other.position -= 1;
                }
            }
        }
        Ok(())
    }

    async fn insert_appointment(
        &self,
        tenant: &TenantId,
        new: NewAppointment,
    ) -> Result<Appointment> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let appointment = Appointment {
            id: AppointmentId::new(state.mint_id()),
            tenant_id: tenant.clone(),
            customer_id: new.customer_id,
            service_id: new.service_id,
            barber: new.barber,
            start_time: new.start_time,
            end_time: new.end_time,
            status: AppointmentStatus::Scheduled,
            notes: new.notes,
        };
        state.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn appointment(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
    ) -> Result<Option<Appointment>> {
        let Ok(shard) = self.shard(tenant) else {
            return Ok(None);
        };
        let state = shard.lock();
        Ok(state.appointments.get(&id).cloned())
    }

    async fn update_appointment(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
        update: AppointmentUpdate,
    ) -> Result<Appointment> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let appointment = state
            .appointments
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("appointment {id}")))?;
        appointment.service_id = update.service_id;
        appointment.barber = update.barber;
        appointment.start_time = update.start_time;
        appointment.end_time = update.end_time;
        appointment.notes = update.notes;
        Ok(appointment.clone())
    }

    async fn update_appointment_status(
        &self,
        tenant: &TenantId,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        let appointment = state
            .appointments
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("appointment {id}")))?;
        if appointment.status != from {
            return Err(EngineError::ConcurrencyConflict);
        }
        appointment.status = to;
        Ok(appointment.clone())
    }

    async fn appointments_in_window(
        &self,
        tenant: &TenantId,
        window: DayWindow,
    ) -> Result<Vec<Appointment>> {
        let shard = self.shard(tenant)?;
        let state = shard.lock();
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| window.contains(a.start_time))
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.start_time);
        Ok(appointments)
    }

    async fn appointment_count(&self, tenant: &TenantId, window: DayWindow) -> Result<i64> {
        let shard = self.shard(tenant)?;
        let state = shard.lock();
        let count = state
            .appointments
            .values()
            .filter(|a| window.contains(a.start_time))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn delete_appointment(&self, tenant: &TenantId, id: AppointmentId) -> Result<()> {
        let shard = self.shard(tenant)?;
        let mut state = shard.lock();
        state
            .appointments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("appointment {id}")))
    }

    async fn revenue_in_window(&self, tenant: &TenantId, window: DayWindow) -> Result<Money> {
        let shard = self.shard(tenant)?;
        let state = shard.lock();
        Ok(state
            .transactions
            .iter()
            .filter(|t| window.contains(t.created_at))
            .map(|t| t.total)
            .sum())
    }
}
