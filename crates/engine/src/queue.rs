//! Walk-in queue operations.
//!
//! Each tenant has exactly one line. Ordering is positional: non-terminal
//! entries hold unique, ordered positions, exactly `{1..N}` until a
//! mid-line completion parks an entry outside the line. Every mutation that
//! could disturb that invariant runs atomically inside the store.

use std::sync::Arc;

use tracing::{info, instrument};

use chairtime_core::{CustomerId, QueueEntryId, ServiceId, TenantId};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::estimator::WaitTimeEstimator;
use crate::models::{NewQueueEntry, QueueEntry};
use crate::store::EntityStore;

/// Parameters for admitting a walk-in to the line.
#[derive(Debug, Clone)]
pub struct AdmitParams {
    /// Customer joining the line.
    pub customer_id: CustomerId,
    /// Service they are waiting for.
    pub service_id: ServiceId,
    /// Requested barber, if any.
    pub barber: Option<String>,
}

/// Positional queue service over an [`EntityStore`].
pub struct QueueService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    estimator: WaitTimeEstimator<S>,
}

impl<S: EntityStore> QueueService<S> {
    /// Create a new queue service.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let estimator = WaitTimeEstimator::new(Arc::clone(&store));
        Self {
            store,
            clock,
            estimator,
        }
    }

    /// Admit a walk-in at the tail of the tenant's line.
    ///
    /// The entry is stamped with a wait estimate computed before the
    /// append, so the admitted customer's own entry does not inflate their
    /// estimate. Position assignment happens inside the store under the
    /// tenant's write lock.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the customer or service doesn't resolve within
    /// the tenant, and `Validation` if the service is inactive.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn admit(&self, tenant: &TenantId, params: AdmitParams) -> Result<QueueEntry> {
        self.store
            .customer(tenant, params.customer_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("customer {}", params.customer_id)))?;
        let service = self
            .store
            .service(tenant, params.service_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("service {}", params.service_id)))?;
        if !service.is_active {
            return Err(EngineError::Validation(format!(
                "service {} is inactive",
                service.id
            )));
        }

        let estimated_wait_minutes = self.estimator.estimate(tenant, params.service_id).await?;
        let entry = self
            .store
            .append_queue_entry(
                tenant,
                NewQueueEntry {
                    customer_id: params.customer_id,
                    service_id: params.service_id,
                    barber: params.barber,
                    estimated_wait_minutes,
                    joined_at: self.clock.now(),
                },
            )
            .await?;
        info!(
            entry_id = %entry.id,
            position = entry.position,
            wait = entry.estimated_wait_minutes,
            "admitted walk-in"
        );
        Ok(entry)
    }

    /// Move an entry to a new rank in the line.
    ///
    /// Entries strictly between the old and new rank shift by exactly one;
    /// all other entries keep their positions. The shift is atomic, so no
    /// reader ever observes a gapped or duplicated line.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown entry, `Validation` when the entry
    /// is terminal (it no longer occupies a rank), and `InvalidPosition`
    /// when the target falls outside `[1, count]`.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn reposition(
        &self,
        tenant: &TenantId,
        id: QueueEntryId,
        new_position: i32,
    ) -> Result<QueueEntry> {
        let entry = self.store.move_queue_entry(tenant, id, new_position).await?;
        info!(entry_id = %entry.id, position = entry.position, "repositioned entry");
        Ok(entry)
    }

    /// Advance an entry one step along `waiting -> in_progress -> completed`.
    ///
    /// The status write is compare-and-set against the status observed here,
    /// so two racing advances cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown entry, `InvalidTransition` when the
    /// entry is already completed, and `ConcurrencyConflict` when a
    /// concurrent update won the race.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn advance(&self, tenant: &TenantId, id: QueueEntryId) -> Result<QueueEntry> {
        let entry = self
            .store
            .queue_entry(tenant, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))?;
        let Some(next) = entry.status.next() else {
            return Err(EngineError::InvalidTransition {
                from: entry.status.to_string(),
                to: entry.status.to_string(),
            });
        };
        let updated = self
            .store
            .update_queue_status(tenant, id, entry.status, next)
            .await?;
        info!(entry_id = %updated.id, status = %updated.status, "advanced entry");
        Ok(updated)
    }

    /// Remove an entry from the line entirely, at any status.
    ///
    /// When the entry still occupied a rank, every entry behind it moves up
    /// by one in the same atomic mutation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown entry.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn remove(&self, tenant: &TenantId, id: QueueEntryId) -> Result<()> {
        self.store.delete_queue_entry(tenant, id).await?;
        info!(entry_id = %id, "removed entry");
        Ok(())
    }

    /// Non-terminal entries of the tenant, ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    pub async fn entries(&self, tenant: &TenantId) -> Result<Vec<QueueEntry>> {
        self.store.active_queue_entries(tenant).await
    }

    /// Current wait estimate for a prospective admission of `service_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service doesn't resolve within the tenant.
    pub async fn estimate(&self, tenant: &TenantId, service_id: ServiceId) -> Result<i32> {
        self.estimator.estimate(tenant, service_id).await
    }
}
