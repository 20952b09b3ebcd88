//! Wait-time estimation for walk-in admissions.

use std::sync::Arc;

use tracing::instrument;

use chairtime_core::{ServiceId, TenantId};

use crate::error::{EngineError, Result};
use crate::store::EntityStore;

/// Produces the wait estimate stamped onto a queue entry at admission time.
///
/// The estimate is `waiting count x requested service duration` - a
/// point-in-time figure. It is not kept consistent with later reorderings
/// or service changes; callers needing a live number re-derive it from
/// current queue state.
pub struct WaitTimeEstimator<S> {
    store: Arc<S>,
}

impl<S: EntityStore> WaitTimeEstimator<S> {
    /// Create a new estimator over a store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Estimated wait in minutes for a new admission of `service_id`.
    ///
    /// Returns `0` when nobody is waiting. Never negative: the waiting
    /// count is a count and the duration is positive by the service
    /// invariant.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service doesn't resolve within the tenant.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn estimate(&self, tenant: &TenantId, service_id: ServiceId) -> Result<i32> {
        let service = self
            .store
            .service(tenant, service_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("service {service_id}")))?;
        let waiting = self.store.waiting_count(tenant).await?;
        let minutes = waiting.saturating_mul(i64::from(service.duration_minutes));
        Ok(i32::try_from(minutes).unwrap_or(i32::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use chairtime_core::Money;

    use crate::models::{NewCustomer, NewQueueEntry, NewService, Tenant};
    use crate::store::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, TenantId, ServiceId) {
        let store = Arc::new(MemoryStore::new());
        let tenant = TenantId::parse("shop_1").unwrap();
        store
            .create_tenant(Tenant {
                id: tenant.clone(),
                name: "Shop".to_owned(),
                utc_offset_minutes: None,
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            })
            .unwrap();
        let service = store
            .add_service(
                &tenant,
                NewService {
                    name: "Haircut".to_owned(),
                    price: Money::from_cents(3000),
                    duration_minutes: 30,
                },
            )
            .unwrap();
        (store, tenant, service.id)
    }

    #[tokio::test]
    async fn test_empty_queue_estimates_zero() {
        let (store, tenant, service) = setup().await;
        let estimator = WaitTimeEstimator::new(store);
        assert_eq!(estimator.estimate(&tenant, service).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_estimate_scales_with_waiting_count() {
        let (store, tenant, service) = setup().await;
        let customer = store
            .add_customer(
                &tenant,
                NewCustomer {
                    name: "Ada".to_owned(),
                    phone: None,
                    email: None,
                    preferred_barber: None,
                },
            )
            .unwrap();
        for _ in 0..3 {
            store
                .append_queue_entry(
                    &tenant,
                    NewQueueEntry {
                        customer_id: customer.id,
                        service_id: service,
                        barber: None,
                        estimated_wait_minutes: 0,
                        joined_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                    },
                )
                .await
                .unwrap();
        }
        let estimator = WaitTimeEstimator::new(store);
        assert_eq!(estimator.estimate(&tenant, service).await.unwrap(), 90);
    }

    #[tokio::test]
    async fn test_unknown_service_is_not_found() {
        let (store, tenant, _service) = setup().await;
        let estimator = WaitTimeEstimator::new(store);
        let result = estimator.estimate(&tenant, ServiceId::new(999)).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }
}
