//! Daily per-tenant aggregates.

use std::sync::Arc;

use chrono::FixedOffset;
use serde::Serialize;
use tracing::instrument;

use chairtime_core::{Money, TenantId};

use crate::clock::{Clock, day_window, offset_from_minutes};
use crate::error::{EngineError, Result};
use crate::store::EntityStore;

/// One tenant's dashboard numbers for the current shop-local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Queue entries that joined today, any status.
    pub today_queue_count: i64,
    /// Appointments starting today, any status.
    pub today_appointment_count: i64,
    /// Mean of the stamped wait estimates across ALL queue entries of the
    /// tenant (not just today's), rounded to the nearest minute. `0` when
    /// the tenant has no entries.
    pub average_wait_minutes: i32,
    /// Sum of transaction totals recorded today, regardless of settlement
    /// status: pending and refunded amounts count.
    pub today_revenue: Money,
}

/// Read-only aggregation over an [`EntityStore`].
pub struct StatsService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    default_offset: FixedOffset,
}

impl<S: EntityStore> StatsService<S> {
    /// Create a new stats service.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<dyn Clock>, default_offset: FixedOffset) -> Self {
        Self {
            store,
            clock,
            default_offset,
        }
    }

    /// Compute the tenant's snapshot for the current shop-local day.
    ///
    /// The day window is evaluated once, up front; all four aggregates use
    /// that same window even if the call straddles midnight. The snapshot
    /// is all-or-nothing: any sub-query failure fails the whole call.
    ///
    /// # Errors
    ///
    /// Returns `TenantNotFound` for an unknown tenant.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn snapshot(&self, tenant: &TenantId) -> Result<StatsSnapshot> {
        let row = self
            .store
            .tenant(tenant)
            .await?
            .ok_or_else(|| EngineError::TenantNotFound(tenant.to_string()))?;
        let offset = row
            .utc_offset_minutes
            .map_or(self.default_offset, offset_from_minutes);
        let window = day_window(self.clock.now(), offset);

        let today_queue_count = self.store.queue_joined_count(tenant, window).await?;
        let today_appointment_count = self.store.appointment_count(tenant, window).await?;
        let waits = self.store.queue_entry_waits(tenant).await?;
        let today_revenue = self.store.revenue_in_window(tenant, window).await?;

        Ok(StatsSnapshot {
            today_queue_count,
            today_appointment_count,
            average_wait_minutes: average_minutes(&waits),
            today_revenue,
        })
    }
}

/// Mean rounded half-up to the nearest whole minute, in integer arithmetic.
fn average_minutes(waits: &[i32]) -> i32 {
    let n = i64::try_from(waits.len()).unwrap_or(i64::MAX);
    if n == 0 {
        return 0;
    }
    let sum: i64 = waits.iter().copied().map(i64::from).sum();
    let avg = (2 * sum + n) / (2 * n);
    i32::try_from(avg).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use parking_lot::Mutex;

    use chairtime_core::{CustomerId, PaymentMethod, ServiceId, TransactionStatus};

    use crate::clock::FixedClock;
    use crate::models::{
        NewCustomer, NewQueueEntry, NewService, NewTransaction, Tenant,
    };
    use crate::store::MemoryStore;

    #[test]
    fn test_average_rounds_half_up() {
        assert_eq!(average_minutes(&[]), 0);
        assert_eq!(average_minutes(&[10]), 10);
        assert_eq!(average_minutes(&[0, 30, 60]), 30);
        // 10 + 15 = 25, mean 12.5, rounds up.
        assert_eq!(average_minutes(&[10, 15]), 13);
        // 10 + 11 = 21, mean 10.5, rounds up.
        assert_eq!(average_minutes(&[10, 11]), 11);
        // Mean 10.4 rounds down.
        assert_eq!(average_minutes(&[10, 10, 10, 10, 12]), 10);
    }

    struct Fixture {
        stats: StatsService<MemoryStore>,
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        tenant: TenantId,
        customer_id: CustomerId,
        service_id: ServiceId,
    }

    fn fixture(utc_offset_minutes: Option<i32>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let tenant = TenantId::parse("shop_1").unwrap();
        store
            .create_tenant(Tenant {
                id: tenant.clone(),
                name: "Shop".to_owned(),
                utc_offset_minutes,
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            })
            .unwrap();
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
        Fixture {
            stats: StatsService::new(Arc::clone(&store), clock.clone(), offset_from_minutes(0)),
            store,
            clock,
            tenant,
            customer_id: customer.id,
            service_id: service.id,
        }
    }

    fn transaction(f: &Fixture, cents: u32, status: TransactionStatus) -> NewTransaction {
        NewTransaction {
            customer_id: Some(f.customer_id),
            appointment_id: None,
            total: Money::from_cents(cents),
            payment_method: PaymentMethod::Card,
            status,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_for_empty_tenant_is_all_zero() {
        let f = fixture(None);
        let snapshot = f.stats.snapshot(&f.tenant).await.unwrap();
        assert_eq!(snapshot.today_queue_count, 0);
        assert_eq!(snapshot.today_appointment_count, 0);
        assert_eq!(snapshot.average_wait_minutes, 0);
        assert!(snapshot.today_revenue.is_zero());
    }

    #[tokio::test]
    async fn test_revenue_counts_every_settlement_status() {
        let f = fixture(None);
        f.store
            .record_transaction(&f.tenant, transaction(&f, 2000, TransactionStatus::Completed))
            .unwrap();
        f.store
            .record_transaction(&f.tenant, transaction(&f, 3500, TransactionStatus::Pending))
            .unwrap();

        let snapshot = f.stats.snapshot(&f.tenant).await.unwrap();
        assert_eq!(snapshot.today_revenue.to_string(), "55.00");
    }

    #[tokio::test]
    async fn test_window_follows_tenant_offset() {
        // UTC+120: the local day 2024-01-01 covers
        // [2023-12-31T22:00Z, 2024-01-01T22:00Z).
        let f = fixture(Some(120));
        f.store
            .append_queue_entry(
                &f.tenant,
                NewQueueEntry {
                    customer_id: f.customer_id,
                    service_id: f.service_id,
                    barber: None,
                    estimated_wait_minutes: 30,
                    joined_at: Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap(),
                },
            )
            .await
            .unwrap();
        f.store
            .append_queue_entry(
                &f.tenant,
                NewQueueEntry {
                    customer_id: f.customer_id,
                    service_id: f.service_id,
                    barber: None,
                    estimated_wait_minutes: 10,
                    joined_at: Utc.with_ymd_and_hms(2023, 12, 31, 21, 0, 0).unwrap(),
                },
            )
            .await
            .unwrap();

        let snapshot = f.stats.snapshot(&f.tenant).await.unwrap();
        // Only the 23:00Z entry falls inside the local day.
        assert_eq!(snapshot.today_queue_count, 1);
        // The average still spans every entry regardless of day.
        assert_eq!(snapshot.average_wait_minutes, 20);
    }

    #[tokio::test]
    async fn test_snapshot_uses_one_instant() {
        let f = fixture(None);
        f.store
            .record_transaction(&f.tenant, transaction(&f, 2000, TransactionStatus::Completed))
            .unwrap();

        let snapshot = f.stats.snapshot(&f.tenant).await.unwrap();
        assert_eq!(snapshot.today_revenue.to_string(), "20.00");

        // The next day, yesterday's money is out of the window.
        f.clock.set(Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap());
        let snapshot = f.stats.snapshot(&f.tenant).await.unwrap();
        assert!(snapshot.today_revenue.is_zero());
    }

    /// Jumps a full day forward on every reading.
    struct MidnightHoppingClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl Clock for MidnightHoppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.now.lock();
            let current = *now;
            *now += Duration::days(1);
            current
        }
    }

    #[tokio::test]
    async fn test_snapshot_window_survives_a_midnight_hop() {
        let f = fixture(None);
        f.store
            .record_transaction(&f.tenant, transaction(&f, 2000, TransactionStatus::Completed))
            .unwrap();
        f.store
            .append_queue_entry(
                &f.tenant,
                NewQueueEntry {
                    customer_id: f.customer_id,
                    service_id: f.service_id,
                    barber: None,
                    estimated_wait_minutes: 30,
                    joined_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                },
            )
            .await
            .unwrap();

        // One snapshot must read one window, even when the clock crosses
        // midnight between sub-computations. Any aggregate taking a second
        // reading would land a day later and drop today's rows.
        let clock = Arc::new(MidnightHoppingClock {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 0).unwrap()),
        });
        let stats = StatsService::new(Arc::clone(&f.store), clock, offset_from_minutes(0));

        let snapshot = stats.snapshot(&f.tenant).await.unwrap();
        assert_eq!(snapshot.today_queue_count, 1);
        assert_eq!(snapshot.today_revenue.to_string(), "20.00");
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_tenant_not_found() {
        let f = fixture(None);
        let ghost = TenantId::parse("ghost").unwrap();
        let result = f.stats.snapshot(&ghost).await;
        assert!(matches!(result, Err(EngineError::TenantNotFound(_))));
    }
}
