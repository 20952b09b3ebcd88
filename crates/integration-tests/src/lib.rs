//! Integration test harness for ChairTime.
//!
//! Tests run the real services against [`MemoryStore`] with a [`FixedClock`],
//! so whole booking-day scenarios execute deterministically and without a
//! database. `PostgreSQL`-specific behavior (row locking, migrations) is
//! covered separately against a live database.

#![cfg_attr(not(test), forbid(unsafe_code))]
// Test support code; setup failures should panic loudly.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use chairtime_core::{CustomerId, Money, ServiceId, TenantId};
use chairtime_engine::clock::offset_from_minutes;
use chairtime_engine::models::{NewCustomer, NewService, Tenant};
use chairtime_engine::queue::AdmitParams;
use chairtime_engine::scheduler::BookingRequest;
use chairtime_engine::{
    AppointmentScheduler, FixedClock, MemoryStore, QueueService, StatsService,
};

/// All four services wired over one shared in-memory store and clock,
/// pre-seeded with a tenant, one customer and two services.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub queue: QueueService<MemoryStore>,
    pub scheduler: AppointmentScheduler<MemoryStore>,
    pub stats: StatsService<MemoryStore>,
    pub tenant: TenantId,
    pub customer_id: CustomerId,
    /// "Haircut", 30.00, 30 minutes.
    pub haircut: ServiceId,
    /// "Shave", 15.00, 15 minutes.
    pub shave: ServiceId,
}

impl TestContext {
    /// Context at 2024-01-01 09:00 UTC with a UTC-local tenant.
    #[must_use]
    pub fn new() -> Self {
        Self::at(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            None,
        )
    }

    /// Context pinned to `now`, with an optional tenant UTC offset.
    #[must_use]
    pub fn at(now: DateTime<Utc>, utc_offset_minutes: Option<i32>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(now));
        let tenant = TenantId::parse("test_shop").unwrap();
        store
            .create_tenant(Tenant {
                id: tenant.clone(),
                name: "Test Shop".to_owned(),
                utc_offset_minutes,
                created_at: now,
            })
            .unwrap();
        let customer = store
            .add_customer(
                &tenant,
                NewCustomer {
                    name: "Ada Lovelace".to_owned(),
                    phone: Some("+1-555-0100".to_owned()),
                    email: None,
                    preferred_barber: None,
                },
            )
            .unwrap();
        let haircut = store
            .add_service(
                &tenant,
                NewService {
                    name: "Haircut".to_owned(),
                    price: Money::from_cents(3000),
                    duration_minutes: 30,
                },
            )
            .unwrap();
        let shave = store
            .add_service(
                &tenant,
                NewService {
                    name: "Shave".to_owned(),
                    price: Money::from_cents(1500),
                    duration_minutes: 15,
                },
            )
            .unwrap();

        let default_offset = offset_from_minutes(0);
        Self {
            queue: QueueService::new(Arc::clone(&store), clock.clone()),
            scheduler: AppointmentScheduler::new(
                Arc::clone(&store),
                clock.clone(),
                default_offset,
            ),
            stats: StatsService::new(Arc::clone(&store), clock.clone(), default_offset),
            store,
            clock,
            tenant,
            customer_id: customer.id,
            haircut: haircut.id,
            shave: shave.id,
        }
    }

    /// Admission of the seeded customer for a haircut.
    #[must_use]
    pub fn haircut_admission(&self) -> AdmitParams {
        AdmitParams {
            customer_id: self.customer_id,
            service_id: self.haircut,
            barber: None,
        }
    }

    /// Haircut booking for the seeded customer at a UTC instant.
    #[must_use]
    pub fn haircut_booking(&self, start_time: DateTime<Utc>) -> BookingRequest {
        BookingRequest {
            customer_id: self.customer_id,
            service_id: self.haircut,
            barber: None,
            start_time,
            notes: None,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
