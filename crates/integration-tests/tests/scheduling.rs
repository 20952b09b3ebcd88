//! End-to-end appointment scheduling scenarios.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};

use chairtime_core::AppointmentStatus;
use chairtime_engine::EngineError;
use chairtime_engine::models::AppointmentPatch;
use chairtime_integration_tests::TestContext;

#[tokio::test]
async fn test_booking_derives_the_end_time() {
    let ctx = TestContext::new();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();

    let appointment = ctx
        .scheduler
        .book(&ctx.tenant, ctx.haircut_booking(start))
        .await
        .unwrap();

    assert_eq!(appointment.start_time, start);
    assert_eq!(
        appointment.end_time,
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap()
    );
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn test_reschedule_keeps_end_time_consistent() {
    let ctx = TestContext::new();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let appointment = ctx
        .scheduler
        .book(&ctx.tenant, ctx.haircut_booking(start))
        .await
        .unwrap();

    // Move the slot and switch to the 15-minute shave in one patch.
    let updated = ctx
        .scheduler
        .reschedule(
            &ctx.tenant,
            appointment.id,
            AppointmentPatch {
                start_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap()),
                service_id: Some(ctx.shave),
                ..AppointmentPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        updated.end_time,
        Utc.with_ymd_and_hms(2024, 1, 1, 11, 15, 0).unwrap()
    );
    assert_eq!(updated.service_id, ctx.shave);
}

#[tokio::test]
async fn test_cancellation_is_terminal() {
    let ctx = TestContext::new();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let appointment = ctx
        .scheduler
        .book(&ctx.tenant, ctx.haircut_booking(start))
        .await
        .unwrap();

    let appointment = ctx
        .scheduler
        .transition(&ctx.tenant, appointment.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);

    for target in [
        AppointmentStatus::Scheduled,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
    ] {
        let result = ctx
            .scheduler
            .transition(&ctx.tenant, appointment.id, target)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidTransition { .. })));
    }
}

#[tokio::test]
async fn test_todays_appointments_follow_the_tenant_offset() {
    // Shop in UTC-5; at 03:00 UTC on Jan 2 it is still Jan 1 locally.
    let ctx = TestContext::at(
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap(),
        Some(-300),
    );

    // 23:00 UTC Jan 1 = 18:00 local Jan 1: inside today.
    ctx.scheduler
        .book(
            &ctx.tenant,
            ctx.haircut_booking(Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap()),
        )
        .await
        .unwrap();
    // 14:00 UTC Jan 2 = 09:00 local Jan 2: tomorrow.
    ctx.scheduler
        .book(
            &ctx.tenant,
            ctx.haircut_booking(Utc.with_ymd_and_hms(2024, 1, 2, 14, 0, 0).unwrap()),
        )
        .await
        .unwrap();

    let today = ctx.scheduler.todays_appointments(&ctx.tenant).await.unwrap();
    assert_eq!(today.len(), 1);
    assert_eq!(
        today[0].start_time,
        Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_remove_then_lookup_is_not_found() {
    let ctx = TestContext::new();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let appointment = ctx
        .scheduler
        .book(&ctx.tenant, ctx.haircut_booking(start))
        .await
        .unwrap();

    ctx.scheduler.remove(&ctx.tenant, appointment.id).await.unwrap();

    let result = ctx
        .scheduler
        .reschedule(&ctx.tenant, appointment.id, AppointmentPatch::default())
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}
