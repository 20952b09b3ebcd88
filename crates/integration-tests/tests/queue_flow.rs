//! End-to-end walk-in queue scenarios.
//!
//! The central invariant: among non-terminal entries of one tenant,
//! positions are unique and ordered after any sequence of admits, advances,
//! repositions and removals, and exactly `{1..N}` whenever no mid-line
//! completion has parked an entry outside the line.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use chairtime_core::QueueStatus;
use chairtime_engine::{EngineError, EntityStore, QueueService};
use chairtime_integration_tests::TestContext;

async fn assert_dense(ctx: &TestContext) {
    let entries = ctx.queue.entries(&ctx.tenant).await.unwrap();
    let positions: Vec<i32> = entries.iter().map(|e| e.position).collect();
    let expected: Vec<i32> = (1..=i32::try_from(entries.len()).unwrap()).collect();
    assert_eq!(positions, expected, "line must stay dense and ordered");
}

#[tokio::test]
async fn test_morning_rush_scenario() {
    let ctx = TestContext::new();

    // Three walk-ins for the 30-minute haircut.
    let first = ctx
        .queue
        .admit(&ctx.tenant, ctx.haircut_admission())
        .await
        .unwrap();
    let second = ctx
        .queue
        .admit(&ctx.tenant, ctx.haircut_admission())
        .await
        .unwrap();
    let third = ctx
        .queue
        .admit(&ctx.tenant, ctx.haircut_admission())
        .await
        .unwrap();

    assert_eq!(
        [first.position, second.position, third.position],
        [1, 2, 3]
    );
    assert_eq!(
        [
            first.estimated_wait_minutes,
            second.estimated_wait_minutes,
            third.estimated_wait_minutes
        ],
        [0, 30, 60]
    );

    // The first customer sits down in the chair.
    let first = ctx.queue.advance(&ctx.tenant, first.id).await.unwrap();
    assert_eq!(first.status, QueueStatus::InProgress);

    // The second customer gives up and leaves.
    ctx.queue.remove(&ctx.tenant, second.id).await.unwrap();

    // The third customer moved up into the vacated rank.
    let entries = ctx.queue.entries(&ctx.tenant).await.unwrap();
    assert_eq!(entries.len(), 2);
    let survivor = entries.iter().find(|e| e.id == third.id).unwrap();
    assert_eq!(survivor.position, 2);
    assert_dense(&ctx).await;
}

#[tokio::test]
async fn test_completion_frees_a_rank_for_the_next_admission() {
    let ctx = TestContext::new();

    let entry = ctx
        .queue
        .admit(&ctx.tenant, ctx.haircut_admission())
        .await
        .unwrap();
    ctx.queue.advance(&ctx.tenant, entry.id).await.unwrap();
    ctx.queue.advance(&ctx.tenant, entry.id).await.unwrap();

    // The completed entry left the dense window; the line is empty again.
    assert!(ctx.queue.entries(&ctx.tenant).await.unwrap().is_empty());

    let next = ctx
        .queue
        .admit(&ctx.tenant, ctx.haircut_admission())
        .await
        .unwrap();
    assert_eq!(next.position, 1);
    assert_eq!(next.estimated_wait_minutes, 0);
}

#[tokio::test]
async fn test_mid_line_completion_never_duplicates_a_live_position() {
    let ctx = TestContext::new();

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            ctx.queue
                .admit(&ctx.tenant, ctx.haircut_admission())
                .await
                .unwrap()
                .id,
        );
    }

    // The front customer is served to completion; the entries behind keep
    // their ranks.
    ctx.queue.advance(&ctx.tenant, ids[0]).await.unwrap();
    ctx.queue.advance(&ctx.tenant, ids[0]).await.unwrap();

    // A newcomer must land behind the live ranks {2,3}, not on top of one.
    let fourth = ctx
        .queue
        .admit(&ctx.tenant, ctx.haircut_admission())
        .await
        .unwrap();
    assert_eq!(fourth.position, 4);

    let entries = ctx.queue.entries(&ctx.tenant).await.unwrap();
    let positions: Vec<i32> = entries.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![2, 3, 4]);
    let unique: HashSet<i32> = positions.iter().copied().collect();
    assert_eq!(unique.len(), positions.len(), "live positions must be unique");
}

#[tokio::test]
async fn test_reposition_shifts_exactly_the_span_between() {
    let ctx = TestContext::new();

    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(
            ctx.queue
                .admit(&ctx.tenant, ctx.haircut_admission())
                .await
                .unwrap()
                .id,
        );
    }

    // Jump the last customer to the front: [1,2,3,4] -> [4,1,2,3].
    ctx.queue.reposition(&ctx.tenant, ids[3], 1).await.unwrap();

    let entries = ctx.queue.entries(&ctx.tenant).await.unwrap();
    let order: Vec<_> = entries.iter().map(|e| e.id).collect();
    assert_eq!(order, vec![ids[3], ids[0], ids[1], ids[2]]);
    assert_dense(&ctx).await;
}

#[tokio::test]
async fn test_concurrent_admissions_never_share_a_position() {
    let ctx = Arc::new(TestContext::new());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            ctx.queue
                .admit(&ctx.tenant, ctx.haircut_admission())
                .await
                .unwrap()
                .position
        }));
    }

    let mut positions = HashSet::new();
    for handle in handles {
        assert!(positions.insert(handle.await.unwrap()));
    }
    assert_eq!(positions, (1..=8).collect::<HashSet<i32>>());
    assert_dense(&ctx).await;
}

#[tokio::test]
async fn test_failed_operations_leave_the_line_untouched() {
    let ctx = TestContext::new();

    let entry = ctx
        .queue
        .admit(&ctx.tenant, ctx.haircut_admission())
        .await
        .unwrap();

    // Out-of-range reposition.
    let result = ctx.queue.reposition(&ctx.tenant, entry.id, 9).await;
    assert!(matches!(result, Err(EngineError::InvalidPosition { .. })));

    // Advancing past completed.
    ctx.queue.advance(&ctx.tenant, entry.id).await.unwrap();
    ctx.queue.advance(&ctx.tenant, entry.id).await.unwrap();
    let result = ctx.queue.advance(&ctx.tenant, entry.id).await;
    assert!(matches!(result, Err(EngineError::InvalidTransition { .. })));

    let stored = ctx
        .store
        .queue_entry(&ctx.tenant, entry.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, QueueStatus::Completed);
    assert_dense(&ctx).await;
}

#[tokio::test]
async fn test_queue_is_tenant_scoped() {
    let ctx = TestContext::new();
    let other = TestContext::new();

    let entry = ctx
        .queue
        .admit(&ctx.tenant, ctx.haircut_admission())
        .await
        .unwrap();

    // The entry id doesn't resolve through a different store's tenant.
    let foreign: QueueService<_> =
        QueueService::new(Arc::clone(&other.store), other.clock.clone());
    let result = foreign.advance(&other.tenant, entry.id).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));

    // Nor through an unknown tenant on the same store.
    let ghost = chairtime_core::TenantId::parse("ghost").unwrap();
    let result = ctx.queue.advance(&ghost, entry.id).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}
