use super::*;
use crate::test_support::Harness;

#[test]
fn labels_pluralise() {
    assert_eq!(ViewCount(0).label(), "No views");
    assert_eq!(ViewCount(1).label(), "1 view");
    assert_eq!(ViewCount(2).label(), "2 views");
    assert_eq!(ViewCount(1_000).label(), "1000 views");
}

#[tokio::test]
async fn resolve_shows_current_count_and_defers_increment() {
    let harness = Harness::new(None).await;
    harness.seed_author("a1", "Ada").await;
    let id = harness.seed_startup("Rocket", "Space", "a1", None, 4).await;
    let deferred = DeferredWork::new();

    let count = ViewCounter::new(id.clone())
        .resolve(&harness.ctx, &deferred)
        .await
        .expect("resolve");

    assert_eq!(count, ViewCount(4));
    assert_eq!(deferred.len(), 1);
    assert_eq!(harness.patches(), 0, "increment must wait for the response");
    assert_eq!(harness.views(&id).await, 4);

    deferred.run_all().await;
    assert_eq!(harness.patches(), 1);
    assert_eq!(harness.views(&id).await, 5);
}

#[tokio::test]
async fn concurrent_views_increment_at_least_once_and_at_most_twice() {
    let harness = Harness::new(None).await;
    harness.seed_author("a1", "Ada").await;
    let id = harness.seed_startup("Rocket", "Space", "a1", None, 10).await;
    let first = DeferredWork::new();
    let second = DeferredWork::new();
    let counter = ViewCounter::new(id.clone());

    let (a, b) = tokio::join!(
        counter.resolve(&harness.ctx, &first),
        counter.resolve(&harness.ctx, &second),
    );
    assert_eq!(a.expect("first"), ViewCount(10));
    assert_eq!(b.expect("second"), ViewCount(10));

    first.run_all().await;
    second.run_all().await;

    let final_views = harness.views(&id).await;
    assert!((11..=12).contains(&final_views), "got {final_views}");
}

#[tokio::test]
async fn failed_increment_is_swallowed() {
    let harness = Harness::rejecting_writes(None, "read only").await;
    harness.seed_author("a1", "Ada").await;
    let id = harness.seed_startup("Rocket", "Space", "a1", None, 1).await;
    let deferred = DeferredWork::new();

    let count = ViewCounter::new(id.clone())
        .resolve(&harness.ctx, &deferred)
        .await
        .expect("resolve");
    deferred.run_all().await;

    assert_eq!(count.label(), "1 view");
    assert_eq!(harness.patches(), 1);
    assert_eq!(harness.views(&id).await, 1);
}

#[tokio::test]
async fn missing_startup_is_not_found_and_schedules_nothing() {
    let harness = Harness::new(None).await;
    let deferred = DeferredWork::new();

    let err = ViewCounter::new(StartupId::new("missing"))
        .resolve(&harness.ctx, &deferred)
        .await
        .expect_err("missing");

    assert!(err.is_not_found());
    assert!(deferred.is_empty());
}
