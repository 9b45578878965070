//! Integration tests for the `house-cup-db` data layer.
//!
//! Every test runs the same scenario against both [`EventStore`]
//! implementations through a trait object, the way the aggregator and
//! ingestion worker use them. The `SQLite` store writes into a temporary
//! directory, so no external services are needed.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use house_cup_db::{
    EventStore, MemoryEventStore, SqliteConfig, SqliteDb, SqliteEventStore, StoreError,
};
use house_cup_types::{House, ScoredEvent};

// =============================================================================
// Helpers
// =============================================================================

fn event(id: &str, category: House, points: i64, timestamp: DateTime<Utc>) -> ScoredEvent {
    ScoredEvent {
        id: id.to_owned(),
        category,
        points,
        timestamp,
    }
}

/// Build one of each store. The temp dir must outlive the `SQLite` store.
async fn stores(dir: &tempfile::TempDir) -> Vec<(&'static str, Arc<dyn EventStore>)> {
    let config = SqliteConfig::for_path(&dir.path().join("points.db")).with_max_connections(4);
    let db = SqliteDb::open(&config)
        .await
        .expect("Failed to open SQLite database");

    vec![
        ("sqlite", Arc::new(SqliteEventStore::new(&db))),
        ("memory", Arc::new(MemoryEventStore::new())),
    ]
}

// =============================================================================
// Contract tests
// =============================================================================

#[tokio::test]
async fn two_houses_then_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let t = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

    for (name, store) in stores(&dir).await {
        store.insert(&event("1", House::Gryff, 10, t)).await.unwrap();
        store
            .insert(&event("2", House::Slyth, 5, t + TimeDelta::seconds(1)))
            .await
            .unwrap();

        let before = store.sum_by_category(None).await.unwrap();
        assert_eq!(before.get(&House::Gryff), Some(&10), "{name}");
        assert_eq!(before.get(&House::Slyth), Some(&5), "{name}");
        assert!(!before.contains_key(&House::Raven), "{name}");
        assert!(!before.contains_key(&House::Huff), "{name}");

        let err = store
            .insert(&event("1", House::Gryff, 10, t))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)), "{name}: {err}");

        assert_eq!(store.sum_by_category(None).await.unwrap(), before, "{name}");
    }
}

#[tokio::test]
async fn cutoff_excludes_older_events() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();

    for (name, store) in stores(&dir).await {
        store
            .insert(&event("old", House::Raven, 30, now - TimeDelta::minutes(10)))
            .await
            .unwrap();
        store
            .insert(&event("new", House::Raven, 4, now - TimeDelta::seconds(5)))
            .await
            .unwrap();

        let recent = store
            .sum_by_category(Some(now - TimeDelta::minutes(5)))
            .await
            .unwrap();
        assert_eq!(recent.get(&House::Raven), Some(&4), "{name}");

        let all = store.sum_by_category(None).await.unwrap();
        assert_eq!(all.get(&House::Raven), Some(&34), "{name}");
    }
}

#[tokio::test]
async fn negative_points_reduce_totals() {
    let dir = tempfile::tempdir().unwrap();
    let t = Utc::now();

    for (name, store) in stores(&dir).await {
        store.insert(&event("a", House::Huff, 20, t)).await.unwrap();
        store.insert(&event("b", House::Huff, -25, t)).await.unwrap();

        let sums = store.sum_by_category(None).await.unwrap();
        assert_eq!(sums.get(&House::Huff), Some(&-5), "{name}");
    }
}

#[tokio::test]
async fn invalid_event_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in stores(&dir).await {
        let err = store
            .insert(&event("   ", House::Gryff, 1, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "{name}");
        assert_eq!(store.count().await.unwrap(), 0, "{name}");
    }
}

#[tokio::test]
async fn reads_run_alongside_writes() {
    let dir = tempfile::tempdir().unwrap();
    let t = Utc::now();

    for (name, store) in stores(&dir).await {
        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..40_i64 {
                    store
                        .insert(&event(&format!("w{i}"), House::Gryff, 1, t))
                        .await
                        .unwrap();
                }
            })
        };

        // Every read sees a whole number of completed inserts.
        for _ in 0..20 {
            let sums = store.sum_by_category(None).await.unwrap();
            let gryff = sums.get(&House::Gryff).copied().unwrap_or(0);
            assert!((0..=40).contains(&gryff), "{name}: {gryff}");
        }

        writer.await.unwrap();
        let sums = store.sum_by_category(None).await.unwrap();
        assert_eq!(sums.get(&House::Gryff), Some(&40), "{name}");
    }
}

#[tokio::test]
async fn totals_saturate_at_i64_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let t = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

    for (name, store) in stores(&dir).await {
        store.insert(&event("a", House::Gryff, i64::MAX, t)).await.unwrap();
        store.insert(&event("b", House::Gryff, 1, t)).await.unwrap();
        store.insert(&event("c", House::Slyth, i64::MIN, t)).await.unwrap();
        store.insert(&event("d", House::Slyth, -1, t)).await.unwrap();
        store.insert(&event("e", House::Raven, 3, t)).await.unwrap();

        let sums = store.sum_by_category(None).await.unwrap();
        assert_eq!(sums.get(&House::Gryff), Some(&i64::MAX), "{name}");
        assert_eq!(sums.get(&House::Slyth), Some(&i64::MIN), "{name}");
        assert_eq!(sums.get(&House::Raven), Some(&3), "{name}");

        let recent = store
            .sum_by_category(Some(t - TimeDelta::minutes(5)))
            .await
            .unwrap();
        assert_eq!(recent, sums, "{name}");
    }
}

#[tokio::test]
async fn cutoff_compares_at_microsecond_precision() {
    let dir = tempfile::tempdir().unwrap();
    let cutoff = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

    for (name, store) in stores(&dir).await {
        store
            .insert(&event("sub", House::Huff, 5, cutoff + TimeDelta::nanoseconds(500)))
            .await
            .unwrap();
        store
            .insert(&event("micro", House::Huff, 2, cutoff + TimeDelta::microseconds(1)))
            .await
            .unwrap();

        let sums = store.sum_by_category(Some(cutoff)).await.unwrap();
        assert_eq!(sums.get(&House::Huff), Some(&2), "{name}");
    }
}
