//! Behaviour of the in-memory backend and of scoped handles.

use super::*;
use crate::error::StoreError;
use chrono::{DateTime, TimeZone, Utc};

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn insert_rejects_invalid_records_without_storing() {
    let store = MemoryStore::new();
    let bad = Subscription::new(Uuid::new_v4(), "", 100, day(2025, 1, 1));
    let err = store.insert(&bad).await.unwrap_err();
    assert!(matches!(err, StoreError::BadInput { op: "insert", field: "service_name", .. }));
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn with_records_merges_duplicates() {
    let user = Uuid::new_v4();
    let store = MemoryStore::with_records([
        Subscription::new(user, "Netflix", 999, day(2025, 1, 1)),
        Subscription::new(user, "Netflix", 1099, day(2025, 1, 1)),
        Subscription::new(user, "Netflix", 1099, day(2025, 2, 1)),
    ])
    .unwrap();
    assert_eq!(store.len().unwrap(), 2);
    assert_eq!(store.list_by_user(user).await.unwrap()[0].price, 1099);
}

#[tokio::test]
async fn clones_share_records() {
    let store = MemoryStore::new();
    let other = store.clone();
    let user = Uuid::new_v4();
    store
        .insert(&Subscription::new(user, "Spotify", 199, day(2025, 3, 1)))
        .await
        .unwrap();
    assert_eq!(other.list_all().await.unwrap().len(), 1);
    assert!(other.ping().await.is_ok());
}

#[tokio::test]
async fn update_rejects_empty_patch_before_looking_for_rows() {
    let store = MemoryStore::new();
    let err = store
        .update_by_user(Uuid::new_v4(), &PatchSpec::new())
        .await
        .unwrap_err();
    assert!(err.is_bad_input());
    assert_eq!(err.op(), Some("update_by_user"));
}

#[tokio::test]
async fn nil_user_is_bad_input_everywhere() {
    let store = MemoryStore::new();
    assert!(store.delete_by_user(Uuid::nil()).await.unwrap_err().is_bad_input());
    assert!(store.list_by_user(Uuid::nil()).await.unwrap_err().is_bad_input());
    assert!(
        store
            .update_by_user(Uuid::nil(), &PatchSpec::new().price(1))
            .await
            .unwrap_err()
            .is_bad_input()
    );
}

#[tokio::test]
async fn sum_overflow_is_a_storage_failure() {
    let store = MemoryStore::with_records([
        Subscription::new(Uuid::new_v4(), "A", i64::MAX, day(2025, 1, 1)),
        Subscription::new(Uuid::new_v4(), "B", 1, day(2025, 1, 1)),
    ])
    .unwrap();
    let err = store.filter_sum(&FilterSpec::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::StorageFailure { op: "filter_sum", .. }));
}

#[tokio::test]
async fn inverted_range_sums_to_zero() {
    let store = MemoryStore::with_records([Subscription::new(
        Uuid::new_v4(),
        "Netflix",
        999,
        day(2025, 1, 1),
    )
    .ending(day(2025, 1, 31))])
    .unwrap();
    let total = store
        .filter_sum(&FilterSpec::new().from(day(2025, 2, 1)).to(day(2024, 12, 1)))
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[cfg(feature = "pool")]
#[tokio::test]
async fn closed_pool_fails_as_storage_failure() {
    let store = PgStore::from_config(&crate::StoreConfig::from_url(
        "postgres://postgres@127.0.0.1:1/subledger",
    ))
    .unwrap();
    store.close();
    assert!(store.is_closed());

    let err = store.ping().await.unwrap_err();
    assert!(matches!(err, StoreError::StorageFailure { op: "ping", .. }));
    assert!(err.is_retryable());
}

#[cfg(feature = "pool")]
#[tokio::test]
async fn cancelled_scope_never_checks_out_a_connection() {
    let store = PgStore::from_config(&crate::StoreConfig::from_url(
        "postgres://postgres@127.0.0.1:1/subledger",
    ))
    .unwrap();
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let scoped = store.scoped(
        CallScope::new()
            .with_timeout(std::time::Duration::from_secs(1))
            .with_cancel(signal),
    );
    let err = scoped.list_all().await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.op(), Some("list_all"));
    assert_eq!(scoped.pool().status().size, 0);
}
