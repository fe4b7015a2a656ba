//! Behaviour every `SubscriptionStore` backend must share.
//!
//! Each check works on fresh user ids so it can run against a shared database.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use subledger::{FilterSpec, PatchSpec, StoreError, Subscription, SubscriptionStore};
use uuid::Uuid;

pub fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub async fn upsert_overwrites_price_and_end_date<S: SubscriptionStore>(store: &S) {
    let u1 = Uuid::new_v4();
    store
        .insert(&Subscription::new(u1, "Netflix", 999, day(2025, 1, 1)).ending(day(2025, 2, 1)))
        .await
        .unwrap();
    store
        .insert(&Subscription::new(u1, "Netflix", 1099, day(2025, 1, 1)).ending(day(2025, 2, 1)))
        .await
        .unwrap();

    let records = store.list_by_user(u1).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].price, 1099);
    assert_eq!(records[0].end_date, Some(day(2025, 2, 1)));

    // Re-opening the period clears the end date.
    store
        .insert(&Subscription::new(u1, "Netflix", 1099, day(2025, 1, 1)))
        .await
        .unwrap();
    assert_eq!(store.list_by_user(u1).await.unwrap()[0].end_date, None);
}

pub async fn identical_reinsert_succeeds<S: SubscriptionStore>(store: &S) {
    let user = Uuid::new_v4();
    let sub = Subscription::new(user, "Spotify", 199, day(2025, 3, 1));
    store.insert(&sub).await.unwrap();
    store.insert(&sub).await.unwrap();
    assert_eq!(store.list_by_user(user).await.unwrap(), vec![sub]);
}

pub async fn upsert_leaves_other_keys_untouched<S: SubscriptionStore>(store: &S) {
    let user = Uuid::new_v4();
    let jan = Subscription::new(user, "Netflix", 999, day(2025, 1, 1));
    let feb = Subscription::new(user, "Netflix", 999, day(2025, 2, 1));
    let other = Subscription::new(user, "Hulu", 500, day(2025, 1, 1));
    for sub in [&jan, &feb, &other] {
        store.insert(sub).await.unwrap();
    }
    store
        .insert(&Subscription { price: 1299, ..jan.clone() })
        .await
        .unwrap();

    let records = store.list_by_user(user).await.unwrap();
    let prices: Vec<(&str, i64)> = records
        .iter()
        .map(|r| (r.service_name.as_str(), r.price))
        .collect();
    assert_eq!(prices, vec![("Hulu", 500), ("Netflix", 1299), ("Netflix", 999)]);
}

pub async fn delete_reports_count_or_not_found<S: SubscriptionStore>(store: &S) {
    let empty_user = Uuid::new_v4();
    let err = store.delete_by_user(empty_user).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { op: "delete_by_user", .. }));

    let user = Uuid::new_v4();
    let bystander = Uuid::new_v4();
    for (i, service) in ["A", "B", "C"].into_iter().enumerate() {
        store
            .insert(&Subscription::new(user, service, 100 * i as i64, day(2025, 1, 1)))
            .await
            .unwrap();
    }
    store
        .insert(&Subscription::new(bystander, "A", 1, day(2025, 1, 1)))
        .await
        .unwrap();

    assert_eq!(store.delete_by_user(user).await.unwrap(), 3);
    assert!(store.list_by_user(user).await.unwrap().is_empty());
    assert_eq!(store.list_by_user(bystander).await.unwrap().len(), 1);
    assert!(store.delete_by_user(user).await.unwrap_err().is_not_found());
}

pub async fn partial_update_touches_present_fields_only<S: SubscriptionStore>(store: &S) {
    let user = Uuid::new_v4();
    store
        .insert(&Subscription::new(user, "Netflix", 999, day(2025, 1, 1)).ending(day(2025, 6, 1)))
        .await
        .unwrap();
    store
        .insert(&Subscription::new(user, "Spotify", 199, day(2025, 2, 1)))
        .await
        .unwrap();

    let updated = store
        .update_by_user(user, &PatchSpec::new().price(0))
        .await
        .unwrap();
    assert_eq!(updated, 2);
    let records = store.list_by_user(user).await.unwrap();
    assert!(records.iter().all(|r| r.price == 0));
    assert_eq!(records[0].end_date, Some(day(2025, 6, 1)));
    assert_eq!(records[1].end_date, None);

    store
        .update_by_user(user, &PatchSpec::new().end_date(day(2025, 12, 31)))
        .await
        .unwrap();
    let records = store.list_by_user(user).await.unwrap();
    assert!(records.iter().all(|r| r.end_date == Some(day(2025, 12, 31))));
    assert!(records.iter().all(|r| r.price == 0));

    let err = store
        .update_by_user(Uuid::new_v4(), &PatchSpec::new().price(5))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { op: "update_by_user", .. }));

    let err = store.update_by_user(user, &PatchSpec::new()).await.unwrap_err();
    assert!(err.is_bad_input());
}

pub async fn filter_sum_intersects_intervals<S: SubscriptionStore>(store: &S) {
    let user = Uuid::new_v4();
    let records = [
        // Overlaps the window.
        Subscription::new(user, "Netflix", 999, day(2025, 1, 1)).ending(day(2025, 2, 1)),
        // Ended before the window.
        Subscription::new(user, "Hulu", 500, day(2024, 12, 1)).ending(day(2025, 1, 10)),
        // Starts after the window.
        Subscription::new(user, "Disney", 700, day(2025, 1, 21)),
        // Open-ended.
        Subscription::new(user, "Spotify", 199, day(2020, 1, 1)),
    ];
    for sub in &records {
        store.insert(sub).await.unwrap();
    }

    let window = FilterSpec::new()
        .user_id(user)
        .from(day(2025, 1, 15))
        .to(day(2025, 1, 20));
    assert_eq!(store.filter_sum(&window).await.unwrap(), 999 + 199);

    let far_future = FilterSpec::new().user_id(user).from(day(2999, 1, 1));
    assert_eq!(store.filter_sum(&far_future).await.unwrap(), 199 + 700);

    let one_service = FilterSpec::new().user_id(user).service_name("Hulu");
    assert_eq!(store.filter_sum(&one_service).await.unwrap(), 500);

    let everything_of_user = FilterSpec::new().user_id(user).service_name("");
    assert_eq!(
        store.filter_sum(&everything_of_user).await.unwrap(),
        999 + 500 + 700 + 199
    );

    let nobody = FilterSpec::new().user_id(Uuid::new_v4());
    assert_eq!(store.filter_sum(&nobody).await.unwrap(), 0);
}

pub async fn list_by_user_is_ordered_and_stable<S: SubscriptionStore>(store: &S) {
    let user = Uuid::new_v4();
    store
        .insert(&Subscription::new(user, "Spotify", 199, day(2025, 3, 1)))
        .await
        .unwrap();
    store
        .insert(&Subscription::new(user, "Netflix", 999, day(2025, 2, 1)))
        .await
        .unwrap();
    store
        .insert(&Subscription::new(user, "Netflix", 999, day(2025, 1, 1)))
        .await
        .unwrap();

    let first = store.list_by_user(user).await.unwrap();
    let keys: Vec<(&str, DateTime<Utc>)> = first
        .iter()
        .map(|r| (r.service_name.as_str(), r.start_date))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("Netflix", day(2025, 1, 1)),
            ("Netflix", day(2025, 2, 1)),
            ("Spotify", day(2025, 3, 1)),
        ]
    );
    assert_eq!(store.list_by_user(user).await.unwrap(), first);
    assert!(store.list_by_user(Uuid::new_v4()).await.unwrap().is_empty());
}

pub async fn list_all_is_ordered_by_natural_key<S: SubscriptionStore>(store: &S) {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    store
        .insert(&Subscription::new(b, "Netflix", 1, day(2025, 1, 1)))
        .await
        .unwrap();
    store
        .insert(&Subscription::new(a, "Netflix", 2, day(2025, 1, 1)))
        .await
        .unwrap();

    let all = store.list_all().await.unwrap();
    assert!(all.iter().any(|r| r.user_id == a));
    assert!(all.iter().any(|r| r.user_id == b));

    let ours: Vec<&Subscription> = all
        .iter()
        .filter(|r| r.user_id == a || r.user_id == b)
        .collect();
    assert_eq!(ours.len(), 2);
    assert!(ours[0].user_id < ours[1].user_id);
}

pub async fn service_names_sort_bytewise<S: SubscriptionStore>(store: &S) {
    let user = Uuid::new_v4();
    for name in ["apple tv", "Zoom", "Netflix", "amazon"] {
        store
            .insert(&Subscription::new(user, name, 100, day(2025, 1, 1)))
            .await
            .unwrap();
    }

    let names: Vec<String> = store
        .list_by_user(user)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.service_name)
        .collect();
    assert_eq!(names, ["Netflix", "Zoom", "amazon", "apple tv"]);

    let all: Vec<String> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.user_id == user)
        .map(|r| r.service_name)
        .collect();
    assert_eq!(all, names);
}
