//! Runs the shared store checks against PostgreSQL.
//!
//! Set `DATABASE_URL` (a `.env` file is honoured) to enable; every test is skipped otherwise.

mod common;

use std::time::Duration;
use subledger::migrate::{self, MigrationSource};
use subledger::{CallScope, PgStore, StoreConfig, StoreResult, SubscriptionStore};

async fn store() -> StoreResult<Option<PgStore>> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(None);
    };

    let store = PgStore::from_config(&StoreConfig::from_url(url))?;
    migrate::up_pool(store.pool(), &MigrationSource::Embedded).await?;
    Ok(Some(store))
}

macro_rules! pg_test {
    ($name:ident) => {
        #[tokio::test]
        async fn $name() -> StoreResult<()> {
            let Some(store) = store().await? else {
                return Ok(());
            };
            common::$name(&store).await;
            Ok(())
        }
    };
}

pg_test!(upsert_overwrites_price_and_end_date);
pg_test!(identical_reinsert_succeeds);
pg_test!(upsert_leaves_other_keys_untouched);
pg_test!(delete_reports_count_or_not_found);
pg_test!(partial_update_touches_present_fields_only);
pg_test!(filter_sum_intersects_intervals);
pg_test!(list_by_user_is_ordered_and_stable);
pg_test!(list_all_is_ordered_by_natural_key);
pg_test!(service_names_sort_bytewise);

#[tokio::test]
async fn ping_round_trips() -> StoreResult<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    store.ping().await
}

#[tokio::test]
async fn timed_out_upsert_is_rolled_back_before_returning() -> StoreResult<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };

    // One connection, so a call after the timeout reuses the abandoned statement's backend.
    let mut config = StoreConfig::from_url(std::env::var("DATABASE_URL").unwrap_or_default());
    config.database.max_connections = 1;
    let single = PgStore::from_config(&config)?;
    let scoped = single.scoped(CallScope::new().with_timeout(Duration::from_millis(100)));

    let user = uuid::Uuid::new_v4();
    let sub = subledger::Subscription::new(user, "Netflix", 999, common::day(2025, 1, 1));
    store.insert(&sub).await?;

    // Hold the row lock from another pool so the upsert below blocks.
    let locker = store.client().await?;
    locker.batch_execute("BEGIN").await.map_err(subledger::StoreError::from_db_error)?;
    locker
        .execute("SELECT 1 FROM user_info WHERE user_id = $1 FOR UPDATE", &[&user])
        .await
        .map_err(subledger::StoreError::from_db_error)?;

    let err = scoped
        .insert(&subledger::Subscription { price: 1099, ..sub.clone() })
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert_eq!(err.op(), Some("insert"));

    // Release immediately: a statement still queued behind the lock would apply now.
    locker.batch_execute("ROLLBACK").await.map_err(subledger::StoreError::from_db_error)?;
    assert_eq!(store.list_by_user(user).await?[0].price, 999);

    // The only pooled connection is idle and usable.
    scoped.ping().await?;
    assert_eq!(single.list_by_user(user).await?[0].price, 999);
    Ok(())
}

#[tokio::test]
async fn cancelled_upsert_is_rolled_back_before_returning() -> StoreResult<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };

    let user = uuid::Uuid::new_v4();
    let sub = subledger::Subscription::new(user, "Spotify", 199, common::day(2025, 3, 1));
    store.insert(&sub).await?;

    let locker = store.client().await?;
    locker.batch_execute("BEGIN").await.map_err(subledger::StoreError::from_db_error)?;
    locker
        .execute("SELECT 1 FROM user_info WHERE user_id = $1 FOR UPDATE", &[&user])
        .await
        .map_err(subledger::StoreError::from_db_error)?;

    let (handle, signal) = subledger::cancel_pair();
    let scoped = store.scoped(CallScope::new().with_cancel(signal));
    let update = subledger::Subscription { price: 299, ..sub.clone() };
    let (res, ()) = tokio::join!(scoped.insert(&update), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });
    let err = res.unwrap_err();
    assert!(err.is_cancelled(), "{err}");
    assert_eq!(err.op(), Some("insert"));

    locker.batch_execute("ROLLBACK").await.map_err(subledger::StoreError::from_db_error)?;
    assert_eq!(store.list_by_user(user).await?[0].price, 199);
    Ok(())
}

#[tokio::test]
async fn grouped_operations_roll_back_together() -> StoreResult<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let user = uuid::Uuid::new_v4();
    store
        .insert(&subledger::Subscription::new(user, "Netflix", 999, common::day(2025, 1, 1)))
        .await?;

    let mut client = store.client().await?;
    let result: StoreResult<()> = subledger::transaction!(&mut client, tx, {
        subledger::store::ops::delete_by_user(&tx, user).await?;
        // Second delete finds nothing and aborts the whole group.
        subledger::store::ops::delete_by_user(&tx, user).await?;
        Ok::<(), subledger::StoreError>(())
    });
    assert!(result.unwrap_err().is_not_found());
    assert_eq!(store.list_by_user(user).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn check_violation_is_a_storage_failure() -> StoreResult<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let client = store.client().await?;

    // Rendered directly so record validation does not stop the negative price first.
    let bad = subledger::Subscription::new(uuid::Uuid::new_v4(), "Netflix", -1, common::day(2025, 1, 1));
    let q = subledger::UpsertPolicy::insert_query(&bad);
    let err = subledger::GenericClient::execute(&client, &q.sql, &q.params_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, subledger::StoreError::StorageFailure { .. }), "{err}");
    assert!(err.to_string().contains("23514"), "{err}");
    Ok(())
}

#[tokio::test]
async fn unique_violation_is_a_conflict() -> StoreResult<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let client = store.client().await?;

    let user = uuid::Uuid::new_v4();
    let start = common::day(2025, 1, 1);
    let sql = "INSERT INTO user_info (service_name, price, user_id, start_date) VALUES ($1, $2, $3, $4)";
    let params: [&(dyn tokio_postgres::types::ToSql + Sync); 4] = [&"Netflix", &999_i64, &user, &start];
    subledger::GenericClient::execute(&client, sql, &params).await?;
    let err = subledger::GenericClient::execute(&client, sql, &params)
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "{err}");
    assert!(err.to_string().contains("user_info_user_service_start_key"), "{err}");
    Ok(())
}

#[tokio::test]
async fn migrations_round_trip_in_a_private_schema() -> StoreResult<()> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        return Ok(());
    };
    const SCHEMA: &str = "subledger_migrate_round_trip";

    let (admin, conn) = tokio_postgres::connect(&url, tokio_postgres::NoTls)
        .await
        .map_err(subledger::StoreError::from_db_error)?;
    tokio::spawn(conn);
    admin
        .batch_execute(&format!(
            "DROP SCHEMA IF EXISTS {SCHEMA} CASCADE; CREATE SCHEMA {SCHEMA};"
        ))
        .await
        .map_err(subledger::StoreError::from_db_error)?;

    let mut config: tokio_postgres::Config = url
        .parse()
        .map_err(|e| subledger::StoreError::Config(format!("{e}")))?;
    config.options(format!("-c search_path={SCHEMA}"));
    let (mut client, conn) = config
        .connect(tokio_postgres::NoTls)
        .await
        .map_err(subledger::StoreError::from_db_error)?;
    tokio::spawn(conn);

    let source = MigrationSource::Embedded;
    assert_eq!(migrate::version(&client).await?, None);
    assert_eq!(migrate::up(&mut client, &source).await?, vec![1]);
    assert!(migrate::up(&mut client, &source).await?.is_empty());
    assert_eq!(migrate::version(&client).await?.map(|m| m.version), Some(1));

    let reverted = migrate::down(&mut client, &source).await?;
    assert_eq!(reverted.len(), 1);
    assert_eq!(reverted[0].version, 1);
    assert_eq!(migrate::version(&client).await?, None);
    assert_eq!(migrate::up(&mut client, &source).await?, vec![1]);

    admin
        .batch_execute(&format!("DROP SCHEMA {SCHEMA} CASCADE"))
        .await
        .map_err(subledger::StoreError::from_db_error)?;
    Ok(())
}
