//! Grouping store operations in one transaction.
//!
//! The functions in [`crate::store::ops`] accept any [`crate::GenericClient`], including
//! `tokio_postgres::Transaction` and `deadpool_postgres::Transaction`. Wrap them in
//! [`transaction!`] to commit on success and roll back on the first error.
//!
//! ```ignore
//! use subledger::store::ops;
//!
//! let mut client = store.client().await?;
//! subledger::transaction!(&mut client, tx, {
//!     ops::delete_by_user(&tx, old_user).await?;
//!     for sub in &migrated {
//!         ops::insert(&tx, sub).await?;
//!     }
//!     Ok(())
//! })?;
//! ```

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `subledger::StoreResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let $tx = ($client)
            .transaction()
            .await
            .map_err(|e| $crate::StoreError::from_db_error(e).in_op("begin"))?;

        let __subledger_tx_body_result = async { $body }.await;
        match __subledger_tx_body_result {
            Ok(value) => {
                $tx.commit()
                    .await
                    .map_err(|e| $crate::StoreError::from_db_error(e).in_op("commit"))?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::StoreError::storage(
                    "rollback",
                    format!("{error} (rollback failed: {rollback_err})"),
                )),
            },
        }
    }};
}
