//! The connection seam shared by plain clients, pooled clients and transactions.

use crate::error::{StoreError, StoreResult, UNSCOPED};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// The connection capability the store consumes: positional-parameter execution plus a
/// cancellation handle.
///
/// Implemented for plain connections, pooled connections and transactions, so every
/// operation in [`crate::store::ops`] composes with or without a transaction.
pub trait GenericClient: Send + Sync {
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = StoreResult<Vec<Row>>> + Send;

    /// First row of the result; an empty result is [`StoreError::NotFound`].
    fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = StoreResult<Row>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            rows.into_iter()
                .next()
                .ok_or_else(|| StoreError::not_found(UNSCOPED, "expected one row, got none"))
        }
    }

    /// Affected row count.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = StoreResult<u64>> + Send;

    /// Token for aborting the statement currently running on this connection.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }
}

/// Native tokio-postgres types: call the inherent method and map the driver error.
macro_rules! impl_native {
    ($ty:ty) => {
        impl GenericClient for $ty {
            async fn query(
                &self,
                sql: &str,
                params: &[&(dyn ToSql + Sync)],
            ) -> StoreResult<Vec<Row>> {
                <$ty>::query(self, sql, params)
                    .await
                    .map_err(StoreError::from_db_error)
            }

            async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StoreResult<u64> {
                <$ty>::execute(self, sql, params)
                    .await
                    .map_err(StoreError::from_db_error)
            }

            fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
                Some(<$ty>::cancel_token(self))
            }
        }
    };
}

impl_native!(tokio_postgres::Client);
impl_native!(tokio_postgres::Transaction<'_>);

/// deadpool wrappers deref to a type that already implements the trait.
#[cfg(feature = "pool")]
macro_rules! impl_via_deref {
    ($ty:ty) => {
        impl GenericClient for $ty {
            async fn query(
                &self,
                sql: &str,
                params: &[&(dyn ToSql + Sync)],
            ) -> StoreResult<Vec<Row>> {
                GenericClient::query(&**self, sql, params).await
            }

            async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StoreResult<u64> {
                GenericClient::execute(&**self, sql, params).await
            }

            fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
                GenericClient::cancel_token(&**self)
            }
        }
    };
}

#[cfg(feature = "pool")]
impl_via_deref!(deadpool_postgres::ClientWrapper);
#[cfg(feature = "pool")]
impl_via_deref!(deadpool_postgres::Client);
#[cfg(feature = "pool")]
impl_via_deref!(deadpool_postgres::Transaction<'_>);
