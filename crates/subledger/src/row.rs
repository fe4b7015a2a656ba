//! Row mapping traits and utilities

use crate::error::{StoreError, StoreResult, UNSCOPED};
use tokio_postgres::Row;

/// Trait for converting a database row into a Rust type.
pub trait FromRow: Sized {
    /// Convert a row into Self
    fn from_row(row: &Row) -> StoreResult<Self>;
}

/// Extension trait for tokio_postgres::Row with better error messages
pub trait RowExt {
    /// Try to get a column value, returning a storage failure naming the column
    fn try_get_column<T>(&self, column: &str) -> StoreResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> StoreResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| StoreError::storage(UNSCOPED, format!("decode column '{column}': {e}")))
    }
}
