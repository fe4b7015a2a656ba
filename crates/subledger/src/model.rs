//! The subscription record and its persisted column set.

use crate::error::{StoreError, StoreResult};
use crate::row::{FromRow, RowExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// Persisted table name.
pub const TABLE: &str = "user_info";

/// Column list in the order every SELECT returns them.
pub const COLUMNS: &str = "service_name, price, user_id, start_date, end_date";

/// Columns of the `user_info` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    ServiceName,
    Price,
    UserId,
    StartDate,
    EndDate,
}

impl Column {
    /// Column name as it appears in SQL.
    pub fn as_str(self) -> &'static str {
        match self {
            Column::ServiceName => "service_name",
            Column::Price => "price",
            Column::UserId => "user_id",
            Column::StartDate => "start_date",
            Column::EndDate => "end_date",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service name that is empty or whitespace only. Never stored, never filtered on.
pub(crate) fn is_blank_service(name: &str) -> bool {
    name.trim().is_empty()
}

/// One subscription period of one user.
///
/// `(user_id, service_name, start_date)` is the natural key. `end_date = None` means the
/// subscription is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub service_name: String,
    /// Price in the smallest currency unit.
    pub price: i64,
    pub user_id: Uuid,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

/// The natural key of a [`Subscription`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey<'a> {
    pub user_id: Uuid,
    pub service_name: &'a str,
    pub start_date: DateTime<Utc>,
}

impl Subscription {
    pub fn new(
        user_id: Uuid,
        service_name: impl Into<String>,
        price: i64,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            price,
            user_id,
            start_date,
            end_date: None,
        }
    }

    /// Set the inclusive end of the validity window.
    pub fn ending(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn key(&self) -> SubscriptionKey<'_> {
        SubscriptionKey {
            user_id: self.user_id,
            service_name: &self.service_name,
            start_date: self.start_date,
        }
    }

    /// End date with the open-ended case resolved to the unbounded upper sentinel.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end_date.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Structural validation applied before an insert is issued.
    pub fn validate(&self, op: &'static str) -> StoreResult<()> {
        if is_blank_service(&self.service_name) {
            return Err(StoreError::bad_input(op, "service_name", "must not be empty"));
        }
        if self.price < 0 {
            return Err(StoreError::bad_input(
                op,
                "price",
                format!("must be non-negative, got {}", self.price),
            ));
        }
        if self.user_id.is_nil() {
            return Err(StoreError::bad_input(op, "user_id", "must not be the nil UUID"));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(StoreError::bad_input(
                    op,
                    "end_date",
                    format!("{end} is before start_date {}", self.start_date),
                ));
            }
        }
        Ok(())
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            service_name: row.try_get_column(Column::ServiceName.as_str())?,
            price: row.try_get_column(Column::Price.as_str())?,
            user_id: row.try_get_column(Column::UserId.as_str())?,
            start_date: row.try_get_column(Column::StartDate.as_str())?,
            end_date: row.try_get_column(Column::EndDate.as_str())?,
        })
    }
}
