//! Partial update composition.

use crate::error::{StoreError, StoreResult};
use crate::model::{Column, Subscription, TABLE};
use crate::qb::BuiltQuery;
use crate::qb::param::{Param, ParamList};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The mutable fields of a subscription, each independently present or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSpec {
    price: Option<i64>,
    end_date: Option<DateTime<Utc>>,
}

impl PatchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price(mut self, price: i64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn new_price(&self) -> Option<i64> {
        self.price
    }

    pub fn new_end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Number of fields present.
    pub fn present_fields(&self) -> usize {
        usize::from(self.price.is_some()) + usize::from(self.end_date.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields() == 0
    }

    /// Reject patches that would issue a no-op or invalid statement.
    pub fn validate(&self, op: &'static str) -> StoreResult<()> {
        if self.is_empty() {
            return Err(StoreError::bad_input(op, "patch", "no fields to update"));
        }
        if let Some(price) = self.price {
            if price < 0 {
                return Err(StoreError::bad_input(
                    op,
                    "price",
                    format!("must be non-negative, got {price}"),
                ));
            }
        }
        Ok(())
    }

    /// Apply the present fields to an in-memory record.
    pub fn apply(&self, sub: &mut Subscription) {
        if let Some(price) = self.price {
            sub.price = price;
        }
        if let Some(end_date) = self.end_date {
            sub.end_date = Some(end_date);
        }
    }

    /// Compose `UPDATE user_info SET ... WHERE user_id = $n` for one user.
    pub fn update_by_user(&self, op: &'static str, user_id: Uuid) -> StoreResult<UpdateStatement> {
        self.validate(op)?;
        let mut stmt = UpdateStatement::new(Column::UserId, user_id);
        if let Some(price) = self.price {
            stmt.set(Column::Price, price);
        }
        if let Some(end_date) = self.end_date {
            stmt.set(Column::EndDate, end_date);
        }
        Ok(stmt)
    }
}

/// SET fragments plus the identifier scoping the update.
///
/// The identifier is always bound last, at position `set_count + 1`.
#[derive(Clone, Debug)]
pub struct UpdateStatement {
    set_fields: Vec<(Column, Param)>,
    key: (Column, Param),
}

impl UpdateStatement {
    fn new<T>(key_column: Column, key: T) -> Self
    where
        T: tokio_postgres::types::ToSql + Send + Sync + 'static,
    {
        Self {
            set_fields: Vec::new(),
            key: (key_column, Param::new(key)),
        }
    }

    fn set<T>(&mut self, column: Column, value: T)
    where
        T: tokio_postgres::types::ToSql + Send + Sync + 'static,
    {
        self.set_fields.push((column, Param::new(value)));
    }

    /// `column = $n` fragments in binding order.
    pub fn set_fragments(&self) -> Vec<String> {
        self.set_fields
            .iter()
            .enumerate()
            .map(|(i, (col, _))| format!("{col} = ${}", i + 1))
            .collect()
    }

    /// Placeholder position of the scoping identifier.
    pub fn key_position(&self) -> usize {
        self.set_fields.len() + 1
    }

    pub fn build(&self) -> BuiltQuery {
        let mut params = ParamList::new();
        let mut set_parts = Vec::with_capacity(self.set_fields.len());
        for (col, value) in &self.set_fields {
            let idx = params.push_param(value.clone());
            set_parts.push(format!("{col} = ${idx}"));
        }
        let (key_col, key) = &self.key;
        let key_idx = params.push_param(key.clone());

        BuiltQuery::new(
            format!(
                "UPDATE {TABLE} SET {} WHERE {key_col} = ${key_idx}",
                set_parts.join(", ")
            ),
            params,
        )
    }
}
