//! Predicate composition for read and aggregate queries.

use crate::model::{COLUMNS, Column, Subscription, TABLE, is_blank_service};
use crate::qb::BuiltQuery;
use crate::qb::expr::ExprGroup;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A sparse set of filters scoping a read or aggregate query.
///
/// Every field is independently present or absent. The setters treat a blank service
/// name and the nil UUID as absent, so a filter can never ask for those literally.
///
/// `from` / `to` describe a query interval: a record matches when its validity window
/// `[start_date, end_date or infinity]` intersects `[from, to]`.
///
/// ```ignore
/// let filter = FilterSpec::new()
///     .service_name("Netflix")
///     .from(jan_15)
///     .to(jan_20);
/// let total = store.filter_sum(&filter).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    user_id: Option<Uuid>,
    service_name: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl FilterSpec {
    /// An empty filter: matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one user. The nil UUID leaves the field absent.
    pub fn user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = (!user_id.is_nil()).then_some(user_id);
        self
    }

    /// Restrict to one service. A blank name leaves the field absent.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.service_name = (!is_blank_service(&name)).then_some(name);
        self
    }

    /// Lower bound: keep records still valid at or after `from`.
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Upper bound: keep records starting at or before `to`.
    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Set the user filter from an optional value.
    pub fn user_id_opt(self, user_id: Option<Uuid>) -> Self {
        match user_id {
            Some(id) => self.user_id(id),
            None => self,
        }
    }

    /// Set the service filter from an optional value.
    pub fn service_name_opt(self, name: Option<impl Into<String>>) -> Self {
        match name {
            Some(name) => self.service_name(name),
            None => self,
        }
    }

    /// Set the lower bound from an optional value.
    pub fn from_opt(self, from: Option<DateTime<Utc>>) -> Self {
        match from {
            Some(from) => self.from(from),
            None => self,
        }
    }

    /// Set the upper bound from an optional value.
    pub fn to_opt(self, to: Option<DateTime<Utc>>) -> Self {
        match to {
            Some(to) => self.to(to),
            None => self,
        }
    }

    pub fn user(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn service(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.from
    }

    pub fn upper_bound(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    /// Number of fields present.
    pub fn present_fields(&self) -> usize {
        usize::from(self.user_id.is_some())
            + usize::from(self.service_name.is_some())
            + usize::from(self.from.is_some())
            + usize::from(self.to.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields() == 0
    }

    /// Accumulate one condition per present field.
    ///
    /// Order: lower bound, upper bound, user, service.
    pub fn to_expr_group(&self) -> ExprGroup {
        let mut group = ExprGroup::new();
        if let Some(from) = self.from {
            group.open_ended_gte(Column::EndDate, from);
        }
        if let Some(to) = self.to {
            group.lte(Column::StartDate, to);
        }
        if let Some(user_id) = self.user_id {
            group.eq(Column::UserId, user_id);
        }
        if let Some(name) = &self.service_name {
            group.eq(Column::ServiceName, name.clone());
        }
        group
    }

    /// `SELECT COALESCE(SUM(price), 0)` over the matched records.
    ///
    /// `SUM(bigint)` is `numeric` in PostgreSQL; the cast keeps the result an `i64`.
    pub fn sum_query(&self) -> BuiltQuery {
        let (where_sql, params) = self.to_expr_group().build();
        BuiltQuery::new(
            format!(
                "SELECT COALESCE(SUM({price}), 0)::bigint AS total FROM {TABLE} WHERE {where_sql}",
                price = Column::Price
            ),
            params,
        )
    }

    /// Matched records in the stable `(user_id, service_name, start_date)` order.
    ///
    /// Service names compare bytewise (`COLLATE "C"`) whatever the database collation.
    pub fn select_query(&self) -> BuiltQuery {
        let (where_sql, params) = self.to_expr_group().build();
        BuiltQuery::new(
            format!(
                "SELECT {COLUMNS} FROM {TABLE} WHERE {where_sql} \
                 ORDER BY user_id, service_name COLLATE \"C\", start_date"
            ),
            params,
        )
    }

    /// Evaluate the predicate against an in-memory record.
    ///
    /// Mirrors the rendered SQL exactly, including the open-ended end date.
    pub fn matches(&self, sub: &Subscription) -> bool {
        self.from.is_none_or(|from| sub.effective_end() >= from)
            && self.to.is_none_or(|to| sub.start_date <= to)
            && self.user_id.is_none_or(|id| sub.user_id == id)
            && self
                .service_name
                .as_deref()
                .is_none_or(|name| sub.service_name == name)
    }
}
