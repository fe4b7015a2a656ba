//! Conflict resolution for inserts of an already-reported subscription period.

use crate::model::{Column, Subscription, TABLE};
use crate::qb::BuiltQuery;
use crate::qb::param::ParamList;

/// Upsert policy for `user_info`.
///
/// Uniqueness is enforced on `(user_id, service_name, start_date)`. A colliding insert is a
/// correction of the same period: price and end date take the incoming values, every other
/// column keeps what is stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertPolicy;

impl UpsertPolicy {
    /// Columns of the uniqueness constraint, in constraint order.
    pub const CONFLICT_TARGET: [Column; 3] = [Column::UserId, Column::ServiceName, Column::StartDate];

    /// Columns overwritten on conflict.
    pub const MERGED: [Column; 2] = [Column::Price, Column::EndDate];

    /// Columns written by an insert, in `VALUES` order.
    pub const INSERTED: [Column; 5] = [
        Column::ServiceName,
        Column::Price,
        Column::UserId,
        Column::StartDate,
        Column::EndDate,
    ];

    /// Whether two records collide on the conflict target.
    pub fn same_key(a: &Subscription, b: &Subscription) -> bool {
        a.key() == b.key()
    }

    /// Last-writer-wins on the merged columns.
    pub fn merge(existing: &mut Subscription, incoming: &Subscription) {
        existing.price = incoming.price;
        existing.end_date = incoming.end_date;
    }

    /// `INSERT ... ON CONFLICT (...) DO UPDATE SET price = EXCLUDED.price, ...`
    pub fn insert_query(sub: &Subscription) -> BuiltQuery {
        let mut params = ParamList::new();
        let mut placeholders = Vec::with_capacity(Self::INSERTED.len());
        for col in Self::INSERTED {
            let idx = match col {
                Column::ServiceName => params.push(sub.service_name.clone()),
                Column::Price => params.push(sub.price),
                Column::UserId => params.push(sub.user_id),
                Column::StartDate => params.push(sub.start_date),
                Column::EndDate => params.push(sub.end_date),
            };
            placeholders.push(format!("${idx}"));
        }

        let columns = join(&Self::INSERTED);
        let target = join(&Self::CONFLICT_TARGET);
        let merge = Self::MERGED
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        BuiltQuery::new(
            format!(
                "INSERT INTO {TABLE} ({columns}) VALUES ({}) \
                 ON CONFLICT ({target}) DO UPDATE SET {merge}",
                placeholders.join(", ")
            ),
            params,
        )
    }
}

fn join(cols: &[Column]) -> String {
    cols.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
}
