//! Store operations over any [`GenericClient`].
//!
//! Each function validates its input before touching the connection, renders its statement
//! through the composers in [`crate::qb`] and attributes every error to its operation name.
//! Pass a transaction to run several of them atomically.

use crate::client::GenericClient;
use crate::error::{StoreError, StoreResult};
use crate::model::{COLUMNS, Column, Subscription, TABLE};
use crate::qb::{BuiltQuery, FilterSpec, PatchSpec, UpsertPolicy};
use crate::row::{FromRow, RowExt};
use uuid::Uuid;

pub const OP_INSERT: &str = "insert";
pub const OP_DELETE_BY_USER: &str = "delete_by_user";
pub const OP_UPDATE_BY_USER: &str = "update_by_user";
pub const OP_LIST_ALL: &str = "list_all";
pub const OP_LIST_BY_USER: &str = "list_by_user";
pub const OP_FILTER_SUM: &str = "filter_sum";
pub const OP_PING: &str = "ping";

const MAX_LOGGED_SQL: usize = 200;

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(MAX_LOGGED_SQL) {
        Some((cut, _)) => format!("{}...", &sql[..cut]),
        None => sql.to_string(),
    }
}

fn trace_sql(op: &'static str, q: &BuiltQuery) {
    tracing::debug!(
        target: "subledger.sql",
        op,
        param_count = q.params.len(),
        sql = %truncate_sql(&q.sql),
    );
}

pub(crate) fn require_user(op: &'static str, user_id: Uuid) -> StoreResult<()> {
    if user_id.is_nil() {
        return Err(StoreError::bad_input(op, "user_id", "must not be the nil UUID"));
    }
    Ok(())
}

/// Insert a record, or overwrite price and end date of the record with the same
/// `(user_id, service_name, start_date)`.
pub async fn insert(conn: &impl GenericClient, sub: &Subscription) -> StoreResult<()> {
    sub.validate(OP_INSERT)?;
    let q = UpsertPolicy::insert_query(sub);
    trace_sql(OP_INSERT, &q);

    let affected = conn
        .execute(&q.sql, &q.params_ref())
        .await
        .map_err(|e| e.in_op(OP_INSERT))?;
    if affected == 0 {
        return Err(StoreError::conflict(OP_INSERT, "no rows affected"));
    }
    Ok(())
}

/// Delete every record of a user. Returns the number of deleted rows.
pub async fn delete_by_user(conn: &impl GenericClient, user_id: Uuid) -> StoreResult<u64> {
    require_user(OP_DELETE_BY_USER, user_id)?;
    let mut params = crate::qb::ParamList::new();
    let idx = params.push(user_id);
    let q = BuiltQuery::new(
        format!("DELETE FROM {TABLE} WHERE {} = ${idx}", Column::UserId),
        params,
    );
    trace_sql(OP_DELETE_BY_USER, &q);

    let affected = conn
        .execute(&q.sql, &q.params_ref())
        .await
        .map_err(|e| e.in_op(OP_DELETE_BY_USER))?;
    if affected == 0 {
        return Err(StoreError::not_found(
            OP_DELETE_BY_USER,
            format!("no subscriptions for user {user_id}"),
        ));
    }
    Ok(affected)
}

/// Apply the present fields of `patch` to every record of a user. Returns the number of
/// updated rows.
pub async fn update_by_user(
    conn: &impl GenericClient,
    user_id: Uuid,
    patch: &PatchSpec,
) -> StoreResult<u64> {
    require_user(OP_UPDATE_BY_USER, user_id)?;
    let q = patch.update_by_user(OP_UPDATE_BY_USER, user_id)?.build();
    trace_sql(OP_UPDATE_BY_USER, &q);

    let affected = conn
        .execute(&q.sql, &q.params_ref())
        .await
        .map_err(|e| e.in_op(OP_UPDATE_BY_USER))?;
    if affected == 0 {
        return Err(StoreError::not_found(
            OP_UPDATE_BY_USER,
            format!("no subscriptions for user {user_id}"),
        ));
    }
    Ok(affected)
}

/// Every record, ordered by user, service and start date.
pub async fn list_all(conn: &impl GenericClient) -> StoreResult<Vec<Subscription>> {
    let q = FilterSpec::new().select_query();
    fetch_all(conn, OP_LIST_ALL, &q).await
}

/// Every record of one user, ordered by service (bytewise) and start date. An unknown user
/// yields an empty list.
pub async fn list_by_user(
    conn: &impl GenericClient,
    user_id: Uuid,
) -> StoreResult<Vec<Subscription>> {
    require_user(OP_LIST_BY_USER, user_id)?;
    let mut params = crate::qb::ParamList::new();
    let idx = params.push(user_id);
    let q = BuiltQuery::new(
        format!(
            "SELECT {COLUMNS} FROM {TABLE} WHERE {} = ${idx} ORDER BY {} COLLATE \"C\", {}",
            Column::UserId,
            Column::ServiceName,
            Column::StartDate
        ),
        params,
    );
    fetch_all(conn, OP_LIST_BY_USER, &q).await
}

/// Sum of `price` over the records matching `filter`; 0 when nothing matches.
pub async fn filter_sum(conn: &impl GenericClient, filter: &FilterSpec) -> StoreResult<i64> {
    let q = filter.sum_query();
    trace_sql(OP_FILTER_SUM, &q);

    let row = conn
        .query_one(&q.sql, &q.params_ref())
        .await
        .map_err(|e| e.in_op(OP_FILTER_SUM))?;
    row.try_get_column::<i64>("total")
        .map_err(|e| e.in_op(OP_FILTER_SUM))
}

/// Round-trip a trivial statement.
pub async fn ping(conn: &impl GenericClient) -> StoreResult<()> {
    tracing::debug!(target: "subledger.sql", op = OP_PING, param_count = 0, sql = "SELECT 1");
    conn.query_one("SELECT 1", &[])
        .await
        .map(|_| ())
        .map_err(|e| e.in_op(OP_PING))
}

async fn fetch_all(
    conn: &impl GenericClient,
    op: &'static str,
    q: &BuiltQuery,
) -> StoreResult<Vec<Subscription>> {
    trace_sql(op, q);
    let rows = conn
        .query(&q.sql, &q.params_ref())
        .await
        .map_err(|e| e.in_op(op))?;
    rows.iter()
        .map(|row| Subscription::from_row(row).map_err(|e| e.in_op(op)))
        .collect()
}
