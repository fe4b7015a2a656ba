//! Statement composition for the `user_info` table.
//!
//! Three composers turn sparse inputs into positional SQL:
//!
//! - [`FilterSpec`] → `WHERE 1=1 AND ...` for list and aggregate queries
//! - [`PatchSpec`] → `UPDATE ... SET ... WHERE user_id = $n`
//! - [`UpsertPolicy`] → `INSERT ... ON CONFLICT (...) DO UPDATE`
//!
//! Each one produces a [`BuiltQuery`]: the SQL text and the [`ParamList`] whose order is
//! the `$n` numbering. Nothing here touches a connection, so the rendering can be tested
//! on its own.
//!
//! ```ignore
//! use subledger::qb::FilterSpec;
//!
//! let q = FilterSpec::new().user_id(user).service_name("Netflix").sum_query();
//! assert_eq!(q.params.len(), 2);
//! ```

mod expr;
mod filter;
mod param;
mod patch;
mod upsert;

pub use expr::{BASE_PREDICATE, CmpOp, Condition, ExprGroup, Operand};
pub use filter::FilterSpec;
pub use param::{Param, ParamList};
pub use patch::{PatchSpec, UpdateStatement};
pub use upsert::UpsertPolicy;

use tokio_postgres::types::ToSql;

/// The result of composing a statement.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: ParamList,
}

impl BuiltQuery {
    /// Create a new built query.
    pub fn new(sql: String, params: ParamList) -> Self {
        Self { sql, params }
    }

    /// Get parameters as references for tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.as_refs()
    }
}
