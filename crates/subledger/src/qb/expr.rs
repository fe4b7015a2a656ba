//! Typed condition triples and their rendering to `$n` placeholders.
//!
//! Conditions are accumulated as `(operand, operator, value)` and turned into SQL in a
//! single render step, so placeholder numbering is computed from the parameter list and
//! never by string replacement.

use crate::model::Column;
use crate::qb::param::{Param, ParamList};
use tokio_postgres::types::ToSql;

/// Always-true anchor every WHERE clause starts from.
pub const BASE_PREDICATE: &str = "1=1";

/// Left-hand side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The column as stored.
    Column(Column),
    /// A nullable column with NULL read as the unbounded upper sentinel:
    /// `COALESCE(col, 'infinity')`.
    OpenEnded(Column),
}

impl Operand {
    fn render(self) -> String {
        match self {
            Operand::Column(col) => col.as_str().to_string(),
            Operand::OpenEnded(col) => format!("COALESCE({col}, 'infinity')"),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gte,
    Lte,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Gte => ">=",
            CmpOp::Lte => "<=",
        }
    }
}

/// A single `operand op $n` condition.
#[derive(Clone, Debug)]
pub struct Condition {
    pub operand: Operand,
    pub op: CmpOp,
    pub value: Param,
}

impl Condition {
    fn render(&self, params: &mut ParamList) -> String {
        let idx = params.push_param(self.value.clone());
        format!("{} {} ${}", self.operand.render(), self.op.as_str(), idx)
    }
}

/// A conjunction of conditions anchored on [`BASE_PREDICATE`].
#[derive(Clone, Debug, Default)]
pub struct ExprGroup {
    conditions: Vec<Condition>,
}

impl ExprGroup {
    /// Create a new empty expression group.
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Append one condition.
    pub fn push<T: ToSql + Send + Sync + 'static>(&mut self, operand: Operand, op: CmpOp, value: T) {
        self.conditions.push(Condition {
            operand,
            op,
            value: Param::new(value),
        });
    }

    /// Add condition: column = value
    pub fn eq<T: ToSql + Send + Sync + 'static>(&mut self, column: Column, value: T) {
        self.push(Operand::Column(column), CmpOp::Eq, value);
    }

    /// Add condition: column <= value
    pub fn lte<T: ToSql + Send + Sync + 'static>(&mut self, column: Column, value: T) {
        self.push(Operand::Column(column), CmpOp::Lte, value);
    }

    /// Add condition: COALESCE(column, 'infinity') >= value
    pub fn open_ended_gte<T: ToSql + Send + Sync + 'static>(&mut self, column: Column, value: T) {
        self.push(Operand::OpenEnded(column), CmpOp::Gte, value);
    }

    /// Number of conditions beyond the base predicate.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Check if the group has no conditions beyond the base predicate.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Render the clause body (without the `WHERE` keyword), numbering from `$1`.
    pub fn build(&self) -> (String, ParamList) {
        self.build_with_offset(0)
    }

    /// Render the clause body with placeholders starting at `$offset + 1`.
    pub fn build_with_offset(&self, offset: usize) -> (String, ParamList) {
        let mut params = ParamList::after(offset);
        let mut sql = String::from(BASE_PREDICATE);
        for cond in &self.conditions {
            sql.push_str(" AND ");
            sql.push_str(&cond.render(&mut params));
        }
        (sql, params)
    }
}
