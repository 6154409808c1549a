//! Compiled query surface (C6-C9): the condition vector, the composite
//! index planner, the AND/OR group orchestrator, and multi-key order/limit.
//!
//! Grounded on the teacher's `sql/compiler.rs` + `sql/plan_statement.rs`
//! split between "compile once" and "execute many": a `CompiledQuery` is
//! built once per call-site shape and evaluated against a `Table` on
//! every invocation without re-parsing anything.

mod composite_plan;
mod condition;
mod group;
mod order;

pub use order::OrderKey;

use crate::error::{EngineError, QueryError};
use crate::pref::Pref;
use crate::selection::Selection;
use crate::table::Table;
use crate::types::Value;

/// One comparison operator recognized by the condition compiler (4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    In,
    NotIn,
    IsNull,
    NotNull,
    StartingWith,
    EndingWith,
    Like,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// A single compiled predicate: `(column_index, operator, arg_index,
/// ignore_case, next_combinator)`, per 6.
#[derive(Debug, Clone)]
pub struct Condition {
    pub column: usize,
    pub operator: Operator,
    pub arg_index: usize,
    pub ignore_case: bool,
    pub next_combinator: Combinator,
}

/// One call-site argument. `BETWEEN` consumes two consecutive `Scalar`
/// arguments; `IN`/`NOT_IN` consume one `List` argument.
#[derive(Debug, Clone)]
pub enum QueryArg {
    Scalar(Value),
    List(Vec<Value>),
}

impl QueryArg {
    fn scalar(&self) -> Option<&Value> {
        match self {
            QueryArg::Scalar(v) => Some(v),
            QueryArg::List(_) => None,
        }
    }

    fn list(&self) -> Option<&[Value]> {
        match self {
            QueryArg::List(vs) => Some(vs),
            QueryArg::Scalar(_) => None,
        }
    }
}

fn arg_at<'a>(args: &'a [QueryArg], index: usize) -> Result<&'a QueryArg, EngineError> {
    args.get(index).ok_or_else(|| QueryError::ArgOutOfRange(index, args.len()).into())
}

/// A fully compiled call: every condition plus an optional multi-key
/// order and a result limit (4.7-4.8). `limit = 0` means unlimited.
#[derive(Debug, Clone, Default)]
pub struct CompiledQuery {
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderKey>,
    pub limit: usize,
}

impl CompiledQuery {
    /// Returns the result as an ordered (or, with no `order_by`, ascending
    /// by `pref`) row list — not a `Selection`, since `Selection`'s
    /// ascending-by-pref invariant only holds for the algebra stage, not
    /// for a caller-ordered materialized result.
    pub fn evaluate(&self, table: &Table, args: &[QueryArg]) -> Result<Vec<Pref>, EngineError> {
        let selection = if self.conditions.is_empty() {
            Selection::from_scan_indices(table.rows(), &table.rows().scan_all())
        } else {
            group::evaluate_groups(table, &self.conditions, args)?
        };
        let ordered = if self.order_by.is_empty() {
            selection.to_ref_vec()
        } else {
            order::sort_selection(table, &selection, &self.order_by)?
        };
        Ok(order::apply_limit(ordered, self.limit))
    }
}
