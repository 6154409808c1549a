//! Direct executors (C6): one compiled function per `(operator,
//! type_code)` branch that turns a single condition into a selection,
//! consulting a matching single-column index before falling back to a
//! column scan (4.4).

use super::{arg_at, Condition, Operator, QueryArg};
use crate::error::{EngineError, QueryError};
use crate::index::IndexKey;
use crate::pref::Pref;
use crate::row_table::RowTable;
use crate::selection::Selection;
use crate::table::Table;
use crate::types::{TypeCode, Value};

fn scan_bound(rows: &RowTable) -> usize {
    rows.allocated_count() as usize
}

fn from_rows(rows: &RowTable, row_indices: Vec<u32>) -> Selection {
    Selection::from_scan_indices(rows, &row_indices)
}

fn from_prefs(rows: &RowTable, prefs: &[Pref]) -> Selection {
    Selection::filter_live(rows, prefs.iter().copied())
}

fn scan_all(table: &Table) -> Selection {
    from_rows(table.rows(), table.rows().scan_all())
}

fn eq(table: &Table, column: usize, value: &Value, ignore_case: bool, type_code: TypeCode) -> Selection {
    if ignore_case {
        if let Value::String(s) = value {
            let rows = table.rows().with_column(column, |c| c.scan_equals_ignore_case(scan_bound(table.rows()), s));
            return from_rows(table.rows(), rows);
        }
    }
    if let Some(key) = IndexKey::from_value(value, type_code) {
        let hit = table.with_hash_index(column, |idx| idx.map(|h| h.lookup(&key).to_vec()));
        if let Some(prefs) = hit {
            return from_prefs(table.rows(), &prefs);
        }
    }
    let rows = table.rows().with_column(column, |c| c.scan_equals(scan_bound(table.rows()), value));
    from_rows(table.rows(), rows)
}

fn between(table: &Table, column: usize, lo: &Value, hi: &Value, type_code: TypeCode) -> Result<Selection, EngineError> {
    let (lo_key, hi_key) = match (IndexKey::from_value(lo, type_code), IndexKey::from_value(hi, type_code)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(Selection::empty()),
    };
    if hi_key < lo_key {
        return Err(QueryError::InvertedBetween.into());
    }
    let hit = table.with_range_index(column, |idx| idx.map(|r| r.between(lo_key, hi_key)));
    if let Some(prefs) = hit {
        return Ok(from_prefs(table.rows(), &prefs));
    }
    let rows = table.rows().with_column(column, |c| c.scan_between(scan_bound(table.rows()), lo, hi));
    Ok(from_rows(table.rows(), rows))
}

fn comparison(table: &Table, column: usize, operator: Operator, value: &Value, type_code: TypeCode) -> Selection {
    let Some(key) = IndexKey::from_value(value, type_code) else { return Selection::empty() };
    let hit = table.with_range_index(column, |idx| {
        idx.map(|r| match operator {
            Operator::Gt => r.gt(key.clone()),
            Operator::Gte => r.gte(key.clone()),
            Operator::Lt => r.lt(key.clone()),
            Operator::Lte => r.lte(key.clone()),
            _ => unreachable!(),
        })
    });
    if let Some(prefs) = hit {
        return from_prefs(table.rows(), &prefs);
    }
    let row_bound = scan_bound(table.rows());
    let rows = table.rows().with_column(column, |c| match operator {
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            // No index: materialize via a scan_between against the type's
            // natural extremes, then trim the open end.
            match operator {
                Operator::Gt => c
                    .scan_between(row_bound, value, &extreme_for(type_code, false))
                    .into_iter()
                    .filter(|&r| c.get_value(r as usize) != *value)
                    .collect(),
                Operator::Gte => c.scan_between(row_bound, value, &extreme_for(type_code, false)),
                Operator::Lt => c
                    .scan_between(row_bound, &extreme_for(type_code, true), value)
                    .into_iter()
                    .filter(|&r| c.get_value(r as usize) != *value)
                    .collect(),
                Operator::Lte => c.scan_between(row_bound, &extreme_for(type_code, true), value),
                _ => unreachable!(),
            }
        }
        _ => unreachable!(),
    });
    from_rows(table.rows(), rows)
}

fn extreme_for(type_code: TypeCode, minimum: bool) -> Value {
    if type_code.is_string_like() {
        if minimum {
            Value::String(String::new())
        } else {
            Value::String(String::from('\u{10FFFF}').repeat(64))
        }
    } else if minimum {
        Value::I64(i64::MIN)
    } else {
        Value::I64(i64::MAX)
    }
}

pub fn execute(table: &Table, cond: &Condition, args: &[QueryArg]) -> Result<Selection, EngineError> {
    let type_code = table.schema.fields[cond.column].type_code;
    match cond.operator {
        Operator::Eq => {
            let value = arg_at(args, cond.arg_index)?.scalar().ok_or(QueryError::NotIterable)?;
            Ok(eq(table, cond.column, value, cond.ignore_case, type_code))
        }
        Operator::Ne => {
            let value = arg_at(args, cond.arg_index)?.scalar().ok_or(QueryError::NotIterable)?;
            let positive = eq(table, cond.column, value, cond.ignore_case, type_code);
            Ok(Selection::subtract(&scan_all(table), &positive))
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let value = arg_at(args, cond.arg_index)?.scalar().ok_or(QueryError::NotIterable)?;
            Ok(comparison(table, cond.column, cond.operator, value, type_code))
        }
        Operator::Between => {
            let lo = arg_at(args, cond.arg_index)?.scalar().ok_or(QueryError::NotIterable)?;
            let hi = arg_at(args, cond.arg_index + 1)?.scalar().ok_or(QueryError::NotIterable)?;
            between(table, cond.column, lo, hi, type_code)
        }
        Operator::In => {
            let values = arg_at(args, cond.arg_index)?.list().ok_or(QueryError::NotIterable)?;
            let mut selection = Selection::empty();
            for v in values {
                selection = Selection::union(&selection, &eq(table, cond.column, v, cond.ignore_case, type_code));
            }
            Ok(selection)
        }
        Operator::NotIn => {
            let values = arg_at(args, cond.arg_index)?.list().ok_or(QueryError::NotIterable)?;
            let mut positive = Selection::empty();
            for v in values {
                positive = Selection::union(&positive, &eq(table, cond.column, v, cond.ignore_case, type_code));
            }
            Ok(Selection::subtract(&scan_all(table), &positive))
        }
        Operator::IsNull => {
            if !table.schema.fields[cond.column].nullable {
                return Ok(Selection::empty());
            }
            let rows = table.rows().with_column(cond.column, |c| c.scan_equals(scan_bound(table.rows()), &Value::Null));
            Ok(from_rows(table.rows(), rows))
        }
        Operator::NotNull => {
            if !table.schema.fields[cond.column].nullable {
                return Ok(scan_all(table));
            }
            let rows = table.rows().with_column(cond.column, |c| c.scan_present(scan_bound(table.rows())));
            Ok(from_rows(table.rows(), rows))
        }
        Operator::StartingWith => {
            let value = arg_at(args, cond.arg_index)?.scalar().ok_or(QueryError::NotIterable)?;
            let Value::String(s) = value else { return Ok(Selection::empty()) };
            let hit = table.with_prefix_index(cond.column, |idx| idx.map(|t| t.starts_with(s).to_vec()));
            if let Some(prefs) = hit {
                return Ok(from_prefs(table.rows(), &prefs));
            }
            let rows = table.rows().with_column(cond.column, |c| c.scan_starts_with(scan_bound(table.rows()), s));
            Ok(from_rows(table.rows(), rows))
        }
        Operator::EndingWith => {
            let value = arg_at(args, cond.arg_index)?.scalar().ok_or(QueryError::NotIterable)?;
            let Value::String(s) = value else { return Ok(Selection::empty()) };
            let reversed: String = s.chars().rev().collect();
            let hit = table.with_suffix_index(cond.column, |idx| idx.map(|t| t.starts_with(&reversed).to_vec()));
            if let Some(prefs) = hit {
                return Ok(from_prefs(table.rows(), &prefs));
            }
            let rows = table.rows().with_column(cond.column, |c| c.scan_ends_with(scan_bound(table.rows()), s));
            Ok(from_rows(table.rows(), rows))
        }
        Operator::Like => {
            let value = arg_at(args, cond.arg_index)?.scalar().ok_or(QueryError::NotIterable)?;
            let Value::String(pattern) = value else { return Ok(Selection::empty()) };
            let rows = table.rows().with_column(cond.column, |c| c.scan_like(scan_bound(table.rows()), pattern));
            Ok(from_rows(table.rows(), rows))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Combinator, Condition};
    use crate::schema::{EntityDecl, FieldDef};

    fn non_nullable_table() -> Table {
        let decl = EntityDecl::new("Row", vec![FieldDef::identifier("id", TypeCode::I64), FieldDef::new("age", TypeCode::I32, false)]);
        let resolved = crate::schema::validate(&decl, false).unwrap();
        Table::new(resolved, 4, false, false)
    }

    /// On a non-nullable column `IS_NULL`/`NOT_NULL` short-circuit without
    /// consulting the bitmap (4.4).
    #[test]
    fn is_null_short_circuits_on_non_nullable_column() {
        let table = non_nullable_table();
        table.insert(vec![Value::I64(1), Value::I32(5)]).unwrap();
        let cond = Condition { column: 1, operator: Operator::IsNull, arg_index: 0, ignore_case: false, next_combinator: Combinator::And };
        let selection = execute(&table, &cond, &[]).unwrap();
        assert!(selection.is_empty());
    }

    #[test]
    fn not_null_short_circuits_on_non_nullable_column() {
        let table = non_nullable_table();
        table.insert(vec![Value::I64(1), Value::I32(5)]).unwrap();
        let cond = Condition { column: 1, operator: Operator::NotNull, arg_index: 0, ignore_case: false, next_combinator: Combinator::And };
        let selection = execute(&table, &cond, &[]).unwrap();
        assert_eq!(selection.len(), 1);
    }
}
