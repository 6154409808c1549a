//! Multi-key order and limit (C9).
//!
//! Builds one dense key array per order column (reading each row once
//! through the seqlock), then sorts the selection lexicographically
//! across those keys with a row-index tiebreak for determinism. Nulls
//! sort last in ascending order, first in descending, per 4.7.

use crate::error::EngineError;
use crate::index::IndexKey;
use crate::selection::Selection;
use crate::table::Table;
use crate::types::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
pub struct OrderKey {
    pub column: usize,
    pub ascending: bool,
}

fn compare_key(a: &Value, b: &Value, type_code: crate::types::TypeCode, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => if ascending { Ordering::Greater } else { Ordering::Less },
        (false, true) => if ascending { Ordering::Less } else { Ordering::Greater },
        (false, false) => {
            let ka = IndexKey::from_value(a, type_code);
            let kb = IndexKey::from_value(b, type_code);
            let ord = ka.cmp(&kb);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
    }
}

/// Returns the selection's rows permuted into `keys` order. The result is
/// no longer ascending-by-pref (that invariant belongs to `Selection`'s
/// set algebra, not to a materialized result list), so callers past this
/// point work with a plain `Vec<Pref>`.
pub fn sort_selection(table: &Table, selection: &Selection, keys: &[OrderKey]) -> Result<Vec<crate::pref::Pref>, EngineError> {
    let mut rows_with_keys: Vec<(u32, Vec<Value>)> = Vec::with_capacity(selection.len());
    for pref in selection.iter() {
        let Some(values) = table.rows().read_with_seqlock(pref.row())? else { continue };
        let key_values = keys.iter().map(|k| values[k.column].clone()).collect();
        rows_with_keys.push((pref.row(), key_values));
    }
    let type_codes: Vec<_> = keys.iter().map(|k| table.schema.fields[k.column].type_code).collect();
    rows_with_keys.sort_unstable_by(|(row_a, keys_a), (row_b, keys_b)| {
        for (i, ok) in keys.iter().enumerate() {
            let ord = compare_key(&keys_a[i], &keys_b[i], type_codes[i], ok.ascending);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        row_a.cmp(row_b)
    });
    Ok(rows_with_keys
        .into_iter()
        .filter_map(|(row, _)| {
            let generation = table.rows().row_generation(row);
            (!table.rows().is_tombstoned(row)).then(|| crate::pref::Pref::pack(row, generation))
        })
        .collect())
}

pub fn apply_limit(mut rows: Vec<crate::pref::Pref>, limit: usize) -> Vec<crate::pref::Pref> {
    if limit > 0 && rows.len() > limit {
        rows.truncate(limit);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityDecl, FieldDef};
    use crate::types::TypeCode;

    fn ages_table(ages: &[i32]) -> Table {
        let decl = EntityDecl::new("Row", vec![FieldDef::identifier("id", TypeCode::I64), FieldDef::new("age", TypeCode::I32, false)]);
        let resolved = crate::schema::validate(&decl, false).unwrap();
        let table = Table::new(resolved, 4, true, true);
        for (i, &age) in ages.iter().enumerate() {
            table.insert(vec![Value::I64(i as i64), Value::I32(age)]).unwrap();
        }
        table
    }

    #[test]
    fn ascending_sort_orders_by_key() {
        let table = ages_table(&[30, 10, 20]);
        let selection = Selection::from_scan_indices(table.rows(), &table.rows().scan_all());
        let sorted = sort_selection(&table, &selection, &[OrderKey { column: 1, ascending: true }]).unwrap();
        let ages: Vec<i32> = sorted
            .iter()
            .map(|p| match table.rows().read_with_seqlock(p.row()).unwrap().unwrap()[1] {
                Value::I32(a) => a,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ages, vec![10, 20, 30]);
    }

    #[test]
    fn limit_truncates() {
        let table = ages_table(&[1, 2, 3, 4, 5]);
        let selection = Selection::from_scan_indices(table.rows(), &table.rows().scan_all());
        let sorted = sort_selection(&table, &selection, &[OrderKey { column: 1, ascending: true }]).unwrap();
        let limited = apply_limit(sorted, 2);
        assert_eq!(limited.len(), 2);
    }
}
