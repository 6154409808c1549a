//! Composite index planner (C7): recognizes AND-groups serviceable by a
//! multi-column hash or range index and turns them into one index probe
//! plus a consumed-positions bitmap, per 4.5.

use super::{arg_at, Condition, Operator, QueryArg};
use crate::error::EngineError;
use crate::index::{CompositeKey, IndexKey, RangeBound};
use crate::pref::Pref;
use crate::row_table::RowTable;
use crate::schema::IndexKind;
use crate::selection::Selection;
use crate::table::Table;

fn resolve_scalar<'a>(args: &'a [QueryArg], cond: &Condition) -> Option<&'a crate::types::Value> {
    arg_at(args, cond.arg_index).ok()?.scalar()
}

/// First case-sensitive condition touching `column`, preferring an
/// operator the composite planner can use (`Eq` for the prefix scan,
/// anything range-eligible for the trailing column).
fn find_condition<'a>(group: &'a [Condition], column: usize, eligible: impl Fn(Operator) -> bool) -> Option<(usize, &'a Condition)> {
    group.iter().enumerate().find(|(_, c)| c.column == column && !c.ignore_case && eligible(c.operator))
}

fn from_prefs(rows: &RowTable, prefs: &[Pref]) -> Selection {
    Selection::filter_live(rows, prefs.iter().copied())
}

fn resolve_bound(bound: &RangeBound, type_code: crate::types::TypeCode) -> IndexKey {
    match bound {
        RangeBound::MinusInf => IndexKey::min_sentinel(type_code),
        RangeBound::PlusInf => IndexKey::max_sentinel(type_code),
        RangeBound::Key(k) => k.clone(),
    }
}

fn bounds_to_key(bounds: &[RangeBound], cols: &[usize], table: &Table) -> CompositeKey {
    let mut key = CompositeKey::new();
    for (bound, &col) in bounds.iter().zip(cols) {
        key.push(resolve_bound(bound, table.schema.fields[col].type_code));
    }
    key
}

/// Attempts every composite index registered on `table` against one
/// AND-group, in declaration order, returning the first hit. `consumed`
/// is sized to `group.len()`.
pub fn probe(table: &Table, group: &[Condition], args: &[QueryArg]) -> Result<Option<(Selection, Vec<bool>)>, EngineError> {
    for (cols, kind) in &table.schema.composite_indices {
        match kind {
            IndexKind::Hash => {
                if let Some(hit) = try_hash(table, cols, group, args)? {
                    return Ok(Some(hit));
                }
            }
            IndexKind::Range => {
                if let Some(hit) = try_range(table, cols, group, args)? {
                    return Ok(Some(hit));
                }
            }
            IndexKind::Prefix | IndexKind::Suffix => unreachable!("rejected at registration"),
        }
    }
    Ok(None)
}

fn try_hash(table: &Table, cols: &[usize], group: &[Condition], args: &[QueryArg]) -> Result<Option<(Selection, Vec<bool>)>, EngineError> {
    let mut consumed = vec![false; group.len()];
    let mut key = CompositeKey::new();
    for &col in cols {
        let Some((group_idx, cond)) = find_condition(group, col, |op| op == Operator::Eq) else {
            return Ok(None);
        };
        let Some(value) = resolve_scalar(args, cond) else { return Ok(None) };
        let Some(index_key) = IndexKey::from_value(value, table.schema.fields[col].type_code) else {
            return Ok(None);
        };
        key.push(index_key);
        consumed[group_idx] = true;
    }
    let hit = table.with_composite_hash_index(cols, |idx| idx.map(|h| h.lookup(&key).to_vec()));
    match hit {
        Some(prefs) => Ok(Some((from_prefs(table.rows(), &prefs), consumed))),
        None => Ok(None),
    }
}

fn try_range(table: &Table, cols: &[usize], group: &[Condition], args: &[QueryArg]) -> Result<Option<(Selection, Vec<bool>)>, EngineError> {
    let mut consumed = vec![false; group.len()];
    let mut prefix_bounds: Vec<RangeBound> = Vec::new();
    let mut prefix_len = 0;
    for &col in cols {
        let Some((group_idx, cond)) = find_condition(group, col, |op| op == Operator::Eq) else { break };
        let Some(value) = resolve_scalar(args, cond) else { break };
        let Some(index_key) = IndexKey::from_value(value, table.schema.fields[col].type_code) else { break };
        prefix_bounds.push(RangeBound::Key(index_key));
        consumed[group_idx] = true;
        prefix_len += 1;
    }
    if prefix_len == 0 && cols.len() > 1 {
        // A pure range probe with no equality prefix degrades to a scan;
        // let the group orchestrator fall back to per-column executors.
        return Ok(None);
    }

    let mut lower = prefix_bounds.clone();
    let mut upper = prefix_bounds;
    let mut trailing_probe: Option<Operator> = None;

    if prefix_len < cols.len() {
        let col = cols[prefix_len];
        let eligible = |op: Operator| {
            matches!(op, Operator::Eq | Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte | Operator::Between)
        };
        if let Some((group_idx, cond)) = find_condition(group, col, eligible) {
            let type_code = table.schema.fields[col].type_code;
            match cond.operator {
                Operator::Eq => {
                    let Some(value) = resolve_scalar(args, cond) else { return Ok(None) };
                    let Some(k) = IndexKey::from_value(value, type_code) else { return Ok(None) };
                    lower.push(RangeBound::Key(k.clone()));
                    upper.push(RangeBound::Key(k));
                    consumed[group_idx] = true;
                    trailing_probe = Some(Operator::Between);
                }
                Operator::Between => {
                    let Some(lo) = arg_at(args, cond.arg_index)?.scalar() else { return Ok(None) };
                    let Some(hi) = arg_at(args, cond.arg_index + 1)?.scalar() else { return Ok(None) };
                    let (Some(lo_k), Some(hi_k)) = (IndexKey::from_value(lo, type_code), IndexKey::from_value(hi, type_code)) else {
                        return Ok(None);
                    };
                    lower.push(RangeBound::Key(lo_k));
                    upper.push(RangeBound::Key(hi_k));
                    consumed[group_idx] = true;
                    trailing_probe = Some(Operator::Between);
                }
                Operator::Gt => {
                    let Some(value) = resolve_scalar(args, cond) else { return Ok(None) };
                    let Some(k) = IndexKey::from_value(value, type_code) else { return Ok(None) };
                    lower.push(RangeBound::Key(k));
                    consumed[group_idx] = true;
                    trailing_probe = Some(Operator::Gt);
                }
                Operator::Gte => {
                    let Some(value) = resolve_scalar(args, cond) else { return Ok(None) };
                    let Some(k) = IndexKey::from_value(value, type_code) else { return Ok(None) };
                    lower.push(RangeBound::Key(k));
                    consumed[group_idx] = true;
                    trailing_probe = Some(Operator::Gte);
                }
                Operator::Lt => {
                    let Some(value) = resolve_scalar(args, cond) else { return Ok(None) };
                    let Some(k) = IndexKey::from_value(value, type_code) else { return Ok(None) };
                    upper.push(RangeBound::Key(k));
                    consumed[group_idx] = true;
                    trailing_probe = Some(Operator::Lt);
                }
                Operator::Lte => {
                    let Some(value) = resolve_scalar(args, cond) else { return Ok(None) };
                    let Some(k) = IndexKey::from_value(value, type_code) else { return Ok(None) };
                    upper.push(RangeBound::Key(k));
                    consumed[group_idx] = true;
                    trailing_probe = Some(Operator::Lte);
                }
                _ => unreachable!("filtered by `eligible`"),
            }
        }
    }

    // Pad remaining columns with open sentinels. The direction depends on
    // the trailing operator, not just which of lower/upper it touched: GT's
    // lower bound must pad with +inf (so the fixed prefix+v tuple itself is
    // excluded from the probe), while LT's upper bound must pad with -inf
    // (so that tuple is excluded there too); every other case pads toward
    // the open end (4.5's range-operator table).
    let lower_pad = if trailing_probe == Some(Operator::Gt) { RangeBound::PlusInf } else { RangeBound::MinusInf };
    let upper_pad = if trailing_probe == Some(Operator::Lt) { RangeBound::MinusInf } else { RangeBound::PlusInf };
    while lower.len() < cols.len() {
        lower.push(lower_pad.clone());
    }
    while upper.len() < cols.len() {
        upper.push(upper_pad.clone());
    }

    let lower_key = bounds_to_key(&lower, cols, table);
    let upper_key = bounds_to_key(&upper, cols, table);
    let probe_op = trailing_probe.unwrap_or(Operator::Between);
    let hit = table.with_composite_range_index(cols, |idx| {
        idx.map(|r| match probe_op {
            Operator::Gt => r.gt(lower_key.clone()),
            Operator::Gte => r.gte(lower_key.clone()),
            Operator::Lt => r.lt(upper_key.clone()),
            Operator::Lte => r.lte(upper_key.clone()),
            _ => r.between(lower_key.clone(), upper_key.clone()),
        })
    });
    match hit {
        Some(prefs) => Ok(Some((from_prefs(table.rows(), &prefs), consumed))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Combinator;
    use crate::schema::{EntityDecl, FieldDef, IndexKind as SchemaIndexKind};
    use crate::types::{TypeCode, Value};

    fn three_col_table() -> Table {
        let decl = EntityDecl::new(
            "Row",
            vec![
                FieldDef::identifier("id", TypeCode::I64),
                FieldDef::new("dept", TypeCode::String, false),
                FieldDef::new("age", TypeCode::I32, false),
                FieldDef::new("score", TypeCode::I32, false),
            ],
        )
        .with_composite_index(vec!["dept".into(), "age".into(), "score".into()], SchemaIndexKind::Range);
        let resolved = crate::schema::validate(&decl, false).unwrap();
        Table::new(resolved, 8, true, true)
    }

    /// A trailing `GT` on the middle plan column must exclude every row at
    /// the boundary value regardless of the third column, which means the
    /// lower bound's padding for unconsumed trailing columns has to be
    /// `+inf`, not `-inf` (4.5's range-operator table).
    #[test]
    fn trailing_gt_excludes_boundary_value_at_any_trailing_column() {
        let table = three_col_table();
        for score in 0..5 {
            table.insert(vec![Value::I64(score), Value::String("d1".into()), Value::I32(5), Value::I32(score as i32)]).unwrap();
        }
        table.insert(vec![Value::I64(100), Value::String("d1".into()), Value::I32(6), Value::I32(0)]).unwrap();

        let group = vec![
            Condition { column: 1, operator: Operator::Eq, arg_index: 0, ignore_case: false, next_combinator: Combinator::And },
            Condition { column: 2, operator: Operator::Gt, arg_index: 1, ignore_case: false, next_combinator: Combinator::And },
        ];
        let args = vec![QueryArg::Scalar(Value::String("d1".into())), QueryArg::Scalar(Value::I32(5))];
        let (selection, consumed) = probe(&table, &group, &args).unwrap().expect("composite range plan should hit");
        assert_eq!(consumed, vec![true, true]);
        assert_eq!(selection.len(), 1);
        let row = table.rows().read_with_seqlock(selection.iter().next().unwrap().row()).unwrap().unwrap();
        assert_eq!(row[2], Value::I32(6));
    }

    /// Symmetric case for trailing `LT`: the upper bound's padding for
    /// unconsumed trailing columns has to be `-inf`.
    #[test]
    fn trailing_lt_excludes_boundary_value_at_any_trailing_column() {
        let table = three_col_table();
        for score in 0..5 {
            table.insert(vec![Value::I64(score), Value::String("d1".into()), Value::I32(5), Value::I32(score as i32)]).unwrap();
        }
        table.insert(vec![Value::I64(200), Value::String("d1".into()), Value::I32(4), Value::I32(9)]).unwrap();

        let group = vec![
            Condition { column: 1, operator: Operator::Eq, arg_index: 0, ignore_case: false, next_combinator: Combinator::And },
            Condition { column: 2, operator: Operator::Lt, arg_index: 1, ignore_case: false, next_combinator: Combinator::And },
        ];
        let args = vec![QueryArg::Scalar(Value::String("d1".into())), QueryArg::Scalar(Value::I32(5))];
        let (selection, _) = probe(&table, &group, &args).unwrap().expect("composite range plan should hit");
        assert_eq!(selection.len(), 1);
        let row = table.rows().read_with_seqlock(selection.iter().next().unwrap().row()).unwrap().unwrap();
        assert_eq!(row[2], Value::I32(4));
    }
}
