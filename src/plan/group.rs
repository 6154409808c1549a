//! AND/OR group orchestrator (C8): partitions the condition vector into
//! contiguous AND-groups terminated by `OR`, evaluates each with a
//! composite-index probe over whatever the probe didn't consume, then
//! unions the groups (4.6).

use super::{condition, composite_plan, Combinator, Condition, QueryArg};
use crate::error::EngineError;
use crate::selection::Selection;
use crate::table::Table;

fn split_groups(conditions: &[Condition]) -> Vec<&[Condition]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (i, cond) in conditions.iter().enumerate() {
        if cond.next_combinator == Combinator::Or {
            groups.push(&conditions[start..=i]);
            start = i + 1;
        }
    }
    if start < conditions.len() {
        groups.push(&conditions[start..]);
    }
    groups
}

fn evaluate_group(table: &Table, group: &[Condition], args: &[QueryArg]) -> Result<Selection, EngineError> {
    let composite_hit = composite_plan::probe(table, group, args)?;
    let (mut running, consumed): (Option<Selection>, Vec<bool>) = match composite_hit {
        Some((selection, consumed)) => (Some(selection), consumed),
        None => (None, vec![false; group.len()]),
    };
    for (cond, &was_consumed) in group.iter().zip(&consumed) {
        if was_consumed {
            continue;
        }
        let cond_selection = condition::execute(table, cond, args)?;
        running = Some(match running {
            Some(existing) => Selection::intersect(&existing, &cond_selection),
            None => cond_selection,
        });
    }
    Ok(running.unwrap_or_else(Selection::empty))
}

pub fn evaluate_groups(table: &Table, conditions: &[Condition], args: &[QueryArg]) -> Result<Selection, EngineError> {
    let groups = split_groups(conditions);
    let mut result = Selection::empty();
    for group in groups {
        let group_selection = evaluate_group(table, group, args)?;
        result = Selection::union(&result, &group_selection);
    }
    Ok(result)
}
