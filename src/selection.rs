//! Selection algebra (C5): an immutable, ascending vector of packed refs
//! with merge-style set operations.

use crate::pref::Pref;
use crate::row_table::RowTable;
use itertools::{EitherOrBoth, Itertools};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    refs: Vec<Pref>,
}

impl Selection {
    pub fn empty() -> Self {
        Selection { refs: Vec::new() }
    }

    /// Builds a selection directly from an already-ascending vector of
    /// prefs. Debug-asserts the ascending invariant; callers outside this
    /// module should prefer `from_scan_indices`/`union`/etc.
    pub fn from_sorted(refs: Vec<Pref>) -> Self {
        debug_assert!(refs.windows(2).all(|w| w[0] < w[1]), "selection must be strictly ascending");
        Selection { refs }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn as_slice(&self) -> &[Pref] {
        &self.refs
    }

    pub fn to_ref_vec(&self) -> Vec<Pref> {
        self.refs.clone()
    }

    pub fn to_int_array(&self) -> Vec<u32> {
        self.refs.iter().map(|p| p.row()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Pref> + '_ {
        self.refs.iter().copied()
    }

    pub fn contains(&self, p: Pref) -> bool {
        self.refs.binary_search(&p).is_ok()
    }

    /// Packs each row index in `rows` (assumed ascending, as produced by a
    /// column scan) with its current generation, skipping tombstoned rows.
    pub fn from_scan_indices(table: &RowTable, rows: &[u32]) -> Self {
        let mut refs = Vec::with_capacity(rows.len());
        for &row in rows {
            if !table.is_tombstoned(row) {
                refs.push(Pref::pack(row, table.row_generation(row)));
            }
        }
        Selection { refs }
    }

    /// Drops entries whose `(row, gen)` no longer matches the table; used
    /// after index lookups since index-produced prefs may be stale (5,
    /// Open Questions: every index-produced pref must pass `is_live`).
    pub fn filter_live(table: &RowTable, refs: impl IntoIterator<Item = Pref>) -> Self {
        let mut out: Vec<Pref> = refs.into_iter().filter(|&p| table.is_live(p)).collect();
        out.sort_unstable();
        out.dedup();
        Selection { refs: out }
    }

    pub fn union(a: &Selection, b: &Selection) -> Selection {
        Selection { refs: merge(&a.refs, &b.refs, MergeOp::Union) }
    }

    pub fn intersect(a: &Selection, b: &Selection) -> Selection {
        Selection { refs: merge(&a.refs, &b.refs, MergeOp::Intersect) }
    }

    pub fn subtract(a: &Selection, b: &Selection) -> Selection {
        Selection { refs: merge(&a.refs, &b.refs, MergeOp::Subtract) }
    }
}

enum MergeOp {
    Union,
    Intersect,
    Subtract,
}

/// O(|a| + |b|) merge-style set algebra over two ascending `Pref` slices,
/// via `itertools`'s sorted merge-join rather than a hand-rolled two-index
/// walk.
fn merge(a: &[Pref], b: &[Pref], op: MergeOp) -> Vec<Pref> {
    a.iter()
        .copied()
        .merge_join_by(b.iter().copied(), Pref::cmp)
        .filter_map(|joined| match (op, joined) {
            (MergeOp::Union, EitherOrBoth::Both(p, _)) => Some(p),
            (MergeOp::Union, EitherOrBoth::Left(p)) => Some(p),
            (MergeOp::Union, EitherOrBoth::Right(p)) => Some(p),
            (MergeOp::Intersect, EitherOrBoth::Both(p, _)) => Some(p),
            (MergeOp::Intersect, _) => None,
            (MergeOp::Subtract, EitherOrBoth::Left(p)) => Some(p),
            (MergeOp::Subtract, _) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(rows: &[u32]) -> Selection {
        Selection::from_sorted(rows.iter().map(|&r| Pref::pack(r, 0)).collect())
    }

    #[test]
    fn union_is_commutative_and_associative() {
        let a = sel(&[1, 3, 5]);
        let b = sel(&[2, 3, 7]);
        let c = sel(&[0, 9]);
        assert_eq!(Selection::union(&a, &b), Selection::union(&b, &a));
        assert_eq!(
            Selection::union(&Selection::union(&a, &b), &c),
            Selection::union(&a, &Selection::union(&b, &c))
        );
    }

    #[test]
    fn intersect_is_commutative() {
        let a = sel(&[1, 3, 5, 7]);
        let b = sel(&[3, 5, 9]);
        assert_eq!(Selection::intersect(&a, &b), Selection::intersect(&b, &a));
        assert_eq!(Selection::intersect(&a, &b).to_int_array(), vec![3, 5]);
    }

    #[test]
    fn subtract_self_is_empty() {
        let a = sel(&[1, 2, 3]);
        assert!(Selection::subtract(&a, &a).is_empty());
    }

    #[test]
    fn union_with_empty_is_identity() {
        let a = sel(&[1, 2, 3]);
        let empty = Selection::empty();
        assert_eq!(Selection::union(&a, &empty), a);
    }

    #[test]
    fn contains_matches_membership() {
        let a = sel(&[2, 4, 6]);
        assert!(a.contains(Pref::pack(4, 0)));
        assert!(!a.contains(Pref::pack(5, 0)));
    }
}
