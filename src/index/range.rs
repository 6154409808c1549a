//! Single-column sorted range index, serving `GT/GTE/LT/LTE/BETWEEN`.
//!
//! Grounded on the teacher's `BTreeIndex::seek`
//! (`locking_tx_datastore/btree_index.rs`), which ranges over a
//! `BTreeSet<IndexKey>` using `std::ops::Bound`; here the index is a
//! `BTreeMap` keyed on the normalized `IndexKey` so multiple rows can share
//! a key (a multi-set) without a synthetic per-row tiebreaker in the key.

use super::IndexKey;
use crate::pref::Pref;
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Default)]
pub struct RangeIndex {
    map: BTreeMap<IndexKey, Vec<Pref>>,
}

impl RangeIndex {
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }

    pub fn insert(&mut self, key: IndexKey, pref: Pref) {
        self.map.entry(key).or_default().push(pref);
    }

    pub fn remove(&mut self, key: &IndexKey, pref: Pref) {
        if let Some(bucket) = self.map.get_mut(key) {
            bucket.retain(|&p| p != pref);
            if bucket.is_empty() {
                self.map.remove(key);
            }
        }
    }

    pub fn lookup(&self, key: &IndexKey) -> &[Pref] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns every `Pref` whose key falls in `(lo_bound, hi_bound)`, in
    /// ascending key order (not ascending pref order — callers merge-sort
    /// via the selection algebra afterwards).
    pub fn range(&self, lo: Bound<IndexKey>, hi: Bound<IndexKey>) -> Vec<Pref> {
        let mut out = Vec::new();
        for (_, bucket) in self.map.range((lo, hi)) {
            out.extend_from_slice(bucket);
        }
        out
    }

    pub fn between(&self, lo: IndexKey, hi: IndexKey) -> Vec<Pref> {
        self.range(Bound::Included(lo), Bound::Included(hi))
    }

    pub fn gt(&self, v: IndexKey) -> Vec<Pref> {
        self.range(Bound::Excluded(v), Bound::Unbounded)
    }

    pub fn gte(&self, v: IndexKey) -> Vec<Pref> {
        self.range(Bound::Included(v), Bound::Unbounded)
    }

    pub fn lt(&self, v: IndexKey) -> Vec<Pref> {
        self.range(Bound::Unbounded, Bound::Excluded(v))
    }

    pub fn lte(&self, v: IndexKey) -> Vec<Pref> {
        self.range(Bound::Unbounded, Bound::Included(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx() -> RangeIndex {
        let mut r = RangeIndex::new();
        for i in 0..10 {
            r.insert(IndexKey::Int(i), Pref::pack(i as u32, 1));
        }
        r
    }

    #[test]
    fn between_is_inclusive_both_sides() {
        let r = idx();
        let mut got: Vec<u32> = r.between(IndexKey::Int(3), IndexKey::Int(5)).iter().map(|p| p.row()).collect();
        got.sort_unstable();
        assert_eq!(got, vec![3, 4, 5]);
    }

    #[test]
    fn gt_excludes_pivot() {
        let r = idx();
        let mut got: Vec<u32> = r.gt(IndexKey::Int(7)).iter().map(|p| p.row()).collect();
        got.sort_unstable();
        assert_eq!(got, vec![8, 9]);
    }

    #[test]
    fn gte_includes_pivot() {
        let r = idx();
        let mut got: Vec<u32> = r.gte(IndexKey::Int(8)).iter().map(|p| p.row()).collect();
        got.sort_unstable();
        assert_eq!(got, vec![8, 9]);
    }
}
