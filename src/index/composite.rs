//! Composite (multi-column) hash and range indices (C7's target
//! structures). Keys are tuples of normalized per-column `IndexKey`s.

use super::IndexKey;
use crate::pref::Pref;
use rustc_hash::FxHashMap as HashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A composite key: one `IndexKey` per plan column, small-vec inlined since
/// composite indices rarely cover more than a handful of columns.
pub type CompositeKey = SmallVec<[IndexKey; 4]>;

#[derive(Debug, Default)]
pub struct CompositeHashIndex {
    map: HashMap<CompositeKey, Vec<Pref>>,
}

impl CompositeHashIndex {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn insert(&mut self, key: CompositeKey, pref: Pref) {
        self.map.entry(key).or_default().push(pref);
    }

    pub fn remove(&mut self, key: &CompositeKey, pref: Pref) {
        if let Some(bucket) = self.map.get_mut(key) {
            bucket.retain(|&p| p != pref);
            if bucket.is_empty() {
                self.map.remove(key);
            }
        }
    }

    pub fn lookup(&self, key: &CompositeKey) -> &[Pref] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A bound used when constructing a composite-range probe key (4.5): plan
/// columns beyond the equality-prefix + range column are padded with
/// `-inf`/`+inf` sentinels rather than a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RangeBound {
    MinusInf,
    Key(IndexKey),
    PlusInf,
}

#[derive(Debug, Default)]
pub struct CompositeRangeIndex {
    map: BTreeMap<CompositeKey, Vec<Pref>>,
}

impl CompositeRangeIndex {
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }

    pub fn insert(&mut self, key: CompositeKey, pref: Pref) {
        self.map.entry(key).or_default().push(pref);
    }

    pub fn remove(&mut self, key: &CompositeKey, pref: Pref) {
        if let Some(bucket) = self.map.get_mut(key) {
            bucket.retain(|&p| p != pref);
            if bucket.is_empty() {
                self.map.remove(key);
            }
        }
    }

    /// Queries the inclusive range `[lower, upper]` where each tuple
    /// element is a `RangeBound`; `MinusInf`/`PlusInf` act as open bounds
    /// on that position by construction of the composite key (the planner
    /// never mixes a `MinusInf`/`PlusInf` column with tighter bounds below
    /// it — see 4.5's padding rule), so the whole probe can be expressed as
    /// a single plain `BTreeMap` range scan over `CompositeKey` once the
    /// sentinels are materialized to concrete `IndexKey::min_sentinel` /
    /// `max_sentinel` values.
    pub fn between(&self, lower: CompositeKey, upper: CompositeKey) -> Vec<Pref> {
        self.range(Bound::Included(lower), Bound::Included(upper))
    }

    pub fn gt(&self, lower: CompositeKey) -> Vec<Pref> {
        self.range(Bound::Excluded(lower), Bound::Unbounded)
    }

    pub fn gte(&self, lower: CompositeKey) -> Vec<Pref> {
        self.range(Bound::Included(lower), Bound::Unbounded)
    }

    pub fn lt(&self, upper: CompositeKey) -> Vec<Pref> {
        self.range(Bound::Unbounded, Bound::Excluded(upper))
    }

    pub fn lte(&self, upper: CompositeKey) -> Vec<Pref> {
        self.range(Bound::Unbounded, Bound::Included(upper))
    }

    fn range(&self, lo: Bound<CompositeKey>, hi: Bound<CompositeKey>) -> Vec<Pref> {
        let mut out = Vec::new();
        for (_, bucket) in self.map.range((lo, hi)) {
            out.extend_from_slice(bucket);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn composite_hash_exact_match() {
        let mut idx = CompositeHashIndex::new();
        let key: CompositeKey = smallvec![IndexKey::Str("d3".into()), IndexKey::Int(42)];
        idx.insert(key.clone(), Pref::pack(5, 1));
        assert_eq!(idx.lookup(&key).len(), 1);
        let other: CompositeKey = smallvec![IndexKey::Str("d3".into()), IndexKey::Int(43)];
        assert!(idx.lookup(&other).is_empty());
    }

    #[test]
    fn composite_range_prefix_then_trailing_between() {
        let mut idx = CompositeRangeIndex::new();
        for age in 0..10 {
            let key: CompositeKey = smallvec![IndexKey::Str("d1".into()), IndexKey::Int(age)];
            idx.insert(key, Pref::pack(age as u32, 1));
        }
        let lower: CompositeKey = smallvec![IndexKey::Str("d1".into()), IndexKey::Int(3)];
        let upper: CompositeKey = smallvec![IndexKey::Str("d1".into()), IndexKey::Int(6)];
        let mut rows: Vec<u32> = idx.between(lower, upper).iter().map(|p| p.row()).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![3, 4, 5, 6]);
    }
}
