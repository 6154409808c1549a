//! Single-column hash (point equality) index.
//!
//! Grounded on the teacher's `BTreeIndex` (`locking_tx_datastore/btree_index.rs`):
//! same insert/delete/seek shape, but keyed by a plain hash map since the
//! point-equality index has no need for ordered iteration.

use super::IndexKey;
use crate::pref::Pref;
use rustc_hash::FxHashMap as HashMap;

#[derive(Debug, Default)]
pub struct HashIndex {
    map: HashMap<IndexKey, Vec<Pref>>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn insert(&mut self, key: IndexKey, pref: Pref) {
        self.map.entry(key).or_default().push(pref);
    }

    /// Removes the exact `(key, pref)` pair. Indices never snapshot the old
    /// value themselves — the caller must supply the pre-mutation key (4,
    /// Lifecycles).
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

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup() {
        let mut idx = HashIndex::new();
        idx.insert(IndexKey::Int(42), Pref::pack(0, 1));
        idx.insert(IndexKey::Int(42), Pref::pack(1, 1));
        assert_eq!(idx.lookup(&IndexKey::Int(42)).len(), 2);
        assert!(idx.lookup(&IndexKey::Int(7)).is_empty());
    }

    #[test]
    fn remove_drops_exact_match_only() {
        let mut idx = HashIndex::new();
        let a = Pref::pack(0, 1);
        let b = Pref::pack(1, 1);
        idx.insert(IndexKey::Int(1), a);
        idx.insert(IndexKey::Int(1), b);
        idx.remove(&IndexKey::Int(1), a);
        assert_eq!(idx.lookup(&IndexKey::Int(1)), &[b]);
    }
}
