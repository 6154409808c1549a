//! Table orchestration (C3 primary-key index + C4 secondary indices),
//! layered on top of the raw row storage in `row_table.rs`.
//!
//! Grounded on the teacher's `locking_tx_datastore/table.rs`: a `Table`
//! owns one row store plus the indices declared over it, and every
//! mutating op re-derives the old indexed values before writing so
//! indices can drop exactly the stale entry (indices never snapshot a
//! value themselves, per 3 Lifecycles).

use crate::error::EngineError;
use crate::index::{CompositeHashIndex, CompositeKey, CompositeRangeIndex, HashIndex, IndexKey, RangeIndex, StringTrieIndex};
use crate::pref::Pref;
use crate::row_table::RowTable;
use crate::schema::{IndexKind, ResolvedSchema};
use crate::types::Value;
use parking_lot::RwLock;
use tracing::instrument;

enum SingleIndex {
    Hash(HashIndex),
    Range(RangeIndex),
    Prefix(StringTrieIndex),
    Suffix(StringTrieIndex),
}

enum CompositeIndex {
    Hash(CompositeHashIndex),
    Range(CompositeRangeIndex),
}

struct Indices {
    primary: HashIndex,
    by_column: Vec<(usize, SingleIndex)>,
    composite: Vec<(Vec<usize>, CompositeIndex)>,
}

pub struct Table {
    pub schema: ResolvedSchema,
    rows: RowTable,
    indices: RwLock<Indices>,
    enable_prefix_index: bool,
    enable_suffix_index: bool,
}

impl Table {
    pub fn new(schema: ResolvedSchema, initial_capacity: usize, enable_prefix_index: bool, enable_suffix_index: bool) -> Self {
        let type_codes = schema.fields.iter().map(|f| f.type_code).collect();
        let mut by_column = Vec::new();
        for &(col, kind) in &schema.field_indices {
            let index = match kind {
                IndexKind::Hash => SingleIndex::Hash(HashIndex::new()),
                IndexKind::Range => SingleIndex::Range(RangeIndex::new()),
                IndexKind::Prefix if enable_prefix_index => SingleIndex::Prefix(StringTrieIndex::new_prefix()),
                IndexKind::Suffix if enable_suffix_index => SingleIndex::Suffix(StringTrieIndex::new_suffix()),
                IndexKind::Prefix | IndexKind::Suffix => continue,
            };
            by_column.push((col, index));
        }
        let composite = schema
            .composite_indices
            .iter()
            .map(|(cols, kind)| {
                let index = match kind {
                    IndexKind::Hash => CompositeIndex::Hash(CompositeHashIndex::new()),
                    IndexKind::Range => CompositeIndex::Range(CompositeRangeIndex::new()),
                    IndexKind::Prefix | IndexKind::Suffix => unreachable!("rejected at registration"),
                };
                (cols.clone(), index)
            })
            .collect();
        Table {
            rows: RowTable::new(type_codes, initial_capacity),
            indices: RwLock::new(Indices { primary: HashIndex::new(), by_column, composite }),
            schema,
            enable_prefix_index,
            enable_suffix_index,
        }
    }

    pub fn rows(&self) -> &RowTable {
        &self.rows
    }

    fn composite_key(values: &[Value], cols: &[usize], type_codes: &[crate::types::TypeCode]) -> Option<CompositeKey> {
        let mut key = CompositeKey::new();
        for &c in cols {
            key.push(IndexKey::from_value(&values[c], type_codes[c])?);
        }
        Some(key)
    }

    fn index_row(&self, indices: &mut Indices, values: &[Value], pref: Pref) {
        let type_codes: Vec<_> = self.schema.fields.iter().map(|f| f.type_code).collect();
        if let Some(key) = IndexKey::from_value(&values[self.schema.identifier_field], type_codes[self.schema.identifier_field]) {
            indices.primary.insert(key, pref);
        }
        for (col, index) in &mut indices.by_column {
            let value = &values[*col];
            match index {
                SingleIndex::Hash(h) => {
                    if let Some(k) = IndexKey::from_value(value, type_codes[*col]) {
                        h.insert(k, pref);
                    }
                }
                SingleIndex::Range(r) => {
                    if let Some(k) = IndexKey::from_value(value, type_codes[*col]) {
                        r.insert(k, pref);
                    }
                }
                SingleIndex::Prefix(t) | SingleIndex::Suffix(t) => {
                    if let Value::String(s) = value {
                        t.insert(s, pref);
                    }
                }
            }
        }
        for (cols, index) in &mut indices.composite {
            let Some(key) = Self::composite_key(values, cols, &type_codes) else { continue };
            match index {
                CompositeIndex::Hash(h) => h.insert(key, pref),
                CompositeIndex::Range(r) => r.insert(key, pref),
            }
        }
    }

    fn deindex_row(&self, indices: &mut Indices, values: &[Value], pref: Pref) {
        let type_codes: Vec<_> = self.schema.fields.iter().map(|f| f.type_code).collect();
        if let Some(key) = IndexKey::from_value(&values[self.schema.identifier_field], type_codes[self.schema.identifier_field]) {
            indices.primary.remove(&key, pref);
        }
        for (col, index) in &mut indices.by_column {
            let value = &values[*col];
            match index {
                SingleIndex::Hash(h) => {
                    if let Some(k) = IndexKey::from_value(value, type_codes[*col]) {
                        h.remove(&k, pref);
                    }
                }
                SingleIndex::Range(r) => {
                    if let Some(k) = IndexKey::from_value(value, type_codes[*col]) {
                        r.remove(&k, pref);
                    }
                }
                SingleIndex::Prefix(t) | SingleIndex::Suffix(t) => {
                    if let Value::String(s) = value {
                        t.remove(s, pref);
                    }
                }
            }
        }
        for (cols, index) in &mut indices.composite {
            let Some(key) = Self::composite_key(values, cols, &type_codes) else { continue };
            match index {
                CompositeIndex::Hash(h) => h.remove(&key, pref),
                CompositeIndex::Range(r) => r.remove(&key, pref),
            }
        }
    }

    #[instrument(level = "trace", skip(self, values))]
    pub fn insert(&self, values: Vec<Value>) -> Result<Pref, EngineError> {
        let pref = self.rows.insert(&values)?;
        self.index_row(&mut self.indices.write(), &values, pref);
        Ok(pref)
    }

    /// Updates the named columns, re-indexing only the columns that
    /// actually changed and only after reading their pre-mutation value
    /// (3, Lifecycles: indices never snapshot the old value themselves).
    #[instrument(level = "trace", skip(self, changes))]
    pub fn update(&self, pref: Pref, changes: Vec<(usize, Value)>) -> Result<Pref, EngineError> {
        let old_values = self
            .rows
            .read_with_seqlock(pref.row())?
            .ok_or(crate::error::TableError::NotLive(pref))?;
        let new_pref = self.rows.update(pref, &changes)?;
        let mut indices = self.indices.write();
        let changed_cols: Vec<usize> = changes.iter().map(|(c, _)| *c).collect();
        self.deindex_affected(&mut indices, &old_values, pref, &changed_cols);
        let new_values = self.rows.read_with_seqlock(new_pref.row())?.expect("just written");
        self.index_affected(&mut indices, &new_values, new_pref, &changed_cols);
        Ok(new_pref)
    }

    fn deindex_affected(&self, indices: &mut Indices, old_values: &[Value], pref: Pref, changed_cols: &[usize]) {
        let type_codes: Vec<_> = self.schema.fields.iter().map(|f| f.type_code).collect();
        if changed_cols.contains(&self.schema.identifier_field) {
            if let Some(key) = IndexKey::from_value(&old_values[self.schema.identifier_field], type_codes[self.schema.identifier_field]) {
                indices.primary.remove(&key, pref);
            }
        }
        for (col, index) in &mut indices.by_column {
            if !changed_cols.contains(col) {
                continue;
            }
            let value = &old_values[*col];
            match index {
                SingleIndex::Hash(h) => {
                    if let Some(k) = IndexKey::from_value(value, type_codes[*col]) {
                        h.remove(&k, pref);
                    }
                }
                SingleIndex::Range(r) => {
                    if let Some(k) = IndexKey::from_value(value, type_codes[*col]) {
                        r.remove(&k, pref);
                    }
                }
                SingleIndex::Prefix(t) | SingleIndex::Suffix(t) => {
                    if let Value::String(s) = value {
                        t.remove(s, pref);
                    }
                }
            }
        }
        for (cols, index) in &mut indices.composite {
            if !cols.iter().any(|c| changed_cols.contains(c)) {
                continue;
            }
            let Some(key) = Self::composite_key(old_values, cols, &type_codes) else { continue };
            match index {
                CompositeIndex::Hash(h) => h.remove(&key, pref),
                CompositeIndex::Range(r) => r.remove(&key, pref),
            }
        }
    }

    fn index_affected(&self, indices: &mut Indices, new_values: &[Value], pref: Pref, changed_cols: &[usize]) {
        let type_codes: Vec<_> = self.schema.fields.iter().map(|f| f.type_code).collect();
        if changed_cols.contains(&self.schema.identifier_field) {
            if let Some(key) = IndexKey::from_value(&new_values[self.schema.identifier_field], type_codes[self.schema.identifier_field]) {
                indices.primary.insert(key, pref);
            }
        }
        for (col, index) in &mut indices.by_column {
            if !changed_cols.contains(col) {
                continue;
            }
            let value = &new_values[*col];
            match index {
                SingleIndex::Hash(h) => {
                    if let Some(k) = IndexKey::from_value(value, type_codes[*col]) {
                        h.insert(k, pref);
                    }
                }
                SingleIndex::Range(r) => {
                    if let Some(k) = IndexKey::from_value(value, type_codes[*col]) {
                        r.insert(k, pref);
                    }
                }
                SingleIndex::Prefix(t) | SingleIndex::Suffix(t) => {
                    if let Value::String(s) = value {
                        t.insert(s, pref);
                    }
                }
            }
        }
        for (cols, index) in &mut indices.composite {
            if !cols.iter().any(|c| changed_cols.contains(c)) {
                continue;
            }
            let Some(key) = Self::composite_key(new_values, cols, &type_codes) else { continue };
            match index {
                CompositeIndex::Hash(h) => h.insert(key, pref),
                CompositeIndex::Range(r) => r.insert(key, pref),
            }
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn tombstone(&self, pref: Pref) -> Result<(), EngineError> {
        let values = self
            .rows
            .read_with_seqlock(pref.row())?
            .ok_or(crate::error::TableError::NotLive(pref))?;
        self.rows.tombstone(pref)?;
        self.deindex_row(&mut self.indices.write(), &values, pref);
        Ok(())
    }

    pub fn find_by_id(&self, id: &Value) -> Option<Pref> {
        let type_code = self.schema.fields[self.schema.identifier_field].type_code;
        let key = IndexKey::from_value(id, type_code)?;
        let indices = self.indices.read();
        indices.primary.lookup(&key).iter().copied().find(|&p| self.rows.is_live(p))
    }

    pub fn with_hash_index<R>(&self, col: usize, f: impl FnOnce(Option<&HashIndex>) -> R) -> R {
        let indices = self.indices.read();
        let found = indices.by_column.iter().find_map(|(c, i)| if *c == col { if let SingleIndex::Hash(h) = i { Some(h) } else { None } } else { None });
        f(found)
    }

    pub fn with_range_index<R>(&self, col: usize, f: impl FnOnce(Option<&RangeIndex>) -> R) -> R {
        let indices = self.indices.read();
        let found = indices.by_column.iter().find_map(|(c, i)| if *c == col { if let SingleIndex::Range(r) = i { Some(r) } else { None } } else { None });
        f(found)
    }

    pub fn with_prefix_index<R>(&self, col: usize, f: impl FnOnce(Option<&StringTrieIndex>) -> R) -> R {
        let indices = self.indices.read();
        let found = indices.by_column.iter().find_map(|(c, i)| if *c == col { if let SingleIndex::Prefix(t) = i { Some(t) } else { None } } else { None });
        f(found)
    }

    pub fn with_suffix_index<R>(&self, col: usize, f: impl FnOnce(Option<&StringTrieIndex>) -> R) -> R {
        let indices = self.indices.read();
        let found = indices.by_column.iter().find_map(|(c, i)| if *c == col { if let SingleIndex::Suffix(t) = i { Some(t) } else { None } } else { None });
        f(found)
    }

    pub fn with_composite_hash_index<R>(&self, cols: &[usize], f: impl FnOnce(Option<&CompositeHashIndex>) -> R) -> R {
        let indices = self.indices.read();
        let found = indices.composite.iter().find_map(|(c, i)| if c == cols { if let CompositeIndex::Hash(h) = i { Some(h) } else { None } } else { None });
        f(found)
    }

    pub fn with_composite_range_index<R>(&self, cols: &[usize], f: impl FnOnce(Option<&CompositeRangeIndex>) -> R) -> R {
        let indices = self.indices.read();
        let found = indices.composite.iter().find_map(|(c, i)| if c == cols { if let CompositeIndex::Range(r) = i { Some(r) } else { None } } else { None });
        f(found)
    }

    pub fn prefix_index_enabled(&self) -> bool {
        self.enable_prefix_index
    }

    pub fn suffix_index_enabled(&self) -> bool {
        self.enable_suffix_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityDecl, FieldDef};
    use crate::types::TypeCode;

    fn person_table() -> Table {
        let decl = EntityDecl::new(
            "Person",
            vec![
                FieldDef::identifier("id", TypeCode::I64),
                FieldDef::new("name", TypeCode::String, false),
                FieldDef::new("age", TypeCode::I32, true),
            ],
        )
        .with_index("name", IndexKind::Hash)
        .with_index("age", IndexKind::Range);
        let resolved = crate::schema::validate(&decl, false).unwrap();
        Table::new(resolved, 4, true, true)
    }

    #[test]
    fn insert_populates_primary_and_secondary_indices() {
        let t = person_table();
        let pref = t.insert(vec![Value::I64(1), Value::String("alice".into()), Value::I32(30)]).unwrap();
        assert_eq!(t.find_by_id(&Value::I64(1)), Some(pref));
        let hits = t.with_hash_index(1, |idx| idx.unwrap().lookup(&IndexKey::Str("alice".into())).to_vec());
        assert_eq!(hits, vec![pref]);
    }

    #[test]
    fn update_moves_secondary_index_entry() {
        let t = person_table();
        let pref = t.insert(vec![Value::I64(1), Value::String("alice".into()), Value::I32(30)]).unwrap();
        let pref2 = t.update(pref, vec![(1, Value::String("bob".into()))]).unwrap();
        let alice_hits = t.with_hash_index(1, |idx| idx.unwrap().lookup(&IndexKey::Str("alice".into())).to_vec());
        assert!(alice_hits.is_empty());
        let bob_hits = t.with_hash_index(1, |idx| idx.unwrap().lookup(&IndexKey::Str("bob".into())).to_vec());
        assert_eq!(bob_hits, vec![pref2]);
    }

    /// A partial update that never touches the identifier column must leave
    /// the primary index's `Pref` resolvable: the row's generation does not
    /// move on an ordinary update, only on tombstone-reclaim (3).
    #[test]
    fn find_by_id_survives_partial_update() {
        let t = person_table();
        let pref = t.insert(vec![Value::I64(1), Value::String("alice".into()), Value::I32(30)]).unwrap();
        let pref2 = t.update(pref, vec![(2, Value::I32(31))]).unwrap();
        assert_eq!(pref2.generation(), pref.generation());
        assert_eq!(t.find_by_id(&Value::I64(1)), Some(pref2));
    }

    #[test]
    fn tombstone_removes_all_index_entries() {
        let t = person_table();
        let pref = t.insert(vec![Value::I64(1), Value::String("alice".into()), Value::I32(30)]).unwrap();
        t.tombstone(pref).unwrap();
        assert_eq!(t.find_by_id(&Value::I64(1)), None);
        let hits = t.with_hash_index(1, |idx| idx.unwrap().lookup(&IndexKey::Str("alice".into())).to_vec());
        assert!(hits.is_empty());
    }
}
