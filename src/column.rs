//! Type-coded column buffers (C1).
//!
//! Storage cells are atomics so that a writer holding only a shared
//! (read-mode) lock on the owning table can mutate a single row's fields
//! while scans on other rows proceed lock-free; consistency *across*
//! fields of one row is the seqlock's job (`row_table.rs`), not this
//! module's. Strings live in an append-only byte arena addressed by
//! 32-bit `(offset, len)` pairs packed into one atomic word, per 4.1.

use crate::error::{EngineError, TableError};
use crate::types::{f32_to_sortable_i32, f64_to_sortable_i64, sortable_i32_to_f32, sortable_i64_to_f64, TypeCode, Value};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

const LOAD: Ordering = Ordering::Acquire;
const STORE: Ordering = Ordering::Release;

#[derive(Debug, Default)]
struct NullBitmap {
    words: Vec<AtomicU64>,
}

impl NullBitmap {
    fn resize(&mut self, capacity: usize) {
        let words_needed = capacity.div_ceil(64);
        while self.words.len() < words_needed {
            self.words.push(AtomicU64::new(0));
        }
    }

    /// `true` means the row holds a value; `false` means SQL-style NULL.
    fn is_present(&self, row: usize) -> bool {
        let (word, bit) = (row / 64, row % 64);
        self.words[word].load(LOAD) & (1 << bit) != 0
    }

    fn set_present(&self, row: usize, present: bool) {
        let (word, bit) = (row / 64, row % 64);
        if present {
            self.words[word].fetch_or(1 << bit, STORE);
        } else {
            self.words[word].fetch_and(!(1u64 << bit), STORE);
        }
    }
}

/// An append-only UTF-8 byte heap, addressed by 32-bit offset/len pairs.
/// Rewrites never reclaim the bytes of the overwritten value; the row's
/// slot simply starts pointing at a fresh append.
#[derive(Debug, Default)]
struct StringArena {
    heap: RwLock<Vec<u8>>,
    slots: Vec<AtomicU64>,
}

impl StringArena {
    fn resize(&mut self, capacity: usize) {
        while self.slots.len() < capacity {
            self.slots.push(AtomicU64::new(u64::MAX)); // sentinel: no value written yet
        }
    }

    fn set(&self, row: usize, value: &str) {
        let bytes = value.as_bytes();
        let offset = {
            let mut heap = self.heap.write();
            let offset = heap.len() as u32;
            heap.extend_from_slice(bytes);
            offset
        };
        let len = bytes.len() as u32;
        let word = ((offset as u64) << 32) | len as u64;
        self.slots[row].store(word, STORE);
    }

    fn get(&self, row: usize) -> String {
        let word = self.slots[row].load(LOAD);
        let offset = (word >> 32) as usize;
        let len = (word & 0xFFFF_FFFF) as usize;
        let heap = self.heap.read();
        String::from_utf8_lossy(&heap[offset..offset + len]).into_owned()
    }
}

#[derive(Debug)]
enum ColumnData {
    I8(Vec<AtomicI32>),
    I16(Vec<AtomicI32>),
    I32(Vec<AtomicI32>),
    I64(Vec<AtomicI64>),
    F32(Vec<AtomicI32>),    // sortable-encoded
    F64(Vec<AtomicI64>),    // sortable-encoded
    Bool(Vec<AtomicBool>),
    Char(Vec<AtomicU32>),
    String(StringArena),
    BigDecimal(StringArena),
    BigInteger(StringArena),
    Epoch(Vec<AtomicI64>),
}

/// Dense, row-indexed storage for one entity field.
#[derive(Debug)]
pub struct Column {
    type_code: TypeCode,
    data: ColumnData,
    nulls: NullBitmap,
    capacity: usize,
}

impl Column {
    pub fn new(type_code: TypeCode, initial_capacity: usize) -> Self {
        let mut col = Column {
            type_code,
            data: match type_code {
                TypeCode::I8 => ColumnData::I8(Vec::new()),
                TypeCode::I16 => ColumnData::I16(Vec::new()),
                TypeCode::I32 => ColumnData::I32(Vec::new()),
                TypeCode::I64 => ColumnData::I64(Vec::new()),
                TypeCode::F32 => ColumnData::F32(Vec::new()),
                TypeCode::F64 => ColumnData::F64(Vec::new()),
                TypeCode::Bool => ColumnData::Bool(Vec::new()),
                TypeCode::Char => ColumnData::Char(Vec::new()),
                TypeCode::String => ColumnData::String(StringArena::default()),
                TypeCode::BigDecimal => ColumnData::BigDecimal(StringArena::default()),
                TypeCode::BigInteger => ColumnData::BigInteger(StringArena::default()),
                TypeCode::Instant | TypeCode::Date | TypeCode::DateTime | TypeCode::LocalDate => {
                    ColumnData::Epoch(Vec::new())
                }
            },
            nulls: NullBitmap::default(),
            capacity: 0,
        };
        col.resize(initial_capacity.max(1));
        col
    }

    pub fn type_code(&self) -> TypeCode {
        self.type_code
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows storage by doubling until it covers `new_capacity`, per 3
    /// ("Grows by doubling"). Callers hold the table's capacity lock in
    /// write mode while calling this (see `row_table.rs`).
    pub fn resize(&mut self, new_capacity: usize) {
        let mut target = self.capacity.max(1);
        while target < new_capacity {
            target *= 2;
        }
        macro_rules! grow_atomic {
            ($vec:expr, $zero:expr) => {
                while $vec.len() < target {
                    $vec.push($zero);
                }
            };
        }
        match &mut self.data {
            ColumnData::I8(v) => grow_atomic!(v, AtomicI32::new(0)),
            ColumnData::I16(v) => grow_atomic!(v, AtomicI32::new(0)),
            ColumnData::I32(v) => grow_atomic!(v, AtomicI32::new(0)),
            ColumnData::I64(v) => grow_atomic!(v, AtomicI64::new(0)),
            ColumnData::F32(v) => grow_atomic!(v, AtomicI32::new(0)),
            ColumnData::F64(v) => grow_atomic!(v, AtomicI64::new(0)),
            ColumnData::Bool(v) => grow_atomic!(v, AtomicBool::new(false)),
            ColumnData::Char(v) => grow_atomic!(v, AtomicU32::new(0)),
            ColumnData::Epoch(v) => grow_atomic!(v, AtomicI64::new(0)),
            ColumnData::String(a) | ColumnData::BigDecimal(a) | ColumnData::BigInteger(a) => a.resize(target),
        }
        self.nulls.resize(target);
        self.capacity = target;
    }

    pub fn is_present(&self, row: usize) -> bool {
        self.nulls.is_present(row)
    }

    pub fn set_null(&self, row: usize) {
        self.nulls.set_present(row, false);
    }

    fn mismatch(&self, col_idx: usize, found: TypeCode) -> EngineError {
        TableError::ColumnTypeMismatch(col_idx, self.type_code, found).into()
    }

    /// Writes `value` into `row`. `Value::Null` clears presence without
    /// touching the stored bit pattern. `col_idx` is used only to label a
    /// `ColumnTypeMismatch` error; the owning `Table` passes its own index
    /// for this column.
    pub fn set_value(&self, col_idx: usize, row: usize, value: &Value) -> Result<(), EngineError> {
        if value.is_null() {
            self.set_null(row);
            return Ok(());
        }
        match (&self.data, value) {
            (ColumnData::I8(v), Value::I8(x)) => v[row].store(*x as i32, STORE),
            (ColumnData::I16(v), Value::I16(x)) => v[row].store(*x as i32, STORE),
            (ColumnData::I32(v), Value::I32(x)) => v[row].store(*x, STORE),
            (ColumnData::I64(v), Value::I64(x)) => v[row].store(*x, STORE),
            (ColumnData::F32(v), Value::F32(x)) => v[row].store(f32_to_sortable_i32(*x), STORE),
            (ColumnData::F64(v), Value::F64(x)) => v[row].store(f64_to_sortable_i64(*x), STORE),
            (ColumnData::Bool(v), Value::Bool(x)) => v[row].store(*x, STORE),
            (ColumnData::Char(v), Value::Char(x)) => v[row].store(*x as u32, STORE),
            (ColumnData::Epoch(v), Value::Epoch(x)) => v[row].store(*x, STORE),
            (ColumnData::String(a), Value::String(s)) => a.set(row, s),
            (ColumnData::BigDecimal(a), Value::BigDecimal(s)) => a.set(row, s),
            (ColumnData::BigInteger(a), Value::BigInteger(s)) => a.set(row, s),
            _ => return Err(self.mismatch(col_idx, value.type_code().unwrap_or(self.type_code))),
        }
        self.nulls.set_present(row, true);
        Ok(())
    }

    /// Complement of `scan_equals(row_count, Value::Null)`; backs `NOT_NULL`.
    pub fn scan_present(&self, row_count: usize) -> Vec<u32> {
        (0..row_count as u32).filter(|&r| self.is_present(r as usize)).collect()
    }

    pub fn get_value(&self, row: usize) -> Value {
        if !self.is_present(row) {
            return Value::Null;
        }
        match &self.data {
            ColumnData::I8(v) => Value::I8(v[row].load(LOAD) as i8),
            ColumnData::I16(v) => Value::I16(v[row].load(LOAD) as i16),
            ColumnData::I32(v) => Value::I32(v[row].load(LOAD)),
            ColumnData::I64(v) => Value::I64(v[row].load(LOAD)),
            ColumnData::F32(v) => Value::F32(sortable_i32_to_f32(v[row].load(LOAD))),
            ColumnData::F64(v) => Value::F64(sortable_i64_to_f64(v[row].load(LOAD))),
            ColumnData::Bool(v) => Value::Bool(v[row].load(LOAD)),
            ColumnData::Char(v) => Value::Char(char::from_u32(v[row].load(LOAD)).unwrap_or('\u{FFFD}')),
            ColumnData::Epoch(v) => Value::Epoch(v[row].load(LOAD)),
            ColumnData::String(a) => Value::String(a.get(row)),
            ColumnData::BigDecimal(a) => Value::BigDecimal(a.get(row)),
            ColumnData::BigInteger(a) => Value::BigInteger(a.get(row)),
        }
    }

    fn int_key(&self, row: usize) -> Option<i64> {
        Some(match &self.data {
            ColumnData::I8(v) => v[row].load(LOAD) as i64,
            ColumnData::I16(v) => v[row].load(LOAD) as i64,
            ColumnData::I32(v) => v[row].load(LOAD) as i64,
            ColumnData::I64(v) => v[row].load(LOAD),
            ColumnData::F32(v) => v[row].load(LOAD) as i64,
            ColumnData::F64(v) => v[row].load(LOAD),
            ColumnData::Bool(v) => v[row].load(LOAD) as i64,
            ColumnData::Char(v) => v[row].load(LOAD) as i64,
            ColumnData::Epoch(v) => v[row].load(LOAD),
            ColumnData::String(_) | ColumnData::BigDecimal(_) | ColumnData::BigInteger(_) => return None,
        })
    }

    /// Scans `[0, row_count)` for rows whose value equals `value`. Does
    /// not itself consult tombstone/seqlock state — callers scan through
    /// `RowTable`, which filters and re-validates (4.1, 4.2).
    pub fn scan_equals(&self, row_count: usize, value: &Value) -> Vec<u32> {
        if value.is_null() {
            return (0..row_count as u32).filter(|&r| !self.is_present(r as usize)).collect();
        }
        if let ColumnData::String(a) | ColumnData::BigDecimal(a) | ColumnData::BigInteger(a) = &self.data {
            let Value::String(s) | Value::BigDecimal(s) | Value::BigInteger(s) = value else {
                return Vec::new();
            };
            return (0..row_count as u32)
                .filter(|&r| self.is_present(r as usize) && &a.get(r as usize) == s)
                .collect();
        }
        let Some(target) = self.value_to_int_key(value) else { return Vec::new() };
        (0..row_count as u32)
            .filter(|&r| self.is_present(r as usize) && self.int_key(r as usize) == Some(target))
            .collect()
    }

    pub fn scan_equals_ignore_case(&self, row_count: usize, value: &str) -> Vec<u32> {
        let lower = value.to_lowercase();
        (0..row_count as u32)
            .filter(|&r| self.is_present(r as usize) && self.string_at(r as usize).map(|s| s.to_lowercase()) == Some(lower.clone()))
            .collect()
    }

    /// Inclusive on both sides; caller pre-normalizes so `lo <= hi` (4.1).
    pub fn scan_between(&self, row_count: usize, lo: &Value, hi: &Value) -> Vec<u32> {
        if let (Some(lo), Some(hi)) = (self.value_to_int_key(lo), self.value_to_int_key(hi)) {
            return (0..row_count as u32)
                .filter(|&r| self.is_present(r as usize) && matches!(self.int_key(r as usize), Some(k) if k >= lo && k <= hi))
                .collect();
        }
        if let (Value::String(lo), Value::String(hi)) = (lo, hi) {
            return (0..row_count as u32)
                .filter(|&r| {
                    self.is_present(r as usize)
                        .then(|| self.string_at(r as usize))
                        .flatten()
                        .is_some_and(|s| &s >= lo && &s <= hi)
                })
                .collect();
        }
        Vec::new()
    }

    pub fn scan_in(&self, row_count: usize, values: &[Value]) -> Vec<u32> {
        let mut out = Vec::new();
        for v in values {
            out.extend(self.scan_equals(row_count, v));
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn scan_starts_with(&self, row_count: usize, prefix: &str) -> Vec<u32> {
        (0..row_count as u32)
            .filter(|&r| self.is_present(r as usize) && self.string_at(r as usize).is_some_and(|s| s.starts_with(prefix)))
            .collect()
    }

    pub fn scan_ends_with(&self, row_count: usize, suffix: &str) -> Vec<u32> {
        (0..row_count as u32)
            .filter(|&r| self.is_present(r as usize) && self.string_at(r as usize).is_some_and(|s| s.ends_with(suffix)))
            .collect()
    }

    /// `%` matches zero-or-more characters, `_` matches exactly one (4.1).
    pub fn scan_like(&self, row_count: usize, pattern: &str) -> Vec<u32> {
        (0..row_count as u32)
            .filter(|&r| {
                self.is_present(r as usize)
                    .then(|| self.string_at(r as usize))
                    .flatten()
                    .is_some_and(|s| like_match(pattern, &s))
            })
            .collect()
    }

    fn string_at(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::String(a) | ColumnData::BigDecimal(a) | ColumnData::BigInteger(a) => Some(a.get(row)),
            _ => None,
        }
    }

    fn value_to_int_key(&self, v: &Value) -> Option<i64> {
        match v {
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::F32(x) => Some(f32_to_sortable_i32(*x) as i64),
            Value::F64(x) => Some(f64_to_sortable_i64(*x)),
            Value::Bool(x) => Some(*x as i64),
            Value::Char(x) => Some(*x as i64),
            Value::Epoch(x) => Some(*x),
            _ => None,
        }
    }
}

/// `%` = zero-or-more, `_` = exactly one, per 4.1.
fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let mut memo = vec![vec![None; t.len() + 1]; p.len() + 1];
    like_match_rec(&p, &t, 0, 0, &mut memo)
}

fn like_match_rec(p: &[char], t: &[char], pi: usize, ti: usize, memo: &mut Vec<Vec<Option<bool>>>) -> bool {
    if let Some(cached) = memo[pi][ti] {
        return cached;
    }
    let result = if pi == p.len() {
        ti == t.len()
    } else if p[pi] == '%' {
        (ti..=t.len()).any(|k| like_match_rec(p, t, pi + 1, k, memo))
    } else if ti < t.len() && (p[pi] == '_' || p[pi] == t[ti]) {
        like_match_rec(p, t, pi + 1, ti + 1, memo)
    } else {
        false
    };
    memo[pi][ti] = Some(result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip_i32() {
        let col = Column::new(TypeCode::I32, 4);
        col.set_value(0, 0, &Value::I32(42)).unwrap();
        assert_eq!(col.get_value(0), Value::I32(42));
        assert!(col.is_present(0));
    }

    #[test]
    fn null_clears_presence() {
        let col = Column::new(TypeCode::I32, 4);
        col.set_value(0, 0, &Value::I32(1)).unwrap();
        col.set_null(0);
        assert!(!col.is_present(0));
        assert_eq!(col.get_value(0), Value::Null);
    }

    #[test]
    fn string_roundtrip_through_arena() {
        let col = Column::new(TypeCode::String, 2);
        col.set_value(0, 0, &Value::String("hello".into())).unwrap();
        col.set_value(0, 1, &Value::String("world".into())).unwrap();
        assert_eq!(col.get_value(0), Value::String("hello".into()));
        assert_eq!(col.get_value(1), Value::String("world".into()));
    }

    #[test]
    fn scan_equals_finds_matching_rows() {
        let col = Column::new(TypeCode::I32, 8);
        for i in 0..8 {
            col.set_value(0, i, &Value::I32(if i % 2 == 0 { 1 } else { 2 })).unwrap();
        }
        let rows = col.scan_equals(8, &Value::I32(1));
        assert_eq!(rows, vec![0, 2, 4, 6]);
    }

    #[test]
    fn scan_between_is_inclusive() {
        let col = Column::new(TypeCode::I32, 10);
        for i in 0..10 {
            col.set_value(0, i, &Value::I32(i as i32)).unwrap();
        }
        let rows = col.scan_between(10, &Value::I32(3), &Value::I32(6));
        assert_eq!(rows, vec![3, 4, 5, 6]);
    }

    #[test]
    fn like_pattern_matching() {
        assert!(like_match("a%c", "abc"));
        assert!(like_match("a_c", "abc"));
        assert!(!like_match("a_c", "abbc"));
        assert!(like_match("%", "anything"));
    }

    #[test]
    fn grows_by_doubling() {
        let mut col = Column::new(TypeCode::I32, 4);
        assert_eq!(col.capacity(), 4);
        col.resize(5);
        assert_eq!(col.capacity(), 8);
    }
}
