//! Seqlock-protected row storage (C2).
//!
//! Each row carries two independent counters. `seq` is a pure seqlock
//! sequence number — odd while a write to that row is in flight, even
//! otherwise — bumped on every write (insert, update, or tombstone) and
//! used only to detect torn reads: a reader loads `seq`, reads every column
//! value, loads `seq` again, and retries if it changed or was odd. This
//! gives torn-read-free multi-column reads without ever blocking a writer
//! on a different row. `generation` is the row's cross-call identity and
//! is the high half of every `Pref` naming it; unlike `seq` it does *not*
//! move on an ordinary update, only when a tombstoned slot is reclaimed by
//! a later `insert` — that is what makes a `Pref` captured before the
//! tombstone fail `is_live` instead of aliasing the new occupant (3, ABA
//! guard).
//!
//! Capacity growth (new rows beyond the allocated vectors) takes the
//! table's `storage` lock in write mode; every other operation — insert,
//! update, tombstone, scan — takes it in read mode and relies solely on
//! the per-row atomics for synchronization, per 4.2.

use crate::column::Column;
use crate::error::{EngineError, TableError};
use crate::pref::Pref;
use crate::types::{TypeCode, Value};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const MAX_SEQLOCK_RETRIES: u32 = 64;

struct RowMeta {
    /// Seqlock parity: odd mid-write, even otherwise. Unrelated to
    /// `generation` — it moves on every write, including plain updates.
    seq: AtomicU32,
    /// The row's current `Pref` identity. Stable across updates; only
    /// advances when `tombstone` reclaims the slot.
    generation: AtomicU32,
    tombstoned: AtomicBool,
}

impl RowMeta {
    fn new() -> Self {
        RowMeta { seq: AtomicU32::new(0), generation: AtomicU32::new(0), tombstoned: AtomicBool::new(false) }
    }
}

struct Storage {
    columns: Vec<Column>,
    meta: Vec<RowMeta>,
}

/// Free-list and high-water mark bookkeeping, mutated only while holding
/// `free`; row liveness itself never depends on this lock.
struct FreeList {
    free_rows: Vec<u32>,
    allocated: u32,
}

pub struct RowTable {
    type_codes: Vec<TypeCode>,
    storage: RwLock<Storage>,
    free: Mutex<FreeList>,
    initial_capacity: usize,
}

impl RowTable {
    pub fn new(type_codes: Vec<TypeCode>, initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(1);
        let columns = type_codes.iter().map(|&tc| Column::new(tc, capacity)).collect();
        let meta = (0..capacity).map(|_| RowMeta::new()).collect();
        RowTable {
            type_codes,
            storage: RwLock::new(Storage { columns, meta }),
            free: Mutex::new(FreeList { free_rows: Vec::new(), allocated: 0 }),
            initial_capacity: capacity,
        }
    }

    pub fn column_count(&self) -> usize {
        self.type_codes.len()
    }

    pub fn type_code_at(&self, col_idx: usize) -> TypeCode {
        self.type_codes[col_idx]
    }

    /// Number of row slots ever handed out by `insert`, live or tombstoned.
    pub fn allocated_count(&self) -> u32 {
        self.free.lock().allocated
    }

    pub fn row_count(&self) -> u32 {
        let free = self.free.lock();
        free.allocated - free.free_rows.len() as u32
    }

    fn grow_to(&self, capacity: usize) {
        let mut storage = self.storage.write();
        if storage.meta.len() >= capacity {
            return;
        }
        for col in &mut storage.columns {
            col.resize(capacity);
        }
        while storage.meta.len() < capacity {
            storage.meta.push(RowMeta::new());
        }
    }

    /// Allocates a row (reusing a tombstoned slot when available) and
    /// writes `values`, one per column in declaration order. Growth
    /// doubles capacity, per 3.
    pub fn insert(&self, values: &[Value]) -> Result<Pref, EngineError> {
        if values.len() != self.type_codes.len() {
            return Err(EngineError::InvalidArgument(format!(
                "expected {} column values, got {}",
                self.type_codes.len(),
                values.len()
            )));
        }
        let row = {
            let mut free = self.free.lock();
            if let Some(row) = free.free_rows.pop() {
                row
            } else {
                let row = free.allocated;
                free.allocated += 1;
                row
            }
        };
        if row as usize >= self.storage.read().meta.len() {
            let mut target = self.initial_capacity.max(1);
            while target <= row as usize {
                target *= 2;
            }
            self.grow_to(target);
        }
        let generation = self.write_row(row, values)?;
        Ok(Pref::pack(row, generation))
    }

    /// Overwrites every column of `row` under the seqlock (parity odd
    /// during the write, even after — 4.2). Returns the row's current
    /// generation, unchanged by this call.
    fn write_row(&self, row: u32, values: &[Value]) -> Result<u32, EngineError> {
        let storage = self.storage.read();
        let meta = &storage.meta[row as usize];
        meta.seq.fetch_add(1, Ordering::AcqRel); // now odd: write in flight
        for (col_idx, (col, value)) in storage.columns.iter().zip(values).enumerate() {
            col.set_value(col_idx, row as usize, value)?;
        }
        meta.tombstoned.store(false, Ordering::Release);
        meta.seq.fetch_add(1, Ordering::Release); // even again: write complete
        Ok(meta.generation.load(Ordering::Acquire))
    }

    /// Updates only the columns named in `changes` (index, new value),
    /// leaving the rest untouched. The returned `Pref` carries the same
    /// generation as `pref` — an ordinary update never advances identity.
    /// Errors with `NotLive` if `pref` no longer names a live row.
    pub fn update(&self, pref: Pref, changes: &[(usize, Value)]) -> Result<Pref, EngineError> {
        if !self.is_live(pref) {
            return Err(TableError::NotLive(pref).into());
        }
        let row = pref.row();
        let storage = self.storage.read();
        let meta = &storage.meta[row as usize];
        meta.seq.fetch_add(1, Ordering::AcqRel); // odd: write in flight
        for &(col_idx, ref value) in changes {
            storage.columns[col_idx].set_value(col_idx, row as usize, value)?;
        }
        meta.seq.fetch_add(1, Ordering::Release); // even again: write complete
        Ok(Pref::pack(row, pref.generation()))
    }

    /// Marks `pref`'s row dead, advances its generation so the reclaimed
    /// slot cannot alias `pref`, and returns it to the free list. A no-op
    /// (returns `NotLive`) if the row is already dead or the generation is
    /// stale.
    pub fn tombstone(&self, pref: Pref) -> Result<(), EngineError> {
        if !self.is_live(pref) {
            return Err(TableError::NotLive(pref).into());
        }
        let row = pref.row();
        {
            let storage = self.storage.read();
            let meta = &storage.meta[row as usize];
            meta.seq.fetch_add(1, Ordering::AcqRel); // odd: write in flight
            meta.tombstoned.store(true, Ordering::Release);
            meta.generation.fetch_add(1, Ordering::AcqRel);
            meta.seq.fetch_add(1, Ordering::Release); // even again: write complete
        }
        self.free.lock().free_rows.push(row);
        Ok(())
    }

    pub fn is_tombstoned(&self, row: u32) -> bool {
        let storage = self.storage.read();
        match storage.meta.get(row as usize) {
            Some(meta) => meta.tombstoned.load(Ordering::Acquire),
            None => true,
        }
    }

    pub fn row_generation(&self, row: u32) -> u32 {
        let storage = self.storage.read();
        storage.meta[row as usize].generation.load(Ordering::Acquire)
    }

    /// A `pref` is live iff its row exists, is not tombstoned, and its
    /// generation matches the row's current one exactly.
    pub fn is_live(&self, pref: Pref) -> bool {
        let storage = self.storage.read();
        let Some(meta) = storage.meta.get(pref.row() as usize) else { return false };
        !meta.tombstoned.load(Ordering::Acquire) && meta.generation.load(Ordering::Acquire) == pref.generation()
    }

    /// Reads every column of `row` as one atomically-consistent snapshot,
    /// retrying while a concurrent write is observed. Returns `None` if
    /// the row is tombstoned.
    pub fn read_with_seqlock(&self, row: u32) -> Result<Option<Vec<Value>>, EngineError> {
        let storage = self.storage.read();
        let meta = &storage.meta[row as usize];
        for _ in 0..MAX_SEQLOCK_RETRIES {
            let seq1 = meta.seq.load(Ordering::Acquire);
            if seq1 & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            if meta.tombstoned.load(Ordering::Acquire) {
                return Ok(None);
            }
            let values: Vec<Value> = storage.columns.iter().map(|c| c.get_value(row as usize)).collect();
            let seq2 = meta.seq.load(Ordering::Acquire);
            if seq1 == seq2 {
                return Ok(Some(values));
            }
        }
        Err(TableError::SeqlockExhausted(row).into())
    }

    /// All allocated row indices in `[0, allocated_count())`, live or not;
    /// callers filter tombstones via `Selection::from_scan_indices`.
    pub fn scan_all(&self) -> Vec<u32> {
        (0..self.allocated_count()).collect()
    }

    pub fn with_column<R>(&self, col_idx: usize, f: impl FnOnce(&Column) -> R) -> R {
        let storage = self.storage.read();
        f(&storage.columns[col_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RowTable {
        RowTable::new(vec![TypeCode::I32, TypeCode::String], 4)
    }

    #[test]
    fn insert_then_read_back() {
        let t = table();
        let pref = t.insert(&[Value::I32(1), Value::String("a".into())]).unwrap();
        let values = t.read_with_seqlock(pref.row()).unwrap().unwrap();
        assert_eq!(values, vec![Value::I32(1), Value::String("a".into())]);
        assert!(t.is_live(pref));
    }

    #[test]
    fn tombstone_then_reuse_advances_generation() {
        let t = table();
        let pref = t.insert(&[Value::I32(1), Value::String("a".into())]).unwrap();
        t.tombstone(pref).unwrap();
        assert!(!t.is_live(pref));
        let pref2 = t.insert(&[Value::I32(2), Value::String("b".into())]).unwrap();
        assert_eq!(pref2.row(), pref.row());
        assert!(pref2.generation() > pref.generation());
        assert!(t.is_live(pref2));
        assert!(!t.is_live(pref));
    }

    #[test]
    fn update_changes_only_named_columns() {
        let t = table();
        let pref = t.insert(&[Value::I32(1), Value::String("a".into())]).unwrap();
        let pref2 = t.update(pref, &[(0, Value::I32(99))]).unwrap();
        let values = t.read_with_seqlock(pref2.row()).unwrap().unwrap();
        assert_eq!(values, vec![Value::I32(99), Value::String("a".into())]);
    }

    /// An ordinary update must not advance generation — only a
    /// tombstone-then-reclaim does (3). The original `pref` stays live
    /// and usable for a second update.
    #[test]
    fn update_preserves_generation_across_repeated_writes() {
        let t = table();
        let pref = t.insert(&[Value::I32(1), Value::String("a".into())]).unwrap();
        let pref2 = t.update(pref, &[(0, Value::I32(2))]).unwrap();
        assert_eq!(pref2.generation(), pref.generation());
        assert!(t.is_live(pref));
        let pref3 = t.update(pref2, &[(0, Value::I32(3))]).unwrap();
        assert_eq!(pref3.generation(), pref.generation());
        assert!(t.is_live(pref));
    }

    #[test]
    fn update_on_dead_row_is_not_live() {
        let t = table();
        let pref = t.insert(&[Value::I32(1), Value::String("a".into())]).unwrap();
        t.tombstone(pref).unwrap();
        assert!(t.update(pref, &[(0, Value::I32(2))]).is_err());
    }

    #[test]
    fn grows_capacity_past_initial() {
        let t = RowTable::new(vec![TypeCode::I32], 2);
        let mut prefs = Vec::new();
        for i in 0..10 {
            prefs.push(t.insert(&[Value::I32(i)]).unwrap());
        }
        assert_eq!(t.allocated_count(), 10);
        for (i, pref) in prefs.iter().enumerate() {
            let values = t.read_with_seqlock(pref.row()).unwrap().unwrap();
            assert_eq!(values, vec![Value::I32(i as i32)]);
        }
    }

    #[test]
    fn concurrent_reader_and_writer_never_observe_torn_rows() {
        use std::sync::Arc;
        let t = Arc::new(RowTable::new(vec![TypeCode::I32, TypeCode::I32], 4));
        let pref = t.insert(&[Value::I32(0), Value::I32(0)]).unwrap();
        let writer_table = Arc::clone(&t);
        let writer = std::thread::spawn(move || {
            for i in 1..2000 {
                writer_table.update(pref, &[(0, Value::I32(i)), (1, Value::I32(i))]).ok();
            }
        });
        for _ in 0..2000 {
            if let Some(values) = t.read_with_seqlock(pref.row()).unwrap() {
                assert_eq!(values[0], values[1], "torn read: columns disagree");
            }
        }
        writer.join().unwrap();
    }
}
