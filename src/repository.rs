//! Repository dispatcher (C10): every entry point carries an opcode and
//! a return-kind; dispatch is a direct branch, never a reflective or
//! string-keyed lookup (9, Re-architecture guidance).

use crate::arena::Arena;
use crate::error::EngineError;
use crate::plan::{CompiledQuery, QueryArg};
use crate::pref::Pref;
use crate::types::Value;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    FindById,
    FindAllById,
    FindAll,
    Find,
    Count,
    CountAll,
    Exists,
    ExistsById,
    SaveOne,
    SaveAll,
    DeleteOne,
    DeleteAll,
    DeleteById,
    DeleteAllById,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    OneOptional,
    ManyList,
    ExistsBool,
    CountLong,
    Save,
    SaveAll,
    Delete,
    DeleteAll,
    DeleteById,
}

impl Opcode {
    /// The return-kind each opcode is always paired with; kept as a
    /// lookup from opcode rather than a free-standing second enum the
    /// caller could mismatch.
    pub fn return_kind(self) -> ReturnKind {
        match self {
            Opcode::FindById => ReturnKind::OneOptional,
            Opcode::FindAllById | Opcode::FindAll | Opcode::Find => ReturnKind::ManyList,
            Opcode::Count | Opcode::CountAll => ReturnKind::CountLong,
            Opcode::Exists | Opcode::ExistsById => ReturnKind::ExistsBool,
            Opcode::SaveOne => ReturnKind::Save,
            Opcode::SaveAll => ReturnKind::SaveAll,
            Opcode::DeleteOne => ReturnKind::Delete,
            Opcode::DeleteAll => ReturnKind::DeleteAll,
            Opcode::DeleteById | Opcode::DeleteAllById => ReturnKind::DeleteById,
        }
    }
}

/// One materialized row: the identifier plus every declared field, in
/// schema order.
pub type Row = Vec<Value>;

#[derive(Debug)]
pub enum RepoResult {
    OneOptional(Option<Row>),
    ManyList(Vec<Row>),
    ExistsBool(bool),
    CountLong(u64),
    Save(Pref),
    SaveAll(Vec<Pref>),
    Delete,
    DeleteAll(u64),
    DeleteById,
}

/// A non-owning handle to one entity's table, bound at construction the
/// way the teacher binds a repository descriptor to its table/index
/// slots once and reuses it for every call (9, Re-architecture guidance).
pub struct Repository<'a> {
    arena: &'a Arena,
    entity: String,
}

impl<'a> Repository<'a> {
    pub fn new(arena: &'a Arena, entity: impl Into<String>) -> Self {
        Repository { arena, entity: entity.into() }
    }

    fn materialize(&self, prefs: &[Pref]) -> Result<Vec<Row>, EngineError> {
        self.arena.with_table(&self.entity, |table, _| {
            let mut rows = Vec::with_capacity(prefs.len());
            for &pref in prefs {
                if let Some(values) = table.rows().read_with_seqlock(pref.row())? {
                    rows.push(values);
                }
            }
            Ok(rows)
        })
    }

    pub fn find_by_id(&self, id: Value) -> Result<RepoResult, EngineError> {
        let row = self.arena.with_table(&self.entity, |table, _| {
            match table.find_by_id(&id) {
                Some(pref) => table.rows().read_with_seqlock(pref.row()),
                None => Ok(None),
            }
        })?;
        Ok(RepoResult::OneOptional(row))
    }

    pub fn find_all_by_id(&self, ids: Vec<Value>) -> Result<RepoResult, EngineError> {
        let prefs: Vec<Pref> = self.arena.with_table(&self.entity, |table, _| {
            Ok(ids.iter().filter_map(|id| table.find_by_id(id)).collect())
        })?;
        Ok(RepoResult::ManyList(self.materialize(&prefs)?))
    }

    pub fn find_all(&self) -> Result<RepoResult, EngineError> {
        let prefs: Vec<Pref> = self.arena.with_table(&self.entity, |table, _| Ok(table.rows().scan_all()
            .into_iter()
            .filter(|&r| !table.rows().is_tombstoned(r))
            .map(|r| Pref::pack(r, table.rows().row_generation(r)))
            .collect()))?;
        Ok(RepoResult::ManyList(self.materialize(&prefs)?))
    }

    #[instrument(level = "trace", skip(self, query, args))]
    pub fn find(&self, query: &CompiledQuery, args: &[QueryArg]) -> Result<RepoResult, EngineError> {
        let prefs = self.arena.with_table(&self.entity, |table, _| query.evaluate(table, args))?;
        Ok(RepoResult::ManyList(self.materialize(&prefs)?))
    }

    pub fn count(&self, query: &CompiledQuery, args: &[QueryArg]) -> Result<RepoResult, EngineError> {
        let prefs = self.arena.with_table(&self.entity, |table, _| query.evaluate(table, args))?;
        Ok(RepoResult::CountLong(prefs.len() as u64))
    }

    pub fn count_all(&self) -> Result<RepoResult, EngineError> {
        let count = self.arena.with_table(&self.entity, |table, _| Ok(table.rows().row_count()))?;
        Ok(RepoResult::CountLong(count as u64))
    }

    pub fn exists(&self, query: &CompiledQuery, args: &[QueryArg]) -> Result<RepoResult, EngineError> {
        let prefs = self.arena.with_table(&self.entity, |table, _| query.evaluate(table, args))?;
        Ok(RepoResult::ExistsBool(!prefs.is_empty()))
    }

    pub fn exists_by_id(&self, id: Value) -> Result<RepoResult, EngineError> {
        let found = self.arena.with_table(&self.entity, |table, _| Ok(table.find_by_id(&id).is_some()))?;
        Ok(RepoResult::ExistsBool(found))
    }

    /// Upsert: a zero/null identifier is allocated from the entity's
    /// counter and inserted; otherwise the row is looked up and updated,
    /// or inserted fresh if that identifier is free (4.8).
    #[instrument(level = "trace", skip(self, row))]
    pub fn save_one(&self, identifier_field: usize, mut row: Row) -> Result<RepoResult, EngineError> {
        let pref = self.arena.with_table(&self.entity, |table, counter| {
            let needs_allocation = matches!(&row[identifier_field], Value::Null) || matches!(&row[identifier_field], Value::I64(0));
            if needs_allocation {
                row[identifier_field] = Value::I64(counter.next_id() as i64);
                table.insert(row.clone())
            } else {
                if let Value::I64(v) = row[identifier_field] {
                    counter.observe_supplied(v as u64);
                }
                match table.find_by_id(&row[identifier_field]) {
                    Some(existing) => {
                        let changes: Vec<(usize, Value)> = row.iter().cloned().enumerate().collect();
                        table.update(existing, changes)
                    }
                    None => table.insert(row.clone()),
                }
            }
        })?;
        Ok(RepoResult::Save(pref))
    }

    pub fn save_all(&self, identifier_field: usize, rows: Vec<Row>) -> Result<RepoResult, EngineError> {
        let mut prefs = Vec::with_capacity(rows.len());
        for row in rows {
            match self.save_one(identifier_field, row)? {
                RepoResult::Save(pref) => prefs.push(pref),
                _ => unreachable!("save_one always returns RepoResult::Save"),
            }
        }
        Ok(RepoResult::SaveAll(prefs))
    }

    pub fn delete_one(&self, pref: Pref) -> Result<RepoResult, EngineError> {
        self.arena.with_table(&self.entity, |table, _| table.tombstone(pref))?;
        Ok(RepoResult::Delete)
    }

    pub fn delete_all(&self) -> Result<RepoResult, EngineError> {
        let count = self.arena.with_table(&self.entity, |table, _| {
            let live_rows: Vec<u32> = table.rows().scan_all().into_iter().filter(|&r| !table.rows().is_tombstoned(r)).collect();
            let mut n = 0u64;
            for row in live_rows {
                let pref = Pref::pack(row, table.rows().row_generation(row));
                if table.tombstone(pref).is_ok() {
                    n += 1;
                }
            }
            Ok(n)
        })?;
        Ok(RepoResult::DeleteAll(count))
    }

    /// No-op (not an error) when `id` names no live row (7).
    pub fn delete_by_id(&self, id: Value) -> Result<RepoResult, EngineError> {
        self.arena.with_table(&self.entity, |table, _| {
            if let Some(pref) = table.find_by_id(&id) {
                table.tombstone(pref)?;
            }
            Ok(())
        })?;
        Ok(RepoResult::DeleteById)
    }

    pub fn delete_all_by_id(&self, ids: Vec<Value>) -> Result<RepoResult, EngineError> {
        self.arena.with_table(&self.entity, |table, _| {
            for id in &ids {
                if let Some(pref) = table.find_by_id(id) {
                    table.tombstone(pref)?;
                }
            }
            Ok(())
        })?;
        Ok(RepoResult::DeleteById)
    }
}
