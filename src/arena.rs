//! Arena (C12): owns every table, index, and identifier counter for one
//! isolated data space, behind one lifecycle lock.
//!
//! Grounded on the teacher's locking pattern across
//! `locking_tx_datastore/datastore.rs`: a coarse reader-writer lock guards
//! the registry of tables while the tables themselves carry their own
//! finer-grained (seqlock / per-index-lock) synchronization below it.

use crate::config::Config;
use crate::error::{ArenaError, EngineError};
use crate::id_gen::IdCounter;
use crate::schema::EntityDecl;
use crate::table::Table;
use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::instrument;

struct ArenaInner {
    closed: bool,
    tables: HashMap<String, Table>,
    id_counters: HashMap<String, IdCounter>,
}

pub struct Arena {
    config: Config,
    inner: RwLock<ArenaInner>,
}

impl Arena {
    pub fn new(config: Config) -> Self {
        Arena { config, inner: RwLock::new(ArenaInner { closed: false, tables: HashMap::new(), id_counters: HashMap::new() }) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validates and registers `decl`, taking the lifecycle lock
    /// exclusively (4.11).
    #[instrument(level = "debug", skip(self, decl), fields(entity = %decl.name))]
    pub fn register_entity(&self, decl: EntityDecl) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(EngineError::LifecycleClosed);
        }
        let exists = inner.tables.contains_key(&decl.name);
        let resolved = crate::schema::validate(&decl, exists)?;
        let table = Table::new(resolved, self.config.initial_pages.max(1), self.config.enable_prefix_index, self.config.enable_suffix_index);
        inner.id_counters.insert(decl.name.clone(), IdCounter::new());
        inner.tables.insert(decl.name.clone(), table);
        Ok(())
    }

    /// Runs `f` against the named entity's table and id counter under a
    /// shared lifecycle lock. Returns `LifecycleClosed` or
    /// `ArenaError::EntityNotFound` before `f` ever sees a table.
    pub fn with_table<R>(&self, entity: &str, f: impl FnOnce(&Table, &IdCounter) -> Result<R, EngineError>) -> Result<R, EngineError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(EngineError::LifecycleClosed);
        }
        let table = inner.tables.get(entity).ok_or_else(|| ArenaError::EntityNotFound(entity.to_string()))?;
        let counter = inner.id_counters.get(entity).expect("id counter registered alongside its table");
        f(table, counter)
    }

    pub fn is_registered(&self, entity: &str) -> bool {
        !self.inner.read().closed && self.inner.read().tables.contains_key(entity)
    }

    /// Drops every table, index, and counter at once. Any handle obtained
    /// before this call observes `LifecycleClosed` on its next operation
    /// rather than touching freed state (4.11).
    #[instrument(level = "debug", skip(self))]
    pub fn close(&self) {
        let mut inner = self.inner.write();
        inner.closed = true;
        inner.tables.clear();
        inner.id_counters.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, IndexKind};
    use crate::types::{TypeCode, Value};

    fn person_decl() -> EntityDecl {
        EntityDecl::new(
            "Person",
            vec![FieldDef::identifier("id", TypeCode::I64), FieldDef::new("name", TypeCode::String, false)],
        )
        .with_index("name", IndexKind::Hash)
    }

    #[test]
    fn register_then_use_table() {
        let arena = Arena::new(Config::default());
        arena.register_entity(person_decl()).unwrap();
        let pref = arena
            .with_table("Person", |table, _| table.insert(vec![Value::I64(1), Value::String("alice".into())]))
            .unwrap();
        let found = arena.with_table("Person", |table, _| Ok(table.find_by_id(&Value::I64(1)))).unwrap();
        assert_eq!(found, Some(pref));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let arena = Arena::new(Config::default());
        arena.register_entity(person_decl()).unwrap();
        assert!(matches!(arena.register_entity(person_decl()), Err(EngineError::Arena(ArenaError::EntityExists(_)))));
    }

    #[test]
    fn operation_on_unknown_entity_is_rejected() {
        let arena = Arena::new(Config::default());
        let result = arena.with_table("Ghost", |_, _| Ok(()));
        assert!(matches!(result, Err(EngineError::Arena(ArenaError::EntityNotFound(_)))));
    }

    #[test]
    fn closed_arena_rejects_further_operations() {
        let arena = Arena::new(Config::default());
        arena.register_entity(person_decl()).unwrap();
        arena.close();
        let result = arena.with_table("Person", |_, _| Ok(()));
        assert!(matches!(result, Err(EngineError::LifecycleClosed)));
        assert!(matches!(arena.register_entity(person_decl()), Err(EngineError::LifecycleClosed)));
    }
}
