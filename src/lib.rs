//! An in-memory columnar data engine: fixed-width column storage under
//! a seqlock, primary/secondary/composite indices, a compiled query
//! surface, and a direct-dispatch repository layer.

pub mod arena;
pub mod column;
pub mod config;
pub mod error;
pub mod id_gen;
pub mod index;
pub mod plan;
pub mod pref;
pub mod repository;
pub mod row_table;
pub mod schema;
pub mod selection;
pub mod table;
pub mod types;

pub use arena::Arena;
pub use config::{Config, ConfigValue};
pub use error::{ArenaError, ConfigError, EngineError, QueryError, Result, TableError};
pub use id_gen::IdCounter;
pub use plan::{Combinator, CompiledQuery, Condition, Operator, OrderKey, QueryArg};
pub use pref::Pref;
pub use repository::{Opcode, RepoResult, Repository, ReturnKind, Row};
pub use schema::{Cardinality, EntityDecl, FieldDef, IndexKind, RelationshipDef, ResolvedSchema};
pub use table::Table;
pub use types::{TypeCode, Value};
