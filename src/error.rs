//! Error taxonomy for the engine.
//!
//! Mirrors the teacher's split of one enum per subsystem aggregated into a
//! top-level error via `#[from]` (see `db/datastore/error.rs`'s
//! `DatastoreError` / `TableError` / `IndexError` / `SequenceError`).

use thiserror::Error;

/// Top-level error surfaced by every public operation.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum EngineError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Identifier or packed reference resolves to no live row.
    #[error("not found")]
    NotFound,
    /// Column type code does not match the requested read/write type, or an
    /// index declaration names an unknown/unsupported field.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Bad caller-supplied argument: negative row index, out-of-range arg
    /// index, inverted BETWEEN bounds, IN over a non-iterable, composite
    /// index with fewer than two columns.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Operation attempted against a closed arena.
    #[error("arena is closed")]
    LifecycleClosed,
    /// Invariant violation. Non-recoverable; callers should not retry.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum TableError {
    #[error("row index {0} out of range")]
    RowOutOfRange(u32),
    #[error("column {0} has type {expected:?}, not {found:?}", expected = .1, found = .2)]
    ColumnTypeMismatch(usize, crate::types::TypeCode, crate::types::TypeCode),
    #[error("row {0:?} is not live")]
    NotLive(crate::pref::Pref),
    #[error("seqlock retry budget exhausted on row {0}")]
    SeqlockExhausted(u32),
    #[error("free-list produced a row index still marked live: {0}")]
    FreeListCorruption(u32),
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum QueryError {
    #[error("argument index {0} out of range (have {1} arguments)")]
    ArgOutOfRange(usize, usize),
    #[error("BETWEEN lower bound is greater than upper bound after normalization")]
    InvertedBetween,
    #[error("IN/NOT_IN requires an iterable argument")]
    NotIterable,
    #[error("composite index requires at least two columns, got {0}")]
    CompositeTooFew(usize),
    #[error("unknown operator code {0}")]
    UnknownOperator(u8),
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ArenaError {
    #[error("entity `{0}` is already registered")]
    EntityExists(String),
    #[error("entity `{0}` is not registered")]
    EntityNotFound(String),
    #[error("index on {0:?} is already registered for entity `{1}`")]
    IndexExists(Vec<usize>, String),
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("unrecognized configuration option `{0}`")]
    UnknownOption(String),
    #[error("configuration option `{0}` has an invalid value: {1}")]
    InvalidValue(String, String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
