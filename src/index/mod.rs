//! Secondary index layer (C4): hash, sorted range, string prefix/suffix,
//! and composite (hash/range) indices. None of these own rows — they
//! return `Pref` candidate sets that the caller filters through
//! `is_live` (GLOSSARY: every index-produced pref must pass `is_live`
//! before entering the selection algebra).

mod composite;
mod hash;
mod range;
mod trie;

pub use composite::{CompositeHashIndex, CompositeKey, CompositeRangeIndex, RangeBound};
pub use hash::HashIndex;
pub use range::RangeIndex;
pub use trie::StringTrieIndex;

use crate::types::{f32_to_sortable_i32, f64_to_sortable_i64, TypeCode, Value};

/// Normalized index key. Every index normalizes its column's `Value` into
/// one of these two comparable forms before insertion/lookup so that
/// `Ord`/`Eq`/`Hash` are well-defined independent of the source type
/// (floats compare via their sortable-integer encoding per 4.4).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Int(i64),
    Str(String),
}

impl IndexKey {
    pub fn from_value(value: &Value, type_code: TypeCode) -> Option<IndexKey> {
        Some(match (value, type_code) {
            (Value::Null, _) => return None,
            (Value::I8(v), _) => IndexKey::Int(*v as i64),
            (Value::I16(v), _) => IndexKey::Int(*v as i64),
            (Value::I32(v), _) => IndexKey::Int(*v as i64),
            (Value::I64(v), _) => IndexKey::Int(*v),
            (Value::Bool(v), _) => IndexKey::Int(*v as i64),
            (Value::Char(v), _) => IndexKey::Int(*v as i64),
            (Value::F32(v), _) => IndexKey::Int(f32_to_sortable_i32(*v) as i64),
            (Value::F64(v), _) => IndexKey::Int(f64_to_sortable_i64(*v)),
            (Value::Epoch(v), _) => IndexKey::Int(*v),
            (Value::String(v), _) => IndexKey::Str(v.clone()),
            (Value::BigDecimal(v), _) => IndexKey::Str(v.clone()),
            (Value::BigInteger(v), _) => IndexKey::Str(v.clone()),
        })
    }

    pub fn min_sentinel(type_code: TypeCode) -> IndexKey {
        if type_code.is_string_like() {
            IndexKey::Str(String::new())
        } else {
            IndexKey::Int(i64::MIN)
        }
    }

    pub fn max_sentinel(type_code: TypeCode) -> IndexKey {
        if type_code.is_string_like() {
            // No finite string is greater than every other string under a
            // prefix-free comparator; callers needing an exclusive upper
            // sentinel use `RangeBound` instead, which has a dedicated
            // `PlusInf` variant rather than relying on a sentinel string.
            IndexKey::Str(String::from('\u{10FFFF}').repeat(64))
        } else {
            IndexKey::Int(i64::MAX)
        }
    }
}
