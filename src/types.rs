//! Column type codes and the typed value union (section 3).

use std::cmp::Ordering;

/// Storage representation of a column, per section 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeCode {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Char,
    String,
    BigDecimal,
    BigInteger,
    Instant,
    Date,
    DateTime,
    LocalDate,
}

impl TypeCode {
    /// Temporal codes are normalized to an `i64` epoch value (ms for
    /// instant/datetime/date, day for local-date) per 4.4.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            TypeCode::Instant | TypeCode::Date | TypeCode::DateTime | TypeCode::LocalDate
        )
    }

    pub fn is_string_like(self) -> bool {
        matches!(self, TypeCode::String | TypeCode::BigDecimal | TypeCode::BigInteger)
    }
}

/// A typed value as it flows between the caller and the engine.
///
/// Arbitrary-precision numerics (`BigDecimal`/`BigInteger`) are carried as
/// their canonical string form, per section 3.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Char(char),
    String(String),
    BigDecimal(String),
    BigInteger(String),
    /// Epoch milliseconds (Instant/DateTime), epoch days (LocalDate), or
    /// epoch millis for `Date`; the caller is responsible for normalizing
    /// per `TypeCode`.
    Epoch(i64),
    Null,
}

impl Value {
    pub fn type_code(&self) -> Option<TypeCode> {
        Some(match self {
            Value::I8(_) => TypeCode::I8,
            Value::I16(_) => TypeCode::I16,
            Value::I32(_) => TypeCode::I32,
            Value::I64(_) => TypeCode::I64,
            Value::F32(_) => TypeCode::F32,
            Value::F64(_) => TypeCode::F64,
            Value::Bool(_) => TypeCode::Bool,
            Value::Char(_) => TypeCode::Char,
            Value::String(_) => TypeCode::String,
            Value::BigDecimal(_) => TypeCode::BigDecimal,
            Value::BigInteger(_) => TypeCode::BigInteger,
            Value::Epoch(_) => return None, // caller-context dependent
            Value::Null => return None,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Sortable integer encoding (GLOSSARY): a bijection `f32 <-> i32` / `f64 <->
/// i64` under which integer comparison agrees with IEEE total order on
/// non-NaN values. This is the classic "flip sign bit, or flip everything
/// for negatives" trick.
pub fn f32_to_sortable_i32(v: f32) -> i32 {
    let bits = v.to_bits() as i32;
    bits ^ (((bits >> 31) as u32) >> 1) as i32
}

pub fn sortable_i32_to_f32(key: i32) -> f32 {
    let bits = key ^ (((!key) >> 31) as u32 >> 1) as i32;
    f32::from_bits(bits as u32)
}

pub fn f64_to_sortable_i64(v: f64) -> i64 {
    let bits = v.to_bits() as i64;
    bits ^ (((bits >> 63) as u64) >> 1) as i64
}

pub fn sortable_i64_to_f64(key: i64) -> f64 {
    let bits = key ^ (((!key) >> 63) as u64 >> 1) as i64;
    f64::from_bits(bits as u64)
}

/// Total order over non-NaN floats via the sortable encoding, exposed for
/// callers that want to compare raw floats without manually encoding them.
pub fn f64_total_cmp_non_nan(a: f64, b: f64) -> Ordering {
    f64_to_sortable_i64(a).cmp(&f64_to_sortable_i64(b))
}
