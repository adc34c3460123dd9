//! Host value types and their SQL type tags.
//!
//! Every Rust type that can appear as a column, a captured constant, or a
//! projected result implements [`SqlValue`]. The trait ties the host type to
//! an [`SqlType`] tag (used by the expression type checker) and converts
//! between the host value and `sea_query::Value`, which is the bound-value
//! model used throughout the crate.

use crate::error::QueryError;
use sea_query::Value;
use std::fmt;

/// Static result type of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bool,
    Integer,
    Float,
    Decimal,
    Text,
    Bytes,
    Date,
    Time,
    Timestamp,
    Uuid,
    Json,
    /// Type of the "no value" constant.
    Null,
    /// Type of a bare reference to the entity parameter.
    Entity,
}

impl SqlType {
    pub fn is_numeric(self) -> bool {
        matches!(self, SqlType::Integer | SqlType::Float | SqlType::Decimal)
    }

    /// Whether `<`, `<=`, `>`, `>=` are meaningful for this type.
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            SqlType::Integer
                | SqlType::Float
                | SqlType::Decimal
                | SqlType::Text
                | SqlType::Date
                | SqlType::Time
                | SqlType::Timestamp
        )
    }

    /// Result type of arithmetic between two numeric operands.
    pub(crate) fn widen(self, other: SqlType) -> SqlType {
        match (self, other) {
            (SqlType::Float, _) | (_, SqlType::Float) => SqlType::Float,
            (SqlType::Decimal, _) | (_, SqlType::Decimal) => SqlType::Decimal,
            _ => SqlType::Integer,
        }
    }

    /// Whether values of the two types can be compared for equality.
    pub fn is_comparable_with(self, other: SqlType) -> bool {
        if self == SqlType::Entity || other == SqlType::Entity {
            return false;
        }
        self == other
            || self == SqlType::Null
            || other == SqlType::Null
            || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Bool => "bool",
            SqlType::Integer => "integer",
            SqlType::Float => "float",
            SqlType::Decimal => "decimal",
            SqlType::Text => "text",
            SqlType::Bytes => "bytes",
            SqlType::Date => "date",
            SqlType::Time => "time",
            SqlType::Timestamp => "timestamp",
            SqlType::Uuid => "uuid",
            SqlType::Json => "json",
            SqlType::Null => "null",
            SqlType::Entity => "entity",
        };
        f.write_str(name)
    }
}

/// A Rust type usable as a column type, captured constant, or query result.
pub trait SqlValue: Sized + Send + 'static {
    /// Type tag of non-null values of this type.
    const SQL_TYPE: SqlType;
    /// `true` for `Option<T>`.
    const NULLABLE: bool = false;

    /// Convert into a bound value.
    fn into_value(self) -> Value;

    /// Typed SQL NULL for this type.
    fn null_value() -> Value;

    /// Type tag of this particular value (`Null` for `None`).
    fn value_type(&self) -> SqlType {
        Self::SQL_TYPE
    }

    /// Convert a fetched value back into the host type.
    fn from_value(value: Value) -> Result<Self, QueryError>;
}

fn mismatch<T>(expected: SqlType, value: &Value) -> Result<T, QueryError> {
    Err(QueryError::Decode(format!(
        "expected {expected} value, got {value:?}"
    )))
}

impl SqlValue for bool {
    const SQL_TYPE: SqlType = SqlType::Bool;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::Bool(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::Bool(Some(b)) => Ok(*b),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for i16 {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::SmallInt(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        let wide = match integer_of(&value) {
            Some(i) => i,
            None => return mismatch(Self::SQL_TYPE, &value),
        };
        i16::try_from(wide)
            .map_err(|_| QueryError::Decode(format!("value {wide} does not fit in i16")))
    }
}

impl SqlValue for i32 {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::Int(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        let wide = match integer_of(&value) {
            Some(i) => i,
            None => return mismatch(Self::SQL_TYPE, &value),
        };
        i32::try_from(wide)
            .map_err(|_| QueryError::Decode(format!("value {wide} does not fit in i32")))
    }
}

impl SqlValue for i64 {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::BigInt(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match integer_of(&value) {
            Some(i) => Ok(i),
            None => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for f32 {
    const SQL_TYPE: SqlType = SqlType::Float;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::Float(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::Float(Some(f)) => Ok(*f),
            Value::Double(Some(d)) => Ok(*d as f32),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for f64 {
    const SQL_TYPE: SqlType = SqlType::Float;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::Double(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::Double(Some(d)) => Ok(*d),
            Value::Float(Some(f)) => Ok(f64::from(*f)),
            _ => match integer_of(&value) {
                Some(i) => Ok(i as f64),
                None => mismatch(Self::SQL_TYPE, &value),
            },
        }
    }
}

impl SqlValue for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::String(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::String(Some(s)) => Ok(String::clone(s)),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Bytes;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::Bytes(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::Bytes(Some(b)) => Ok(Vec::<u8>::clone(b)),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for rust_decimal::Decimal {
    const SQL_TYPE: SqlType = SqlType::Decimal;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::Decimal(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::Decimal(Some(d)) => Ok(rust_decimal::Decimal::clone(d)),
            _ => match integer_of(&value) {
                Some(i) => Ok(rust_decimal::Decimal::from(i)),
                None => mismatch(Self::SQL_TYPE, &value),
            },
        }
    }
}

impl SqlValue for chrono::NaiveDate {
    const SQL_TYPE: SqlType = SqlType::Date;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::ChronoDate(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::ChronoDate(Some(d)) => Ok(chrono::NaiveDate::clone(d)),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for chrono::NaiveTime {
    const SQL_TYPE: SqlType = SqlType::Time;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::ChronoTime(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::ChronoTime(Some(t)) => Ok(chrono::NaiveTime::clone(t)),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for chrono::NaiveDateTime {
    const SQL_TYPE: SqlType = SqlType::Timestamp;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::ChronoDateTime(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::ChronoDateTime(Some(t)) => Ok(chrono::NaiveDateTime::clone(t)),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for chrono::DateTime<chrono::Utc> {
    const SQL_TYPE: SqlType = SqlType::Timestamp;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::ChronoDateTimeUtc(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::ChronoDateTimeUtc(Some(t)) => Ok(chrono::DateTime::<chrono::Utc>::clone(t)),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for uuid::Uuid {
    const SQL_TYPE: SqlType = SqlType::Uuid;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::Uuid(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::Uuid(Some(u)) => Ok(uuid::Uuid::clone(u)),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl SqlValue for serde_json::Value {
    const SQL_TYPE: SqlType = SqlType::Json;

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn null_value() -> Value {
        Value::Json(None)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match &value {
            Value::Json(Some(j)) => Ok(serde_json::Value::clone(j)),
            _ => mismatch(Self::SQL_TYPE, &value),
        }
    }
}

impl<T: SqlValue> SqlValue for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;

    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => T::null_value(),
        }
    }

    fn null_value() -> Value {
        T::null_value()
    }

    fn value_type(&self) -> SqlType {
        match self {
            Some(v) => v.value_type(),
            None => SqlType::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        if is_null(&value) {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Integer payload of any signed or unsigned integer value.
pub(crate) fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(Some(i)) => Some(i64::from(*i)),
        Value::SmallInt(Some(i)) => Some(i64::from(*i)),
        Value::Int(Some(i)) => Some(i64::from(*i)),
        Value::BigInt(Some(i)) => Some(*i),
        Value::TinyUnsigned(Some(u)) => Some(i64::from(*u)),
        Value::SmallUnsigned(Some(u)) => Some(i64::from(*u)),
        Value::Unsigned(Some(u)) => Some(i64::from(*u)),
        Value::BigUnsigned(Some(u)) => i64::try_from(*u).ok(),
        _ => None,
    }
}

/// Float payload of a float or double value.
pub(crate) fn float_of(value: &Value) -> Option<f64> {
    match value {
        Value::Float(Some(f)) => Some(f64::from(*f)),
        Value::Double(Some(d)) => Some(*d),
        _ => None,
    }
}

/// Whether `value` is a typed SQL NULL.
pub fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Bytes(None)
            | Value::Json(None)
            | Value::Decimal(None)
            | Value::Uuid(None)
            | Value::ChronoDate(None)
            | Value::ChronoTime(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_types_are_comparable() {
        assert!(SqlType::Integer.is_comparable_with(SqlType::Float));
        assert!(SqlType::Decimal.is_comparable_with(SqlType::Integer));
        assert!(!SqlType::Text.is_comparable_with(SqlType::Integer));
    }

    #[test]
    fn test_null_is_comparable_with_anything_but_entity() {
        assert!(SqlType::Null.is_comparable_with(SqlType::Text));
        assert!(SqlType::Uuid.is_comparable_with(SqlType::Null));
        assert!(!SqlType::Null.is_comparable_with(SqlType::Entity));
    }

    #[test]
    fn test_widen() {
        assert_eq!(SqlType::Integer.widen(SqlType::Integer), SqlType::Integer);
        assert_eq!(SqlType::Integer.widen(SqlType::Decimal), SqlType::Decimal);
        assert_eq!(SqlType::Decimal.widen(SqlType::Float), SqlType::Float);
    }

    #[test]
    fn test_option_value_type() {
        assert_eq!(Some(3i32).value_type(), SqlType::Integer);
        assert_eq!(None::<i32>.value_type(), SqlType::Null);
        assert!(<Option<String> as SqlValue>::NULLABLE);
        assert!(!<String as SqlValue>::NULLABLE);
    }

    #[test]
    fn test_none_becomes_typed_null() {
        let value = None::<String>.into_value();
        assert!(is_null(&value));
        assert_eq!(value, Value::String(None));
    }

    #[test]
    fn test_from_value_widens_integers() {
        assert_eq!(i64::from_value(Value::Int(Some(7))).unwrap(), 7);
        assert_eq!(i32::from_value(Value::BigInt(Some(7))).unwrap(), 7);
        assert!(i16::from_value(Value::BigInt(Some(1 << 40))).is_err());
    }

    #[test]
    fn test_from_value_rejects_wrong_type() {
        let err = String::from_value(Value::Int(Some(1))).unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[test]
    fn test_option_from_null() {
        assert_eq!(Option::<String>::from_value(Value::String(None)).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::from("Ann")).unwrap(),
            Some("Ann".to_string())
        );
    }
}
