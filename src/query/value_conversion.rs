//! Value conversion utilities for `sea_query::Value` to may_postgres.
//!
//! Rendered statements carry `sea_query::Value`s and `?` placeholders. The
//! Postgres executor needs `$n` placeholders and `ToSql` trait objects; both
//! conversions live here.

use crate::executor::ExecutorError;
use may_postgres::types::ToSql;
use sea_query::Value;

/// Convert bound values to may_postgres `ToSql` parameters and run `f` with them.
///
/// Each value is boxed with its concrete Rust type (typed NULLs become `None` of
/// that type) so the server sees the same parameter types the host side bound.
///
/// # Errors
///
/// Returns `ExecutorError::Conversion` if a value has no Postgres representation,
/// or whatever `f` returns.
pub fn with_converted_params<F, R>(values: &[Value], f: F) -> Result<R, ExecutorError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, ExecutorError>,
{
    let boxed = values
        .iter()
        .map(to_sql_param)
        .collect::<Result<Vec<_>, _>>()?;
    let params: Vec<&dyn ToSql> = boxed.iter().map(|b| b.as_ref()).collect();
    f(&params)
}

fn to_sql_param(value: &Value) -> Result<Box<dyn ToSql>, ExecutorError> {
    let param: Box<dyn ToSql> = match value {
        Value::Bool(v) => Box::new(*v),
        Value::TinyInt(v) => Box::new(v.map(i16::from)),
        Value::SmallInt(v) => Box::new(*v),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::TinyUnsigned(v) => Box::new(v.map(i16::from)),
        Value::SmallUnsigned(v) => Box::new(v.map(i32::from)),
        Value::Unsigned(v) => Box::new(v.map(i64::from)),
        Value::BigUnsigned(Some(u)) => {
            let signed = i64::try_from(*u).map_err(|_| {
                ExecutorError::Conversion(format!(
                    "BigUnsigned value {} exceeds i64::MAX ({}), cannot be safely cast to i64",
                    u,
                    i64::MAX
                ))
            })?;
            Box::new(signed)
        }
        Value::BigUnsigned(None) => Box::new(None::<i64>),
        Value::Float(v) => Box::new(*v),
        Value::Double(v) => Box::new(*v),
        Value::Char(v) => Box::new(v.map(|c| c.to_string())),
        Value::String(Some(s)) => Box::new(String::clone(s)),
        Value::String(None) => Box::new(None::<String>),
        Value::Bytes(Some(b)) => Box::new(Vec::<u8>::clone(b)),
        Value::Bytes(None) => Box::new(None::<Vec<u8>>),
        Value::Json(Some(j)) => Box::new(serde_json::Value::clone(j)),
        Value::Json(None) => Box::new(None::<serde_json::Value>),
        Value::Decimal(Some(d)) => Box::new(rust_decimal::Decimal::clone(d)),
        Value::Decimal(None) => Box::new(None::<rust_decimal::Decimal>),
        Value::Uuid(Some(u)) => Box::new(uuid::Uuid::clone(u)),
        Value::Uuid(None) => Box::new(None::<uuid::Uuid>),
        Value::ChronoDate(Some(d)) => Box::new(chrono::NaiveDate::clone(d)),
        Value::ChronoDate(None) => Box::new(None::<chrono::NaiveDate>),
        Value::ChronoTime(Some(t)) => Box::new(chrono::NaiveTime::clone(t)),
        Value::ChronoTime(None) => Box::new(None::<chrono::NaiveTime>),
        Value::ChronoDateTime(Some(t)) => Box::new(chrono::NaiveDateTime::clone(t)),
        Value::ChronoDateTime(None) => Box::new(None::<chrono::NaiveDateTime>),
        Value::ChronoDateTimeUtc(Some(t)) => {
            Box::new(chrono::DateTime::<chrono::Utc>::clone(t))
        }
        Value::ChronoDateTimeUtc(None) => Box::new(None::<chrono::DateTime<chrono::Utc>>),
        other => {
            return Err(ExecutorError::Conversion(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}

/// Rewrite `?` placeholders as `$1, $2, ...` in occurrence order.
///
/// Question marks inside quoted identifiers or string literals are left alone.
pub fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut closing: Option<char> = None;
    let mut index = 0usize;

    for c in sql.chars() {
        match closing {
            Some(end) => {
                if c == end {
                    closing = None;
                }
                out.push(c);
            }
            None => match c {
                '?' => {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
                '"' | '\'' | '`' => {
                    closing = Some(c);
                    out.push(c);
                }
                '[' => {
                    closing = Some(']');
                    out.push(c);
                }
                _ => out.push(c),
            },
        }
    }
    out
}
