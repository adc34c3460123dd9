//! SQL functions an expression may call.

use crate::error::QueryError;
use crate::value::SqlType;

/// Resolve the result type of `function(args...)`.
///
/// Function names are case-insensitive. Anything not listed here is rejected as
/// `UnsupportedConstruct` so that arbitrary names never reach the SQL text.
pub(crate) fn resolve(function: &str, args: &[SqlType]) -> Result<SqlType, QueryError> {
    let name = function.to_ascii_lowercase();
    match name.as_str() {
        "lower" | "upper" | "trim" => {
            let arg = single(&name, args)?;
            text_arg(&name, arg)?;
            Ok(SqlType::Text)
        }
        "length" => {
            let arg = single(&name, args)?;
            text_arg(&name, arg)?;
            Ok(SqlType::Integer)
        }
        "abs" => {
            let arg = single(&name, args)?;
            if arg.is_numeric() {
                Ok(arg)
            } else {
                Err(QueryError::type_mismatch(name, arg, arg))
            }
        }
        "coalesce" => {
            if args.len() < 2 {
                return Err(arity(&name, "at least 2", args.len()));
            }
            let mut result = SqlType::Null;
            for &arg in args {
                if arg == SqlType::Entity {
                    return Err(QueryError::UnsupportedConstruct(
                        "the entity parameter cannot be passed to a function".to_string(),
                    ));
                }
                if !result.is_comparable_with(arg) {
                    return Err(QueryError::type_mismatch(&name, result, arg));
                }
                if result == SqlType::Null {
                    result = arg;
                }
            }
            Ok(result)
        }
        _ => Err(QueryError::UnsupportedConstruct(format!(
            "function {function} is not supported"
        ))),
    }
}

fn single(name: &str, args: &[SqlType]) -> Result<SqlType, QueryError> {
    match args {
        [arg] => Ok(*arg),
        _ => Err(arity(name, "1", args.len())),
    }
}

fn text_arg(name: &str, arg: SqlType) -> Result<(), QueryError> {
    match arg {
        SqlType::Text | SqlType::Null => Ok(()),
        SqlType::Entity => Err(QueryError::UnsupportedConstruct(
            "the entity parameter cannot be passed to a function".to_string(),
        )),
        other => Err(QueryError::type_mismatch(name, other, SqlType::Text)),
    }
}

fn arity(name: &str, expected: &str, actual: usize) -> QueryError {
    QueryError::UnsupportedConstruct(format!(
        "function {name} takes {expected} argument(s), got {actual}"
    ))
}
