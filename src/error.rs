//! Error type for query composition and execution.
//!
//! Composition errors (`UnsupportedConstruct`, `TypeMismatch`) are raised at the
//! `filter` / `or_filter` / `project` / `order_by` call site, before any SQL is
//! generated. Execution errors are raised by the terminal calls (`all`, `one`,
//! ...). Failures reported by the executor are carried unchanged in
//! `ExecutionFailure`; nothing here retries or reinterprets them.

use crate::executor::ExecutorError;
use crate::value::SqlType;
use std::fmt;

/// Error type for everything between a closure and a decoded result.
#[derive(Debug)]
pub enum QueryError {
    /// The expression uses something the compiler cannot model
    UnsupportedConstruct(String),
    /// Operand types are incompatible with the operator
    TypeMismatch {
        operator: String,
        left: SqlType,
        right: SqlType,
    },
    /// Single-row mode received more rows than allowed
    CardinalityViolation { expected: usize, actual: usize },
    /// The executor reported a failure
    ExecutionFailure(ExecutorError),
    /// A fetched row could not be mapped to the requested type
    Decode(String),
    /// The pending execution was cancelled through its handle
    Cancelled,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::UnsupportedConstruct(s) => {
                write!(f, "Unsupported construct: {s}")
            }
            QueryError::TypeMismatch {
                operator,
                left,
                right,
            } => write!(
                f,
                "Type mismatch: operator {operator} cannot be applied to {left} and {right}"
            ),
            QueryError::CardinalityViolation { expected, actual } => write!(
                f,
                "Cardinality violation: expected at most {expected} row(s), got {actual}"
            ),
            QueryError::ExecutionFailure(e) => write!(f, "Execution failure: {e}"),
            QueryError::Decode(s) => write!(f, "Decode error: {s}"),
            QueryError::Cancelled => write!(f, "Query cancelled"),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::ExecutionFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExecutorError> for QueryError {
    fn from(err: ExecutorError) -> Self {
        QueryError::ExecutionFailure(err)
    }
}

impl QueryError {
    pub(crate) fn type_mismatch(operator: impl fmt::Display, left: SqlType, right: SqlType) -> Self {
        QueryError::TypeMismatch {
            operator: operator.to_string(),
            left,
            right,
        }
    }

    /// `true` for errors raised while composing a query.
    pub fn is_composition_error(&self) -> bool {
        matches!(
            self,
            QueryError::UnsupportedConstruct(_) | QueryError::TypeMismatch { .. }
        )
    }
}
