//! `QueryExecutor` Module
//!
//! Abstracts the connection collaborator: anything that can run a `?`-placeholder
//! statement with bound `sea_query::Value`s and hand back rows.
//!
//! The query façades never talk to a driver directly; they render a statement and
//! pass it here. Failures are reported as [`ExecutorError`] and carried to the
//! caller unchanged.

use crate::entity::SqlRow;
use crate::query::value_conversion::{numbered_placeholders, with_converted_params};
use may_postgres::{Client, Error as PostgresError, Row};
use sea_query::Value;
use std::fmt;

/// Why an executor could not run a statement.
#[derive(Debug)]
pub enum ExecutorError {
    /// The driver reported a failure
    Postgres(PostgresError),
    /// The database rejected the statement
    Statement(String),
    /// A bound value or fetched column had no driver representation
    Conversion(String),
    Other(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::Postgres(e) => write!(f, "PostgreSQL error: {e}"),
            ExecutorError::Statement(s) => write!(f, "Statement rejected: {s}"),
            ExecutorError::Conversion(s) => write!(f, "Value conversion failed: {s}"),
            ExecutorError::Other(s) => write!(f, "Executor failed: {s}"),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Postgres(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for ExecutorError {
    fn from(err: PostgresError) -> Self {
        ExecutorError::Postgres(err)
    }
}

/// Trait for running rendered statements
///
/// `sql` always uses `?` positional placeholders, matched left to right by `values`.
/// Implementations translate to their driver's placeholder syntax.
pub trait QueryExecutor {
    /// Row type handed back by `query_all`
    type Row: SqlRow;

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the query execution fails.
    fn query_all(&self, sql: &str, values: &[Value]) -> Result<Vec<Self::Row>, ExecutorError>;

    /// Execute a statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the statement execution fails.
    fn execute(&self, sql: &str, values: &[Value]) -> Result<u64, ExecutorError>;
}

/// Implementation of `QueryExecutor` for `may_postgres::Client`
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect and wrap the client in one step
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the connection string is invalid or the server
    /// cannot be reached.
    pub fn connect(url: &str) -> Result<Self, crate::connection::ConnectionError> {
        crate::connection::connect(url).map(Self::new)
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Consume the executor and return the underlying client
    pub fn into_client(self) -> Client {
        self.client
    }
}

impl QueryExecutor for MayPostgresExecutor {
    type Row = Row;

    fn query_all(&self, sql: &str, values: &[Value]) -> Result<Vec<Row>, ExecutorError> {
        let sql = numbered_placeholders(sql);
        with_converted_params(values, |params| Ok(self.client.query(sql.as_str(), params)?))
    }

    fn execute(&self, sql: &str, values: &[Value]) -> Result<u64, ExecutorError> {
        let sql = numbered_placeholders(sql);
        with_converted_params(values, |params| Ok(self.client.execute(sql.as_str(), params)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use std::error::Error;

    #[test]
    fn test_failure_reaches_caller_as_execution_failure() {
        let err: QueryError = ExecutorError::Statement("relation \"person\" does not exist".into()).into();
        match &err {
            QueryError::ExecutionFailure(ExecutorError::Statement(message)) => {
                assert!(message.contains("person"));
            }
            other => panic!("expected ExecutionFailure, got {other:?}"),
        }
        let source = err.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("Statement rejected: relation \"person\" does not exist")
        );
    }

    #[test]
    fn test_unconvertible_parameter_is_reported_before_the_driver() {
        let err = with_converted_params(&[Value::BigUnsigned(Some(u64::MAX))], |_| Ok(()));
        let err = err.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.starts_with("Value conversion failed"), "{err}");
    }

    #[test]
    fn test_only_driver_errors_have_a_source() {
        assert!(ExecutorError::Other("worker panicked".into()).source().is_none());
        assert!(ExecutorError::Conversion("u64 out of range".into()).source().is_none());
    }
}
