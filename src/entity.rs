//! Entity descriptors and row mapping.
//!
//! An [`Entity`] names its table, lists its columns in declaration order and
//! hands out a field proxy: a struct of symbolic [`Expr`] columns that predicate
//! and selector closures are applied to. `#[derive(Entity)]` generates all of it.
//!
//! Rows come back from a [`QueryExecutor`](crate::QueryExecutor) as its own row
//! type; anything implementing [`SqlRow`] can be decoded column by column through
//! [`Decode`], which is what the generated [`FromRow`] impls do.

use crate::error::QueryError;
use crate::expr::Expr;
use crate::query::facade::{AsyncQuery, Query};
use crate::value::{SqlType, SqlValue};
use may_postgres::types::FromSqlOwned;
use sea_query::Value;

/// One mapped column, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name in the database
    pub name: &'static str,
    /// Rust field name on the entity
    pub field: &'static str,
    /// Type tag of the field's non-null values
    pub sql_type: SqlType,
    /// Whether the field is an `Option<_>`
    pub nullable: bool,
}

/// A mapped table.
pub trait Entity: Sized + Send + 'static {
    /// Field proxy handed to predicate and selector closures
    type Fields;

    /// Table the entity is stored in
    fn table_name() -> &'static str;

    /// Mapped columns, in declaration order
    fn columns() -> &'static [ColumnDescriptor];

    /// Symbolic columns bound to [`Entity::parameter_name`]
    fn fields() -> Self::Fields;

    /// Name of the closure parameter member accesses hang off.
    fn parameter_name() -> &'static str {
        Self::table_name()
    }

    /// Look a column up by its database name.
    fn column(name: &str) -> Option<&'static ColumnDescriptor> {
        Self::columns().iter().find(|c| c.name == name)
    }

    /// Start a blocking query over this entity.
    fn query() -> Query<Self> {
        Query::new()
    }

    /// Start a query whose terminal operations run on a coroutine.
    fn query_async() -> AsyncQuery<Self> {
        Query::new().asynchronous()
    }

    /// Symbolic column, used by generated field proxies.
    fn field<T: SqlValue>(column: &'static str) -> Expr<T> {
        Expr::column(Self::parameter_name(), column)
    }
}

/// Build an entity from a fetched row.
pub trait FromRow<R>: Sized {
    /// # Errors
    ///
    /// Returns `QueryError::Decode` if a column is missing or has the wrong type.
    fn from_row(row: &R) -> Result<Self, QueryError>;
}

/// Address of a column inside a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnIndex<'a> {
    Name(&'a str),
    Position(usize),
}

impl std::fmt::Display for ColumnIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnIndex::Name(name) => write!(f, "column {name}"),
            ColumnIndex::Position(idx) => write!(f, "column #{idx}"),
        }
    }
}

/// Decode a single column of row type `R` into `Self`.
pub trait Decode<R: ?Sized>: Sized {
    /// # Errors
    ///
    /// Returns `QueryError::Decode` if the column is missing or has the wrong type.
    fn decode(row: &R, index: ColumnIndex<'_>) -> Result<Self, QueryError>;
}

/// A fetched row.
pub trait SqlRow {
    /// Number of columns in the row
    fn column_count(&self) -> usize;

    /// Decode the column named `name`.
    fn get<T: Decode<Self>>(&self, name: &str) -> Result<T, QueryError> {
        T::decode(self, ColumnIndex::Name(name))
    }

    /// Decode the column at `idx`.
    fn get_at<T: Decode<Self>>(&self, idx: usize) -> Result<T, QueryError> {
        T::decode(self, ColumnIndex::Position(idx))
    }
}

impl SqlRow for may_postgres::Row {
    fn column_count(&self) -> usize {
        self.len()
    }
}

impl<T: FromSqlOwned> Decode<may_postgres::Row> for T {
    fn decode(row: &may_postgres::Row, index: ColumnIndex<'_>) -> Result<Self, QueryError> {
        let result = match index {
            ColumnIndex::Name(name) => row.try_get::<_, T>(name),
            ColumnIndex::Position(idx) => row.try_get::<_, T>(idx),
        };
        result.map_err(|e| QueryError::Decode(format!("Failed to decode {index}: {e}")))
    }
}

/// A row of plain `sea_query::Value`s, as produced by in-memory executors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueRow {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl ValueRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named column.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push(column.into());
        self.values.push(value.into());
        self
    }

    /// Single unnamed column, as returned by projections and aggregates.
    pub fn single(value: impl Into<Value>) -> Self {
        Self::new().with("?column?", value)
    }

    pub fn value(&self, index: ColumnIndex<'_>) -> Option<&Value> {
        match index {
            ColumnIndex::Name(name) => self
                .columns
                .iter()
                .position(|c| c == name)
                .and_then(|idx| self.values.get(idx)),
            ColumnIndex::Position(idx) => self.values.get(idx),
        }
    }
}

impl SqlRow for ValueRow {
    fn column_count(&self) -> usize {
        self.values.len()
    }
}

impl<T: SqlValue> Decode<ValueRow> for T {
    fn decode(row: &ValueRow, index: ColumnIndex<'_>) -> Result<Self, QueryError> {
        let value = row
            .value(index)
            .ok_or_else(|| QueryError::Decode(format!("{index} not present in row")))?;
        T::from_value(value.clone())
            .map_err(|e| QueryError::Decode(format!("Failed to decode {index}: {e}")))
    }
}
