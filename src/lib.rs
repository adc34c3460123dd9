//! # sqlambda
//!
//! Typed closures to parameterized SQL, with a composable query builder on the
//! `may` coroutine runtime.
//!
//! Predicates and selectors are ordinary Rust closures over an entity's field
//! proxy. Each closure is quoted into an expression tree, checked against the
//! entity, rendered into a `?`-placeholder fragment and layered onto an
//! immutable query. Execution is blocking or coroutine based; the SQL is the
//! same either way.
//!
//! ```ignore
//! use sqlambda::{Database, Entity};
//!
//! #[derive(Entity)]
//! #[table_name = "person"]
//! struct Person {
//!     id: i64,
//!     age: i32,
//!     name: String,
//! }
//!
//! let db = Database::new(executor);
//! let query = Person::query()
//!     .filter(|p| p.age.gt(18))?
//!     .or_filter(|p| p.name.eq("Ann"))?;
//! // SELECT id, age, name FROM person WHERE (age > ?) OR (name = ?)
//! let people = query.all(&db)?;
//! ```

extern crate self as sqlambda;

pub mod config;
pub mod connection;
pub mod database;
pub mod entity;
pub mod error;
pub mod executor;
pub mod expr;
pub mod metrics;
pub mod query;
pub mod sql;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod value;

pub use config::DatabaseConfig;
pub use database::Database;
pub use entity::{ColumnDescriptor, ColumnIndex, Decode, Entity, FromRow, SqlRow, ValueRow};
pub use error::QueryError;
pub use executor::{ExecutorError, MayPostgresExecutor, QueryExecutor};
pub use expr::{Expr, ExpressionNode, IntoExpr, Introspector, Numeric, Textual};
pub use query::{
    AsyncQuery, Blocking, CancelToken, Coroutine, ExecutionStrategy, Order, ProjectionQuery,
    Query, QueryHandle, SqlStatement,
};
pub use sql::{Dialect, SqlFragment};
pub use value::{SqlType, SqlValue};

pub use sqlambda_derive::Entity;
