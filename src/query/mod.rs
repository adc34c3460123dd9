//! Query composition and execution.
//!
//! # Architecture
//!
//! - **Descriptor**: the immutable state a query owns (`QueryDescriptor`)
//! - **Builder**: assembles full statements from a descriptor (`QueryBuilder`)
//! - **Façade**: fluent entity queries (`Query`, `AsyncQuery`)
//! - **Projection**: single-expression queries (`ProjectionQuery`)
//! - **Execution**: blocking and coroutine strategies (`Blocking`, `Coroutine`)
//! - **Value Conversion**: `sea_query::Value` to `ToSql` parameter conversion
//!
//! # Examples
//!
//! ```ignore
//! use sqlambda::{Database, Entity, Order};
//!
//! let db = Database::new(executor);
//!
//! let adults = Person::query()
//!     .filter(|p| p.age.ge(18))?
//!     .order_by(|p| p.name.clone(), Order::Asc)?
//!     .all(&db)?;
//!
//! let handle = Person::query_async()
//!     .filter(|p| p.email.is_null())?
//!     .count(&db);
//! let missing_email = handle.join()?;
//! ```

pub mod builder;
pub mod descriptor;
pub mod execution;
pub mod facade;
pub mod projection;
pub(crate) mod value_conversion;

pub use builder::{FetchMode, QueryBuilder, SqlStatement};
pub use descriptor::{Order, Ordering, Projection, QueryDescriptor};
pub use execution::{at_most_one, Blocking, CancelToken, Coroutine, ExecutionStrategy, QueryHandle};
pub use facade::{AsyncQuery, Query};
pub use projection::ProjectionQuery;
