//! The fluent query façade.
//!
//! [`Query<E, S>`] is an immutable builder over entity `E`: every composition
//! method borrows the receiver and returns a new query, so a partially built
//! query can be reused as a template for several branches. Predicate and
//! selector closures are compiled and rendered at the call that receives them,
//! which is also where composition errors surface.
//!
//! The strategy parameter `S` decides how terminal operations run. `Query<E>`
//! blocks and returns `Result`s; [`AsyncQuery<E>`] returns
//! [`QueryHandle`](crate::query::QueryHandle)s. The SQL is identical.
//!
//! ```ignore
//! let adults = Person::query().filter(|p| p.age.gt(18))?;
//! let named_ann = adults.or_filter(|p| p.name.eq("Ann"))?.all(&db)?;
//! let names: Vec<String> = adults.project(|p| p.name.clone())?.all(&db)?;
//! ```

use crate::database::Database;
use crate::entity::{Decode, Entity, FromRow, SqlRow};
use crate::error::QueryError;
use crate::executor::QueryExecutor;
use crate::expr::{compile_predicate, compile_selector, Expr};
use crate::query::builder::{FetchMode, QueryBuilder, SqlStatement};
use crate::query::descriptor::{Order, Ordering, Projection, QueryDescriptor};
use crate::query::execution::{at_most_one, Blocking, Coroutine, ExecutionStrategy};
use crate::query::projection::ProjectionQuery;
use crate::sql::{Connective, Dialect, Renderer};
use crate::value::{SqlType, SqlValue};
use std::fmt;
use std::marker::PhantomData;

/// Query over `E` executed with strategy `S`.
pub struct Query<E, S = Blocking> {
    descriptor: QueryDescriptor,
    _marker: PhantomData<fn() -> (E, S)>,
}

/// Query whose terminal operations run on a coroutine.
pub type AsyncQuery<E> = Query<E, Coroutine>;

impl<E, S> Clone for Query<E, S> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E, S> fmt::Debug for Query<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl<E: Entity> Query<E> {
    /// Blocking query rendered in the generic dialect.
    pub fn new() -> Self {
        Self::with_dialect(Dialect::default())
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self::from_descriptor(QueryDescriptor::for_entity::<E>(dialect))
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity, S: ExecutionStrategy> Query<E, S> {
    pub(crate) fn from_descriptor(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn dialect(&self) -> Dialect {
        self.descriptor.dialect()
    }

    /// The same query with coroutine execution.
    pub fn asynchronous(&self) -> Query<E, Coroutine> {
        Query::from_descriptor(self.descriptor.clone())
    }

    /// The same query with blocking execution.
    pub fn blocking(&self) -> Query<E, Blocking> {
        Query::from_descriptor(self.descriptor.clone())
    }

    /// AND a predicate onto the query.
    ///
    /// # Errors
    ///
    /// `UnsupportedConstruct` or `TypeMismatch` if the closure body cannot be
    /// translated; the receiver is unaffected either way.
    pub fn filter<F>(&self, predicate: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&E::Fields) -> Expr<bool>,
    {
        self.combine(Connective::And, predicate)
    }

    /// OR a predicate onto the query.
    ///
    /// # Errors
    ///
    /// As for [`filter`](Self::filter).
    pub fn or_filter<F>(&self, predicate: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&E::Fields) -> Expr<bool>,
    {
        self.combine(Connective::Or, predicate)
    }

    fn combine<F>(&self, connective: Connective, predicate: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&E::Fields) -> Expr<bool>,
    {
        let descriptor = with_predicate::<E, F>(&self.descriptor, connective, predicate)?;
        Ok(Self::from_descriptor(descriptor))
    }

    /// Select a single expression instead of whole entities.
    ///
    /// # Errors
    ///
    /// As for [`filter`](Self::filter).
    pub fn project<T, F>(&self, selector: F) -> Result<ProjectionQuery<E, T, S>, QueryError>
    where
        T: SqlValue,
        F: FnOnce(&E::Fields) -> Expr<T>,
    {
        let (node, result_type) = compile_selector::<E, T, F>(selector)?;
        if result_type != T::SQL_TYPE && result_type != SqlType::Null {
            return Err(QueryError::type_mismatch("projection", result_type, T::SQL_TYPE));
        }
        let fragment = Renderer::new(self.dialect()).render(&node)?;
        let descriptor = self.descriptor.with_projection(Projection {
            node,
            fragment,
            result_type,
        });
        Ok(ProjectionQuery::from_descriptor(descriptor))
    }

    /// Append an `ORDER BY` term. Terms apply in call order.
    ///
    /// # Errors
    ///
    /// As for [`filter`](Self::filter).
    pub fn order_by<T, F>(&self, selector: F, order: Order) -> Result<Self, QueryError>
    where
        F: FnOnce(&E::Fields) -> Expr<T>,
    {
        let descriptor = with_ordering::<E, T, F>(&self.descriptor, selector, order)?;
        Ok(Self::from_descriptor(descriptor))
    }

    pub fn limit(&self, limit: u64) -> Self {
        Self::from_descriptor(self.descriptor.with_limit(limit))
    }

    pub fn offset(&self, offset: u64) -> Self {
        Self::from_descriptor(self.descriptor.with_offset(offset))
    }

    /// The statement [`all`](Self::all) would run against a database of this
    /// query's dialect.
    pub fn to_statement(&self) -> SqlStatement {
        QueryBuilder::new(&self.descriptor).build(FetchMode::All)
    }

    /// Fetch every matching entity.
    pub fn all<Ex>(&self, db: &Database<Ex>) -> S::Output<Vec<E>>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
        E: FromRow<Ex::Row>,
    {
        let statement = prepare(&self.descriptor, db.dialect(), |b| b.build(FetchMode::All));
        let db = db.clone();
        S::run(move |token| {
            let statement = statement?;
            let rows = db.fetch(&statement, token)?;
            token.check()?;
            rows.iter().map(E::from_row).collect()
        })
    }

    /// Fetch at most one entity.
    ///
    /// No match is `Ok(None)`; more than one is `CardinalityViolation`.
    pub fn one<Ex>(&self, db: &Database<Ex>) -> S::Output<Option<E>>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
        E: FromRow<Ex::Row>,
    {
        let statement = prepare(&self.descriptor, db.dialect(), |b| b.build(FetchMode::Single));
        let db = db.clone();
        S::run(move |token| {
            let statement = statement?;
            let rows = db.fetch(&statement, token)?;
            token.check()?;
            at_most_one(rows)?.as_ref().map(E::from_row).transpose()
        })
    }

    /// Number of matching rows, ignoring ordering and row limits.
    pub fn count<Ex>(&self, db: &Database<Ex>) -> S::Output<u64>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
        i64: Decode<Ex::Row>,
    {
        count::<Ex, S>(&self.descriptor, db)
    }

    /// Whether any row matches.
    pub fn exists<Ex>(&self, db: &Database<Ex>) -> S::Output<bool>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
    {
        exists::<Ex, S>(&self.descriptor, db)
    }

    /// Delete every matching row and return how many were affected.
    ///
    /// Without any predicate this empties the table.
    pub fn delete<Ex>(&self, db: &Database<Ex>) -> S::Output<u64>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
    {
        if self.descriptor.predicate().is_empty() {
            log::warn!(
                "Deleting every row of {}: the query has no predicate",
                self.descriptor.table()
            );
        }
        let statement = prepare(&self.descriptor, db.dialect(), |b| b.build_delete());
        let db = db.clone();
        S::run(move |token| db.update(&statement?, token))
    }
}

/// Build a statement from `descriptor` rendered for the database's dialect.
pub(crate) fn prepare<B>(
    descriptor: &QueryDescriptor,
    dialect: Dialect,
    build: B,
) -> Result<SqlStatement, QueryError>
where
    B: FnOnce(&QueryBuilder<'_>) -> SqlStatement,
{
    let descriptor = descriptor.for_dialect(dialect)?;
    Ok(build(&QueryBuilder::new(&descriptor)))
}

pub(crate) fn with_predicate<E, F>(
    descriptor: &QueryDescriptor,
    connective: Connective,
    predicate: F,
) -> Result<QueryDescriptor, QueryError>
where
    E: Entity,
    F: FnOnce(&E::Fields) -> Expr<bool>,
{
    let node = compile_predicate::<E, F>(predicate)?;
    let fragment = Renderer::new(descriptor.dialect()).render_predicate(&node)?;
    Ok(descriptor.with_predicate(connective, node, fragment))
}

pub(crate) fn with_ordering<E, T, F>(
    descriptor: &QueryDescriptor,
    selector: F,
    order: Order,
) -> Result<QueryDescriptor, QueryError>
where
    E: Entity,
    F: FnOnce(&E::Fields) -> Expr<T>,
{
    let (node, _) = compile_selector::<E, T, F>(selector)?;
    let fragment = Renderer::new(descriptor.dialect()).render(&node)?;
    Ok(descriptor.with_ordering(Ordering {
        node,
        fragment,
        order,
    }))
}

pub(crate) fn count<Ex, S>(descriptor: &QueryDescriptor, db: &Database<Ex>) -> S::Output<u64>
where
    Ex: QueryExecutor + Send + Sync + 'static,
    S: ExecutionStrategy,
    i64: Decode<Ex::Row>,
{
    let statement = prepare(descriptor, db.dialect(), |b| b.build_count());
    let db = db.clone();
    S::run(move |token| {
        let statement = statement?;
        let rows = db.fetch(&statement, token)?;
        token.check()?;
        let row = rows.first().ok_or_else(|| QueryError::CardinalityViolation {
            expected: 1,
            actual: 0,
        })?;
        let count: i64 = row.get_at(0)?;
        u64::try_from(count)
            .map_err(|_| QueryError::Decode(format!("Count cannot be negative: {count}")))
    })
}

pub(crate) fn exists<Ex, S>(descriptor: &QueryDescriptor, db: &Database<Ex>) -> S::Output<bool>
where
    Ex: QueryExecutor + Send + Sync + 'static,
    S: ExecutionStrategy,
{
    let statement = prepare(descriptor, db.dialect(), |b| b.build_exists());
    let db = db.clone();
    S::run(move |token| Ok(!db.fetch(&statement?, token)?.is_empty()))
}
