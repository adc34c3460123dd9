//! Single-expression queries.
//!
//! [`ProjectionQuery<E, T, S>`] is what [`Query::project`](crate::Query::project)
//! returns: the same descriptor with a selector in place of the column list,
//! yielding values of type `T` instead of entities. It keeps the fluent
//! composition methods so predicates can still be layered on after projecting.

use crate::database::Database;
use crate::entity::{Decode, Entity, SqlRow};
use crate::error::QueryError;
use crate::executor::QueryExecutor;
use crate::expr::Expr;
use crate::query::builder::{FetchMode, QueryBuilder, SqlStatement};
use crate::query::descriptor::{Order, QueryDescriptor};
use crate::query::execution::{at_most_one, Blocking, Coroutine, ExecutionStrategy};
use crate::query::facade::{count, exists, prepare, with_ordering, with_predicate};
use crate::sql::Connective;
use crate::value::{SqlType, SqlValue};
use std::fmt;
use std::marker::PhantomData;

pub struct ProjectionQuery<E, T, S = Blocking> {
    descriptor: QueryDescriptor,
    _marker: PhantomData<fn() -> (E, T, S)>,
}

impl<E, T, S> Clone for ProjectionQuery<E, T, S> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E, T, S> fmt::Debug for ProjectionQuery<E, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionQuery")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl<E: Entity, T: SqlValue, S: ExecutionStrategy> ProjectionQuery<E, T, S> {
    pub(crate) fn from_descriptor(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Static type of the projected expression.
    pub fn result_type(&self) -> SqlType {
        self.descriptor
            .projection()
            .map_or(T::SQL_TYPE, |p| p.result_type)
    }

    pub fn asynchronous(&self) -> ProjectionQuery<E, T, Coroutine> {
        ProjectionQuery::from_descriptor(self.descriptor.clone())
    }

    pub fn blocking(&self) -> ProjectionQuery<E, T, Blocking> {
        ProjectionQuery::from_descriptor(self.descriptor.clone())
    }

    /// # Errors
    ///
    /// `UnsupportedConstruct` or `TypeMismatch` if the closure body cannot be translated.
    pub fn filter<F>(&self, predicate: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&E::Fields) -> Expr<bool>,
    {
        with_predicate::<E, F>(&self.descriptor, Connective::And, predicate)
            .map(Self::from_descriptor)
    }

    /// # Errors
    ///
    /// `UnsupportedConstruct` or `TypeMismatch` if the closure body cannot be translated.
    pub fn or_filter<F>(&self, predicate: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&E::Fields) -> Expr<bool>,
    {
        with_predicate::<E, F>(&self.descriptor, Connective::Or, predicate)
            .map(Self::from_descriptor)
    }

    /// # Errors
    ///
    /// `UnsupportedConstruct` or `TypeMismatch` if the closure body cannot be translated.
    pub fn order_by<U, F>(&self, selector: F, order: Order) -> Result<Self, QueryError>
    where
        F: FnOnce(&E::Fields) -> Expr<U>,
    {
        with_ordering::<E, U, F>(&self.descriptor, selector, order).map(Self::from_descriptor)
    }

    pub fn limit(&self, limit: u64) -> Self {
        Self::from_descriptor(self.descriptor.with_limit(limit))
    }

    pub fn offset(&self, offset: u64) -> Self {
        Self::from_descriptor(self.descriptor.with_offset(offset))
    }

    pub fn to_statement(&self) -> SqlStatement {
        QueryBuilder::new(&self.descriptor).build(FetchMode::All)
    }

    /// Fetch the projected value of every matching row.
    pub fn all<Ex>(&self, db: &Database<Ex>) -> S::Output<Vec<T>>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
        T: Decode<Ex::Row>,
    {
        let statement = prepare(&self.descriptor, db.dialect(), |b| b.build(FetchMode::All));
        let db = db.clone();
        S::run(move |token| {
            let statement = statement?;
            let rows = db.fetch(&statement, token)?;
            token.check()?;
            rows.iter().map(|row| row.get_at::<T>(0)).collect()
        })
    }

    /// Fetch the projected value of at most one row.
    pub fn one<Ex>(&self, db: &Database<Ex>) -> S::Output<Option<T>>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
        T: Decode<Ex::Row>,
    {
        let statement = prepare(&self.descriptor, db.dialect(), |b| b.build(FetchMode::Single));
        let db = db.clone();
        S::run(move |token| {
            let statement = statement?;
            let rows = db.fetch(&statement, token)?;
            token.check()?;
            at_most_one(rows)?
                .map(|row| row.get_at::<T>(0))
                .transpose()
        })
    }

    pub fn count<Ex>(&self, db: &Database<Ex>) -> S::Output<u64>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
        i64: Decode<Ex::Row>,
    {
        count::<Ex, S>(&self.descriptor, db)
    }

    pub fn exists<Ex>(&self, db: &Database<Ex>) -> S::Output<bool>
    where
        Ex: QueryExecutor + Send + Sync + 'static,
    {
        exists::<Ex, S>(&self.descriptor, db)
    }
}
