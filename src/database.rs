//! Execution entry point.
//!
//! A [`Database`] pairs a [`QueryExecutor`] with the dialect queries are
//! rendered in and the logging policy. It is cheap to clone (the executor is
//! shared) and every terminal operation of a query takes one.

use crate::config::DatabaseConfig;
use crate::connection::ConnectionError;
use crate::entity::Entity;
use crate::error::QueryError;
use crate::executor::{ExecutorError, MayPostgresExecutor, QueryExecutor};
use crate::query::builder::SqlStatement;
use crate::query::execution::CancelToken;
use crate::query::facade::{AsyncQuery, Query};
use crate::sql::Dialect;
use log::{debug, info};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

pub struct Database<Ex> {
    executor: Arc<Ex>,
    dialect: Dialect,
    log_queries: bool,
}

impl<Ex> Clone for Database<Ex> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            dialect: self.dialect,
            log_queries: self.log_queries,
        }
    }
}

impl<Ex> fmt::Debug for Database<Ex> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect)
            .field("log_queries", &self.log_queries)
            .finish_non_exhaustive()
    }
}

impl Database<MayPostgresExecutor> {
    /// Connect to the configured PostgreSQL server.
    ///
    /// # Errors
    ///
    /// `UnsupportedDialect` unless the configured dialect is `generic` or
    /// `postgres`; otherwise as for [`connection::connect`](crate::connection::connect).
    pub fn connect(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        if !matches!(config.dialect, Dialect::Generic | Dialect::Postgres) {
            return Err(ConnectionError::UnsupportedDialect(config.dialect));
        }
        let executor = MayPostgresExecutor::connect(&config.url)?;
        Ok(Self::from_config(executor, config))
    }
}

impl<Ex: QueryExecutor> Database<Ex> {
    pub fn new(executor: Ex) -> Self {
        Self {
            executor: Arc::new(executor),
            dialect: Dialect::default(),
            log_queries: false,
        }
    }

    pub fn from_config(executor: Ex, config: &DatabaseConfig) -> Self {
        Self::new(executor)
            .with_dialect(config.dialect)
            .with_query_logging(config.log_queries)
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Log executed statements at info level instead of debug.
    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn executor(&self) -> &Ex {
        &self.executor
    }

    /// Blocking query over `E` rendered in this database's dialect.
    pub fn query<E: Entity>(&self) -> Query<E> {
        Query::with_dialect(self.dialect)
    }

    /// Coroutine query over `E` rendered in this database's dialect.
    pub fn query_async<E: Entity>(&self) -> AsyncQuery<E> {
        self.query::<E>().asynchronous()
    }

    /// Run a row-returning statement.
    ///
    /// # Errors
    ///
    /// `Cancelled` if `token` was cancelled beforehand; otherwise the executor's
    /// failure wrapped unchanged in `ExecutionFailure`.
    pub fn fetch(
        &self,
        statement: &SqlStatement,
        token: &CancelToken,
    ) -> Result<Vec<Ex::Row>, QueryError> {
        token.check()?;
        self.run(statement, |sql, values| self.executor.query_all(sql, values))
    }

    /// Run a statement and return the affected-row count.
    ///
    /// # Errors
    ///
    /// As for [`fetch`](Self::fetch).
    pub fn update(&self, statement: &SqlStatement, token: &CancelToken) -> Result<u64, QueryError> {
        token.check()?;
        self.run(statement, |sql, values| self.executor.execute(sql, values))
    }

    fn run<T, F>(&self, statement: &SqlStatement, f: F) -> Result<T, QueryError>
    where
        F: FnOnce(&str, &[sea_query::Value]) -> Result<T, ExecutorError>,
    {
        if self.log_queries {
            info!("Executing: {} {:?}", statement.sql, statement.values);
        } else {
            debug!("Executing: {} {:?}", statement.sql, statement.values);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(&statement.sql).entered();

        let start = Instant::now();
        let result = f(&statement.sql, &statement.values);
        let elapsed = start.elapsed();

        #[cfg(feature = "metrics")]
        {
            METRICS.record_query_duration(elapsed);
            if result.is_err() {
                METRICS.record_query_error();
            }
        }

        result.map_err(|e| {
            debug!("Statement failed after {elapsed:?}: {e}");
            QueryError::ExecutionFailure(e)
        })
    }
}
