//! Execution strategies.
//!
//! Composition and rendering always happen on the caller. A strategy only
//! decides *when* the execute-and-decode step runs:
//!
//! - [`Blocking`] runs it immediately and returns the `Result`.
//! - [`Coroutine`] spawns it on a `may` coroutine and returns a
//!   [`QueryHandle`] at once.
//!
//! Both hand the job a [`CancelToken`]; the job checks it before touching the
//! executor and again before decoding rows.

use crate::error::QueryError;
use crate::executor::ExecutorError;
use may::coroutine::JoinHandle;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Cooperative cancellation flag shared between a handle and its job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// `QueryError::Cancelled` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), QueryError> {
        if self.is_cancelled() {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// When the execute-and-decode step of a query runs.
pub trait ExecutionStrategy: Copy + Default + Send + Sync + 'static {
    /// What a terminal operation returns for a result of type `T`
    type Output<T: Send + 'static>;

    fn run<T, F>(job: F) -> Self::Output<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T, QueryError> + Send + 'static;
}

/// Execute on the calling coroutine or thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blocking;

impl ExecutionStrategy for Blocking {
    type Output<T: Send + 'static> = Result<T, QueryError>;

    fn run<T, F>(job: F) -> Self::Output<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T, QueryError> + Send + 'static,
    {
        job(&CancelToken::new())
    }
}

/// Execute on a freshly spawned `may` coroutine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coroutine;

impl ExecutionStrategy for Coroutine {
    type Output<T: Send + 'static> = QueryHandle<T>;

    fn run<T, F>(job: F) -> Self::Output<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T, QueryError> + Send + 'static,
    {
        let token = CancelToken::new();
        let job_token = token.clone();
        let queued = Instant::now();
        let handle = may::go!(move || {
            let waited = queued.elapsed();
            #[cfg(feature = "metrics")]
            METRICS.observe_async_wait(waited);
            log::trace!("Async query started after {waited:?}");
            job(&job_token)
        });
        QueryHandle { handle, token }
    }
}

/// Pending result of an asynchronous query.
pub struct QueryHandle<T> {
    handle: JoinHandle<Result<T, QueryError>>,
    token: CancelToken,
}

impl<T> QueryHandle<T> {
    /// Wait for the query and return its result.
    ///
    /// # Errors
    ///
    /// Whatever the query failed with, `QueryError::Cancelled` if it was
    /// cancelled before finishing, or `ExecutionFailure` if its coroutine panicked.
    pub fn join(self) -> Result<T, QueryError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => Err(QueryError::ExecutionFailure(ExecutorError::Other(format!(
                "query coroutine panicked: {}",
                panic_message(panic.as_ref())
            )))),
        }
    }

    /// `true` once the query has finished, successfully or not.
    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// Request cancellation. Takes effect at the next check point; a statement
    /// already sent to the database is not interrupted.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }
}

impl<T> std::fmt::Debug for QueryHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle")
            .field("done", &self.is_done())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Reduce the rows of a single-row fetch.
///
/// # Errors
///
/// `CardinalityViolation` if more than one row came back.
pub fn at_most_one<R>(rows: Vec<R>) -> Result<Option<R>, QueryError> {
    let actual = rows.len();
    if actual > 1 {
        return Err(QueryError::CardinalityViolation {
            expected: 1,
            actual,
        });
    }
    Ok(rows.into_iter().next())
}
