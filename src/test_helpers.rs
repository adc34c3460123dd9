//! In-memory executor for tests.
//!
//! [`MockExecutor`] records every statement it receives and answers from a
//! queue of scripted responses. With the queue empty, queries return no rows
//! and updates affect none.

use crate::entity::ValueRow;
use crate::executor::{ExecutorError, QueryExecutor};
use sea_query::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A statement as the executor received it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
enum MockResponse {
    Rows(Vec<ValueRow>),
    Affected(u64),
    Failure(String),
}

#[derive(Debug, Default)]
pub struct MockExecutor {
    captured: Arc<Mutex<Vec<CapturedStatement>>>,
    responses: Mutex<VecDeque<MockResponse>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows returned by the next query.
    pub fn with_rows(self, rows: Vec<ValueRow>) -> Self {
        lock(&self.responses).push_back(MockResponse::Rows(rows));
        self
    }

    /// Queue the affected-row count of the next statement.
    pub fn with_affected(self, count: u64) -> Self {
        lock(&self.responses).push_back(MockResponse::Affected(count));
        self
    }

    /// Make the next statement fail with `ExecutorError::Statement(message)`.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        lock(&self.responses).push_back(MockResponse::Failure(message.into()));
        self
    }

    /// Shared handle to the captured statements.
    pub fn captured_handle(&self) -> Arc<Mutex<Vec<CapturedStatement>>> {
        Arc::clone(&self.captured)
    }

    pub fn captured(&self) -> Vec<CapturedStatement> {
        lock(&self.captured).clone()
    }

    pub fn captured_sql(&self) -> Vec<String> {
        lock(&self.captured).iter().map(|s| s.sql.clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.captured).clear();
    }

    fn capture(&self, sql: &str, values: &[Value]) -> Option<MockResponse> {
        lock(&self.captured).push(CapturedStatement {
            sql: sql.to_string(),
            values: values.to_vec(),
        });
        lock(&self.responses).pop_front()
    }
}

impl QueryExecutor for MockExecutor {
    type Row = ValueRow;

    fn query_all(&self, sql: &str, values: &[Value]) -> Result<Vec<ValueRow>, ExecutorError> {
        match self.capture(sql, values) {
            Some(MockResponse::Rows(rows)) => Ok(rows),
            Some(MockResponse::Failure(message)) => Err(ExecutorError::Statement(message)),
            Some(MockResponse::Affected(_)) => Err(ExecutorError::Other(
                "MockExecutor: an affected-row count was scripted for a query".to_string(),
            )),
            None => Ok(Vec::new()),
        }
    }

    fn execute(&self, sql: &str, values: &[Value]) -> Result<u64, ExecutorError> {
        match self.capture(sql, values) {
            Some(MockResponse::Affected(count)) => Ok(count),
            Some(MockResponse::Failure(message)) => Err(ExecutorError::Statement(message)),
            Some(MockResponse::Rows(_)) => Err(ExecutorError::Other(
                "MockExecutor: rows were scripted for an update".to_string(),
            )),
            None => Ok(0),
        }
    }
}
