//! Coroutine execution: handles, joins and cancellation.

use sea_query::Value;
use sqlambda::test_helpers::MockExecutor;
use sqlambda::{Database, Entity, ExecutorError, QueryError, QueryExecutor, ValueRow};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Entity, Debug, Clone, PartialEq)]
#[table_name = "person"]
pub struct Person {
    pub id: i64,
    pub age: i32,
    pub name: String,
}

fn person_row(id: i64, age: i32, name: &str) -> ValueRow {
    ValueRow::new()
        .with("id", id)
        .with("age", age)
        .with("name", name)
}

/// Executor that parks inside `query_all` until released.
#[derive(Default)]
struct GatedExecutor {
    started: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl QueryExecutor for GatedExecutor {
    type Row = ValueRow;

    fn query_all(&self, _sql: &str, _values: &[Value]) -> Result<Vec<ValueRow>, ExecutorError> {
        self.started.store(true, Ordering::SeqCst);
        while !self.released.load(Ordering::SeqCst) {
            may::coroutine::yield_now();
        }
        Ok(vec![person_row(1, 30, "Ann")])
    }

    fn execute(&self, _sql: &str, _values: &[Value]) -> Result<u64, ExecutorError> {
        Ok(0)
    }
}

#[test]
fn test_async_all_matches_blocking_sql() {
    let db = Database::new(
        MockExecutor::new()
            .with_rows(vec![person_row(1, 30, "Ann")])
            .with_rows(vec![person_row(1, 30, "Ann")]),
    );
    let query = Person::query().filter(|p| p.age.gt(18)).unwrap();

    let blocking = query.all(&db).unwrap();
    let handle = query.asynchronous().all(&db);
    let asynchronous = handle.join().unwrap();

    assert_eq!(blocking, asynchronous);
    let sql = db.executor().captured_sql();
    assert_eq!(sql.len(), 2);
    assert_eq!(sql[0], sql[1]);
}

#[test]
fn test_query_async_entry_point() {
    let db = Database::new(MockExecutor::new().with_rows(vec![ValueRow::single(5i64)]));
    let count = Person::query_async()
        .filter(|p| p.name.contains("an"))
        .unwrap()
        .count(&db)
        .join()
        .unwrap();
    assert_eq!(count, 5);
    assert_eq!(db.executor().captured()[0].values, vec![Value::from("%an%")]);
}

#[test]
fn test_async_projection_and_one() {
    let db = Database::new(
        MockExecutor::new()
            .with_rows(vec![ValueRow::single("Ann")])
            .with_rows(vec![person_row(1, 30, "Ann"), person_row(2, 31, "Bob")]),
    );
    let names = db
        .query_async::<Person>()
        .project(|p| p.name.upper())
        .unwrap()
        .all(&db)
        .join()
        .unwrap();
    assert_eq!(names, vec!["Ann".to_string()]);

    let err = db.query_async::<Person>().one(&db).join().unwrap_err();
    assert!(matches!(err, QueryError::CardinalityViolation { .. }));
}

#[test]
fn test_async_failure_is_reported_on_join() {
    let db = Database::new(MockExecutor::new().with_failure("deadlock detected"));
    let err = Person::query_async().delete(&db).join().unwrap_err();
    assert!(matches!(
        err,
        QueryError::ExecutionFailure(ExecutorError::Statement(_))
    ));
}

#[test]
fn test_cancel_while_executing() {
    let executor = GatedExecutor::default();
    let started = Arc::clone(&executor.started);
    let released = Arc::clone(&executor.released);
    let db = Database::new(executor);

    let handle = Person::query_async().all(&db);
    while !started.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }
    assert!(!handle.is_done());

    handle.cancel();
    released.store(true, Ordering::SeqCst);

    assert!(matches!(handle.join(), Err(QueryError::Cancelled)));
}

#[test]
fn test_cancel_token_is_shared_with_handle() {
    let db = Database::new(GatedExecutor::default());
    let handle = Person::query_async().all(&db);
    let token = handle.cancel_token();
    token.cancel();
    db.executor().released.store(true, Ordering::SeqCst);
    assert!(matches!(handle.join(), Err(QueryError::Cancelled)));
}
