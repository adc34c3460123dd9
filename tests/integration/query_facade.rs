//! End-to-end tests for the blocking query façade against `MockExecutor`.

use sea_query::Value;
use sqlambda::test_helpers::MockExecutor;
use sqlambda::{Database, Dialect, Entity, ExecutorError, Expr, Order, QueryError, ValueRow};

#[derive(Entity, Debug, Clone, PartialEq)]
#[table_name = "person"]
pub struct Person {
    pub id: i64,
    pub age: i32,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Entity, Debug, Clone, PartialEq)]
#[table_name = "order"]
pub struct Purchase {
    pub id: i64,
    pub total: i64,
}

const SELECT_PERSON: &str = "SELECT id, age, name, email FROM person";

fn person_row(id: i64, age: i32, name: &str) -> ValueRow {
    ValueRow::new()
        .with("id", id)
        .with("age", age)
        .with("name", name)
        .with("email", Value::String(None))
}

#[test]
fn test_filter_renders_parameterized_where() {
    let db = Database::new(MockExecutor::new().with_rows(vec![person_row(1, 30, "Ann")]));
    let people = Person::query()
        .filter(|p| p.age.gt(18))
        .unwrap()
        .all(&db)
        .unwrap();

    assert_eq!(people.len(), 1);
    assert_eq!(people[0].name, "Ann");
    let captured = db.executor().captured();
    assert_eq!(captured[0].sql, format!("{SELECT_PERSON} WHERE (age > ?)"));
    assert_eq!(captured[0].values, vec![Value::from(18)]);
}

#[test]
fn test_or_filter_keeps_segments_apart() {
    let statement = Person::query()
        .filter(|p| p.age.gt(18))
        .unwrap()
        .or_filter(|p| p.name.eq("Ann"))
        .unwrap()
        .to_statement();

    assert_eq!(
        statement.sql,
        format!("{SELECT_PERSON} WHERE (age > ?) OR (name = ?)")
    );
    assert_eq!(statement.values, vec![Value::from(18), Value::from("Ann")]);
}

#[test]
fn test_and_binds_tighter_than_or() {
    let statement = Person::query()
        .filter(|p| p.age.gt(18))
        .unwrap()
        .or_filter(|p| p.name.eq("Ann"))
        .unwrap()
        .filter(|p| p.id.ne(7))
        .unwrap()
        .to_statement();

    assert_eq!(
        statement.sql,
        format!("{SELECT_PERSON} WHERE (age > ?) OR (name = ? AND id <> ?)")
    );
    assert_eq!(
        statement.values,
        vec![Value::from(18), Value::from("Ann"), Value::from(7i64)]
    );
}

#[test]
fn test_null_comparison_renders_is_null() {
    let statement = Person::query()
        .filter(|p| p.email.is_null())
        .unwrap()
        .to_statement();
    assert_eq!(statement.sql, format!("{SELECT_PERSON} WHERE (email IS NULL)"));
    assert!(statement.values.is_empty());
}

#[test]
fn test_projection() {
    let db = Database::new(
        MockExecutor::new().with_rows(vec![ValueRow::single("Ann"), ValueRow::single("Bob")]),
    );
    let names = Person::query()
        .project(|p| p.name.clone())
        .unwrap()
        .all(&db)
        .unwrap();

    assert_eq!(names, vec!["Ann".to_string(), "Bob".to_string()]);
    assert_eq!(db.executor().captured_sql(), vec!["SELECT name FROM person"]);
}

#[test]
fn test_projection_values_precede_where_values() {
    let statement = Person::query()
        .filter(|p| p.age.lt(65))
        .unwrap()
        .project(|p| &p.age + 1)
        .unwrap()
        .to_statement();
    assert_eq!(statement.sql, "SELECT age + ? FROM person WHERE (age < ?)");
    assert_eq!(statement.values, vec![Value::from(1), Value::from(65)]);
}

#[test]
fn test_ordering_and_limits() {
    let statement = Person::query()
        .filter(|p| p.name.starts_with("A"))
        .unwrap()
        .order_by(|p| p.age.clone(), Order::Desc)
        .unwrap()
        .order_by(|p| p.name.clone(), Order::Asc)
        .unwrap()
        .limit(10)
        .offset(20)
        .to_statement();

    assert_eq!(
        statement.sql,
        format!(
            "{SELECT_PERSON} WHERE (name LIKE ? ESCAPE '\\') ORDER BY age DESC, name ASC LIMIT 10 OFFSET 20"
        )
    );
    assert_eq!(statement.values, vec![Value::from("A%")]);
}

#[test]
fn test_rendering_is_idempotent_and_templates_are_reusable() {
    let adults = Person::query().filter(|p| p.age.ge(18)).unwrap();
    let named = adults.filter(|p| p.name.eq("Ann")).unwrap();
    let either = adults.or_filter(|p| p.email.is_not_null()).unwrap();

    assert_eq!(adults.to_statement(), adults.to_statement());
    assert_eq!(
        adults.to_statement().sql,
        format!("{SELECT_PERSON} WHERE (age >= ?)")
    );
    assert_eq!(
        named.to_statement().sql,
        format!("{SELECT_PERSON} WHERE (age >= ? AND name = ?)")
    );
    assert_eq!(
        either.to_statement().sql,
        format!("{SELECT_PERSON} WHERE (age >= ?) OR (email IS NOT NULL)")
    );
}

#[test]
fn test_constant_subexpressions_are_folded() {
    let statement = Person::query()
        .filter(|p| p.age.gt(Expr::val(10i32) + 8))
        .unwrap()
        .to_statement();
    assert_eq!(statement.sql, format!("{SELECT_PERSON} WHERE (age > ?)"));
    assert_eq!(statement.values, vec![Value::from(18)]);
}

#[test]
fn test_unsupported_construct_leaves_query_untouched() {
    let base = Person::query().filter(|p| p.age.gt(18)).unwrap();
    let err = base
        .filter(|p| Expr::<bool>::call("soundex", vec![p.name.node().clone()]))
        .unwrap_err();

    assert!(matches!(err, QueryError::UnsupportedConstruct(_)));
    assert_eq!(base.to_statement().sql, format!("{SELECT_PERSON} WHERE (age > ?)"));
}

#[test]
fn test_one_returns_none_for_no_rows() {
    let db = Database::new(MockExecutor::new());
    let found = Person::query()
        .filter(|p| p.id.eq(1))
        .unwrap()
        .one(&db)
        .unwrap();

    assert_eq!(found, None);
    assert_eq!(
        db.executor().captured_sql(),
        vec![format!("{SELECT_PERSON} WHERE (id = ?) LIMIT 2")]
    );
}

#[test]
fn test_one_rejects_two_rows() {
    let db = Database::new(
        MockExecutor::new().with_rows(vec![person_row(1, 30, "Ann"), person_row(2, 40, "Ann")]),
    );
    let err = Person::query()
        .filter(|p| p.name.eq("Ann"))
        .unwrap()
        .one(&db)
        .unwrap_err();

    assert!(matches!(
        err,
        QueryError::CardinalityViolation {
            expected: 1,
            actual: 2
        }
    ));
}

#[test]
fn test_executor_failure_is_propagated_unchanged() {
    let db = Database::new(MockExecutor::new().with_failure("connection reset"));
    let err = Person::query().all(&db).unwrap_err();
    match err {
        QueryError::ExecutionFailure(ExecutorError::Statement(message)) => {
            assert_eq!(message, "connection reset")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_decode_failure() {
    let db = Database::new(MockExecutor::new().with_rows(vec![ValueRow::new().with("id", 1i64)]));
    let err = Person::query().all(&db).unwrap_err();
    assert!(matches!(err, QueryError::Decode(_)));
}

#[test]
fn test_count_ignores_ordering_and_limits() {
    let db = Database::new(MockExecutor::new().with_rows(vec![ValueRow::single(3i64)]));
    let count = Person::query()
        .filter(|p| p.age.gt(18))
        .unwrap()
        .order_by(|p| p.name.clone(), Order::Asc)
        .unwrap()
        .limit(1)
        .count(&db)
        .unwrap();

    assert_eq!(count, 3);
    assert_eq!(
        db.executor().captured_sql(),
        vec!["SELECT COUNT(*) FROM person WHERE (age > ?)"]
    );
}

#[test]
fn test_exists() {
    let db = Database::new(
        MockExecutor::new()
            .with_rows(vec![ValueRow::single(1)])
            .with_rows(Vec::new()),
    );
    let query = Person::query().filter(|p| p.age.gt(100)).unwrap();

    assert!(query.exists(&db).unwrap());
    assert!(!query.exists(&db).unwrap());
    assert_eq!(
        db.executor().captured_sql()[0],
        "SELECT 1 FROM person WHERE (age > ?) LIMIT 1"
    );
}

#[test]
fn test_delete() {
    let db = Database::new(MockExecutor::new().with_affected(2));
    let affected = Person::query()
        .filter(|p| p.age.lt(18))
        .unwrap()
        .delete(&db)
        .unwrap();

    assert_eq!(affected, 2);
    let captured = db.executor().captured();
    assert_eq!(captured[0].sql, "DELETE FROM person WHERE (age < ?)");
    assert_eq!(captured[0].values, vec![Value::from(18)]);
}

#[test]
fn test_database_dialect_applies_to_queries() {
    let db = Database::new(MockExecutor::new()).with_dialect(Dialect::SqlServer);
    let statement = db
        .query::<Person>()
        .filter(|p| p.name.eq("Ann"))
        .unwrap()
        .to_statement();
    assert_eq!(
        statement.sql,
        "SELECT id, age, name, email FROM person WHERE (name = ?)"
    );

    db.query::<Person>().one(&db).unwrap();
    assert_eq!(
        db.executor().captured_sql(),
        vec!["SELECT TOP 2 id, age, name, email FROM person"]
    );
}

#[test]
fn test_query_is_rendered_for_the_database_it_runs_on() {
    let query = Person::query().filter(|p| p.name.eq("Ann")).unwrap().limit(5);
    assert_eq!(
        query.to_statement().sql,
        format!("{SELECT_PERSON} WHERE (name = ?) LIMIT 5")
    );

    let db = Database::new(MockExecutor::new()).with_dialect(Dialect::SqlServer);
    query.all(&db).unwrap();
    let captured = db.executor().captured();
    assert_eq!(
        captured[0].sql,
        "SELECT TOP 5 id, age, name, email FROM person WHERE (name = ?)"
    );
    assert_eq!(captured[0].values, vec![Value::from("Ann")]);
}

#[test]
fn test_reserved_table_is_quoted_for_the_running_dialect() {
    let query = Purchase::query()
        .filter(|o| o.total.gt(100i64))
        .unwrap()
        .order_by(|o| o.id.clone(), Order::Desc)
        .unwrap();

    let mysql = Database::new(
        MockExecutor::new()
            .with_rows(Vec::new())
            .with_rows(vec![ValueRow::single(4i64)]),
    )
    .with_dialect(Dialect::MySql);
    assert_eq!(query.one(&mysql).unwrap(), None);
    assert_eq!(query.count(&mysql).unwrap(), 4);
    assert_eq!(
        mysql.executor().captured_sql(),
        vec![
            "SELECT id, total FROM `order` WHERE (total > ?) ORDER BY id DESC LIMIT 2",
            "SELECT COUNT(*) FROM `order` WHERE (total > ?)",
        ]
    );

    let sql_server = Database::new(MockExecutor::new()).with_dialect(Dialect::SqlServer);
    query.delete(&sql_server).unwrap();
    assert_eq!(
        sql_server.executor().captured_sql(),
        vec!["DELETE FROM [order] WHERE (total > ?)"]
    );
}

#[test]
fn test_constant_predicate_on_sql_server() {
    let db = Database::new(MockExecutor::new()).with_dialect(Dialect::SqlServer);
    Person::query()
        .filter(|_| Expr::val(1i32).lt(2))
        .unwrap()
        .exists(&db)
        .unwrap();
    let captured = db.executor().captured();
    assert_eq!(captured[0].sql, "SELECT TOP 1 1 FROM person WHERE (1 = 1)");
    assert!(captured[0].values.is_empty());
}
