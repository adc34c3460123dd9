//! Statement assembly.
//!
//! Builds complete statements from a [`QueryDescriptor`]. Building is a pure
//! read of the descriptor: the same descriptor always yields byte-identical
//! SQL and the same bound values.

use crate::query::descriptor::QueryDescriptor;
use crate::sql::{Dialect, Embedding};
use sea_query::Value;
use std::fmt;

/// How many rows the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    All,
    /// At most one row. Two are fetched so that "more than one" is detectable.
    Single,
}

/// Rows fetched in [`FetchMode::Single`].
pub const SINGLE_ROW_FETCH: u64 = 2;

/// Final SQL text with `?` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

pub struct QueryBuilder<'a> {
    descriptor: &'a QueryDescriptor,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(descriptor: &'a QueryDescriptor) -> Self {
        Self { descriptor }
    }

    fn dialect(&self) -> Dialect {
        self.descriptor.dialect()
    }

    fn table(&self) -> String {
        self.dialect().quote_identifier(self.descriptor.table())
    }

    /// `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...] [row limit]`
    ///
    /// Bound values come in projection, WHERE, ORDER BY order.
    pub fn build(&self, mode: FetchMode) -> SqlStatement {
        let dialect = self.dialect();
        let limit = match mode {
            FetchMode::All => self.descriptor.limit(),
            FetchMode::Single => Some(
                self.descriptor
                    .limit()
                    .map_or(SINGLE_ROW_FETCH, |n| n.min(SINGLE_ROW_FETCH)),
            ),
        };
        let offset = self.descriptor.offset();

        let mut sql = String::from("SELECT ");
        let mut values = Vec::new();

        if let Some(top) = dialect.top_clause(limit, offset) {
            sql.push_str(&top);
        }
        match self.descriptor.projection() {
            Some(projection) => {
                sql.push_str(projection.fragment.text());
                values.extend_from_slice(projection.fragment.values());
            }
            None => {
                let columns = self
                    .descriptor
                    .columns()
                    .iter()
                    .map(|c| dialect.quote_identifier(c.name))
                    .collect::<Vec<_>>();
                sql.push_str(&columns.join(", "));
            }
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.table());
        self.push_where(&mut sql, &mut values);

        let ordering = self.descriptor.ordering();
        if !ordering.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, term) in ordering.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(term.fragment.text());
                sql.push(' ');
                sql.push_str(term.order.keyword());
                values.extend_from_slice(term.fragment.values());
            }
        }

        if let Some(clause) = dialect.limit_clause(limit, offset, !ordering.is_empty()) {
            sql.push_str(&clause);
        }

        SqlStatement { sql, values }
    }

    /// `SELECT COUNT(*) FROM <table> [WHERE ...]`
    ///
    /// Projection, ordering and row limits do not change how many rows match,
    /// so they are left out.
    pub fn build_count(&self) -> SqlStatement {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table());
        let mut values = Vec::new();
        self.push_where(&mut sql, &mut values);
        SqlStatement { sql, values }
    }

    /// `SELECT 1 FROM <table> [WHERE ...]` limited to one row.
    pub fn build_exists(&self) -> SqlStatement {
        let dialect = self.dialect();
        let mut sql = String::from("SELECT ");
        if let Some(top) = dialect.top_clause(Some(1), None) {
            sql.push_str(&top);
        }
        sql.push_str("1 FROM ");
        sql.push_str(&self.table());
        let mut values = Vec::new();
        self.push_where(&mut sql, &mut values);
        if let Some(clause) = dialect.limit_clause(Some(1), None, false) {
            sql.push_str(&clause);
        }
        SqlStatement { sql, values }
    }

    /// `DELETE FROM <table> [WHERE ...]`
    pub fn build_delete(&self) -> SqlStatement {
        let mut sql = format!("DELETE FROM {}", self.table());
        let mut values = Vec::new();
        self.push_where(&mut sql, &mut values);
        SqlStatement { sql, values }
    }

    fn push_where(&self, sql: &mut String, values: &mut Vec<Value>) {
        if let Some(condition) = self.descriptor.predicate().render(Embedding::TopLevel) {
            sql.push_str(" WHERE ");
            sql.push_str(condition.text());
            values.extend_from_slice(condition.values());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ColumnDescriptor;
    use crate::expr::Expr;
    use crate::query::descriptor::{Order, Ordering, Projection};
    use crate::sql::{Connective, Renderer};
    use crate::value::SqlType;

    const COLUMNS: &[ColumnDescriptor] = &[
        ColumnDescriptor {
            name: "id",
            field: "id",
            sql_type: SqlType::Integer,
            nullable: false,
        },
        ColumnDescriptor {
            name: "age",
            field: "age",
            sql_type: SqlType::Integer,
            nullable: false,
        },
        ColumnDescriptor {
            name: "name",
            field: "name",
            sql_type: SqlType::Text,
            nullable: false,
        },
    ];

    fn descriptor(dialect: Dialect) -> QueryDescriptor {
        QueryDescriptor::new("person", COLUMNS, dialect)
    }

    fn age() -> Expr<i32> {
        Expr::column("person", "age")
    }

    fn name() -> Expr<String> {
        Expr::column("person", "name")
    }

    fn filtered(dialect: Dialect) -> QueryDescriptor {
        let node = age().gt(18).into_node();
        let fragment = Renderer::new(dialect).render_predicate(&node).unwrap();
        descriptor(dialect).with_predicate(Connective::And, node, fragment)
    }

    #[test]
    fn test_select_all_columns() {
        let statement = QueryBuilder::new(&descriptor(Dialect::Generic)).build(FetchMode::All);
        assert_eq!(statement.sql, "SELECT id, age, name FROM person");
        assert!(statement.values.is_empty());
    }

    #[test]
    fn test_select_with_where() {
        let statement = QueryBuilder::new(&filtered(Dialect::Generic)).build(FetchMode::All);
        assert_eq!(statement.sql, "SELECT id, age, name FROM person WHERE (age > ?)");
        assert_eq!(statement.values, vec![Value::Int(Some(18))]);
    }

    #[test]
    fn test_single_mode_fetches_two_rows() {
        let statement = QueryBuilder::new(&filtered(Dialect::Generic)).build(FetchMode::Single);
        assert_eq!(
            statement.sql,
            "SELECT id, age, name FROM person WHERE (age > ?) LIMIT 2"
        );

        let statement = QueryBuilder::new(&filtered(Dialect::SqlServer)).build(FetchMode::Single);
        assert_eq!(
            statement.sql,
            "SELECT TOP 2 id, age, name FROM person WHERE (age > ?)"
        );
    }

    #[test]
    fn test_single_mode_respects_smaller_limit() {
        let statement =
            QueryBuilder::new(&descriptor(Dialect::Generic).with_limit(1)).build(FetchMode::Single);
        assert!(statement.sql.ends_with("LIMIT 1"));
    }

    #[test]
    fn test_value_order_is_projection_where_order_by() {
        let renderer = Renderer::default();
        let selected = (&age() + 1).into_node();
        let sorted = (&age() * 2).into_node();
        let projection = Projection {
            fragment: renderer.render(&selected).unwrap(),
            node: selected,
            result_type: SqlType::Integer,
        };
        let ordering = Ordering {
            fragment: renderer.render(&sorted).unwrap(),
            node: sorted,
            order: Order::Desc,
        };
        let descriptor = filtered(Dialect::Generic)
            .with_projection(projection)
            .with_ordering(ordering)
            .with_limit(10)
            .with_offset(20);

        let statement = QueryBuilder::new(&descriptor).build(FetchMode::All);
        assert_eq!(
            statement.sql,
            "SELECT age + ? FROM person WHERE (age > ?) ORDER BY age * ? DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            statement.values,
            vec![Value::Int(Some(1)), Value::Int(Some(18)), Value::Int(Some(2))]
        );
    }

    #[test]
    fn test_projection_of_single_column() {
        let projection = Projection {
            fragment: Renderer::default().render(name().node()).unwrap(),
            node: name().into_node(),
            result_type: SqlType::Text,
        };
        let statement = QueryBuilder::new(&descriptor(Dialect::Generic).with_projection(projection))
            .build(FetchMode::All);
        assert_eq!(statement.sql, "SELECT name FROM person");
    }

    #[test]
    fn test_sql_server_offset_needs_order() {
        let statement = QueryBuilder::new(&descriptor(Dialect::SqlServer).with_offset(5).with_limit(5))
            .build(FetchMode::All);
        assert_eq!(
            statement.sql,
            "SELECT id, age, name FROM person ORDER BY (SELECT NULL) OFFSET 5 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }

    #[test]
    fn test_count_exists_delete() {
        let descriptor = filtered(Dialect::Generic).with_limit(3);
        let builder = QueryBuilder::new(&descriptor);
        assert_eq!(
            builder.build_count().sql,
            "SELECT COUNT(*) FROM person WHERE (age > ?)"
        );
        assert_eq!(
            builder.build_exists().sql,
            "SELECT 1 FROM person WHERE (age > ?) LIMIT 1"
        );
        let delete = builder.build_delete();
        assert_eq!(delete.sql, "DELETE FROM person WHERE (age > ?)");
        assert_eq!(delete.values, vec![Value::Int(Some(18))]);
    }

    #[test]
    fn test_reserved_table_is_quoted() {
        let descriptor = QueryDescriptor::new("user", COLUMNS, Dialect::Postgres);
        assert_eq!(
            QueryBuilder::new(&descriptor).build_count().sql,
            "SELECT COUNT(*) FROM \"user\""
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let descriptor = filtered(Dialect::MySql);
        let builder = QueryBuilder::new(&descriptor);
        assert_eq!(builder.build(FetchMode::All), builder.build(FetchMode::All));
    }
}
