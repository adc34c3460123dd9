//! The value a query façade owns.
//!
//! A [`QueryDescriptor`] records everything composition has produced so far:
//! the target table and columns, the dialect fragments were rendered for, the
//! accumulated predicates, an optional projection, ordering and row limits.
//! Every `with_*` method returns an extended copy; nothing is ever mutated in
//! place, so a partially built query can serve as a template.
//!
//! The compiled expressions are kept next to their fragments so that
//! [`for_dialect`](QueryDescriptor::for_dialect) can re-render the whole query
//! for the database it finally runs against.

use crate::entity::{ColumnDescriptor, Entity};
use crate::error::QueryError;
use crate::expr::ExpressionNode;
use crate::sql::{Connective, Dialect, PredicateState, Renderer, SqlFragment};
use crate::value::SqlType;
use std::borrow::Cow;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub node: ExpressionNode,
    pub fragment: SqlFragment,
    pub order: Order,
}

/// The selector of a projection, rendered, and its static result type.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub node: ExpressionNode,
    pub fragment: SqlFragment,
    pub result_type: SqlType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    table: &'static str,
    columns: &'static [ColumnDescriptor],
    dialect: Dialect,
    conditions: Vec<(Connective, ExpressionNode)>,
    predicate: PredicateState,
    projection: Option<Projection>,
    ordering: Vec<Ordering>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryDescriptor {
    pub fn for_entity<E: Entity>(dialect: Dialect) -> Self {
        Self::new(E::table_name(), E::columns(), dialect)
    }

    pub fn new(table: &'static str, columns: &'static [ColumnDescriptor], dialect: Dialect) -> Self {
        Self {
            table,
            columns,
            dialect,
            conditions: Vec::new(),
            predicate: PredicateState::new(),
            projection: None,
            ordering: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &'static [ColumnDescriptor] {
        self.columns
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn predicate(&self) -> &PredicateState {
        &self.predicate
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    pub fn ordering(&self) -> &[Ordering] {
        &self.ordering
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Append a compiled condition. `fragment` is `node` rendered for this
    /// descriptor's dialect.
    pub fn with_predicate(
        &self,
        connective: Connective,
        node: ExpressionNode,
        fragment: SqlFragment,
    ) -> Self {
        let mut next = self.clone();
        next.conditions.push((connective, node));
        next.predicate = self.predicate.combine(connective, fragment);
        next
    }

    pub fn with_projection(&self, projection: Projection) -> Self {
        Self {
            projection: Some(projection),
            ..self.clone()
        }
    }

    pub fn with_ordering(&self, ordering: Ordering) -> Self {
        let mut next = self.clone();
        next.ordering.push(ordering);
        next
    }

    pub fn with_limit(&self, limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..self.clone()
        }
    }

    pub fn with_offset(&self, offset: u64) -> Self {
        Self {
            offset: Some(offset),
            ..self.clone()
        }
    }

    /// This descriptor with every fragment rendered for `dialect`.
    ///
    /// Borrows `self` when the dialect already matches.
    ///
    /// # Errors
    ///
    /// Whatever the renderer reports; a tree that rendered once renders in
    /// every dialect.
    pub fn for_dialect(&self, dialect: Dialect) -> Result<Cow<'_, Self>, QueryError> {
        if dialect == self.dialect {
            return Ok(Cow::Borrowed(self));
        }
        let renderer = Renderer::new(dialect);

        let mut predicate = PredicateState::new();
        for (connective, node) in &self.conditions {
            predicate = predicate.combine(*connective, renderer.render_predicate(node)?);
        }
        let projection = self
            .projection
            .as_ref()
            .map(|p| {
                Ok::<_, QueryError>(Projection {
                    node: p.node.clone(),
                    fragment: renderer.render(&p.node)?,
                    result_type: p.result_type,
                })
            })
            .transpose()?;
        let ordering = self
            .ordering
            .iter()
            .map(|term| {
                Ok(Ordering {
                    node: term.node.clone(),
                    fragment: renderer.render(&term.node)?,
                    order: term.order,
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        Ok(Cow::Owned(Self {
            dialect,
            predicate,
            projection,
            ordering,
            ..self.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::sql::Embedding;

    const COLUMNS: &[ColumnDescriptor] = &[ColumnDescriptor {
        name: "age",
        field: "age",
        sql_type: SqlType::Integer,
        nullable: false,
    }];

    #[test]
    fn test_extension_leaves_original_untouched() {
        let base = QueryDescriptor::new("person", COLUMNS, Dialect::Generic);
        let age: Expr<i32> = Expr::column("person", "age");
        let node = age.gt(1).into_node();
        let fragment = Renderer::default().render_predicate(&node).unwrap();

        let filtered = base
            .with_predicate(Connective::And, node, fragment)
            .with_limit(5);

        assert!(base.predicate().is_empty());
        assert_eq!(base.limit(), None);
        assert_eq!(filtered.predicate().len(), 1);
        assert_eq!(filtered.limit(), Some(5));
        assert_eq!(filtered.table(), "person");
    }

    #[test]
    fn test_order_keywords() {
        assert_eq!(Order::Asc.keyword(), "ASC");
        assert_eq!(Order::Desc.keyword(), "DESC");
    }

    #[test]
    fn test_for_dialect_rerenders_every_fragment() {
        let order: Expr<i32> = Expr::column("person", "order");
        let node = order.gt(1).into_node();
        let generic = Renderer::default();
        let base = QueryDescriptor::new("person", COLUMNS, Dialect::Generic)
            .with_predicate(
                Connective::And,
                node.clone(),
                generic.render_predicate(&node).unwrap(),
            )
            .with_ordering(Ordering {
                node: order.clone().into_node(),
                fragment: generic.render(order.node()).unwrap(),
                order: Order::Desc,
            });

        assert!(matches!(base.for_dialect(Dialect::Generic).unwrap(), Cow::Borrowed(_)));

        let mysql = base.for_dialect(Dialect::MySql).unwrap();
        assert_eq!(mysql.dialect(), Dialect::MySql);
        assert_eq!(
            mysql.predicate().render(Embedding::TopLevel).unwrap().text(),
            "(`order` > ?)"
        );
        assert_eq!(mysql.ordering()[0].fragment.text(), "`order`");
        assert_eq!(base.ordering()[0].fragment.text(), "\"order\"");
    }
}
