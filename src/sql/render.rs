//! Expression AST to SQL.
//!
//! Constants are never inlined: each one becomes a `?` and its value is bound
//! at the same position. Operands that are themselves operators are
//! parenthesized unless they share the parent's precedence and sit where an
//! associative chain allows it, so `a + b + c` stays flat while `a - (b - c)`
//! and `(x > ?) AND (y = ?)` keep their parentheses.

use crate::error::QueryError;
use crate::expr::node::{BinaryOperator, ExpressionNode, LogicalOperator, UnaryOperator};
use crate::sql::dialect::{ConcatStyle, Dialect};
use crate::sql::fragment::{FragmentBuilder, Precedence, SqlFragment};
use sea_query::Value;

/// Renders validated expression trees for one dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    dialect: Dialect,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Renderer {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// # Errors
    ///
    /// `UnsupportedConstruct` if the tree still contains a bare parameter
    /// reference; trees produced by the introspector never do.
    pub fn render(&self, node: &ExpressionNode) -> Result<SqlFragment, QueryError> {
        let mut out = FragmentBuilder::new();
        self.write(node, &mut out)?;
        Ok(out.finish(self.precedence(node)))
    }

    /// Render a node used as a condition.
    ///
    /// SQL Server has no boolean literals in conditions, so there a constant
    /// condition is written as `1 = 1` or `1 = 0` instead of a bound value.
    ///
    /// # Errors
    ///
    /// As for [`render`](Self::render).
    pub fn render_predicate(&self, node: &ExpressionNode) -> Result<SqlFragment, QueryError> {
        let mut out = FragmentBuilder::new();
        self.write_condition(node, &mut out)?;
        let precedence = if self.literal_condition(node).is_some() {
            Precedence::Comparison
        } else {
            self.precedence(node)
        };
        Ok(out.finish(precedence))
    }

    fn literal_condition(&self, node: &ExpressionNode) -> Option<&'static str> {
        match node {
            ExpressionNode::Constant {
                value: Value::Bool(Some(b)),
                ..
            } if self.dialect == Dialect::SqlServer => Some(if *b { "1 = 1" } else { "1 = 0" }),
            _ => None,
        }
    }

    fn write_condition(
        &self,
        node: &ExpressionNode,
        out: &mut FragmentBuilder,
    ) -> Result<(), QueryError> {
        match self.literal_condition(node) {
            Some(text) => {
                out.push_str(text);
                Ok(())
            }
            None => self.write(node, out),
        }
    }

    fn precedence(&self, node: &ExpressionNode) -> Precedence {
        match node {
            ExpressionNode::Constant { .. }
            | ExpressionNode::ParameterRef { .. }
            | ExpressionNode::MemberAccess { .. }
            | ExpressionNode::Call { .. } => Precedence::Atom,
            ExpressionNode::UnaryOp { op, .. } => match op {
                UnaryOperator::Not => Precedence::Not,
                UnaryOperator::Neg => Precedence::Unary,
            },
            ExpressionNode::LogicalOp { op, .. } => match op {
                LogicalOperator::And => Precedence::And,
                LogicalOperator::Or => Precedence::Or,
            },
            ExpressionNode::BinaryOp { op, .. } => match op {
                BinaryOperator::Add | BinaryOperator::Sub => Precedence::Additive,
                BinaryOperator::Concat => match self.dialect.concat_style() {
                    ConcatStyle::Function => Precedence::Atom,
                    _ => Precedence::Additive,
                },
                BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => {
                    Precedence::Multiplicative
                }
                _ => Precedence::Comparison,
            },
        }
    }

    fn needs_parens(&self, parent: &ExpressionNode, child: &ExpressionNode, side: Side) -> bool {
        let child_prec = self.precedence(child);
        if child_prec == Precedence::Atom {
            return false;
        }
        if child_prec != self.precedence(parent) {
            return true;
        }
        match (parent, child) {
            (
                ExpressionNode::LogicalOp { op: parent_op, .. },
                ExpressionNode::LogicalOp { op: child_op, .. },
            ) => parent_op != child_op,
            (
                ExpressionNode::BinaryOp { op: parent_op, .. },
                ExpressionNode::BinaryOp { op: child_op, .. },
            ) => {
                if parent_op.is_comparison() {
                    return true;
                }
                match side {
                    Side::Left => false,
                    Side::Right => {
                        parent_op != child_op
                            || !matches!(
                                parent_op,
                                BinaryOperator::Add | BinaryOperator::Mul | BinaryOperator::Concat
                            )
                    }
                }
            }
            _ => true,
        }
    }

    fn write_operand(
        &self,
        parent: &ExpressionNode,
        child: &ExpressionNode,
        side: Side,
        out: &mut FragmentBuilder,
    ) -> Result<(), QueryError> {
        let parens = self.needs_parens(parent, child, side);
        if parens {
            out.push_str("(");
        }
        if matches!(parent, ExpressionNode::LogicalOp { .. }) {
            self.write_condition(child, out)?;
        } else {
            self.write(child, out)?;
        }
        if parens {
            out.push_str(")");
        }
        Ok(())
    }

    fn write(&self, node: &ExpressionNode, out: &mut FragmentBuilder) -> Result<(), QueryError> {
        match node {
            ExpressionNode::Constant { value, .. } => {
                out.push_value(value.clone());
            }
            ExpressionNode::ParameterRef { name } => {
                return Err(QueryError::UnsupportedConstruct(format!(
                    "the entity parameter {name} cannot be rendered as a value"
                )))
            }
            ExpressionNode::MemberAccess { member, .. } => {
                out.push_str(&self.dialect.quote_identifier(member));
            }
            ExpressionNode::UnaryOp { op, operand } => {
                out.push_str(match op {
                    UnaryOperator::Not => "NOT (",
                    UnaryOperator::Neg => "-(",
                });
                if *op == UnaryOperator::Not {
                    self.write_condition(operand, out)?;
                } else {
                    self.write(operand, out)?;
                }
                out.push_str(")");
            }
            ExpressionNode::LogicalOp { op, left, right } => {
                self.write_operand(node, left, Side::Left, out)?;
                out.push_str(&format!(" {op} "));
                self.write_operand(node, right, Side::Right, out)?;
            }
            ExpressionNode::BinaryOp { op, left, right } => {
                self.write_binary(node, *op, left, right, out)?;
            }
            ExpressionNode::Call { function, args } => {
                out.push_str(&self.dialect.function_name(function));
                out.push_str("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write(arg, out)?;
                }
                out.push_str(")");
            }
        }
        Ok(())
    }

    fn write_binary(
        &self,
        node: &ExpressionNode,
        op: BinaryOperator,
        left: &ExpressionNode,
        right: &ExpressionNode,
        out: &mut FragmentBuilder,
    ) -> Result<(), QueryError> {
        if matches!(op, BinaryOperator::Eq | BinaryOperator::Ne) {
            let tested = if right.is_null_constant() {
                Some(left)
            } else if left.is_null_constant() {
                Some(right)
            } else {
                None
            };
            if let Some(tested) = tested {
                self.write_operand(node, tested, Side::Left, out)?;
                out.push_str(if op == BinaryOperator::Eq {
                    " IS NULL"
                } else {
                    " IS NOT NULL"
                });
                return Ok(());
            }
        }

        let token = match op {
            BinaryOperator::Concat => match self.dialect.concat_style() {
                ConcatStyle::Function => {
                    out.push_str("CONCAT(");
                    self.write(left, out)?;
                    out.push_str(", ");
                    self.write(right, out)?;
                    out.push_str(")");
                    return Ok(());
                }
                ConcatStyle::Plus => "+".to_string(),
                ConcatStyle::Pipes => "||".to_string(),
            },
            other => other.to_string(),
        };

        self.write_operand(node, left, Side::Left, out)?;
        out.push_str(&format!(" {token} "));
        self.write_operand(node, right, Side::Right, out)?;
        if op == BinaryOperator::Like {
            out.push_str(self.dialect.like_escape());
        }
        Ok(())
    }
}
