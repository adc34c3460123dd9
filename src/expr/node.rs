//! Expression AST.
//!
//! A closure body is represented as a tree of [`ExpressionNode`]s. Nodes are
//! plain data; the only behaviour is structural equality and result-type
//! queries. The checked constructors (`binary`, `logical`, `unary`, `call`)
//! refuse to build ill-typed trees.

use crate::error::QueryError;
use crate::expr::function;
use crate::value::SqlType;
use sea_query::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

/// One node of a quoted closure body.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// A value with no dependency on the entity parameter
    Constant { value: Value, ty: SqlType },
    /// The closure's entity parameter
    ParameterRef { name: String },
    /// A column of the entity parameter
    MemberAccess {
        target: Box<ExpressionNode>,
        member: String,
        ty: SqlType,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<ExpressionNode>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    LogicalOp {
        op: LogicalOperator,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    Call {
        function: String,
        args: Vec<ExpressionNode>,
    },
}

impl UnaryOperator {
    pub fn result_type(self, operand: SqlType) -> Result<SqlType, QueryError> {
        reject_entity(operand, operand)?;
        match self {
            UnaryOperator::Not if operand == SqlType::Bool => Ok(SqlType::Bool),
            UnaryOperator::Neg if operand.is_numeric() => Ok(operand),
            _ => Err(QueryError::type_mismatch(self, operand, operand)),
        }
    }
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
                | BinaryOperator::Like
        )
    }

    pub fn result_type(self, left: SqlType, right: SqlType) -> Result<SqlType, QueryError> {
        reject_entity(left, right)?;
        let ok = match self {
            BinaryOperator::Eq | BinaryOperator::Ne => left.is_comparable_with(right),
            BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge => {
                left.is_ordered() && right.is_ordered() && left.is_comparable_with(right)
            }
            BinaryOperator::Like => left == SqlType::Text && right == SqlType::Text,
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div
            | BinaryOperator::Mod => left.is_numeric() && right.is_numeric(),
            BinaryOperator::Concat => {
                matches!(left, SqlType::Text | SqlType::Null)
                    && matches!(right, SqlType::Text | SqlType::Null)
            }
        };
        if !ok {
            return Err(QueryError::type_mismatch(self, left, right));
        }
        Ok(match self {
            BinaryOperator::Concat => SqlType::Text,
            op if op.is_comparison() => SqlType::Bool,
            _ => left.widen(right),
        })
    }
}

impl LogicalOperator {
    pub fn result_type(self, left: SqlType, right: SqlType) -> Result<SqlType, QueryError> {
        reject_entity(left, right)?;
        if left == SqlType::Bool && right == SqlType::Bool {
            Ok(SqlType::Bool)
        } else {
            Err(QueryError::type_mismatch(self, left, right))
        }
    }
}

fn reject_entity(left: SqlType, right: SqlType) -> Result<(), QueryError> {
    if left == SqlType::Entity || right == SqlType::Entity {
        return Err(QueryError::UnsupportedConstruct(
            "the entity parameter cannot be used as a value; access one of its columns".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOperator::Not => "NOT",
            UnaryOperator::Neg => "-",
        })
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Concat => "||",
        })
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        })
    }
}

impl ExpressionNode {
    pub fn constant(value: Value, ty: SqlType) -> Self {
        ExpressionNode::Constant { value, ty }
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        ExpressionNode::ParameterRef { name: name.into() }
    }

    /// `parameter.member`
    pub fn member(parameter: impl Into<String>, member: impl Into<String>, ty: SqlType) -> Self {
        ExpressionNode::MemberAccess {
            target: Box::new(ExpressionNode::parameter(parameter)),
            member: member.into(),
            ty,
        }
    }

    /// # Errors
    ///
    /// `TypeMismatch` if the operand type does not fit the operator.
    pub fn unary(op: UnaryOperator, operand: ExpressionNode) -> Result<Self, QueryError> {
        op.result_type(operand.result_type()?)?;
        Ok(ExpressionNode::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    /// # Errors
    ///
    /// `TypeMismatch` if the operand types are not comparable under `op`.
    pub fn binary(
        op: BinaryOperator,
        left: ExpressionNode,
        right: ExpressionNode,
    ) -> Result<Self, QueryError> {
        op.result_type(left.result_type()?, right.result_type()?)?;
        Ok(ExpressionNode::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// # Errors
    ///
    /// `TypeMismatch` unless both operands are boolean.
    pub fn logical(
        op: LogicalOperator,
        left: ExpressionNode,
        right: ExpressionNode,
    ) -> Result<Self, QueryError> {
        op.result_type(left.result_type()?, right.result_type()?)?;
        Ok(ExpressionNode::LogicalOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// # Errors
    ///
    /// `UnsupportedConstruct` for unknown functions or wrong arity,
    /// `TypeMismatch` for badly typed arguments.
    pub fn call(function: &str, args: Vec<ExpressionNode>) -> Result<Self, QueryError> {
        let types = args
            .iter()
            .map(ExpressionNode::result_type)
            .collect::<Result<Vec<_>, _>>()?;
        function::resolve(function, &types)?;
        Ok(ExpressionNode::Call {
            function: function.to_ascii_lowercase(),
            args,
        })
    }

    /// Static result type of the node.
    ///
    /// # Errors
    ///
    /// Fails the same way the checked constructors do if any sub-tree is ill-typed.
    pub fn result_type(&self) -> Result<SqlType, QueryError> {
        match self {
            ExpressionNode::Constant { ty, .. } => Ok(*ty),
            ExpressionNode::ParameterRef { .. } => Ok(SqlType::Entity),
            ExpressionNode::MemberAccess { ty, .. } => Ok(*ty),
            ExpressionNode::UnaryOp { op, operand } => op.result_type(operand.result_type()?),
            ExpressionNode::BinaryOp { op, left, right } => {
                op.result_type(left.result_type()?, right.result_type()?)
            }
            ExpressionNode::LogicalOp { op, left, right } => {
                op.result_type(left.result_type()?, right.result_type()?)
            }
            ExpressionNode::Call { function, args } => {
                let types = args
                    .iter()
                    .map(ExpressionNode::result_type)
                    .collect::<Result<Vec<_>, _>>()?;
                function::resolve(function, &types)
            }
        }
    }

    /// `true` if the sub-tree references the entity parameter anywhere.
    pub fn depends_on_parameter(&self) -> bool {
        match self {
            ExpressionNode::Constant { .. } => false,
            ExpressionNode::ParameterRef { .. } | ExpressionNode::MemberAccess { .. } => true,
            ExpressionNode::UnaryOp { operand, .. } => operand.depends_on_parameter(),
            ExpressionNode::BinaryOp { left, right, .. }
            | ExpressionNode::LogicalOp { left, right, .. } => {
                left.depends_on_parameter() || right.depends_on_parameter()
            }
            ExpressionNode::Call { args, .. } => args.iter().any(ExpressionNode::depends_on_parameter),
        }
    }

    /// `true` for a constant holding the "no value" marker.
    pub fn is_null_constant(&self) -> bool {
        match self {
            ExpressionNode::Constant { value, ty } => {
                *ty == SqlType::Null || crate::value::is_null(value)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age() -> ExpressionNode {
        ExpressionNode::member("person", "age", SqlType::Integer)
    }

    fn name() -> ExpressionNode {
        ExpressionNode::member("person", "name", SqlType::Text)
    }

    #[test]
    fn test_comparison_is_boolean() {
        let node = ExpressionNode::binary(
            BinaryOperator::Gt,
            age(),
            ExpressionNode::constant(Value::from(18), SqlType::Integer),
        )
        .unwrap();
        assert_eq!(node.result_type().unwrap(), SqlType::Bool);
        assert!(node.depends_on_parameter());
    }

    #[test]
    fn test_text_vs_integer_is_type_mismatch() {
        let err = ExpressionNode::binary(BinaryOperator::Eq, name(), age()).unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_ordering_against_null_is_type_mismatch() {
        let err = ExpressionNode::binary(
            BinaryOperator::Lt,
            age(),
            ExpressionNode::constant(Value::Int(None), SqlType::Null),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_equality_against_null_is_allowed() {
        let node = ExpressionNode::binary(
            BinaryOperator::Eq,
            name(),
            ExpressionNode::constant(Value::String(None), SqlType::Null),
        )
        .unwrap();
        assert_eq!(node.result_type().unwrap(), SqlType::Bool);
    }

    #[test]
    fn test_logical_requires_booleans() {
        let err = ExpressionNode::logical(LogicalOperator::And, age(), age()).unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_bare_parameter_is_unsupported() {
        let err = ExpressionNode::binary(
            BinaryOperator::Eq,
            ExpressionNode::parameter("person"),
            ExpressionNode::constant(Value::from(1), SqlType::Integer),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_arithmetic_widens() {
        let node = ExpressionNode::binary(
            BinaryOperator::Mul,
            age(),
            ExpressionNode::constant(Value::from(1.5f64), SqlType::Float),
        )
        .unwrap();
        assert_eq!(node.result_type().unwrap(), SqlType::Float);
    }

    #[test]
    fn test_unknown_function_is_unsupported() {
        let err = ExpressionNode::call("reflect_field", vec![name()]).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_negating_text_is_type_mismatch() {
        let err = ExpressionNode::unary(UnaryOperator::Neg, name()).unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(age(), age());
        assert_ne!(age(), name());
    }
}
