//! Closure introspection.
//!
//! A predicate or selector closure is applied once to the entity's field proxy,
//! which quotes its body into an [`ExpressionNode`] tree. The [`Introspector`]
//! then checks that tree against the entity (parameter and column resolution,
//! operator and function typing) and folds every sub-tree that does not touch
//! the parameter into a single constant, so captured values reach the SQL as
//! bound parameters.
//!
//! A folded constant is bound with its operands' value type (`i16` stays
//! `i16`, `f32` stays `f32`). Results that do not fit that type, and text
//! comparisons, which depend on the database's collation, stay unfolded.

use crate::entity::{ColumnDescriptor, Entity};
use crate::error::QueryError;
use crate::expr::function;
use crate::expr::node::{BinaryOperator, ExpressionNode, LogicalOperator, UnaryOperator};
use crate::expr::typed::Expr;
use crate::value::{float_of, integer_of, SqlType};
use log::trace;
use sea_query::Value;
use std::cmp::Ordering;

/// Validates and folds quoted closure bodies for one entity.
#[derive(Debug, Clone, Copy)]
pub struct Introspector<'a> {
    parameter: &'a str,
    columns: &'a [ColumnDescriptor],
}

impl Introspector<'static> {
    pub fn for_entity<E: Entity>() -> Self {
        Self::new(E::parameter_name(), E::columns())
    }
}

impl<'a> Introspector<'a> {
    pub fn new(parameter: &'a str, columns: &'a [ColumnDescriptor]) -> Self {
        Self { parameter, columns }
    }

    /// Validate a predicate body.
    ///
    /// # Errors
    ///
    /// `UnsupportedConstruct` for references outside the entity parameter or its
    /// columns, `TypeMismatch` for ill-typed operators or a non-boolean root.
    pub fn predicate(&self, node: ExpressionNode) -> Result<ExpressionNode, QueryError> {
        let (node, ty) = self.resolve(node)?;
        if ty != SqlType::Bool {
            return Err(QueryError::type_mismatch("predicate", ty, SqlType::Bool));
        }
        trace!("Compiled predicate: {node:?}");
        Ok(node)
    }

    /// Validate a selector body and return it with its result type.
    ///
    /// # Errors
    ///
    /// As for [`predicate`](Self::predicate); selecting the bare entity
    /// parameter is `UnsupportedConstruct`.
    pub fn selector(&self, node: ExpressionNode) -> Result<(ExpressionNode, SqlType), QueryError> {
        let (node, ty) = self.resolve(node)?;
        if ty == SqlType::Entity {
            return Err(QueryError::UnsupportedConstruct(
                "a selector must produce a column value, not the entity itself".to_string(),
            ));
        }
        trace!("Compiled selector ({ty}): {node:?}");
        Ok((node, ty))
    }

    fn resolve(&self, node: ExpressionNode) -> Result<(ExpressionNode, SqlType), QueryError> {
        match node {
            ExpressionNode::Constant { value, ty } => {
                Ok((ExpressionNode::Constant { value, ty }, ty))
            }
            ExpressionNode::ParameterRef { name } => {
                self.check_parameter(&name)?;
                Ok((ExpressionNode::ParameterRef { name }, SqlType::Entity))
            }
            ExpressionNode::MemberAccess { target, member, ty } => {
                match target.as_ref() {
                    ExpressionNode::ParameterRef { name } => self.check_parameter(name)?,
                    other => {
                        return Err(QueryError::UnsupportedConstruct(format!(
                            "member {member} must be accessed on the entity parameter, not on {other:?}"
                        )))
                    }
                }
                let column = self
                    .columns
                    .iter()
                    .find(|c| c.name == member)
                    .ok_or_else(|| {
                        QueryError::UnsupportedConstruct(format!(
                            "{member} is not a mapped column of {}",
                            self.parameter
                        ))
                    })?;
                if column.sql_type != ty {
                    return Err(QueryError::type_mismatch(
                        format!(".{member}"),
                        ty,
                        column.sql_type,
                    ));
                }
                Ok((ExpressionNode::MemberAccess { target, member, ty }, ty))
            }
            ExpressionNode::UnaryOp { op, operand } => {
                let (operand, operand_ty) = self.resolve(*operand)?;
                let ty = op.result_type(operand_ty)?;
                let folded = fold_unary(op, &operand);
                let node = folded.unwrap_or_else(|| ExpressionNode::UnaryOp {
                    op,
                    operand: Box::new(operand),
                });
                Ok((node, ty))
            }
            ExpressionNode::BinaryOp { op, left, right } => {
                let (left, left_ty) = self.resolve(*left)?;
                let (right, right_ty) = self.resolve(*right)?;
                let ty = op.result_type(left_ty, right_ty)?;
                let folded = fold_binary(op, &left, &right);
                let node = folded.unwrap_or_else(|| ExpressionNode::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                });
                Ok((node, ty))
            }
            ExpressionNode::LogicalOp { op, left, right } => {
                let (left, left_ty) = self.resolve(*left)?;
                let (right, right_ty) = self.resolve(*right)?;
                let ty = op.result_type(left_ty, right_ty)?;
                let folded = fold_logical(op, &left, &right);
                let node = folded.unwrap_or_else(|| ExpressionNode::LogicalOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                });
                Ok((node, ty))
            }
            ExpressionNode::Call { function, args } => {
                let mut resolved = Vec::with_capacity(args.len());
                let mut types = Vec::with_capacity(args.len());
                for arg in args {
                    let (arg, ty) = self.resolve(arg)?;
                    resolved.push(arg);
                    types.push(ty);
                }
                let ty = function::resolve(&function, &types)?;
                let function = function.to_ascii_lowercase();
                let folded = fold_call(&function, &resolved);
                let node = folded.unwrap_or(ExpressionNode::Call {
                    function,
                    args: resolved,
                });
                Ok((node, ty))
            }
        }
    }

    fn check_parameter(&self, name: &str) -> Result<(), QueryError> {
        if name == self.parameter {
            Ok(())
        } else {
            Err(QueryError::UnsupportedConstruct(format!(
                "{name} is not the closure parameter ({})",
                self.parameter
            )))
        }
    }
}

/// Quote and validate a predicate closure over `E`.
///
/// # Errors
///
/// See [`Introspector::predicate`].
pub fn compile_predicate<E, F>(predicate: F) -> Result<ExpressionNode, QueryError>
where
    E: Entity,
    F: FnOnce(&E::Fields) -> Expr<bool>,
{
    let fields = E::fields();
    let body = predicate(&fields);
    Introspector::for_entity::<E>().predicate(body.into_node())
}

/// Quote and validate a selector closure over `E`.
///
/// # Errors
///
/// See [`Introspector::selector`].
pub fn compile_selector<E, T, F>(selector: F) -> Result<(ExpressionNode, SqlType), QueryError>
where
    E: Entity,
    F: FnOnce(&E::Fields) -> Expr<T>,
{
    let fields = E::fields();
    let body = selector(&fields);
    Introspector::for_entity::<E>().selector(body.into_node())
}

fn constant_value(node: &ExpressionNode) -> Option<&Value> {
    match node {
        ExpressionNode::Constant { value, ty } if *ty != SqlType::Null => {
            if crate::value::is_null(value) {
                None
            } else {
                Some(value)
            }
        }
        _ => None,
    }
}

/// Integer variant a folded result is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    fn of(value: &Value) -> Option<Self> {
        Some(match value {
            Value::TinyInt(_) => IntKind::I8,
            Value::SmallInt(_) => IntKind::I16,
            Value::Int(_) => IntKind::I32,
            Value::BigInt(_) => IntKind::I64,
            Value::TinyUnsigned(_) => IntKind::U8,
            Value::SmallUnsigned(_) => IntKind::U16,
            Value::Unsigned(_) => IntKind::U32,
            Value::BigUnsigned(_) => IntKind::U64,
            _ => return None,
        })
    }

    fn width(self) -> u8 {
        match self {
            IntKind::I8 | IntKind::U8 => 1,
            IntKind::I16 | IntKind::U16 => 2,
            IntKind::I32 | IntKind::U32 => 4,
            IntKind::I64 | IntKind::U64 => 8,
        }
    }

    /// Kind of a binary result: the wider operand's, or `i64` when the
    /// operands differ only in signedness.
    fn join(self, other: Self) -> Self {
        if self == other {
            self
        } else if self.width() != other.width() {
            if self.width() > other.width() {
                self
            } else {
                other
            }
        } else {
            IntKind::I64
        }
    }

    /// `None` if `n` does not fit.
    fn constant(self, n: i64) -> Option<ExpressionNode> {
        let value = match self {
            IntKind::I8 => Value::TinyInt(Some(i8::try_from(n).ok()?)),
            IntKind::I16 => Value::SmallInt(Some(i16::try_from(n).ok()?)),
            IntKind::I32 => Value::Int(Some(i32::try_from(n).ok()?)),
            IntKind::I64 => Value::BigInt(Some(n)),
            IntKind::U8 => Value::TinyUnsigned(Some(u8::try_from(n).ok()?)),
            IntKind::U16 => Value::SmallUnsigned(Some(u16::try_from(n).ok()?)),
            IntKind::U32 => Value::Unsigned(Some(u32::try_from(n).ok()?)),
            IntKind::U64 => Value::BigUnsigned(Some(u64::try_from(n).ok()?)),
        };
        Some(ExpressionNode::constant(value, SqlType::Integer))
    }
}

/// `f32` unless a `Double` operand is involved.
fn single_precision(values: &[&Value]) -> bool {
    values.iter().any(|v| matches!(v, Value::Float(_)))
        && !values.iter().any(|v| matches!(v, Value::Double(_)))
}

fn float_constant(value: f64, single: bool) -> Option<ExpressionNode> {
    let value = if single {
        // f32 arithmetic done in f64 rounds back exactly
        let narrowed = value as f32;
        narrowed.is_finite().then_some(Value::Float(Some(narrowed)))?
    } else {
        value.is_finite().then_some(Value::Double(Some(value)))?
    };
    Some(ExpressionNode::constant(value, SqlType::Float))
}

fn bool_constant(value: bool) -> ExpressionNode {
    ExpressionNode::constant(Value::Bool(Some(value)), SqlType::Bool)
}

fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(Some(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn fold_unary(op: UnaryOperator, operand: &ExpressionNode) -> Option<ExpressionNode> {
    let value = constant_value(operand)?;
    match op {
        UnaryOperator::Not => match value {
            Value::Bool(Some(b)) => Some(bool_constant(!*b)),
            _ => None,
        },
        UnaryOperator::Neg => {
            if let Some(i) = integer_of(value) {
                IntKind::of(value)?.constant(i.checked_neg()?)
            } else {
                float_constant(-float_of(value)?, single_precision(&[value]))
            }
        }
    }
}

fn fold_binary(
    op: BinaryOperator,
    left: &ExpressionNode,
    right: &ExpressionNode,
) -> Option<ExpressionNode> {
    let l = constant_value(left)?;
    let r = constant_value(right)?;
    match op {
        BinaryOperator::Add
        | BinaryOperator::Sub
        | BinaryOperator::Mul
        | BinaryOperator::Div
        | BinaryOperator::Mod => fold_arithmetic(op, l, r),
        BinaryOperator::Concat => {
            let joined = format!("{}{}", text_of(l)?, text_of(r)?);
            Some(ExpressionNode::constant(Value::from(joined), SqlType::Text))
        }
        BinaryOperator::Like => None,
        _ => compare(l, r).map(|ordering| {
            bool_constant(match op {
                BinaryOperator::Eq => ordering == Ordering::Equal,
                BinaryOperator::Ne => ordering != Ordering::Equal,
                BinaryOperator::Lt => ordering == Ordering::Less,
                BinaryOperator::Le => ordering != Ordering::Greater,
                BinaryOperator::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }),
    }
}

fn fold_arithmetic(op: BinaryOperator, l: &Value, r: &Value) -> Option<ExpressionNode> {
    if let (Some(a), Some(b)) = (integer_of(l), integer_of(r)) {
        let result = match op {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Sub => a.checked_sub(b),
            BinaryOperator::Mul => a.checked_mul(b),
            BinaryOperator::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        }?;
        let kind = IntKind::of(l)?.join(IntKind::of(r)?);
        return kind.constant(result);
    }

    let a = float_of(l).or_else(|| integer_of(l).map(|i| i as f64))?;
    let b = float_of(r).or_else(|| integer_of(r).map(|i| i as f64))?;
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        BinaryOperator::Div if b != 0.0 => a / b,
        BinaryOperator::Mod if b != 0.0 => a % b,
        _ => return None,
    };
    float_constant(result, single_precision(&[l, r]))
}

/// Text is left to the database, whose collation may differ from byte order.
fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (integer_of(l), integer_of(r)) {
        return Some(a.cmp(&b));
    }
    if let (Value::Bool(Some(a)), Value::Bool(Some(b))) = (l, r) {
        return Some(a.cmp(b));
    }
    let a = float_of(l).or_else(|| integer_of(l).map(|i| i as f64))?;
    let b = float_of(r).or_else(|| integer_of(r).map(|i| i as f64))?;
    a.partial_cmp(&b)
}

fn fold_logical(
    op: LogicalOperator,
    left: &ExpressionNode,
    right: &ExpressionNode,
) -> Option<ExpressionNode> {
    match (constant_value(left)?, constant_value(right)?) {
        (Value::Bool(Some(a)), Value::Bool(Some(b))) => Some(bool_constant(match op {
            LogicalOperator::And => *a && *b,
            LogicalOperator::Or => *a || *b,
        })),
        _ => None,
    }
}

fn fold_call(function: &str, args: &[ExpressionNode]) -> Option<ExpressionNode> {
    let [arg] = args else {
        return None;
    };
    let value = constant_value(arg)?;
    match function {
        "lower" => Some(text_constant(text_of(value)?.to_lowercase())),
        "upper" => Some(text_constant(text_of(value)?.to_uppercase())),
        "trim" => Some(text_constant(text_of(value)?.trim().to_string())),
        "abs" => {
            if let Some(i) = integer_of(value) {
                IntKind::of(value)?.constant(i.checked_abs()?)
            } else {
                float_constant(float_of(value)?.abs(), single_precision(&[value]))
            }
        }
        // character vs byte length differs between databases
        _ => None,
    }
}

fn text_constant(text: String) -> ExpressionNode {
    ExpressionNode::constant(Value::from(text), SqlType::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn introspector() -> Introspector<'static> {
        Introspector::new("person", COLUMNS)
    }

    fn age() -> Expr<i32> {
        Expr::column("person", "age")
    }

    fn name() -> Expr<String> {
        Expr::column("person", "name")
    }

    #[test]
    fn test_predicate_keeps_column_comparison() {
        let node = introspector().predicate(age().gt(18).into_node()).unwrap();
        assert_eq!(node, age().gt(18).into_node());
    }

    #[test]
    fn test_constant_subtree_is_folded() {
        let limit = 10;
        let node = introspector()
            .predicate(age().gt(Expr::val(limit) * 2 + 1).into_node())
            .unwrap();
        match node {
            ExpressionNode::BinaryOp { right, .. } => assert_eq!(
                *right,
                ExpressionNode::constant(Value::Int(Some(21)), SqlType::Integer)
            ),
            other => panic!("unexpected node {other:?}"),
        }
    }

    fn folded(expr: ExpressionNode) -> ExpressionNode {
        introspector().selector(expr).unwrap().0
    }

    #[test]
    fn test_folding_keeps_small_int_variant() {
        assert_eq!(
            folded((Expr::val(2i16) + 3i16).into_node()),
            ExpressionNode::constant(Value::SmallInt(Some(5)), SqlType::Integer)
        );
        assert_eq!(
            folded((-Expr::val(4i16)).into_node()),
            ExpressionNode::constant(Value::SmallInt(Some(-4)), SqlType::Integer)
        );
    }

    #[test]
    fn test_small_int_overflow_is_not_folded() {
        let node = folded((Expr::val(i16::MAX) + 1i16).into_node());
        assert!(matches!(
            node,
            ExpressionNode::BinaryOp {
                op: BinaryOperator::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_folding_keeps_float_precision() {
        assert_eq!(
            folded((Expr::val(1.5f32) * 2.0f32).into_node()),
            ExpressionNode::constant(Value::Float(Some(3.0)), SqlType::Float)
        );
        assert_eq!(
            folded((Expr::val(1.5f64) * 2.0f64).into_node()),
            ExpressionNode::constant(Value::Double(Some(3.0)), SqlType::Float)
        );
    }

    #[test]
    fn test_mixed_integer_widths_take_the_wider() {
        let node = ExpressionNode::BinaryOp {
            op: BinaryOperator::Add,
            left: Box::new(ExpressionNode::constant(Value::SmallInt(Some(1)), SqlType::Integer)),
            right: Box::new(ExpressionNode::constant(Value::BigInt(Some(2)), SqlType::Integer)),
        };
        assert_eq!(
            folded(node),
            ExpressionNode::constant(Value::BigInt(Some(3)), SqlType::Integer)
        );
    }

    #[test]
    fn test_text_comparison_is_left_to_the_database() {
        let node = folded(Expr::val("b".to_string()).gt("A").into_node());
        assert!(matches!(
            node,
            ExpressionNode::BinaryOp {
                op: BinaryOperator::Gt,
                ..
            }
        ));
    }

    #[test]
    fn test_overflow_is_not_folded() {
        let expr = Expr::val(i64::MAX) + 1i64;
        let (node, ty) = introspector().selector(expr.into_node()).unwrap();
        assert_eq!(ty, SqlType::Integer);
        assert!(matches!(
            node,
            ExpressionNode::BinaryOp {
                op: BinaryOperator::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let expr = Expr::val(1i32) / 0;
        let (node, _) = introspector().selector(expr.into_node()).unwrap();
        assert!(matches!(node, ExpressionNode::BinaryOp { .. }));
    }

    #[test]
    fn test_text_functions_fold() {
        let node = introspector()
            .predicate(name().eq(Expr::val("  Ann ".to_string()).trim().upper()).into_node())
            .unwrap();
        match node {
            ExpressionNode::BinaryOp { right, .. } => assert_eq!(
                *right,
                ExpressionNode::constant(Value::from("ANN"), SqlType::Text)
            ),
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_constant_predicate_folds_to_bool() {
        let node = introspector()
            .predicate(Expr::val(3).lt(4).into_node())
            .unwrap();
        assert_eq!(node, bool_constant(true));
    }

    #[test]
    fn test_unknown_column_is_unsupported() {
        let expr: Expr<String> = Expr::column("person", "salary");
        let err = introspector()
            .predicate(expr.eq("x").into_node())
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_foreign_parameter_is_unsupported() {
        let expr: Expr<i32> = Expr::column("other", "age");
        let err = introspector().predicate(expr.gt(1).into_node()).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_column_type_disagreement_is_mismatch() {
        let expr: Expr<String> = Expr::column("person", "age");
        let err = introspector().predicate(expr.eq("x").into_node()).unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_non_boolean_predicate_is_mismatch() {
        let err = introspector().predicate(age().into_node()).unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_entity_selector_is_unsupported() {
        let err = introspector()
            .selector(ExpressionNode::parameter("person"))
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_member_on_non_parameter_is_unsupported() {
        let node = ExpressionNode::MemberAccess {
            target: Box::new(ExpressionNode::constant(Value::from(1), SqlType::Integer)),
            member: "age".to_string(),
            ty: SqlType::Integer,
        };
        let err = introspector().selector(node).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_like_is_never_folded() {
        let expr = Expr::val("abc".to_string()).like("a%");
        let (node, ty) = introspector().selector(expr.into_node()).unwrap();
        assert_eq!(ty, SqlType::Bool);
        assert!(matches!(
            node,
            ExpressionNode::BinaryOp {
                op: BinaryOperator::Like,
                ..
            }
        ));
    }
}
