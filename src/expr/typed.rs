//! Typed expression builders.
//!
//! [`Expr<T>`] wraps an [`ExpressionNode`] together with the Rust type the
//! expression evaluates to. Field proxies generated by `#[derive(Entity)]` are
//! structs of `Expr<T>` columns; predicate and selector closures combine them
//! with the methods and operators below, which quote the closure body into an
//! AST instead of evaluating it.
//!
//! ```ignore
//! Person::query().filter(|p| p.age.gt(18) & p.name.starts_with("A"))?;
//! Person::query().project(|p| &p.age + 1)?;
//! ```
//!
//! The builders do not type-check; the [`Introspector`](super::Introspector)
//! validates the finished tree.

use crate::expr::node::{BinaryOperator, ExpressionNode, LogicalOperator, UnaryOperator};
use crate::value::{SqlType, SqlValue};
use std::fmt;
use std::marker::PhantomData;
use std::ops;

/// A symbolic expression evaluating to `T`.
pub struct Expr<T> {
    node: ExpressionNode,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Expr<T> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<T> fmt::Debug for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expr").field(&self.node).finish()
    }
}

/// Conversion into an expression of type `T`.
///
/// Implemented for host values (which become bound constants) and for
/// expressions themselves.
pub trait IntoExpr<T> {
    fn into_expr(self) -> Expr<T>;
}

impl<T: SqlValue> IntoExpr<T> for T {
    fn into_expr(self) -> Expr<T> {
        Expr::val(self)
    }
}

impl<T> IntoExpr<T> for Expr<T> {
    fn into_expr(self) -> Expr<T> {
        self
    }
}

impl<T> IntoExpr<T> for &Expr<T> {
    fn into_expr(self) -> Expr<T> {
        self.clone()
    }
}

// A non-null column compared against a nullable one.
impl<T: SqlValue> IntoExpr<Option<T>> for Expr<T> {
    fn into_expr(self) -> Expr<Option<T>> {
        Expr::from_node(self.node)
    }
}

impl<T: SqlValue> IntoExpr<Option<T>> for &Expr<T> {
    fn into_expr(self) -> Expr<Option<T>> {
        Expr::from_node(self.node.clone())
    }
}

impl IntoExpr<String> for &str {
    fn into_expr(self) -> Expr<String> {
        Expr::val(self.to_string())
    }
}

impl IntoExpr<Option<String>> for &str {
    fn into_expr(self) -> Expr<Option<String>> {
        Expr::val(Some(self.to_string()))
    }
}

macro_rules! impl_nullable_lift {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr<Option<$ty>> for $ty {
                fn into_expr(self) -> Expr<Option<$ty>> {
                    Expr::val(Some(self))
                }
            }
        )*
    };
}

impl_nullable_lift!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    Vec<u8>,
    rust_decimal::Decimal,
    chrono::NaiveDate,
    chrono::NaiveTime,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
    uuid::Uuid,
    serde_json::Value,
);

/// Types arithmetic is defined for.
pub trait Numeric: SqlValue {}

impl Numeric for i16 {}
impl Numeric for i32 {}
impl Numeric for i64 {}
impl Numeric for f32 {}
impl Numeric for f64 {}
impl Numeric for rust_decimal::Decimal {}
impl<T: Numeric> Numeric for Option<T> {}

/// Types the text functions are defined for.
pub trait Textual: SqlValue {
    /// Result type of `length`
    type Length: SqlValue;
}

impl Textual for String {
    type Length = i64;
}

impl Textual for Option<String> {
    type Length = Option<i64>;
}

impl<T> Expr<T> {
    /// Wrap an already built node.
    ///
    /// The node's type is not checked against `T`; an inconsistent tree is
    /// reported when the closure is compiled.
    pub fn from_node(node: ExpressionNode) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    pub fn node(&self) -> &ExpressionNode {
        &self.node
    }

    pub fn into_node(self) -> ExpressionNode {
        self.node
    }

    /// Call a SQL function by name.
    pub fn call(function: &str, args: Vec<ExpressionNode>) -> Self {
        Self::from_node(ExpressionNode::Call {
            function: function.to_ascii_lowercase(),
            args,
        })
    }

    fn binary<R>(&self, op: BinaryOperator, other: ExpressionNode) -> Expr<R> {
        Expr::from_node(ExpressionNode::BinaryOp {
            op,
            left: Box::new(self.node.clone()),
            right: Box::new(other),
        })
    }

    pub fn eq<V: IntoExpr<T>>(&self, other: V) -> Expr<bool> {
        self.binary(BinaryOperator::Eq, other.into_expr().node)
    }

    pub fn ne<V: IntoExpr<T>>(&self, other: V) -> Expr<bool> {
        self.binary(BinaryOperator::Ne, other.into_expr().node)
    }

    pub fn lt<V: IntoExpr<T>>(&self, other: V) -> Expr<bool> {
        self.binary(BinaryOperator::Lt, other.into_expr().node)
    }

    pub fn le<V: IntoExpr<T>>(&self, other: V) -> Expr<bool> {
        self.binary(BinaryOperator::Le, other.into_expr().node)
    }

    pub fn gt<V: IntoExpr<T>>(&self, other: V) -> Expr<bool> {
        self.binary(BinaryOperator::Gt, other.into_expr().node)
    }

    pub fn ge<V: IntoExpr<T>>(&self, other: V) -> Expr<bool> {
        self.binary(BinaryOperator::Ge, other.into_expr().node)
    }
}

impl<T: SqlValue> Expr<T> {
    /// A bound constant.
    pub fn val(value: T) -> Self {
        let ty = value.value_type();
        Self::from_node(ExpressionNode::constant(value.into_value(), ty))
    }

    /// Column `column` of the closure parameter `parameter`.
    pub(crate) fn column(parameter: &str, column: &str) -> Self {
        Self::from_node(ExpressionNode::member(parameter, column, T::SQL_TYPE))
    }
}

impl Expr<bool> {
    pub fn and<V: IntoExpr<bool>>(&self, other: V) -> Expr<bool> {
        logical(LogicalOperator::And, self.node.clone(), other.into_expr().node)
    }

    pub fn or<V: IntoExpr<bool>>(&self, other: V) -> Expr<bool> {
        logical(LogicalOperator::Or, self.node.clone(), other.into_expr().node)
    }
}

fn logical(op: LogicalOperator, left: ExpressionNode, right: ExpressionNode) -> Expr<bool> {
    Expr::from_node(ExpressionNode::LogicalOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

impl<T: SqlValue> Expr<Option<T>> {
    /// `x IS NULL`
    pub fn is_null(&self) -> Expr<bool> {
        self.binary(
            BinaryOperator::Eq,
            ExpressionNode::constant(T::null_value(), SqlType::Null),
        )
    }

    /// `x IS NOT NULL`
    pub fn is_not_null(&self) -> Expr<bool> {
        self.binary(
            BinaryOperator::Ne,
            ExpressionNode::constant(T::null_value(), SqlType::Null),
        )
    }

    /// `COALESCE(x, fallback)`
    pub fn coalesce<V: IntoExpr<T>>(&self, fallback: V) -> Expr<T> {
        Expr::<T>::call(
            "coalesce",
            vec![self.node.clone(), fallback.into_expr().node],
        )
    }
}

impl<T: Textual> Expr<T> {
    /// `x LIKE pattern`; the pattern is used as given.
    pub fn like<V: IntoExpr<T>>(&self, pattern: V) -> Expr<bool> {
        self.binary(BinaryOperator::Like, pattern.into_expr().node)
    }

    /// `x LIKE '%needle%'` with `needle` escaped.
    pub fn contains(&self, needle: &str) -> Expr<bool> {
        self.like_pattern(format!("%{}%", escape_like(needle)))
    }

    pub fn starts_with(&self, prefix: &str) -> Expr<bool> {
        self.like_pattern(format!("{}%", escape_like(prefix)))
    }

    pub fn ends_with(&self, suffix: &str) -> Expr<bool> {
        self.like_pattern(format!("%{}", escape_like(suffix)))
    }

    pub fn lower(&self) -> Expr<T> {
        Self::call("lower", vec![self.node.clone()])
    }

    pub fn upper(&self) -> Expr<T> {
        Self::call("upper", vec![self.node.clone()])
    }

    pub fn trim(&self) -> Expr<T> {
        Self::call("trim", vec![self.node.clone()])
    }

    pub fn length(&self) -> Expr<T::Length> {
        Expr::call("length", vec![self.node.clone()])
    }

    fn like_pattern(&self, pattern: String) -> Expr<bool> {
        self.binary(
            BinaryOperator::Like,
            ExpressionNode::constant(pattern.into_value(), SqlType::Text),
        )
    }
}

impl<T: Numeric> Expr<T> {
    pub fn abs(&self) -> Expr<T> {
        Self::call("abs", vec![self.node.clone()])
    }
}

/// Escape the LIKE wildcards in `raw` with `\`.
pub(crate) fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

macro_rules! impl_arithmetic {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<T: Numeric, V: IntoExpr<T>> ops::$trait<V> for Expr<T> {
                type Output = Expr<T>;

                fn $method(self, rhs: V) -> Expr<T> {
                    self.binary(BinaryOperator::$op, rhs.into_expr().node)
                }
            }

            impl<T: Numeric, V: IntoExpr<T>> ops::$trait<V> for &Expr<T> {
                type Output = Expr<T>;

                fn $method(self, rhs: V) -> Expr<T> {
                    self.binary(BinaryOperator::$op, rhs.into_expr().node)
                }
            }
        )*
    };
}

impl_arithmetic!(
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Mod,
);

impl<T: Numeric> ops::Neg for Expr<T> {
    type Output = Expr<T>;

    fn neg(self) -> Expr<T> {
        unary(UnaryOperator::Neg, self.node)
    }
}

impl<T: Numeric> ops::Neg for &Expr<T> {
    type Output = Expr<T>;

    fn neg(self) -> Expr<T> {
        unary(UnaryOperator::Neg, self.node.clone())
    }
}

impl ops::Not for Expr<bool> {
    type Output = Expr<bool>;

    fn not(self) -> Expr<bool> {
        unary(UnaryOperator::Not, self.node)
    }
}

impl ops::Not for &Expr<bool> {
    type Output = Expr<bool>;

    fn not(self) -> Expr<bool> {
        unary(UnaryOperator::Not, self.node.clone())
    }
}

fn unary<T>(op: UnaryOperator, operand: ExpressionNode) -> Expr<T> {
    Expr::from_node(ExpressionNode::UnaryOp {
        op,
        operand: Box::new(operand),
    })
}

impl<V: IntoExpr<bool>> ops::BitAnd<V> for Expr<bool> {
    type Output = Expr<bool>;

    fn bitand(self, rhs: V) -> Expr<bool> {
        logical(LogicalOperator::And, self.node, rhs.into_expr().node)
    }
}

impl<V: IntoExpr<bool>> ops::BitAnd<V> for &Expr<bool> {
    type Output = Expr<bool>;

    fn bitand(self, rhs: V) -> Expr<bool> {
        self.and(rhs)
    }
}

impl<V: IntoExpr<bool>> ops::BitOr<V> for Expr<bool> {
    type Output = Expr<bool>;

    fn bitor(self, rhs: V) -> Expr<bool> {
        logical(LogicalOperator::Or, self.node, rhs.into_expr().node)
    }
}

impl<V: IntoExpr<bool>> ops::BitOr<V> for &Expr<bool> {
    type Output = Expr<bool>;

    fn bitor(self, rhs: V) -> Expr<bool> {
        self.or(rhs)
    }
}
