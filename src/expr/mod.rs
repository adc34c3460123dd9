//! Expression compiler: the AST, typed builders and the introspector.

mod function;
pub mod introspect;
pub mod node;
pub mod typed;

pub use introspect::{compile_predicate, compile_selector, Introspector};
pub use node::{BinaryOperator, ExpressionNode, LogicalOperator, UnaryOperator};
pub use typed::{Expr, IntoExpr, Numeric, Textual};
