//! Procedural macros for sqlambda
//!
//! This crate provides the `Entity` derive.

mod attributes;
mod macros;
mod utils;

use proc_macro::TokenStream;

/// Derive macro for `Entity`
///
/// For a struct with named fields this generates:
/// - the `Entity` implementation (table name, column descriptors, field proxy)
/// - a `<Name>Fields` struct holding one symbolic `Expr<T>` per field
/// - a `FromRow` implementation for every row type the field types decode from
///
/// The table name defaults to the snake_case struct name and can be set with
/// `#[table_name = "..."]`. Columns default to the field name; override one
/// with `#[column_name = "..."]`.
///
/// ```ignore
/// #[derive(Entity)]
/// #[table_name = "person"]
/// struct Person {
///     id: i64,
///     #[column_name = "full_name"]
///     name: String,
///     email: Option<String>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(table_name, column_name))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    macros::derive_entity(input)
}
