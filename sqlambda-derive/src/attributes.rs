//! Attribute parsing utilities

use syn::{Attribute, ExprLit, Field, Lit};

fn string_value(attrs: &[Attribute], name: &str) -> Option<String> {
    for attr in attrs {
        if attr.path().is_ident(name) {
            if let Ok(meta) = attr.meta.require_name_value() {
                if let syn::Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) = &meta.value
                {
                    return Some(s.value());
                }
            }
        }
    }
    None
}

/// Extract table name from `#[table_name = "..."]`
pub fn extract_table_name(attrs: &[Attribute]) -> Option<String> {
    string_value(attrs, "table_name")
}

/// Extract column name from `#[column_name = "..."]`
pub fn extract_column_name(field: &Field) -> Option<String> {
    string_value(&field.attrs, "column_name")
}

/// Find an attribute of ours that is not in `name = "literal"` form.
pub fn malformed_attribute<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident(name))
        .find(|attr| string_value(std::slice::from_ref(*attr), name).is_none())
}
