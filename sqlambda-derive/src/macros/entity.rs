//! Derive macro for `Entity`
//!
//! Generates the `Entity` implementation, the `<Name>Fields` proxy struct and
//! a `FromRow` implementation generic over the row type.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::attributes;
use crate::utils;

struct ColumnField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    column: String,
}

pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let vis = &input.vis;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let named = match &input.data {
        Data::Struct(syn::DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Entity can only be derived for structs with named fields",
            ));
        }
    };

    if let Some(attr) = attributes::malformed_attribute(&input.attrs, "table_name") {
        return Err(syn::Error::new_spanned(
            attr,
            "expected #[table_name = \"...\"]",
        ));
    }
    let table_name = attributes::extract_table_name(&input.attrs)
        .unwrap_or_else(|| utils::snake_case(&struct_name.to_string()));

    let mut columns = Vec::with_capacity(named.len());
    for field in named {
        if let Some(attr) = attributes::malformed_attribute(&field.attrs, "column_name") {
            return Err(syn::Error::new_spanned(
                attr,
                "expected #[column_name = \"...\"]",
            ));
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let column = attributes::extract_column_name(field).unwrap_or_else(|| ident.to_string());
        if columns.iter().any(|c: &ColumnField<'_>| c.column == column) {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate column name `{column}`"),
            ));
        }
        columns.push(ColumnField {
            ident,
            ty: &field.ty,
            column,
        });
    }

    if columns.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Entity needs at least one mapped field",
        ));
    }

    let fields_name = format_ident!("{}Fields", struct_name);

    let descriptors: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let column = &c.column;
            let field = c.ident.to_string();
            let ty = c.ty;
            quote! {
                ::sqlambda::ColumnDescriptor {
                    name: #column,
                    field: #field,
                    sql_type: <#ty as ::sqlambda::SqlValue>::SQL_TYPE,
                    nullable: <#ty as ::sqlambda::SqlValue>::NULLABLE,
                }
            }
        })
        .collect();

    let proxy_fields: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let ident = c.ident;
            let ty = c.ty;
            quote! { pub #ident: ::sqlambda::Expr<#ty> }
        })
        .collect();

    let proxy_init: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let ident = c.ident;
            let ty = c.ty;
            let column = &c.column;
            quote! { #ident: <Self as ::sqlambda::Entity>::field::<#ty>(#column) }
        })
        .collect();

    let decode_bounds: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let ty = c.ty;
            quote! { #ty: ::sqlambda::Decode<R> }
        })
        .collect();

    let row_fields: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let ident = c.ident;
            let ty = c.ty;
            let column = &c.column;
            quote! { #ident: <R as ::sqlambda::SqlRow>::get::<#ty>(row, #column)? }
        })
        .collect();

    let fields_doc = format!("Symbolic columns of [`{struct_name}`].");

    Ok(quote! {
        #[doc = #fields_doc]
        #[derive(Clone, Debug)]
        #vis struct #fields_name {
            #(#proxy_fields,)*
        }

        impl ::sqlambda::Entity for #struct_name {
            type Fields = #fields_name;

            fn table_name() -> &'static str {
                #table_name
            }

            fn columns() -> &'static [::sqlambda::ColumnDescriptor] {
                const COLUMNS: &[::sqlambda::ColumnDescriptor] = &[
                    #(#descriptors,)*
                ];
                COLUMNS
            }

            fn fields() -> Self::Fields {
                #fields_name {
                    #(#proxy_init,)*
                }
            }
        }

        impl<R: ::sqlambda::SqlRow> ::sqlambda::FromRow<R> for #struct_name
        where
            #(#decode_bounds,)*
        {
            fn from_row(row: &R) -> ::std::result::Result<Self, ::sqlambda::QueryError> {
                ::std::result::Result::Ok(Self {
                    #(#row_fields,)*
                })
            }
        }
    })
}
