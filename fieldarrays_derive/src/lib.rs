extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, DeriveInput, LitStr, Type};

/// Derives `fieldarrays::Field` for a unit struct.
///
/// The value type is required: `#[field(value = f64)]`. The optional keys
/// `name = ".."` and `description = ".."` default to the struct's name and
/// to its doc comment.
#[proc_macro_derive(Field, attributes(field))]
pub fn derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match derive_field(&ast) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_field(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {

    let name = &ast.ident;

    match &ast.data {
        syn::Data::Struct(data_struct) if matches!(data_struct.fields, syn::Fields::Unit) => { },
        _ => return Err(syn::Error::new_spanned(name, "`Field` can only be derived for unit structs")),
    }
    if !ast.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&ast.generics, "`Field` cannot be derived for generic structs"));
    }

    let mut value: Option<Type> = None;
    let mut field_name: Option<LitStr> = None;
    let mut description: Option<LitStr> = None;
    for attr in ast.attrs.iter().filter(|attr| attr.path().is_ident("field")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("value") {
                value = Some(meta.value()?.parse()?);
            }
            else if meta.path.is_ident("name") {
                field_name = Some(meta.value()?.parse()?);
            }
            else if meta.path.is_ident("description") {
                description = Some(meta.value()?.parse()?);
            }
            else {
                return Err(meta.error("expected `value`, `name`, or `description`"));
            }
            Ok(())
        })?;
    }

    let value = value.ok_or_else(|| syn::Error::new_spanned(name, "missing `#[field(value = T)]` attribute"))?;
    let field_name = field_name.map(|lit| lit.value()).unwrap_or_else(|| name.to_string());
    let description = description.map(|lit| lit.value()).unwrap_or_else(|| doc_comment(&ast.attrs));

    Ok(quote! {
        impl ::fieldarrays::Field for #name {
            type Value = #value;
            const NAME: &'static str = #field_name;
            const DESCRIPTION: &'static str = #description;
        }
    })
}

/// The struct's doc comment, with lines trimmed and joined by spaces.
fn doc_comment(attrs: &[Attribute]) -> String {
    attrs.iter()
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(meta) if meta.path.is_ident("doc") => match &meta.value {
                syn::Expr::Lit(syn::ExprLit { lit: syn::Lit::Str(text), .. }) => Some(text.value()),
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
