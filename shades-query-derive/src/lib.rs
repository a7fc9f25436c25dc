//! Derive macros for [shades-query](https://crates.io/crates/shades-query).
//!
//! `#[derive(Struct)]` implements `ToType` and `ToValue` for a struct with named fields, so that it can describe
//! shader inputs, uniforms, constants or outputs.
//!
//! The `shades` attribute accepts:
//!
//! - `#[shades(name = "Light")]` on the struct, to change the name of the shading language struct.
//! - `#[shades(rename = "gl_Position")]` on a field, to change the name of the field.
//! - `#[shades(len = 4)]` on a field, to annotate the length of a `Vec<T>` field.

use proc_macro::TokenStream;
use quote::{quote, ToTokens};
use syn::{
  parse::{Parse, ParseStream},
  parse_macro_input,
  punctuated::Punctuated,
  Attribute, Data, DataStruct, DeriveInput, Fields, Generics, Ident, Lit, LitInt, LitStr, MetaNameValue, Token, Type,
};

#[derive(Debug)]
struct Struct {
  ident: Ident,
  generics: Generics,
  name: LitStr,
  fields: Vec<Field>,
}

#[derive(Debug)]
struct Field {
  ident: Ident,
  ty: Type,
  name: LitStr,
  len: Option<LitInt>,
}

#[derive(Debug, Default)]
struct Options {
  name: Option<LitStr>,
  len: Option<LitInt>,
}

impl Options {
  fn from_attrs(attrs: &[Attribute], name_key: &str) -> syn::Result<Self> {
    let mut options = Options::default();

    for attr in attrs.iter().filter(|attr| attr.path.is_ident("shades")) {
      let metas = attr.parse_args_with(Punctuated::<MetaNameValue, Token![,]>::parse_terminated)?;

      for meta in metas {
        let key = meta
          .path
          .get_ident()
          .map(Ident::to_string)
          .unwrap_or_default();

        match (key.as_str(), meta.lit) {
          (key, Lit::Str(name)) if key == name_key => options.name = Some(name),
          ("len", Lit::Int(len)) if name_key == "rename" => options.len = Some(len),
          _ => {
            return Err(syn::Error::new_spanned(
              meta.path,
              format!("unknown shades attribute; expected `{} = \"…\"` or `len = N`", name_key),
            ))
          }
        }
      }
    }

    Ok(options)
  }
}

impl Parse for Struct {
  fn parse(input: ParseStream) -> syn::Result<Self> {
    let input: DeriveInput = input.parse()?;

    let options = Options::from_attrs(&input.attrs, "name")?;
    let name = options
      .name
      .unwrap_or_else(|| LitStr::new(&input.ident.to_string(), input.ident.span()));

    let named = match input.data {
      Data::Struct(DataStruct {
        fields: Fields::Named(named),
        ..
      }) => named,

      _ => {
        return Err(syn::Error::new_spanned(
          &input.ident,
          "only structs with named fields can derive Struct",
        ))
      }
    };

    let mut fields = Vec::with_capacity(named.named.len());
    for field in named.named {
      let options = Options::from_attrs(&field.attrs, "rename")?;
      let ident = match field.ident {
        Some(ident) => ident,
        None => return Err(syn::Error::new_spanned(&field.ty, "unnamed field")),
      };
      let name = options
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));

      fields.push(Field {
        ident,
        ty: field.ty,
        name,
        len: options.len,
      });
    }

    Ok(Struct {
      ident: input.ident,
      generics: input.generics,
      name,
      fields,
    })
  }
}

impl ToTokens for Struct {
  fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
    let ident = &self.ident;
    let name = &self.name;
    let (impl_generics, ty_generics, where_clause) = self.generics.split_for_impl();

    let field_defs = self.fields.iter().map(|field| {
      let name = &field.name;
      let ty = &field.ty;
      let field_ty = match field.len {
        Some(ref len) => quote! { <#ty as ::shades_query::types::ToType>::ty().with_len(#len) },
        None => quote! { <#ty as ::shades_query::types::ToType>::ty() },
      };

      quote! { ::shades_query::types::FieldDef::new(#name, #field_ty) }
    });

    let field_values = self.fields.iter().map(|field| {
      let ident = &field.ident;
      quote! { ::shades_query::reflect::ToValue::to_value(&self.#ident) }
    });

    let q = quote! {
      impl #impl_generics ::shades_query::types::ToType for #ident #ty_generics #where_clause {
        fn ty() -> ::shades_query::types::Type {
          ::shades_query::types::Type::structure(
            ::shades_query::types::StructDef::new(#name, vec![#(#field_defs),*])
          )
        }
      }

      impl #impl_generics ::shades_query::reflect::ToValue for #ident #ty_generics #where_clause {
        fn to_value(&self) -> ::shades_query::reflect::Value {
          ::shades_query::reflect::Value::Struct(vec![#(#field_values),*])
        }
      }
    };

    q.to_tokens(tokens);
  }
}

/// Derive `ToType` and `ToValue` for a struct with named fields.
#[proc_macro_derive(Struct, attributes(shades))]
pub fn derive_struct(tokens: TokenStream) -> TokenStream {
  let parsed = parse_macro_input!(tokens as Struct);
  parsed.to_token_stream().into()
}
