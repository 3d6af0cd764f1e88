//! Derive macro binding structs to CBOR maps and arrays.
//!
//! `#[derive(Cbor)]` generates `ToCbor` and `FromCbor` implementations.
//! By default a struct encodes as a map whose entries are sorted by the
//! bytewise order of their encoded keys, so the output is canonical without
//! per-instance sorting. Field attributes:
//!
//! - `#[cbor(key = 1)]` or `#[cbor(key = "name")]` — integer or text map
//!   key; the default key is the field's name.
//! - `#[cbor(omitempty)]` — omit the entry when the value equals its empty
//!   value.
//! - `#[cbor(skip)]` — exclude the field entirely.
//!
//! The struct-level `#[cbor(array)]` attribute switches to positional
//! encoding: fields in declaration order, no keys. On decode, surplus
//! source items are skipped and missing trailing fields are defaulted.
//!
//! ```ignore
//! #[derive(Cbor, Default)]
//! struct Header {
//!     #[cbor(key = 1, omitempty)]
//!     alg: i64,
//!     #[cbor(key = 4, omitempty)]
//!     kid: Bytes<Vec<u8>>,
//! }
//! ```

mod cbor;

use cbor::{int_key_bytes, text_key_bytes};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Expr, Fields, Lit, parse_macro_input};

#[proc_macro_derive(Cbor, attributes(cbor))]
pub fn derive_cbor(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let (fields, skipped) = parse_fields(input)?;
    let name = &input.ident;
    if want_array(input) {
        let encode = encode_array(name, &fields);
        let decode = decode_array(name, &fields, &skipped);
        Ok(quote! { #encode #decode })
    } else {
        let encode = encode_map(name, &fields);
        let decode = decode_map(name, &fields, &skipped);
        Ok(quote! { #encode #decode })
    }
}

enum Key {
    Int(i64),
    Text(String),
}

struct FieldInfo {
    ident: syn::Ident,
    ty: syn::Type,
    key: Key,
    key_bytes: Vec<u8>,
    omitempty: bool,
}

fn parse_fields(input: &DeriveInput) -> syn::Result<(Vec<FieldInfo>, Vec<syn::Ident>)> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(input, "only named fields supported"));
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "only structs supported")),
    };

    let mut result = Vec::new();
    let mut skipped = Vec::new();
    for field in fields {
        let ident = field.ident.clone().unwrap();
        let mut key = None;
        let mut omitempty = false;
        let mut skip = false;

        for attr in &field.attrs {
            if attr.path().is_ident("cbor") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("key") {
                        let value: Expr = meta.value()?.parse()?;
                        key = Some(parse_key(&value)?);
                        Ok(())
                    } else if meta.path.is_ident("omitempty") {
                        omitempty = true;
                        Ok(())
                    } else if meta.path.is_ident("skip") {
                        skip = true;
                        Ok(())
                    } else {
                        Err(meta.error("unknown cbor attribute"))
                    }
                })?;
            }
        }
        if skip {
            skipped.push(ident);
            continue;
        }

        let key = key.unwrap_or_else(|| Key::Text(ident.to_string()));
        let key_bytes = match &key {
            Key::Int(k) => int_key_bytes(*k),
            Key::Text(s) => text_key_bytes(s),
        };
        result.push(FieldInfo {
            ident,
            ty: field.ty.clone(),
            key,
            key_bytes,
            omitempty,
        });
    }
    Ok((result, skipped))
}

/// Parses `key = N` (integer, possibly negated) or `key = "name"`.
fn parse_key(expr: &Expr) -> syn::Result<Key> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(i) => Ok(Key::Int(i.base10_parse()?)),
            Lit::Str(s) => Ok(Key::Text(s.value())),
            _ => Err(syn::Error::new_spanned(expr, "expected integer or string key")),
        },
        Expr::Unary(unary) => {
            if let syn::UnOp::Neg(_) = unary.op
                && let Expr::Lit(lit) = &*unary.expr
                && let Lit::Int(i) = &lit.lit
            {
                let val: i64 = i.base10_parse()?;
                return Ok(Key::Int(-val));
            }
            Err(syn::Error::new_spanned(expr, "expected integer or string key"))
        }
        _ => Err(syn::Error::new_spanned(expr, "expected integer or string key")),
    }
}

fn want_array(input: &DeriveInput) -> bool {
    for attr in &input.attrs {
        if attr.path().is_ident("cbor") {
            let mut is_array = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("array") {
                    is_array = true;
                }
                Ok(())
            });
            if is_array {
                return true;
            }
        }
    }
    false
}

/// Fields in encoded-key byte order, fixed at expansion time.
fn sorted<'a>(fields: &'a [FieldInfo]) -> Vec<&'a FieldInfo> {
    let mut sorted: Vec<_> = fields.iter().collect();
    sorted.sort_by(|a, b| a.key_bytes.cmp(&b.key_bytes));
    sorted
}

fn encode_map(name: &syn::Ident, fields: &[FieldInfo]) -> TokenStream2 {
    let sorted = sorted(fields);

    let count_fields: Vec<_> = sorted
        .iter()
        .map(|f| {
            let ident = &f.ident;
            if f.omitempty {
                quote! {
                    if !tern_cbor::encode::ToCbor::is_empty_value(&self.#ident) {
                        len += 1;
                    }
                }
            } else {
                quote! { len += 1; }
            }
        })
        .collect();

    let emit_fields: Vec<_> = sorted
        .iter()
        .map(|f| {
            let ident = &f.ident;
            let key_bytes = &f.key_bytes;
            let entry = quote! {
                m.emit_raw(&[#(#key_bytes),*]);
                m.emit(&self.#ident);
            };
            if f.omitempty {
                quote! {
                    if !tern_cbor::encode::ToCbor::is_empty_value(&self.#ident) {
                        #entry
                    }
                }
            } else {
                entry
            }
        })
        .collect();

    let body = if fields.is_empty() {
        quote! { encoder.emit_map(Some(0), |_| {}); }
    } else {
        quote! {
            let mut len: usize = 0;
            #(#count_fields)*
            encoder.emit_map(Some(len), |m| {
                #(#emit_fields)*
            });
        }
    };

    quote! {
        impl tern_cbor::encode::ToCbor for #name {
            fn to_cbor(&self, encoder: &mut tern_cbor::encode::Encoder) {
                #body
            }
        }
    }
}

fn decode_map(name: &syn::Ident, fields: &[FieldInfo], skipped: &[syn::Ident]) -> TokenStream2 {
    let struct_name = name.to_string();
    let idents: Vec<_> = fields.iter().map(|f| &f.ident).collect();
    let tys: Vec<_> = fields.iter().map(|f| &f.ty).collect();
    let seens: Vec<_> = fields
        .iter()
        .map(|f| format_ident!("__seen_{}", f.ident))
        .collect();

    let key_arms: Vec<_> = fields
        .iter()
        .enumerate()
        .map(|(idx, f)| match &f.key {
            Key::Int(k) => {
                let sign = *k < 0;
                let mag = if *k < 0 { !*k as u64 } else { *k as u64 };
                quote! {
                    tern_cbor::decode::Item::Integer(i)
                        if i.sign == #sign && i.magnitude == #mag => Some(#idx),
                }
            }
            Key::Text(s) => quote! {
                tern_cbor::decode::Item::Text { data, .. } if data == #s => Some(#idx),
            },
        })
        .collect();

    let field_arms: Vec<_> = fields
        .iter()
        .enumerate()
        .map(|(idx, f)| {
            let ident = &f.ident;
            let ty = &f.ty;
            let seen = &seens[idx];
            let field_name = ident.to_string();
            quote! {
                Some(#idx) => {
                    if #seen {
                        if deferred.is_none() {
                            deferred = Some(tern_cbor::decode::Error::semantic("duplicate map key"));
                        }
                        m.skip_value()?;
                    } else {
                        #seen = true;
                        match m.parse::<#ty>() {
                            Ok(v) => #ident = v,
                            Err(e) if e.is_type_mismatch() => {
                                if deferred.is_none() {
                                    deferred = Some(e.with_field(#struct_name, #field_name));
                                }
                                m.skip_value()?;
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        })
        .collect();

    quote! {
        impl tern_cbor::decode::FromCbor for #name {
            type Error = tern_cbor::decode::Error;

            fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                tern_cbor::decode::parse_map(data, |m, shortest, _tags| {
                    let mut deferred: Option<tern_cbor::decode::Error> = None;
                    #( let mut #idents: #tys = Default::default(); )*
                    #( let mut #seens = false; )*
                    loop {
                        let key = m.try_parse_value(|item, _, _| {
                            Ok::<_, tern_cbor::decode::Error>(match item {
                                #(#key_arms)*
                                mut other => {
                                    other.skip()?;
                                    None
                                }
                            })
                        })?;
                        match key {
                            None => break,
                            Some((idx, _)) => match idx {
                                #(#field_arms)*
                                _ => {
                                    m.skip_value()?;
                                }
                            },
                        }
                    }
                    if let Some(e) = deferred {
                        return Err(e);
                    }
                    Ok((#name { #(#idents,)* #(#skipped: Default::default(),)* }, shortest))
                })
                .map(|((v, s), len)| (v, s, len))
            }
        }
    }
}

fn encode_array(name: &syn::Ident, fields: &[FieldInfo]) -> TokenStream2 {
    let len = fields.len();
    let idents: Vec<_> = fields.iter().map(|f| &f.ident).collect();

    let body = if fields.is_empty() {
        quote! { encoder.emit_array(Some(0), |_| {}); }
    } else {
        quote! {
            encoder.emit_array(Some(#len), |a| {
                #( a.emit(&self.#idents); )*
            });
        }
    };

    quote! {
        impl tern_cbor::encode::ToCbor for #name {
            fn to_cbor(&self, encoder: &mut tern_cbor::encode::Encoder) {
                #body
            }
        }
    }
}

fn decode_array(name: &syn::Ident, fields: &[FieldInfo], skipped: &[syn::Ident]) -> TokenStream2 {
    let struct_name = name.to_string();
    let idents: Vec<_> = fields.iter().map(|f| &f.ident).collect();
    let tys: Vec<_> = fields.iter().map(|f| &f.ty).collect();

    let decode_fields: Vec<_> = fields
        .iter()
        .map(|f| {
            let ident = &f.ident;
            let ty = &f.ty;
            let field_name = ident.to_string();
            quote! {
                match a.try_parse::<#ty>() {
                    Ok(Some(v)) => #ident = v,
                    Ok(None) => {}
                    Err(e) if e.is_type_mismatch() => {
                        if deferred.is_none() {
                            deferred = Some(e.with_field(#struct_name, #field_name));
                        }
                        a.skip_value()?;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
        .collect();

    quote! {
        impl tern_cbor::decode::FromCbor for #name {
            type Error = tern_cbor::decode::Error;

            fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                tern_cbor::decode::parse_array(data, |a, shortest, _tags| {
                    let mut deferred: Option<tern_cbor::decode::Error> = None;
                    #( let mut #idents: #tys = Default::default(); )*
                    #(#decode_fields)*
                    a.skip_to_end()?;
                    if let Some(e) = deferred {
                        return Err(e);
                    }
                    Ok((#name { #(#idents,)* #(#skipped: Default::default(),)* }, shortest))
                })
                .map(|((v, s), len)| (v, s, len))
            }
        }
    }
}
