//! Derive macro for error enums.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations
//! from `#[error("...")]` attributes. Replacement for the `thiserror` crate,
//! scoped to what the VM's error types need: enums whose variants are unit,
//! tuple, or struct shaped.
//!
//! # Usage
//!
//! ```ignore
//! use k0_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VmError {
//!     #[error("unknown opcode 0x{0:02x}")]
//!     UnknownOpcode(u8),
//!     #[error("register r{register} read before assignment")]
//!     UnboundRegister { register: i64 },
//!     #[error("halted")]
//!     Halted,
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

/// Derives `Display` and `Error` for an enum.
///
/// Each variant must carry an `#[error("...")]` attribute with the display
/// message. Tuple fields interpolate as `{0}`, `{1}`, struct fields as
/// `{field_name}`.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Error derive only supports enums",
        ));
    };

    let arms = data
        .variants
        .iter()
        .map(|variant| {
            let variant_name = &variant.ident;
            let message = error_message(variant)?;

            let arm = match &variant.fields {
                Fields::Unit => quote! {
                    Self::#variant_name => write!(f, #message),
                },
                Fields::Unnamed(fields) => {
                    let bindings: Vec<_> = (0..fields.unnamed.len())
                        .map(|i| quote::format_ident!("f{}", i))
                        .collect();
                    let format_str = positional_to_named(&message, fields.unnamed.len());
                    quote! {
                        Self::#variant_name(#(#bindings),*) =>
                            write!(f, #format_str, #(#bindings = #bindings),*),
                    }
                }
                Fields::Named(fields) => {
                    let bindings: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                    quote! {
                        Self::#variant_name { #(#bindings),* } =>
                            write!(f, #message, #(#bindings = #bindings),*),
                    }
                }
            };
            Ok(arm)
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#arms)*
                }
            }
        }

        impl ::std::error::Error for #name {}
    })
}

/// Extracts the message from a variant's `#[error("...")]` attribute.
fn error_message(variant: &syn::Variant) -> syn::Result<String> {
    for attr in &variant.attrs {
        if !attr.path().is_ident("error") {
            continue;
        }
        let Meta::List(meta_list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")]",
            ));
        };
        return match syn::parse2::<Lit>(meta_list.tokens.clone()) {
            Ok(Lit::Str(lit_str)) => Ok(lit_str.value()),
            _ => Err(syn::Error::new_spanned(
                &attr.meta,
                "#[error] message must be a string literal, e.g. #[error(\"unknown block {block}\")]",
            )),
        };
    }

    Err(syn::Error::new_spanned(
        variant,
        format!(
            "missing #[error(\"...\")] attribute on variant `{}`",
            variant.ident
        ),
    ))
}

/// Converts positional format args `{0}`, `{1}` to the bound names `{f0}`, `{f1}`.
fn positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result.replace(&format!("{{{i}}}"), &format!("{{f{i}}}"));
        result = result.replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    result
}
