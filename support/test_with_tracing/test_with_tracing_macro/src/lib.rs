// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute macro backing the `test_with_tracing` crate.

use proc_macro2::TokenStream;
use quote::quote;
use syn::Error;
use syn::ItemFn;
use syn::parse_macro_input;
use syn::spanned::Spanned;

/// Drop-in replacement for `#[test]` that initializes `tracing` output
/// before running the test body.
///
/// Other attributes on the function, such as `#[should_panic]` or
/// `#[ignore]`, are forwarded to the generated test.
#[proc_macro_attribute]
pub fn test(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attr = TokenStream::from(attr);
    if !attr.is_empty() {
        return Error::new(attr.span(), "`test` takes no arguments")
            .to_compile_error()
            .into();
    }
    let item = parse_macro_input!(item as ItemFn);
    expand(item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand(mut item: ItemFn) -> syn::Result<TokenStream> {
    let sig = &item.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(Error::new(asyncness.span(), "async tests are not supported"));
    }
    if !sig.generics.params.is_empty() {
        return Err(Error::new(sig.generics.span(), "tests cannot be generic"));
    }
    if !sig.inputs.is_empty() {
        return Err(Error::new(sig.inputs.span(), "tests take no arguments"));
    }

    // Outer attributes belong on the generated test, not the inner body.
    let attrs = std::mem::take(&mut item.attrs);
    let name = &item.sig.ident;
    let output = &item.sig.output;
    let vis = &item.vis;

    Ok(quote! {
        #[::core::prelude::v1::test]
        #(#attrs)*
        #vis fn #name() #output {
            #item
            ::test_with_tracing::init();
            #name()
        }
    })
}
