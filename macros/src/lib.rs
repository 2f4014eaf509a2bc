use proc_macro::TokenStream;
use quote::quote;
use syn::{Ident, ItemFn, LitStr, parse_macro_input, spanned::Spanned};

const USAGE: &str = "rxdemand_macro::test only accepts: #[rxdemand_macro::test], \
                     #[rxdemand_macro::test(local)], #[rxdemand_macro::test(shared)], or string \
                     equivalents";

/// Marks a test that runs on every supported target.
///
/// Sync tests become plain `#[test]`s. Async tests run on tokio: `local` (the
/// default) uses a current-thread runtime, `shared` a multi-thread runtime so
/// producers and consumers really do run on different workers.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);
  let is_async = input.sig.asyncness.is_some();
  let raw_args = proc_macro2::TokenStream::from(attr);

  let tokio_args = if raw_args.is_empty() {
    proc_macro2::TokenStream::new()
  } else if !is_async {
    return syn::Error::new(
      raw_args.span(),
      "rxdemand_macro::test flavor args are only supported for async tests",
    )
    .to_compile_error()
    .into();
  } else {
    match parse_flavor(raw_args) {
      Ok(args) => args,
      Err(err) => return err.to_compile_error().into(),
    }
  };

  let wasm_attr = if is_async {
    quote!(wasm_bindgen_test::wasm_bindgen_test(async))
  } else {
    quote!(wasm_bindgen_test::wasm_bindgen_test)
  };
  let native_attr = if is_async { quote!(tokio::test(#tokio_args)) } else { quote!(test) };

  quote! {
    #[cfg_attr(target_arch = "wasm32", #wasm_attr)]
    #[cfg_attr(not(target_arch = "wasm32"), #native_attr)]
    #input
  }
  .into()
}

fn parse_flavor(raw_args: proc_macro2::TokenStream) -> syn::Result<proc_macro2::TokenStream> {
  let (flavor, span) = if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
    (ident.to_string(), ident.span())
  } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
    (lit.value(), lit.span())
  } else {
    return Err(syn::Error::new(raw_args.span(), USAGE));
  };

  match flavor.as_str() {
    "local" => Ok(quote!(flavor = "current_thread")),
    "shared" => Ok(quote!(flavor = "multi_thread", worker_threads = 4)),
    _ => Err(syn::Error::new(span, USAGE)),
  }
}
