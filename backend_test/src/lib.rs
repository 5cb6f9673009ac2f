use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one and inject
/// dependencies, all backed by a fresh in-memory store.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`crate::model::store::StoreHandle`], and
/// [`crate::model::store::Records<T>`], in any order.
#[proc_macro_attribute]
pub fn backend_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let (test_args, bindings) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["voto_backend"],
                log::LevelFilter::Debug,
                "{h({l:5})} {t} - {m}{n}",
            );

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                // Test setup.
                let store: crate::model::store::StoreHandle =
                    std::sync::Arc::new(crate::model::store::MemoryStore::new());
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_store(store.clone(), crate::config::Config::example()),
                )
                .await
                .unwrap();

                #(#bindings)*

                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, and work out how to produce each of its
/// parameters, rejecting unknown ones.
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, Vec<TokenStream2>), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut args = vec![];
    let mut bindings = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "StoreHandle" {
                            args.push(quote! { store.clone() });
                            continue;
                        }
                    } else if let Some(possible_records) = type_path.path.segments.last() {
                        if possible_records.ident == "Records" {
                            if let PathArguments::AngleBracketed(generics) =
                                &possible_records.arguments
                            {
                                if let Some(GenericArgument::Type(Type::Path(record_path))) =
                                    generics.args.first()
                                {
                                    if let Some(record_ident) = record_path.path.get_ident() {
                                        let ident = &pat_ident.ident;
                                        bindings.push(quote! {
                                            let #ident = crate::model::store::Records::<#record_ident>::from_store(&store);
                                        });
                                        args.push(quote! { #ident });
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `store_ident: StoreHandle` or `records_ident: Records<T>`",
        ));
    }

    Ok((args, bindings))
}
