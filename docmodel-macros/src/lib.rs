//! Procedural macros for the docmodel project.
//!
//! Provides `#[derive(Record)]`, which wires a struct into the record engine:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize, Record)]
//! #[record(collection = "posts", search = ["title", "body"])]
//! pub struct Post {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
//!     #[record(id)]
//!     pub id: Option<ObjectId>,
//!     #[record(created_at)]
//!     pub created_at: Option<DateTime>,
//!     #[record(updated_at)]
//!     pub updated_at: Option<DateTime>,
//!     pub title: String,
//!     pub body: String,
//! }
//! ```
//!
//! Marked fields must be `Option<ObjectId>` and `Option<bson::DateTime>` respectively.

#[allow(unused_extern_crates)]
extern crate self as docmodel_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, Ident, LitStr, Token, bracketed, parse_macro_input,
    punctuated::Punctuated, spanned::Spanned,
};

#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_record(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct RecordOptions {
    collection: Option<LitStr>,
    search: Option<Vec<LitStr>>,
}

#[derive(Default)]
struct MarkedFields {
    id: Option<Ident>,
    created_at: Option<Ident>,
    updated_at: Option<Ident>,
}

impl MarkedFields {
    fn is_empty(&self) -> bool {
        self.id.is_none() && self.created_at.is_none() && self.updated_at.is_none()
    }
}

fn parse_record_options(input: &DeriveInput) -> syn::Result<RecordOptions> {
    let mut options = RecordOptions::default();

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("record")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                options.collection = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("search") {
                let value = meta.value()?;
                let content;
                bracketed!(content in value);
                let fields = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;

                if fields.is_empty() {
                    return Err(meta.error("`search` needs at least one field"));
                }

                options.search = Some(fields.into_iter().collect());
                Ok(())
            } else {
                Err(meta.error("expected `collection` or `search`"))
            }
        })?;
    }

    Ok(options)
}

fn parse_marked_fields(input: &DeriveInput) -> syn::Result<MarkedFields> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "Record can only be derived for structs",
        ));
    };

    let mut marked = MarkedFields::default();

    let Fields::Named(fields) = &data.fields else {
        return Ok(marked);
    };

    for field in &fields.named {
        let Some(ident) = &field.ident else {
            continue;
        };

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("record")) {
            attr.parse_nested_meta(|meta| {
                let slot = if meta.path.is_ident("id") {
                    &mut marked.id
                } else if meta.path.is_ident("created_at") {
                    &mut marked.created_at
                } else if meta.path.is_ident("updated_at") {
                    &mut marked.updated_at
                } else {
                    return Err(meta.error("expected `id`, `created_at` or `updated_at`"));
                };

                if slot.is_some() {
                    return Err(meta.error("field marker used more than once"));
                }

                *slot = Some(ident.clone());
                Ok(())
            })?;
        }
    }

    Ok(marked)
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let options = parse_record_options(&input)?;
    let marked = parse_marked_fields(&input)?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Some(collection) = options.collection else {
        return Err(syn::Error::new(
            name.span(),
            "missing `#[record(collection = \"...\")]`",
        ));
    };

    let search_fields = options.search.map(|fields| {
        quote! {
            fn search_fields() -> &'static [&'static str] {
                &[#(#fields),*]
            }
        }
    });

    let default_fields = if marked.is_empty() {
        None
    } else {
        Some(quote! {
            fn default_fields(&mut self) -> ::core::option::Option<&mut dyn ::docmodel::record::DefaultFields> {
                ::core::option::Option::Some(self)
            }
        })
    };

    let default_fields_impl = (!marked.is_empty()).then(|| {
        let id = marked.id.as_ref().map(|field| quote! {
            fn id(&self) -> ::core::option::Option<::docmodel::bson::oid::ObjectId> {
                self.#field
            }

            fn set_id(&mut self, id: ::docmodel::bson::oid::ObjectId) {
                self.#field = ::core::option::Option::Some(id);
            }
        });

        let created_at = marked.created_at.as_ref().map(|field| quote! {
            fn created_at(&self) -> ::core::option::Option<::docmodel::bson::DateTime> {
                self.#field
            }

            fn set_created_at(&mut self, at: ::docmodel::bson::DateTime) {
                self.#field = ::core::option::Option::Some(at);
            }
        });

        let updated_at = marked.updated_at.as_ref().map(|field| quote! {
            fn updated_at(&self) -> ::core::option::Option<::docmodel::bson::DateTime> {
                self.#field
            }

            fn set_updated_at(&mut self, at: ::docmodel::bson::DateTime) {
                self.#field = ::core::option::Option::Some(at);
            }
        });

        quote! {
            impl #impl_generics ::docmodel::record::DefaultFields for #name #ty_generics #where_clause {
                #id
                #created_at
                #updated_at
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::docmodel::record::Record for #name #ty_generics #where_clause {
            fn collection() -> &'static str {
                #collection
            }

            #search_fields
            #default_fields
        }

        #default_fields_impl
    })
}
