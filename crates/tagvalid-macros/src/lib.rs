//! Procedural macros for tagvalid
//!
//! - `#[derive(Record)]` - generates the field schema the validator walks

use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr, Path};

/// Derive `tagvalid::Record` and `tagvalid::Reflect` for a struct.
///
/// # Field attributes
///
/// - `#[valid("Required;Range(1,140)")]` or `#[valid(rules = "...")]` - rule string
/// - `#[valid(json = "age,omitempty")]` - JSON naming tag, used as the error key
/// - `#[valid(alias = "Umur")]` - error key override
/// - `#[valid(inline)]` - promote the fields of a nested record into this one
/// - `#[valid(private)]` - never descended into by recursive validation
///
/// # Struct attributes
///
/// - `#[valid(check = path)]` - `fn(&Self, &mut Validation)` run once the
///   declared fields pass
///
/// Type parameters get a `tagvalid::Reflect` bound.
///
/// # Example
///
/// ```rust,ignore
/// use tagvalid::prelude::*;
///
/// #[derive(Record)]
/// #[valid(check = User::check_names)]
/// struct User {
///     #[valid("Required;Alpha")]
///     name: String,
///     #[valid(rules = "Required;Range(1,140)", json = "age")]
///     age: i32,
/// }
///
/// impl User {
///     fn check_names(&self, v: &mut Validation) {
///         if self.name == "root" {
///             v.set_error("name", "is reserved");
///         }
///     }
/// }
/// ```
#[proc_macro_derive(Record, attributes(valid))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct FieldAttrs {
    rules: Option<LitStr>,
    json: Option<LitStr>,
    alias: Option<LitStr>,
    inline: bool,
    private: bool,
}

impl FieldAttrs {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs {
            if !attr.path().is_ident("valid") {
                continue;
            }
            // bare string form: #[valid("Required")]
            if let Ok(lit) = attr.parse_args::<LitStr>() {
                out.rules = Some(lit);
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rules") {
                    out.rules = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("json") {
                    out.json = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("alias") {
                    out.alias = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("inline") {
                    out.inline = true;
                } else if meta.path.is_ident("private") {
                    out.private = true;
                } else {
                    return Err(meta.error(
                        "expected one of `rules`, `json`, `alias`, `inline`, `private`",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

fn parse_check(attrs: &[syn::Attribute]) -> syn::Result<Option<Path>> {
    let mut check = None;
    for attr in attrs {
        if !attr.path().is_ident("valid") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("check") {
                check = Some(meta.value()?.parse::<Path>()?);
                Ok(())
            } else {
                Err(meta.error("expected `check = path`"))
            }
        })?;
    }
    Ok(check)
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let type_name = name.unraw().to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Record can only be derived for structs",
            ))
        }
    };

    let mut entries = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let attrs = FieldAttrs::parse(&field.attrs)?;
        let field_name = ident.unraw().to_string();

        let mut chain = quote!();
        if let Some(rules) = &attrs.rules {
            chain = quote! { #chain .rules(#rules) };
        }
        if let Some(json) = &attrs.json {
            chain = quote! { #chain .json(#json) };
        }
        if let Some(alias) = &attrs.alias {
            chain = quote! { #chain .alias(#alias) };
        }
        if attrs.inline {
            chain = quote! { #chain .inline() };
        }
        if attrs.private {
            chain = quote! { #chain .private() };
        }

        entries.push(quote! {
            ::tagvalid::Field::new(#field_name, &self.#ident) #chain
        });
    }

    let check = parse_check(&input.attrs)?.map(|path| {
        quote! {
            fn check(&self, validation: &mut ::tagvalid::Validation) {
                #path(self, validation)
            }
        }
    });

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(syn::parse_quote!(::tagvalid::Reflect));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::tagvalid::Record for #name #ty_generics #where_clause {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            fn fields(&self) -> ::std::vec::Vec<::tagvalid::Field<'_>> {
                ::std::vec![#(#entries),*]
            }

            #check
        }

        impl #impl_generics ::tagvalid::Reflect for #name #ty_generics #where_clause {
            fn to_value(&self) -> ::tagvalid::Value {
                ::tagvalid::record_value(self)
            }

            fn node(&self) -> ::tagvalid::Node<'_> {
                ::tagvalid::Node::Record(self)
            }
        }
    })
}
