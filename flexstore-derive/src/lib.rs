use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

mod object;

/// Attribute macro that derives all required traits for store types.
///
/// This is syntax sugar that expands to:
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Default, Flex)]
/// ```
///
/// `Default` is only derived for structs. Arguments are forwarded as a
/// container attribute, so `#[flexible(tag = "app::Settings")]` pins the tag.
///
/// # Example
///
/// ```ignore
/// use flexstore_core::flexible;
///
/// #[flexible]
/// struct Settings {
///     name: String,
///     volume: u32,
/// }
/// ```
#[proc_macro_attribute]
pub fn flexible(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let args = proc_macro2::TokenStream::from(attr);

    let default = match &input.data {
        syn::Data::Struct(_) => quote! { ::std::default::Default, },
        _ => quote! {},
    };
    let container = if args.is_empty() {
        quote! {}
    } else {
        quote! { #[flex(#args)] }
    };

    let output = quote! {
        #[derive(
            ::std::fmt::Debug,
            ::std::clone::Clone,
            ::std::cmp::PartialEq,
            #default
            ::flexstore_core::Flex
        )]
        #container
        #input
    };

    output.into()
}

/// Derive macro for the Flex trait.
///
/// For structs, generates a `FlexObject` member table and a `Flex` impl that
/// encodes through the object codec. Tuple struct members are named `"0"`,
/// `"1"`, and so on. The struct must implement `Default`; members missing
/// from a payload keep their default.
///
/// For enums with only unit variants, generates a `Flex` impl that encodes
/// each variant as its name.
///
/// # Example
///
/// ```ignore
/// use flexstore_core::Flex;
///
/// #[derive(Debug, Clone, PartialEq, Default, Flex)]
/// #[flex(tag = "app::Settings")]
/// struct Settings {
///     name: String,
///     #[flex(rename = "vol")]
///     volume: u32,
///     #[flex(skip)]
///     dirty: bool,
/// }
/// ```
///
/// # Attributes
///
/// - `#[flex(tag = "name")]` on the type - Use a fixed tag instead of the module path
/// - `#[flex(skip)]` on a field - Leave the field out of the payload (it decodes as `Default`)
/// - `#[flex(rename = "name")]` on a field or variant - Use a custom name on the wire
#[proc_macro_derive(Flex, attributes(flex))]
pub fn derive_flex(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_flex_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_flex_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let container = parse_container_attrs(&input.attrs)?;
    let type_tag = generate_type_tag(input, &container);

    match &input.data {
        syn::Data::Struct(data) => object::generate_struct(input, data, &type_tag),
        syn::Data::Enum(data) => object::generate_enum(input, data, &type_tag),
        syn::Data::Union(_) => Err(syn::Error::new_spanned(input, "Flex cannot be derived for unions")),
    }
}

/// Builds the `type_tag()` body: the fixed tag if one was given, otherwise the
/// module path and type name, with type arguments appended for generic types.
fn generate_type_tag(input: &DeriveInput, container: &ContainerAttrs) -> proc_macro2::TokenStream {
    let base = match &container.tag {
        Some(tag) => quote! { #tag },
        None => {
            let name = input.ident.to_string();
            quote! { ::std::concat!(::std::module_path!(), "::", #name) }
        }
    };

    let type_params: Vec<_> = input.generics.type_params().map(|p| &p.ident).collect();
    if type_params.is_empty() {
        quote! { ::flexstore_core::TypeTag::new(#base) }
    } else {
        quote! {
            ::flexstore_core::TypeTag::generic(
                #base,
                &[#(<#type_params as ::flexstore_core::Flex>::type_tag()),*],
            )
        }
    }
}

/// Builds the where clause shared by the generated impls.
pub(crate) fn build_where_clause(
    generics: &syn::Generics,
    existing: Option<&syn::WhereClause>,
    extra: proc_macro2::TokenStream,
) -> proc_macro2::TokenStream {
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();

    if type_params.is_empty() && existing.is_none() && extra.is_empty() {
        return quote! {};
    }

    let flex_bounds = type_params.iter().map(|p| {
        quote! { #p: ::flexstore_core::Flex, }
    });

    let existing_predicates = existing
        .map(|w| {
            let predicates = w.predicates.iter();
            quote! { #(#predicates,)* }
        })
        .unwrap_or_default();

    quote! {
        where
            #extra
            #existing_predicates
            #(#flex_bounds)*
    }
}

#[derive(Default)]
struct ContainerAttrs {
    tag: Option<String>,
}

fn parse_container_attrs(attrs: &[syn::Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("flex") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.tag = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported flex container attribute"))
            }
        })?;
    }

    Ok(result)
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
    pub rename: Option<String>,
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("flex") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported flex attribute"))
            }
        })?;
    }

    Ok(result)
}
