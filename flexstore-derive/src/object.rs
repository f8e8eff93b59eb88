use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::{FieldAttrs, build_where_clause, parse_field_attrs};

/// Generates `FlexObject` and `Flex` for a struct.
pub fn generate_struct(
    input: &DeriveInput,
    data: &syn::DataStruct,
    type_tag: &TokenStream,
) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let where_clause = build_where_clause(
        &input.generics,
        where_clause,
        quote! { Self: ::std::default::Default, },
    );

    let members = generate_members(&data.fields)?;

    Ok(quote! {
        impl #impl_generics ::flexstore_core::FlexObject for #name #ty_generics #where_clause {
            fn members() -> ::std::vec::Vec<::flexstore_core::Member<Self>> {
                ::std::vec![#(#members),*]
            }
        }

        impl #impl_generics ::flexstore_core::Flex for #name #ty_generics #where_clause {
            fn type_tag() -> ::flexstore_core::TypeTag {
                #type_tag
            }

            fn kind() -> ::flexstore_core::WireKind {
                ::flexstore_core::WireKind::Tagged
            }

            fn member_names() -> ::std::vec::Vec<&'static str> {
                ::flexstore_core::codec::object::member_names::<Self>()
            }

            fn to_wire(&self) -> ::std::result::Result<::flexstore_core::serde_json::Value, ::flexstore_core::CodecError> {
                ::flexstore_core::codec::object::encode_object(self)
            }

            fn from_wire(
                wire: &::flexstore_core::serde_json::Value,
                registry: &::flexstore_core::Registry,
            ) -> ::std::result::Result<Self, ::flexstore_core::CodecError> {
                ::flexstore_core::codec::object::decode_object(wire, registry)
            }
        }
    })
}

/// One `Member { name, encode, decode }` per field that is not skipped.
fn generate_members(fields: &syn::Fields) -> syn::Result<Vec<TokenStream>> {
    let mut members = Vec::new();

    for (i, field) in fields.iter().enumerate() {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let access = match &field.ident {
            Some(ident) => quote! { #ident },
            None => {
                let idx = syn::Index::from(i);
                quote! { #idx }
            }
        };
        let wire_name = get_field_name(field, i, &attrs);
        let ty = &field.ty;

        members.push(quote! {
            ::flexstore_core::Member {
                name: #wire_name,
                encode: |value: &Self| ::flexstore_core::Flex::to_wire(&value.#access),
                decode: |value: &mut Self,
                         wire: &::flexstore_core::serde_json::Value,
                         registry: &::flexstore_core::Registry| {
                    value.#access = <#ty as ::flexstore_core::Flex>::from_wire(wire, registry)?;
                    ::std::result::Result::Ok(())
                },
            }
        });
    }

    Ok(members)
}

fn get_field_name(field: &syn::Field, index: usize, attrs: &FieldAttrs) -> String {
    if let Some(rename) = &attrs.rename {
        return rename.clone();
    }
    match &field.ident {
        Some(ident) => ident.to_string(),
        None => index.to_string(),
    }
}

/// Generates `Flex` for an enum whose variants are all unit variants.
/// Each variant is written as its (possibly renamed) name.
pub fn generate_enum(
    input: &DeriveInput,
    data: &syn::DataEnum,
    type_tag: &TokenStream,
) -> syn::Result<TokenStream> {
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(input, "Flex cannot be derived for empty enums"));
    }
    if let Some(variant) = data.variants.iter().find(|v| !matches!(v.fields, syn::Fields::Unit)) {
        return Err(syn::Error::new_spanned(
            variant,
            "Flex can only be derived for enums with unit variants",
        ));
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let where_clause = build_where_clause(&input.generics, where_clause, quote! {});

    let mut encode_arms = Vec::new();
    let mut decode_arms = Vec::new();
    for variant in &data.variants {
        let attrs = parse_field_attrs(&variant.attrs)?;
        if attrs.skip {
            return Err(syn::Error::new_spanned(variant, "enum variants cannot be skipped"));
        }
        let ident = &variant.ident;
        let wire_name = attrs.rename.unwrap_or_else(|| ident.to_string());
        encode_arms.push(quote! { Self::#ident => #wire_name });
        decode_arms.push(quote! { ::std::option::Option::Some(#wire_name) => ::std::result::Result::Ok(Self::#ident) });
    }

    Ok(quote! {
        impl #impl_generics ::flexstore_core::Flex for #name #ty_generics #where_clause {
            fn type_tag() -> ::flexstore_core::TypeTag {
                #type_tag
            }

            fn kind() -> ::flexstore_core::WireKind {
                ::flexstore_core::WireKind::Primitive
            }

            fn to_wire(&self) -> ::std::result::Result<::flexstore_core::serde_json::Value, ::flexstore_core::CodecError> {
                let name: &str = match self {
                    #(#encode_arms),*
                };
                ::std::result::Result::Ok(::flexstore_core::serde_json::Value::String(name.to_string()))
            }

            fn from_wire(
                wire: &::flexstore_core::serde_json::Value,
                _registry: &::flexstore_core::Registry,
            ) -> ::std::result::Result<Self, ::flexstore_core::CodecError> {
                match wire.as_str() {
                    #(#decode_arms,)*
                    _ => ::std::result::Result::Err(::flexstore_core::CodecError::invalid_value(
                        <Self as ::flexstore_core::Flex>::type_tag().as_str(),
                        wire,
                    )),
                }
            }
        }
    })
}
