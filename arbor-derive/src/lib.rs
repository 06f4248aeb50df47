//! # Arbor Derive Macros
//!
//! This crate provides the procedural macros for `arbor`:
//!
//! * `#[derive(Codec)]` lays a struct out as a composite: one child per field,
//!   named by position.
//! * `#[derive(Class)]` additionally declares the struct a polymorphic class with
//!   its [`ClassMetadata`] taken from `#[arbor(...)]`.
//! * `#[derive(Polymorphic)]` turns an enum of newtype variants, each wrapping a
//!   class, into a closed class set.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DataEnum, DeriveInput, Fields, GenericParam, Generics, Ident, LitInt,
    LitStr, Member, parse_macro_input, parse_quote,
};

/// Derives `Encode` and `Decode` with the composite layout.
#[proc_macro_derive(Codec, attributes(arbor))]
pub fn derive_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_codec(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives `Class`, `Polymorphic`, `Encode` and `Decode` for a concrete class.
#[proc_macro_derive(Class, attributes(arbor))]
pub fn derive_class(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_class(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives `Polymorphic`, `Encode`, `Decode` and `From` conversions for an enum
/// whose variants each wrap one class.
#[proc_macro_derive(Polymorphic, attributes(arbor))]
pub fn derive_polymorphic(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_polymorphic(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

// --- Internal Data Structures ---

#[derive(Clone, Copy)]
enum Shape {
    Named,
    Tuple,
    Unit,
}

struct FieldDef {
    member: Member,
    ty: syn::Type,
    skip: bool,
    since: Option<u32>,
}

#[derive(Default)]
struct ClassAttrs {
    class: Option<LitStr>,
    version: Option<LitInt>,
    tracking: Option<Ident>,
    info: Option<Ident>,
}

/// Parses field attributes: `skip` and `since = N`.
fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<(bool, Option<u32>)> {
    let mut skip = false;
    let mut since = None;

    for attr in attrs {
        if attr.path().is_ident("arbor") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    return Ok(());
                }

                if meta.path.is_ident("since") {
                    let lit: LitInt = meta.value()?.parse()?;
                    since = Some(lit.base10_parse::<u32>()?);
                    return Ok(());
                }
                Err(meta.error("Unknown arbor field attribute. Supported: skip, since"))
            })?;
        }
    }
    Ok((skip, since))
}

/// Parses container attributes: `class`, `version`, `tracking`, `info`.
fn parse_class_attributes(attrs: &[Attribute]) -> syn::Result<ClassAttrs> {
    let mut parsed = ClassAttrs::default();

    for attr in attrs {
        if attr.path().is_ident("arbor") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("class") {
                    parsed.class = Some(meta.value()?.parse()?);
                    return Ok(());
                }

                if meta.path.is_ident("version") {
                    let lit: LitInt = meta.value()?.parse()?;
                    let version = lit.base10_parse::<u32>()?;
                    if version > 255 {
                        return Err(meta.error("class versions must be below 256"));
                    }
                    parsed.version = Some(lit);
                    return Ok(());
                }

                if meta.path.is_ident("tracking") {
                    let s: LitStr = meta.value()?.parse()?;
                    let variant = match s.value().to_lowercase().as_str() {
                        "never" => "Never",
                        "always" => "Always",
                        _ => return Err(meta.error("Unknown tracking. Supported: never, always")),
                    };
                    parsed.tracking = Some(Ident::new(variant, s.span()));
                    return Ok(());
                }

                if meta.path.is_ident("info") {
                    let s: LitStr = meta.value()?.parse()?;
                    let variant = match s.value().to_lowercase().as_str() {
                        "no_info" => "NoInfo",
                        "object_class_info" => "ObjectClassInfo",
                        _ => {
                            return Err(meta.error(
                                "Unknown info mode. Supported: no_info, object_class_info",
                            ));
                        }
                    };
                    parsed.info = Some(Ident::new(variant, s.span()));
                    return Ok(());
                }
                Err(meta.error(
                    "Unknown arbor class attribute. Supported: class, version, tracking, info",
                ))
            })?;
        }
    }
    Ok(parsed)
}

fn reject_container_attributes(attrs: &[Attribute], derive: &str) -> syn::Result<()> {
    match attrs.iter().find(|a| a.path().is_ident("arbor")) {
        Some(attr) => Err(syn::Error::new_spanned(
            attr,
            format!("{derive} takes no container attributes; use #[derive(Class)] for class metadata"),
        )),
        None => Ok(()),
    }
}

fn collect_fields(input: &DeriveInput, derive: &str) -> syn::Result<(Shape, Vec<FieldDef>)> {
    let data_struct = match &input.data {
        Data::Struct(ds) => ds,
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                format!("{derive} only supports structs"),
            ));
        }
    };

    let shape = match &data_struct.fields {
        Fields::Named(_) => Shape::Named,
        Fields::Unnamed(_) => Shape::Tuple,
        Fields::Unit => Shape::Unit,
    };
    let mut fields = Vec::new();
    for (index, field) in data_struct.fields.iter().enumerate() {
        let (skip, since) = parse_field_attributes(&field.attrs)?;
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(index.into()),
        };
        fields.push(FieldDef {
            member,
            ty: field.ty.clone(),
            skip,
            since,
        });
    }
    Ok((shape, fields))
}

fn reject_generics(generics: &Generics, derive: &str) -> syn::Result<()> {
    if generics.params.is_empty() {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            generics,
            format!("{derive} does not support generic types; a class name must be fixed"),
        ))
    }
}

fn with_bound(generics: &Generics, bound: TokenStream2) -> Generics {
    let mut generics = generics.clone();
    for param in &mut generics.params {
        if let GenericParam::Type(type_param) = param {
            type_param.bounds.push(parse_quote!(#bound));
        }
    }
    generics
}

// --- Generator: composite bodies ---

/// Statements writing every stored field of `self` as the composite at `path`.
/// Fields marked `since = N` are written, and take a slot, only when the
/// `version` being written is at least `N`.
fn encode_body(fields: &[FieldDef], version: TokenStream2) -> TokenStream2 {
    let writes = fields.iter().filter(|f| !f.skip).map(|f| {
        let member = &f.member;
        match f.since {
            Some(since) => quote! { fields.encode_since(ar, #since, &self.#member)?; },
            None => quote! { fields.encode(ar, &self.#member)?; },
        }
    });
    quote! {
        ::arbor::rt::begin_composite(ar, path)?;
        #[allow(unused_mut, unused_variables)]
        let mut fields = ::arbor::rt::FieldCursor::new(path, #version);
        #(#writes)*
        Ok(())
    }
}

/// An expression building `Self` from the composite at `path`. Fields marked
/// `since = N` are only read when the recorded `version >= N`, and otherwise
/// take no slot.
fn decode_body(fields: &[FieldDef], shape: Shape, version: TokenStream2) -> TokenStream2 {
    let values: Vec<TokenStream2> = fields
        .iter()
        .map(|f| {
            let ty = &f.ty;
            if f.skip {
                return quote! { <#ty as ::core::default::Default>::default() };
            }
            match f.since {
                Some(since) => quote! { fields.decode_since::<#ty>(ar, #since)? },
                None => quote! { fields.decode::<#ty>(ar)? },
            }
        })
        .collect();

    let construct = match shape {
        Shape::Named => {
            let members = fields.iter().map(|f| &f.member);
            quote! { Self { #(#members: #values),* } }
        }
        Shape::Tuple => quote! { Self(#(#values),*) },
        Shape::Unit => quote! { Self },
    };

    quote! {
        ::arbor::rt::open_composite(ar, path)?;
        #[allow(unused_mut, unused_variables)]
        let mut fields = ::arbor::rt::FieldCursor::new(path, #version);
        Ok(#construct)
    }
}

// --- Generator: Codec ---

fn expand_codec(input: &DeriveInput) -> syn::Result<TokenStream2> {
    reject_container_attributes(&input.attrs, "Codec")?;
    let (shape, fields) = collect_fields(input, "Codec")?;
    if let Some(f) = fields.iter().find(|f| f.since.is_some()) {
        return Err(syn::Error::new_spanned(
            &f.ty,
            "`since` requires a versioned class; use #[derive(Class)]",
        ));
    }

    let name = &input.ident;
    let encode_generics = with_bound(&input.generics, quote!(::arbor::Encode));
    let decode_generics = with_bound(&input.generics, quote!(::arbor::Decode));
    let (encode_impl, ty_generics, encode_where) = encode_generics.split_for_impl();
    let (decode_impl, _, decode_where) = decode_generics.split_for_impl();

    let encode = encode_body(&fields, quote!(0));
    let decode = decode_body(&fields, shape, quote!(0));

    Ok(quote! {
        impl #encode_impl ::arbor::Encode for #name #ty_generics #encode_where {
            fn strategy() -> ::arbor::Strategy
            where
                Self: Sized,
            {
                ::arbor::Strategy::Composite
            }

            fn encode(
                &self,
                ar: &mut ::arbor::OutputArchive,
                path: &::arbor::StoragePath,
            ) -> ::arbor::Result<()> {
                #encode
            }
        }

        impl #decode_impl ::arbor::Decode for #name #ty_generics #decode_where {
            fn decode(
                ar: &mut ::arbor::InputArchive,
                path: &::arbor::StoragePath,
            ) -> ::arbor::Result<Self> {
                #decode
            }
        }
    })
}

// --- Generator: Class ---

/// A `since` gate needs a recorded version to compare against, and a gate
/// above the class version would never be written.
fn check_since_fields(attrs: &ClassAttrs, fields: &[FieldDef]) -> syn::Result<()> {
    let class_version = match &attrs.version {
        Some(lit) => lit.base10_parse::<u32>()?,
        None => 0,
    };
    let no_info = attrs.info.as_ref().is_some_and(|i| *i == "NoInfo");
    for f in fields {
        let Some(since) = f.since else { continue };
        if no_info {
            return Err(syn::Error::new_spanned(
                &f.ty,
                "`since` needs the class version on disk; it cannot be used with info = \"no_info\"",
            ));
        }
        if since > class_version {
            return Err(syn::Error::new_spanned(
                &f.ty,
                format!("`since = {since}` is newer than the class version {class_version}"),
            ));
        }
    }
    Ok(())
}

fn expand_class(input: &DeriveInput) -> syn::Result<TokenStream2> {
    reject_generics(&input.generics, "Class")?;
    let attrs = parse_class_attributes(&input.attrs)?;
    let (shape, fields) = collect_fields(input, "Class")?;
    check_since_fields(&attrs, &fields)?;

    let name = &input.ident;
    let class_name = attrs
        .class
        .unwrap_or_else(|| LitStr::new(&name.to_string(), name.span()));
    let version = attrs.version.map(|v| quote! { .with_version(#v) });
    let tracking = attrs
        .tracking
        .map(|t| quote! { .with_tracking(::arbor::Tracking::#t) });
    let info = attrs.info.map(|i| quote! { .with_info(::arbor::InfoMode::#i) });

    let encode = encode_body(&fields, quote!(version));
    let decode = decode_body(&fields, shape, quote!(version));

    Ok(quote! {
        impl ::arbor::Class for #name {
            const CLASS: ::arbor::ClassMetadata =
                ::arbor::ClassMetadata::new(#class_name) #version #tracking #info;

            fn save(
                &self,
                ar: &mut ::arbor::OutputArchive,
                path: &::arbor::StoragePath,
                version: u32,
            ) -> ::arbor::Result<()> {
                #encode
            }

            fn load(
                ar: &mut ::arbor::InputArchive,
                path: &::arbor::StoragePath,
                version: u32,
            ) -> ::arbor::Result<Self> {
                #decode
            }
        }

        ::arbor::impl_polymorphic!(#name);
    })
}

// --- Generator: Polymorphic ---

struct ClassVariant {
    variant: Ident,
    ty: syn::Type,
}

fn collect_members(name: &Ident, data: &DataEnum) -> syn::Result<Vec<ClassVariant>> {
    if data.variants.is_empty() {
        return Err(syn::Error::new(
            name.span(),
            "Polymorphic needs at least one variant",
        ));
    }
    data.variants
        .iter()
        .map(|variant| match &variant.fields {
            Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => Ok(ClassVariant {
                variant: variant.ident.clone(),
                ty: unnamed.unnamed[0].ty.clone(),
            }),
            _ => Err(syn::Error::new_spanned(
                variant,
                "Polymorphic variants must wrap exactly one class, e.g. `Circle(Circle)`",
            )),
        })
        .collect()
}

fn expand_polymorphic(input: &DeriveInput) -> syn::Result<TokenStream2> {
    reject_generics(&input.generics, "Polymorphic")?;
    reject_container_attributes(&input.attrs, "Polymorphic")?;
    let name = &input.ident;
    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "Polymorphic only supports enums",
            ));
        }
    };
    let members = collect_members(name, data)?;

    let class_arms = members.iter().map(|m| {
        let (variant, ty) = (&m.variant, &m.ty);
        quote! {
            #name::#variant(_) => {
                const CLASS: &::arbor::ClassMetadata = &<#ty as ::arbor::Class>::CLASS;
                CLASS
            }
        }
    });
    let class_list = members.iter().map(|m| {
        let ty = &m.ty;
        quote! { &<#ty as ::arbor::Class>::CLASS }
    });
    let save_arms = members.iter().map(|m| {
        let (variant, ty) = (&m.variant, &m.ty);
        quote! {
            #name::#variant(inner) => <#ty as ::arbor::Class>::save(inner, ar, path, version),
        }
    });
    let load_branches = members.iter().map(|m| {
        let (variant, ty) = (&m.variant, &m.ty);
        quote! {
            if class == <#ty as ::arbor::Class>::CLASS.name() {
                return <#ty as ::arbor::Class>::load(ar, path, version).map(#name::#variant);
            }
        }
    });
    let from_impls = members.iter().map(|m| {
        let (variant, ty) = (&m.variant, &m.ty);
        quote! {
            impl ::core::convert::From<#ty> for #name {
                fn from(value: #ty) -> Self {
                    #name::#variant(value)
                }
            }
        }
    });

    Ok(quote! {
        impl ::arbor::Polymorphic for #name {
            fn class(&self) -> &'static ::arbor::ClassMetadata {
                match self {
                    #(#class_arms)*
                }
            }

            fn classes() -> &'static [&'static ::arbor::ClassMetadata] {
                const CLASSES: &[&::arbor::ClassMetadata] = &[#(#class_list),*];
                CLASSES
            }

            fn save_concrete(
                &self,
                ar: &mut ::arbor::OutputArchive,
                path: &::arbor::StoragePath,
                version: u32,
            ) -> ::arbor::Result<()> {
                match self {
                    #(#save_arms)*
                }
            }

            fn load_concrete(
                ar: &mut ::arbor::InputArchive,
                path: &::arbor::StoragePath,
                class: &str,
                version: u32,
            ) -> ::arbor::Result<Self> {
                #(#load_branches)*
                Err(::arbor::ArchiveError::UnknownConcreteType {
                    path: path.to_string(),
                    class: class.to_string(),
                })
            }
        }

        impl ::arbor::Encode for #name {
            fn strategy() -> ::arbor::Strategy
            where
                Self: Sized,
            {
                ::arbor::Strategy::Polymorphic
            }

            fn encode(
                &self,
                ar: &mut ::arbor::OutputArchive,
                path: &::arbor::StoragePath,
            ) -> ::arbor::Result<()> {
                ::arbor::rt::encode_polymorphic(self, ar, path)
            }
        }

        impl ::arbor::Decode for #name {
            fn decode(
                ar: &mut ::arbor::InputArchive,
                path: &::arbor::StoragePath,
            ) -> ::arbor::Result<Self> {
                ::arbor::rt::decode_polymorphic(ar, path)
            }
        }

        #(#from_impls)*
    })
}
