//! Derive macros for keel records.
//!
//! `#[derive(Record)]` exposes the fields of a struct to the model extractor
//! and the row mapper through `keel_sql_core::Reflect`, and adds an empty
//! `keel_sql_core::Record` impl. `#[derive(Reflect)]` generates only the
//! reflection, for records that implement the `Record` hooks by hand.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, Lit,
    LitStr, PathArguments, Type,
};

/// Derives `Reflect` and an empty `Record` impl.
///
/// # Attributes
///
/// - `#[table(name = "table_name")]` - Overrides the table name (optional,
///   defaults to the naming strategy applied to the struct name)
///
/// # Field Attributes
///
/// - `#[column("tag")]` - Comma separated column tags such as
///   `"pk"`, `"size:64,unique"`, `"fk:author"` or `"-"`
///
/// # Field Types
///
/// `bool`, the fixed-size integers, `f32`, `f64`, `String`, `Vec<u8>` and
/// `DateTime<Utc>` map to columns; wrapped in `Option` they become nullable.
/// `Option<Box<R>>` where `R` is a record is a reference. Maps and other
/// vectors are accepted and never mapped. Any other type must be tagged
/// `"-"`.
///
/// # Example
///
/// ```ignore
/// use keel_sql_derive::Record;
///
/// #[derive(Debug, Default, Record)]
/// #[table(name = "posts")]
/// struct Post {
///     id: i64,
///     author_id: i64,
///     author: Option<Box<User>>,
///     #[column("size:200,notnull")]
///     title: String,
/// }
/// ```
#[proc_macro_derive(Record, attributes(table, column))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_reflect_impl(&input)
        .map(|reflect| {
            let name = &input.ident;
            let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
            quote! {
                #reflect

                #[automatically_derived]
                impl #impl_generics ::keel_sql_core::Record for #name #ty_generics #where_clause {}
            }
        })
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives `Reflect` only. Pair it with a hand-written `Record` impl to
/// declare composite indexes or validation.
#[proc_macro_derive(Reflect, attributes(table, column))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_reflect_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// How a field type is exposed.
#[derive(Clone, Copy)]
enum Shape {
    Scalar(&'static str),
    Nullable(&'static str),
    Reference,
    Map,
    Sequence,
}

struct FieldInfo {
    ident: Ident,
    name: String,
    tag: String,
    shape: Shape,
}

fn derive_reflect_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Record derive only supports structs",
            ));
        }
    };

    let mut infos = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let tag = column_tag(&field.attrs)?;
        let shape = match classify(&field.ty) {
            Some(shape) => shape,
            // Ignored fields may hold anything.
            None if is_ignored(&tag) => continue,
            None => {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "unsupported field type; tag the field with #[column(\"-\")] to skip it",
                ));
            }
        };
        infos.push(FieldInfo {
            name: ident.to_string(),
            ident,
            tag,
            shape,
        });
    }

    let type_name = struct_name.to_string();
    let table_name_fn = table_name(&input.attrs)?.map(|name| {
        quote! {
            fn table_name(&self) -> ::core::option::Option<&'static str> {
                ::core::option::Option::Some(#name)
            }
        }
    });

    let decls: Vec<TokenStream2> = infos
        .iter()
        .map(|info| {
            let name = &info.name;
            let tag = &info.tag;
            let kind = field_kind(info.shape);
            quote! {
                ::keel_sql_core::FieldDecl {
                    name: #name,
                    kind: #kind,
                    tag: #tag,
                }
            }
        })
        .collect();

    let scalars: Vec<&FieldInfo> = infos
        .iter()
        .filter(|info| matches!(info.shape, Shape::Scalar(_) | Shape::Nullable(_)))
        .collect();
    let references: Vec<&FieldInfo> = infos
        .iter()
        .filter(|info| matches!(info.shape, Shape::Reference))
        .collect();

    let get_arms = scalars.iter().map(|info| {
        let name = &info.name;
        let ident = &info.ident;
        quote! {
            #name => ::core::option::Option::Some(::keel_sql_core::ToSqlValue::to_sql_value(
                ::core::clone::Clone::clone(&self.#ident),
            )),
        }
    });
    let set_arms = scalars.iter().map(|info| {
        let name = &info.name;
        let ident = &info.ident;
        quote! {
            #name => {
                self.#ident = ::keel_sql_core::FromSqlValue::from_sql_value(value)?;
                ::core::result::Result::Ok(())
            }
        }
    });
    let reference_arms = references.iter().map(|info| {
        let name = &info.name;
        let ident = &info.ident;
        quote! {
            #name => self
                .#ident
                .as_deref()
                .map(|target| target as &dyn ::keel_sql_core::Reflect),
        }
    });
    let reference_or_default_arms = references.iter().map(|info| {
        let name = &info.name;
        let ident = &info.ident;
        quote! {
            #name => {
                let target: &mut dyn ::keel_sql_core::Reflect =
                    &mut **self.#ident.get_or_insert_with(::core::default::Default::default);
                ::core::option::Option::Some(target)
            }
        }
    });
    let clear_arms = references.iter().map(|info| {
        let name = &info.name;
        let ident = &info.ident;
        quote! {
            #name => self.#ident = ::core::option::Option::None,
        }
    });

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::keel_sql_core::Reflect for #struct_name #ty_generics #where_clause {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            #table_name_fn

            fn fields(&self) -> &'static [::keel_sql_core::FieldDecl] {
                const FIELDS: &[::keel_sql_core::FieldDecl] = &[#(#decls),*];
                FIELDS
            }

            fn get(&self, field: &str) -> ::core::option::Option<::keel_sql_core::SqlValue> {
                match field {
                    #(#get_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set(
                &mut self,
                field: &str,
                value: ::keel_sql_core::SqlValue,
            ) -> ::keel_sql_core::Result<()> {
                match field {
                    #(#set_arms)*
                    _ => ::core::result::Result::Err(::keel_sql_core::Error::UnknownField {
                        type_name: #type_name,
                        field: ::std::string::ToString::to_string(field),
                    }),
                }
            }

            fn reference(&self, field: &str) -> ::core::option::Option<&dyn ::keel_sql_core::Reflect> {
                match field {
                    #(#reference_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn reference_or_default(
                &mut self,
                field: &str,
            ) -> ::core::option::Option<&mut dyn ::keel_sql_core::Reflect> {
                match field {
                    #(#reference_or_default_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn clear_reference(&mut self, field: &str) {
                match field {
                    #(#clear_arms)*
                    _ => {}
                }
            }
        }
    })
}

fn field_kind(shape: Shape) -> TokenStream2 {
    let scalar = |variant: &str| {
        let variant = Ident::new(variant, proc_macro2::Span::call_site());
        quote!(::keel_sql_core::ScalarKind::#variant)
    };
    match shape {
        Shape::Scalar(variant) => {
            let kind = scalar(variant);
            quote!(::keel_sql_core::FieldKind::Scalar(#kind))
        }
        Shape::Nullable(variant) => {
            let kind = scalar(variant);
            quote!(::keel_sql_core::FieldKind::Nullable(#kind))
        }
        Shape::Reference => quote!(::keel_sql_core::FieldKind::Reference),
        Shape::Map => quote!(::keel_sql_core::FieldKind::Map),
        Shape::Sequence => quote!(::keel_sql_core::FieldKind::Sequence),
    }
}

/// Classifies a field type by the last segment of its path.
fn classify(ty: &Type) -> Option<Shape> {
    let (ident, argument) = last_segment(ty)?;
    match ident.to_string().as_str() {
        "Option" => {
            let inner = argument?;
            if last_segment(inner).is_some_and(|(ident, _)| ident == "Box") {
                return Some(Shape::Reference);
            }
            scalar_variant(inner).map(Shape::Nullable)
        }
        "HashMap" | "BTreeMap" => Some(Shape::Map),
        "Vec" if !argument.is_some_and(is_u8) => Some(Shape::Sequence),
        _ => scalar_variant(ty).map(Shape::Scalar),
    }
}

fn scalar_variant(ty: &Type) -> Option<&'static str> {
    let (ident, argument) = last_segment(ty)?;
    let variant = match ident.to_string().as_str() {
        "bool" => "Bool",
        "i8" => "I8",
        "i16" => "I16",
        "i32" => "I32",
        "i64" => "I64",
        "u8" => "U8",
        "u16" => "U16",
        "u32" => "U32",
        "u64" => "U64",
        "f32" => "F32",
        "f64" => "F64",
        "String" => "Text",
        "DateTime" => "Time",
        "Vec" if argument.is_some_and(is_u8) => "Bytes",
        _ => return None,
    };
    Some(variant)
}

/// Returns the last path segment and its first type argument.
fn last_segment(ty: &Type) -> Option<(&Ident, Option<&Type>)> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    let argument = match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    };
    Some((&segment.ident, argument))
}

fn is_u8(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|(ident, _)| ident == "u8")
}

fn is_ignored(tag: &str) -> bool {
    tag.split(',').any(|token| token.trim() == "-")
}

fn column_tag(attrs: &[Attribute]) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("column") {
            let tag: LitStr = attr.parse_args()?;
            return Ok(tag.value());
        }
    }
    Ok(String::new())
}

fn table_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut table_name = None;
    for attr in attrs {
        if attr.path().is_ident("table") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            table_name = Some(s.value());
                            return Ok(());
                        }
                    }
                    return Err(meta.error("expected a string literal"));
                }
                Err(meta.error("unsupported table attribute"))
            })?;
        }
    }
    Ok(table_name)
}
