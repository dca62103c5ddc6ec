//! Procedural macros for tempcopy.
//!
//! `#[derive(Model)]` turns a struct with named fields into a
//! `tempcopy_core::Model`: static column metadata, row conversion and access
//! to the identifier field.

use proc_macro::TokenStream;
use syn::ext::IdentExt;

mod parse;

use parse::{IdentityAttr, ModelDef, parse_model};

/// Derive macro for the `Model` trait.
///
/// # Attributes
///
/// - `#[tempcopy(table = "name")]` - Table name (defaults to the struct name)
/// - `#[tempcopy(identity = "int" | "uuid" | "supplied")]` - How missing
///   identifiers are generated (defaults to `supplied`)
/// - `#[tempcopy(primary_key)]` - Mark the identifier field (defaults to `id`)
/// - `#[tempcopy(column = "name")]` - Override column name
/// - `#[tempcopy(nullable)]` - Allow NULL for a non-`Option` field
///
/// Every field type must implement `TypeInfo`, `FromValue` and
/// `Into<Value>`; the identifier field must also implement `KeyField`.
///
/// # Example
///
/// ```ignore
/// use tempcopy::Model;
///
/// #[derive(Model)]
/// #[tempcopy(table = "Person", identity = "int")]
/// struct Person {
///     #[tempcopy(primary_key, column = "Id")]
///     id: Option<i64>,
///     #[tempcopy(column = "Version")]
///     version: Option<Vec<u8>>,
///     #[tempcopy(column = "Name")]
///     name: String,
/// }
/// ```
#[proc_macro_derive(Model, attributes(tempcopy))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let model = match parse_model(&input) {
        Ok(m) => m,
        Err(e) => return e.to_compile_error().into(),
    };

    generate_model_impl(&model).into()
}

/// Generate the Model trait implementation from parsed model definition.
fn generate_model_impl(model: &ModelDef) -> proc_macro2::TokenStream {
    let name = &model.name;
    let table_name = &model.table_name;
    let key = model.key_field();
    let key_column = &key.column_name;
    let key_field = &key.name;

    let identity = match model.identity {
        IdentityAttr::Int => quote::quote! { tempcopy_core::IdentityKind::Int },
        IdentityAttr::Uuid => quote::quote! { tempcopy_core::IdentityKind::Uuid },
        IdentityAttr::Supplied => quote::quote! { tempcopy_core::IdentityKind::Supplied },
    };

    let field_infos = generate_field_infos(model);
    let to_row = generate_to_row(model);
    let from_row = generate_from_row(model);

    quote::quote! {
        impl tempcopy_core::Model for #name {
            const TABLE_NAME: &'static str = #table_name;
            const PRIMARY_KEY: &'static str = #key_column;
            const IDENTITY: tempcopy_core::IdentityKind = #identity;

            fn fields() -> &'static [tempcopy_core::FieldInfo] {
                static FIELDS: &[tempcopy_core::FieldInfo] = &[#field_infos];
                FIELDS
            }

            fn to_row(&self) -> Vec<(&'static str, tempcopy_core::Value)> {
                #to_row
            }

            fn from_row(row: &tempcopy_core::Row) -> tempcopy_core::Result<Self> {
                #from_row
            }

            fn identifier(&self) -> Option<tempcopy_core::Identifier> {
                tempcopy_core::KeyField::to_identifier(&self.#key_field)
            }

            fn set_identifier(
                &mut self,
                id: tempcopy_core::Identifier,
            ) -> tempcopy_core::Result<()> {
                self.#key_field = tempcopy_core::KeyField::from_identifier(id)?;
                Ok(())
            }
        }
    }
}

/// Static `FieldInfo` entries, one per field, in declaration order.
fn generate_field_infos(model: &ModelDef) -> proc_macro2::TokenStream {
    let entries = model.fields.iter().map(|field| {
        let field_name = field.name.unraw().to_string();
        let column_name = &field.column_name;
        let ty = &field.ty;
        let nullable = field.nullable || parse::is_option_type(ty);
        let primary_key = field.primary_key;

        quote::quote! {
            tempcopy_core::FieldInfo::new(
                #field_name,
                #column_name,
                <#ty as tempcopy_core::TypeInfo>::SQL_TYPE,
            )
            .nullable(#nullable)
            .primary_key(#primary_key)
        }
    });

    quote::quote! { #(#entries),* }
}

fn generate_to_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let conversions = model.fields.iter().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        quote::quote! {
            (#column_name, tempcopy_core::Value::from(self.#field_name.clone()))
        }
    });

    quote::quote! {
        vec![#(#conversions),*]
    }
}

/// NULL maps to `None` for `Option` fields through `FromValue`; any other
/// conversion failure is returned with the column name attached.
fn generate_from_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let name = &model.name;
    let extractions = model.fields.iter().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        quote::quote! {
            #field_name: row.get_named(#column_name)?
        }
    });

    quote::quote! {
        Ok(#name {
            #(#extractions,)*
        })
    }
}
