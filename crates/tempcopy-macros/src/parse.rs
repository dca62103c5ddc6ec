//! Parsing logic for the Model derive macro.
//!
//! Extracts struct-level and field-level `#[tempcopy(...)]` attributes into
//! `ModelDef` and `FieldDef` for code generation.

use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Ident, Lit, LitStr, Result, Type};

/// Identity strategy named by `#[tempcopy(identity = "...")]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityAttr {
    Int,
    Uuid,
    #[default]
    Supplied,
}

/// Parsed model definition from a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    pub name: Ident,
    pub table_name: String,
    pub identity: IdentityAttr,
    pub fields: Vec<FieldDef>,
}

impl ModelDef {
    /// The single key field.
    ///
    /// `parse_model` guarantees exactly one exists.
    pub fn key_field(&self) -> &FieldDef {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .unwrap_or(&self.fields[0])
    }
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    /// Stored column name (defaults to the field name)
    pub column_name: String,
    pub ty: Type,
    /// Forced nullability; otherwise taken from the field type
    pub nullable: bool,
    pub primary_key: bool,
}

pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }

    let StructAttrs {
        table_name,
        identity,
    } = parse_struct_attrs(&input.attrs, &name)?;

    let mut fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    let keys = fields.iter().filter(|f| f.primary_key).count();
    match keys {
        0 => match fields.iter_mut().find(|f| f.name == "id") {
            Some(id) => id.primary_key = true,
            None => {
                return Err(Error::new_spanned(
                    &input.ident,
                    "Model requires a #[tempcopy(primary_key)] field or a field named `id`",
                ));
            }
        },
        1 => {}
        _ => {
            return Err(Error::new_spanned(
                &input.ident,
                "Model supports a single primary key field",
            ));
        }
    }

    Ok(ModelDef {
        name,
        table_name,
        identity,
        fields,
    })
}

struct StructAttrs {
    table_name: String,
    identity: IdentityAttr,
}

/// Parse struct-level `#[tempcopy(...)]` attributes.
///
/// Supported keys:
/// - `table = "name"` (defaults to the struct name)
/// - `identity = "int" | "uuid" | "supplied"`
fn parse_struct_attrs(attrs: &[Attribute], struct_name: &Ident) -> Result<StructAttrs> {
    let mut table_name: Option<String> = None;
    let mut identity: Option<IdentityAttr> = None;

    for attr in attrs {
        if !attr.path().is_ident("tempcopy") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                if table_name.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate tempcopy attribute: table",
                    ));
                }
                table_name = Some(string_value(&meta, "table name")?.value());
                Ok(())
            } else if meta.path.is_ident("identity") {
                if identity.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate tempcopy attribute: identity",
                    ));
                }
                let lit = string_value(&meta, "identity")?;
                identity = Some(match lit.value().to_lowercase().as_str() {
                    "int" => IdentityAttr::Int,
                    "uuid" => IdentityAttr::Uuid,
                    "supplied" => IdentityAttr::Supplied,
                    _ => {
                        return Err(Error::new_spanned(
                            lit,
                            "identity must be one of: 'int', 'uuid', 'supplied'",
                        ));
                    }
                });
                Ok(())
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown tempcopy struct attribute (supported: table, identity)",
                ))
            }
        })?;
    }

    Ok(StructAttrs {
        table_name: table_name.unwrap_or_else(|| struct_name.to_string()),
        identity: identity.unwrap_or_default(),
    })
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>, what: &str) -> Result<LitStr> {
    let value: Lit = meta.value()?.parse()?;
    if let Lit::Str(lit_str) = value {
        Ok(lit_str)
    } else {
        Err(Error::new_spanned(
            value,
            format!("expected string literal for {what}"),
        ))
    }
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with fields, not a unit struct",
        )),
    }
}

fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut column: Option<String> = None;
    let mut nullable = false;
    let mut primary_key = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("tempcopy") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                primary_key = true;
            } else if meta.path.is_ident("nullable") {
                nullable = true;
            } else if meta.path.is_ident("column") {
                column = Some(string_value(&meta, "column name")?.value());
            } else {
                return Err(Error::new_spanned(
                    meta.path,
                    "unknown tempcopy field attribute (supported: primary_key, column, nullable)",
                ));
            }
            Ok(())
        })?;
    }

    let column_name = column.unwrap_or_else(|| name.unraw().to_string());

    Ok(FieldDef {
        name,
        column_name,
        ty: field.ty.clone(),
        nullable,
        primary_key,
    })
}

/// Check if a type is `Option<T>`.
pub fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}
