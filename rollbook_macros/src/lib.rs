//! Procedural macros for the `rollbook` mapping toolkit.
//!
//! `#[derive(Entity)]` inspects a struct and generates the table metadata
//! (`Fetchable`, `Identifiable`, `Insertable`), the table declaration (`Schema`:
//! column types, named constraints, indexes) and a default `RowAdapter` for libSQL rows.
//!
//! ```ignore
//! #[derive(Entity, Clone, Debug)]
//! #[entity(table = "students", primary_key = "id_pk")]
//! #[entity(check(name = "grade_between_1_and_12", expr = "grade BETWEEN 1 AND 12"))]
//! #[entity(index(name = "index_name", columns = "name"))]
//! pub struct Student {
//!     #[fetch(id)]
//!     pub id: Option<i64>,
//!     pub name: String,
//!     #[fetch(unique = "unique_email", max_length = 55)]
//!     pub email: String,
//!     pub grade: i64,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{
    parse_macro_input, spanned::Spanned, Data, DeriveInput, Fields, Ident, LitInt, LitStr, Token,
    Type,
};

use inflections::Inflect;

// --- Helper Structs & Functions for Parsing ---

/// Helper to get the inner type of an `Option<T>`.
fn get_option_inner(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        if type_path.qself.is_some() {
            return None;
        }
        let segment = type_path.path.segments.last()?;
        if segment.ident != "Option" {
            return None;
        }
        if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
            if let Some(syn::GenericArgument::Type(inner_ty)) = args.args.first() {
                return Some(inner_ty);
            }
        }
    }
    None
}

fn is_valid_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
}

fn opt_str(value: Option<&str>) -> TokenStream2 {
    match value {
        Some(s) => quote! { ::core::option::Option::Some(#s) },
        None => quote! { ::core::option::Option::None },
    }
}

/// Storage class of a mapped field, derived from its Rust type.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Int32,
    Int64,
    Float,
    Bool,
    Timestamp,
    Date,
}

impl FieldKind {
    fn classify(ty: &Type) -> Option<Self> {
        let ty_str = ty.to_token_stream().to_string().replace(' ', "");
        let last = ty_str.rsplit("::").next().unwrap_or(&ty_str);
        Some(match last {
            "String" => FieldKind::Text,
            "i32" => FieldKind::Int32,
            "i64" => FieldKind::Int64,
            "f64" => FieldKind::Float,
            "bool" => FieldKind::Bool,
            "NaiveDateTime" => FieldKind::Timestamp,
            "NaiveDate" => FieldKind::Date,
            _ => return None,
        })
    }

    fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Text => "TEXT",
            FieldKind::Int32 | FieldKind::Int64 => "INTEGER",
            FieldKind::Float => "REAL",
            FieldKind::Bool => "BOOLEAN",
            FieldKind::Timestamp => "TIMESTAMP",
            FieldKind::Date => "DATE",
        }
    }

    /// Expression converting a non-optional field value into a `ParamValue`.
    fn to_param(self, value: TokenStream2) -> TokenStream2 {
        match self {
            FieldKind::Text => quote! { ::rollbook_core::ParamValue::String(#value.clone()) },
            FieldKind::Int32 => quote! { ::rollbook_core::ParamValue::I32(#value) },
            FieldKind::Int64 => quote! { ::rollbook_core::ParamValue::I64(#value) },
            FieldKind::Float => quote! { ::rollbook_core::ParamValue::F64(#value) },
            FieldKind::Bool => quote! { ::rollbook_core::ParamValue::Bool(#value) },
            // NaiveDateTime/NaiveDate Display matches TIMESTAMP_FORMAT / %Y-%m-%d.
            FieldKind::Timestamp | FieldKind::Date => {
                quote! { ::rollbook_core::ParamValue::String(#value.to_string()) }
            }
        }
    }

    /// Expression reading column `idx` of a `libsql::Row` named `row` as this kind.
    fn read_libsql(self, idx: i32) -> TokenStream2 {
        let mapping = quote! { ::rollbook_core::RepoError::mapping };
        match self {
            FieldKind::Text | FieldKind::Int64 | FieldKind::Float => {
                quote! { row.get(#idx).map_err(#mapping)? }
            }
            FieldKind::Int32 => quote! {{
                let raw: i64 = row.get(#idx).map_err(#mapping)?;
                i32::try_from(raw).map_err(#mapping)?
            }},
            // SQLite stores booleans as 0/1
            FieldKind::Bool => quote! {{
                let raw: i64 = row.get(#idx).map_err(#mapping)?;
                raw != 0
            }},
            FieldKind::Timestamp => quote! {{
                let raw: String = row.get(#idx).map_err(#mapping)?;
                ::chrono::NaiveDateTime::parse_from_str(&raw, ::rollbook_core::TIMESTAMP_FORMAT)
                    .map_err(#mapping)?
            }},
            FieldKind::Date => quote! {{
                let raw: String = row.get(#idx).map_err(#mapping)?;
                ::chrono::NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(#mapping)?
            }},
        }
    }
}

/// Holds parsed metadata about a single struct field.
struct FieldMetadata {
    ident: Ident,
    /// Type with any `Option<...>` wrapper removed.
    inner_ty: Type,
    nullable: bool,
    /// None only for skipped fields, which may have any type.
    kind: Option<FieldKind>,
    column_name: String,
    is_id: bool,
    is_skipped: bool,
    /// `Some(None)` requests a generated constraint name.
    unique: Option<Option<String>>,
    max_length: Option<u32>,
    default: Option<String>,
}

/// Parses all named fields from a `DeriveInput` struct.
fn parse_field_metadata(input: &DeriveInput) -> syn::Result<Vec<FieldMetadata>> {
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => named,
            _ => {
                return Err(syn::Error::new(
                    input.ident.span(),
                    "#[derive(Entity)] only supports structs with named fields.",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                "#[derive(Entity)] can only be used on structs.",
            ))
        }
    };

    let mut out = Vec::with_capacity(fields.named.len());
    for field in &fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "expected a named field"))?;
        let mut column_name = ident.to_string();
        let mut is_id = false;
        let mut is_skipped = false;
        let mut unique = None;
        let mut max_length = None;
        let mut default = None;

        for attr in &field.attrs {
            if !attr.path().is_ident("fetch") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    is_id = true;
                } else if meta.path.is_ident("skip") {
                    is_skipped = true;
                } else if meta.path.is_ident("column") {
                    let s: LitStr = meta.value()?.parse()?;
                    column_name = s.value();
                } else if meta.path.is_ident("unique") {
                    if meta.input.peek(Token![=]) {
                        let s: LitStr = meta.value()?.parse()?;
                        unique = Some(Some(s.value()));
                    } else {
                        unique = Some(None);
                    }
                } else if meta.path.is_ident("max_length") {
                    let n: LitInt = meta.value()?.parse()?;
                    max_length = Some(n.base10_parse::<u32>()?);
                } else if meta.path.is_ident("default") {
                    let s: LitStr = meta.value()?.parse()?;
                    default = Some(s.value());
                } else {
                    return Err(meta.error(
                        "unsupported #[fetch(...)] option; expected one of `id`, `skip`, `column`, `unique`, `max_length`, `default`",
                    ));
                }
                Ok(())
            })?;
        }

        let (inner_ty, nullable) = match get_option_inner(&field.ty) {
            Some(inner) => (inner.clone(), true),
            None => (field.ty.clone(), false),
        };
        let kind = FieldKind::classify(&inner_ty);
        if kind.is_none() && !is_skipped {
            return Err(syn::Error::new_spanned(
                &field.ty,
                format!(
                    "Unsupported type for column `{}`. Hint: use String/i32/i64/f64/bool/NaiveDateTime/NaiveDate (optionally in Option<...>), or mark it with #[fetch(skip)].",
                    column_name
                ),
            ));
        }
        if max_length.is_some() && kind != Some(FieldKind::Text) {
            return Err(syn::Error::new(
                ident.span(),
                "#[fetch(max_length = ...)] only applies to String columns",
            ));
        }

        out.push(FieldMetadata {
            ident,
            inner_ty,
            nullable,
            kind,
            column_name,
            is_id,
            is_skipped,
            unique,
            max_length,
            default,
        });
    }
    Ok(out)
}

struct IndexMetadata {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

/// Struct-level `#[entity(...)]` options.
#[derive(Default)]
struct EntityMetadata {
    table: Option<String>,
    primary_key: Option<String>,
    checks: Vec<(String, String)>,
    indexes: Vec<IndexMetadata>,
}

fn parse_entity_metadata(input: &DeriveInput) -> syn::Result<EntityMetadata> {
    let mut out = EntityMetadata::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let s: LitStr = meta.value()?.parse()?;
                out.table = Some(s.value());
            } else if meta.path.is_ident("primary_key") {
                let s: LitStr = meta.value()?.parse()?;
                out.primary_key = Some(s.value());
            } else if meta.path.is_ident("check") {
                let mut name = None;
                let mut expr = None;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("name") {
                        let s: LitStr = inner.value()?.parse()?;
                        name = Some(s.value());
                    } else if inner.path.is_ident("expr") {
                        let s: LitStr = inner.value()?.parse()?;
                        expr = Some(s.value());
                    } else {
                        return Err(inner.error("expected `name` or `expr`"));
                    }
                    Ok(())
                })?;
                match (name, expr) {
                    (Some(name), Some(expr)) => out.checks.push((name, expr)),
                    _ => {
                        return Err(syn::Error::new(
                            meta.path.span(),
                            "check(...) needs both `name` and `expr`",
                        ))
                    }
                }
            } else if meta.path.is_ident("index") {
                let mut name = None;
                let mut columns = Vec::new();
                let mut unique = false;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("name") {
                        let s: LitStr = inner.value()?.parse()?;
                        name = Some(s.value());
                    } else if inner.path.is_ident("columns") {
                        let s: LitStr = inner.value()?.parse()?;
                        columns = s
                            .value()
                            .split(',')
                            .map(|c| c.trim().to_string())
                            .filter(|c| !c.is_empty())
                            .collect();
                    } else if inner.path.is_ident("unique") {
                        unique = true;
                    } else {
                        return Err(inner.error("expected `name`, `columns` or `unique`"));
                    }
                    Ok(())
                })?;
                match name {
                    Some(name) if !columns.is_empty() => out.indexes.push(IndexMetadata {
                        name,
                        columns,
                        unique,
                    }),
                    _ => {
                        return Err(syn::Error::new(
                            meta.path.span(),
                            "index(...) needs `name` and at least one column",
                        ))
                    }
                }
            } else {
                return Err(meta.error(
                    "unsupported #[entity(...)] option; expected one of `table`, `primary_key`, `check`, `index`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

// --- `Entity` derive macro ---

#[proc_macro_derive(Entity, attributes(entity, fetch))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_entity(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_entity(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let fields_metadata = parse_field_metadata(input)?;
    let entity = parse_entity_metadata(input)?;

    // If no override, deduce the table name from the struct name (`Student` -> `students`).
    let table_name = entity
        .table
        .clone()
        .unwrap_or_else(|| format!("{}s", struct_name.to_string().to_snake_case()));

    let invalid = |what: &str, name: &str| {
        syn::Error::new(
            struct_name.span(),
            format!("Invalid {what} `{name}`. Use ASCII letters, digits, or `_`, starting with a letter or `_`."),
        )
    };
    if !is_valid_ident(&table_name) {
        return Err(invalid("table name", &table_name));
    }
    let mapped: Vec<&FieldMetadata> = fields_metadata.iter().filter(|f| !f.is_skipped).collect();
    for f in &mapped {
        if !is_valid_ident(&f.column_name) {
            return Err(invalid("column name", &f.column_name));
        }
    }
    for name in entity
        .primary_key
        .iter()
        .chain(entity.checks.iter().map(|(n, _)| n))
        .chain(entity.indexes.iter().map(|i| &i.name))
        .chain(mapped.iter().filter_map(|f| f.unique.as_ref()?.as_ref()))
    {
        if !is_valid_ident(name) {
            return Err(invalid("constraint name", name));
        }
    }
    for idx in &entity.indexes {
        for col in &idx.columns {
            if !mapped.iter().any(|f| &f.column_name == col) {
                return Err(syn::Error::new(
                    struct_name.span(),
                    format!("Index `{}` references unknown column `{}`.", idx.name, col),
                ));
            }
        }
    }

    // --- Implement `Fetchable` ---
    let select_columns: Vec<&String> = mapped.iter().map(|f| &f.column_name).collect();
    let fetchable_impl = quote! {
        impl ::rollbook_core::Fetchable for #struct_name {
            const TABLE: &'static str = #table_name;
            const SELECT_COLUMNS: &'static [&'static str] = &[#(#select_columns),*];
        }
    };

    // --- Implement `Identifiable` ---
    let ids: Vec<&FieldMetadata> = fields_metadata.iter().filter(|f| f.is_id).collect();
    let id_field = match ids.as_slice() {
        [single] => *single,
        [] => {
            return Err(syn::Error::new(
                struct_name.span(),
                "A field must be marked with #[fetch(id)]. Hint: mark your primary key field like `#[fetch(id)]`.",
            ))
        }
        many => {
            return Err(syn::Error::new(
                many[1].ident.span(),
                format!(
                    "Exactly one field must be marked with #[fetch(id)] (found {}).",
                    many.len()
                ),
            ))
        }
    };
    if id_field.is_skipped {
        return Err(syn::Error::new(
            id_field.ident.span(),
            "The #[fetch(id)] field cannot be skipped.",
        ));
    }
    let id_ident = &id_field.ident;
    let key_ty = &id_field.inner_ty;
    let id_column_name = &id_field.column_name;
    let id_accessor = if id_field.nullable {
        quote! { self.#id_ident.clone() }
    } else {
        quote! { Some(self.#id_ident.clone()) }
    };

    let identifiable_impl = quote! {
        impl ::rollbook_core::Identifiable for #struct_name {
            type Key = #key_ty;
            const ID_COLUMN: &'static str = #id_column_name;
            fn id(&self) -> Option<Self::Key> {
                #id_accessor
            }
        }
    };

    // --- Implement `Insertable` ---
    let insert_fields: Vec<&&FieldMetadata> = mapped.iter().filter(|f| !f.is_id).collect();
    let insert_columns: Vec<&String> = insert_fields.iter().map(|f| &f.column_name).collect();
    let insert_values: Vec<TokenStream2> = insert_fields
        .iter()
        .filter_map(|f| {
            let ident = &f.ident;
            let kind = f.kind?;
            Some(if f.nullable {
                let converted = kind.to_param(quote! { (*v) });
                quote! {
                    self.#ident.as_ref().map_or(::rollbook_core::ParamValue::Null, |v| #converted)
                }
            } else {
                kind.to_param(quote! { self.#ident })
            })
        })
        .collect();

    let insertable_impl = quote! {
        impl ::rollbook_core::Insertable for #struct_name {
            const INSERT_COLUMNS: &'static [&'static str] = &[#(#insert_columns),*];
            fn insert_values(&self) -> Vec<::rollbook_core::ParamValue> {
                vec![#(#insert_values),*]
            }
        }
    };

    // --- Implement `Schema` ---
    let column_defs: Vec<TokenStream2> = mapped
        .iter()
        .filter_map(|f| {
            let kind = f.kind?;
            let name = &f.column_name;
            let sql_type = match f.max_length {
                Some(n) => format!("VARCHAR({n})"),
                None => kind.sql_type().to_string(),
            };
            let nullable = f.nullable && !f.is_id;
            let primary_key = f.is_id;
            let unique_name = f.unique.as_ref().map(|named| {
                named
                    .clone()
                    .unwrap_or_else(|| format!("{}_{}_key", table_name, f.column_name))
            });
            let unique = opt_str(unique_name.as_deref());
            let max_length = match f.max_length {
                Some(n) => quote! { ::core::option::Option::Some(#n) },
                None => quote! { ::core::option::Option::None },
            };
            let default = opt_str(f.default.as_deref());
            Some(quote! {
                ::rollbook_core::ColumnDef {
                    name: #name,
                    sql_type: #sql_type,
                    nullable: #nullable,
                    primary_key: #primary_key,
                    unique: #unique,
                    max_length: #max_length,
                    default: #default,
                }
            })
        })
        .collect();
    let primary_key_name = opt_str(entity.primary_key.as_deref());
    let check_defs = entity.checks.iter().map(|(name, expr)| {
        quote! { ::rollbook_core::CheckDef { name: #name, expr: #expr } }
    });
    let index_defs = entity.indexes.iter().map(|idx| {
        let name = &idx.name;
        let columns = &idx.columns;
        let unique = idx.unique;
        quote! {
            ::rollbook_core::IndexDef { name: #name, columns: &[#(#columns),*], unique: #unique }
        }
    });

    let schema_impl = quote! {
        impl ::rollbook_core::Schema for #struct_name {
            const COLUMNS: &'static [::rollbook_core::ColumnDef] = &[#(#column_defs),*];
            const PRIMARY_KEY_NAME: ::core::option::Option<&'static str> = #primary_key_name;
            const CHECKS: &'static [::rollbook_core::CheckDef] = &[#(#check_defs),*];
            const INDEXES: &'static [::rollbook_core::IndexDef] = &[#(#index_defs),*];
        }
    };

    // --- Generate `RowAdapter` ---
    // Column positions follow SELECT_COLUMNS, so skipped fields do not consume an index.
    let adapter_struct_name = Ident::new(&format!("{}RowAdapter", struct_name), struct_name.span());
    let mut col_index: i32 = 0;
    let libsql_get_mappings: Vec<TokenStream2> = fields_metadata
        .iter()
        .map(|f| {
            let ident = &f.ident;
            let kind = match (f.is_skipped, f.kind) {
                (false, Some(kind)) => kind,
                _ => return quote! { #ident: ::core::default::Default::default() },
            };
            let idx = col_index;
            col_index += 1;
            let read = kind.read_libsql(idx);
            if f.nullable {
                quote! {
                    #ident: match row.get_value(#idx).map_err(::rollbook_core::RepoError::mapping)? {
                        ::libsql::Value::Null => None,
                        _ => Some(#read),
                    }
                }
            } else {
                quote! { #ident: #read }
            }
        })
        .collect();

    let row_adapter_impls = quote! {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct #adapter_struct_name;

        // Only crates that link libsql and opt in via their own `backend-adapters`
        // feature get the row conversion.
        #[cfg(feature = "backend-adapters")]
        impl ::rollbook_core::RowAdapter<#struct_name> for #adapter_struct_name {
            type Row = ::libsql::Row;
            fn from_row(&self, row: &Self::Row) -> ::rollbook_core::RepoResult<#struct_name> {
                Ok(#struct_name {
                    #(#libsql_get_mappings),*
                })
            }
        }
    };

    Ok(quote! {
        #fetchable_impl
        #identifiable_impl
        #insertable_impl
        #schema_impl
        #row_adapter_impls
    })
}
