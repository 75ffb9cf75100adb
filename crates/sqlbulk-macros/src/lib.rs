//! Procedural macros for sqlbulk.
//!
//! `sqlbulk-macros` is the **compile-time codegen layer**. It turns Rust
//! structs into mapped entities and projection shapes:
//!
//! - `#[derive(Entity)]` produces an `Entity` implementation with table and
//!   column metadata, row conversion, and one typed `Column` constant per
//!   mapped field (`User::is_active`), which is what predicates are built from.
//! - `#[derive(Projection)]` produces a `Projection` implementation whose
//!   outputs name the target columns they fill, plus `Column` constants used
//!   to bind each output to a source expression.
//!
//! Generated code refers to `sqlbulk_core` and `sqlbulk_query`; both must be
//! dependencies of the crate using the derives (the `sqlbulk` facade
//! re-exports them).

use proc_macro::TokenStream;
use syn::ext::IdentExt;

mod infer;
mod parse;

use parse::{EntityDef, ProjectionDef, parse_entity, parse_projection};

/// Derive macro for the `Entity` trait.
///
/// # Attributes
///
/// Struct level:
/// - `#[bulk(table = "name")]` - table name (defaults to snake_case plural of the struct name)
/// - `#[bulk(schema = "name")]` - schema qualifier
/// - `#[bulk(keyless)]` - the entity has no primary key
///
/// Field level:
/// - `#[bulk(primary_key)]` - part of the primary key
/// - `#[bulk(identity)]` / `#[bulk(auto_increment)]` - generated on insert
/// - `#[bulk(computed)]` - computed by the database, never written
/// - `#[bulk(column = "name")]` - column name override
/// - `#[bulk(nullable)]` - nullable even if the type is not `Option<T>`
/// - `#[bulk(sql_type = "VARCHAR(64)")]` - explicit declared type
/// - `#[bulk(foreign_key = "table.column")]`, `#[bulk(on_delete = "cascade")]`
/// - `#[bulk(ordinal = 3)]` - explicit column position
/// - `#[bulk(skip)]` - not mapped; filled with `Default::default()` on read
///
/// # Example
///
/// ```ignore
/// use sqlbulk::Entity;
///
/// #[derive(Entity)]
/// #[bulk(table = "users")]
/// struct User {
///     #[bulk(primary_key, identity)]
///     id: Option<i64>,
///     name: String,
///     is_active: bool,
/// }
///
/// let inactive = !User::is_active;
/// ```
#[proc_macro_derive(Entity, attributes(bulk))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let def = match parse_entity(&input) {
        Ok(d) => d,
        Err(e) => return e.to_compile_error().into(),
    };

    match generate_entity_impl(&def) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Derive macro for the `Projection` trait.
///
/// Each field is one output of a source query. `#[bulk(target = "col")]`
/// names the target column the output fills; without it the field name is
/// used.
///
/// ```ignore
/// #[derive(Projection)]
/// struct ArchivedUser {
///     #[bulk(target = "name")]
///     display: String,
///     is_active: bool,
/// }
/// ```
#[proc_macro_derive(Projection, attributes(bulk))]
pub fn derive_projection(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    match parse_projection(&input) {
        Ok(def) => generate_projection_impl(&def).into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Generate the Entity trait implementation from a parsed entity definition.
fn generate_entity_impl(def: &EntityDef) -> syn::Result<proc_macro2::TokenStream> {
    let name = &def.name;
    let table_name = &def.table_name;
    let keyless = def.keyless;
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();

    let schema_ts = match &def.schema {
        Some(schema) => quote::quote! { Some(#schema) },
        None => quote::quote! { None },
    };

    let field_infos = generate_field_infos(def)?;
    let to_row = generate_to_row(def);
    let from_row = generate_from_row(def);
    let columns = generate_column_consts(
        def.mapped_fields().map(|f| (&f.name, &f.ty)),
        name,
        &def.generics,
    );

    Ok(quote::quote! {
        impl #impl_generics sqlbulk_core::Entity for #name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table_name;
            const SCHEMA: Option<&'static str> = #schema_ts;
            const KEYLESS: bool = #keyless;

            fn fields() -> &'static [sqlbulk_core::FieldInfo] {
                static FIELDS: &[sqlbulk_core::FieldInfo] = &[#field_infos];
                FIELDS
            }

            fn to_row(&self) -> Vec<(&'static str, sqlbulk_core::Value)> {
                #to_row
            }

            fn from_row(row: &sqlbulk_core::Row) -> sqlbulk_core::Result<Self> {
                #from_row
            }
        }

        #columns
    })
}

fn referential_action_ts(action: &str) -> proc_macro2::TokenStream {
    match action.to_uppercase().as_str() {
        "RESTRICT" => quote::quote! { sqlbulk_core::ReferentialAction::Restrict },
        "CASCADE" => quote::quote! { sqlbulk_core::ReferentialAction::Cascade },
        "SET NULL" | "SETNULL" | "SET_NULL" => {
            quote::quote! { sqlbulk_core::ReferentialAction::SetNull }
        }
        "SET DEFAULT" | "SETDEFAULT" | "SET_DEFAULT" => {
            quote::quote! { sqlbulk_core::ReferentialAction::SetDefault }
        }
        _ => quote::quote! { sqlbulk_core::ReferentialAction::NoAction },
    }
}

/// Generate the static FieldInfo array contents.
fn generate_field_infos(def: &EntityDef) -> syn::Result<proc_macro2::TokenStream> {
    let mut field_ts = Vec::new();

    for field in def.mapped_fields() {
        let field_name = field.name.unraw().to_string();
        let column_name = &field.column_name;
        let nullable = field.nullable;
        let primary_key = field.primary_key;
        let identity = field.identity;
        let computed = field.computed;

        let sql_type_ts = match &field.sql_type {
            Some(declared) => infer::parse_sql_type_attr(declared).ok_or_else(|| {
                syn::Error::new_spanned(
                    &field.name,
                    format!("unsupported sql_type \"{declared}\""),
                )
            })?,
            None => infer::infer_sql_type(&field.ty),
        };

        let ordinal_ts = match field.ordinal {
            Some(n) => quote::quote! { Some(#n) },
            None => quote::quote! { None },
        };
        let fk_ts = match &field.foreign_key {
            Some(fk) => quote::quote! { Some(#fk) },
            None => quote::quote! { None },
        };
        let on_delete_ts = match &field.on_delete {
            Some(action) => {
                let action_ts = referential_action_ts(action);
                quote::quote! { Some(#action_ts) }
            }
            None => quote::quote! { None },
        };

        field_ts.push(quote::quote! {
            sqlbulk_core::FieldInfo::new(#field_name, #column_name, #sql_type_ts)
                .nullable(#nullable)
                .primary_key(#primary_key)
                .identity(#identity)
                .computed(#computed)
                .ordinal_opt(#ordinal_ts)
                .foreign_key_opt(#fk_ts)
                .on_delete_opt(#on_delete_ts)
        });
    }

    Ok(quote::quote! { #(#field_ts),* })
}

/// Generate the to_row method body.
fn generate_to_row(def: &EntityDef) -> proc_macro2::TokenStream {
    let conversions = def.mapped_fields().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        quote::quote! {
            (#column_name, sqlbulk_core::Value::from(self.#field_name.clone()))
        }
    });

    quote::quote! {
        vec![#(#conversions),*]
    }
}

/// Generate the from_row method body.
fn generate_from_row(def: &EntityDef) -> proc_macro2::TokenStream {
    let name = &def.name;

    let extractions = def.fields.iter().map(|field| {
        let field_name = &field.name;
        if field.skip {
            quote::quote! { #field_name: Default::default() }
        } else {
            let column_name = &field.column_name;
            quote::quote! { #field_name: row.get_named(#column_name)? }
        }
    });

    quote::quote! {
        Ok(#name {
            #(#extractions,)*
        })
    }
}

/// Generate one `Column<Self, T>` constant per field, where `T` is the
/// field type with any `Option` removed.
fn generate_column_consts<'a>(
    fields: impl Iterator<Item = (&'a syn::Ident, &'a syn::Type)>,
    name: &syn::Ident,
    generics: &syn::Generics,
) -> proc_macro2::TokenStream {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let consts = fields.map(|(ident, ty)| {
        let value_ty = infer::unwrap_option_type(ty);
        let field_name = ident.unraw().to_string();
        quote::quote! {
            pub const #ident: sqlbulk_query::Column<Self, #value_ty> =
                sqlbulk_query::Column::new(#field_name);
        }
    });

    quote::quote! {
        #[allow(non_upper_case_globals)]
        impl #impl_generics #name #ty_generics #where_clause {
            #(#consts)*
        }
    }
}

/// Generate the Projection trait implementation.
fn generate_projection_impl(def: &ProjectionDef) -> proc_macro2::TokenStream {
    let name = &def.name;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();

    let outputs = def.outputs.iter().map(|output| {
        let output_name = output.name.unraw().to_string();
        let target = &output.target;
        quote::quote! { sqlbulk_core::ProjectionField::new(#output_name, #target) }
    });

    let columns = generate_column_consts(
        def.outputs.iter().map(|o| (&o.name, &o.ty)),
        name,
        &def.generics,
    );

    quote::quote! {
        impl #impl_generics sqlbulk_core::Projection for #name #ty_generics #where_clause {
            const NAME: &'static str = #name_str;

            fn outputs() -> &'static [sqlbulk_core::ProjectionField] {
                static OUTPUTS: &[sqlbulk_core::ProjectionField] = &[#(#outputs),*];
                OUTPUTS
            }
        }

        #columns
    }
}
