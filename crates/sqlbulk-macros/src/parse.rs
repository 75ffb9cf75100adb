//! Attribute parsing for the `Entity` and `Projection` derives.

use proc_macro2::Span;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Generics, Ident, Lit, Result, Type};

/// Parsed `#[derive(Entity)]` input.
#[derive(Debug)]
pub struct EntityDef {
    pub name: Ident,
    pub generics: Generics,
    pub table_name: String,
    pub schema: Option<String>,
    pub keyless: bool,
    pub fields: Vec<FieldDef>,
}

/// One entity field with its `#[bulk(...)]` attributes applied.
#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    pub column_name: String,
    pub ty: Type,
    pub sql_type: Option<String>,
    pub nullable: bool,
    pub primary_key: bool,
    pub identity: bool,
    pub computed: bool,
    pub ordinal: Option<u16>,
    pub foreign_key: Option<String>,
    pub on_delete: Option<String>,
    pub skip: bool,
}

impl EntityDef {
    /// Fields that map to a column.
    pub fn mapped_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.skip)
    }
}

/// Parsed `#[derive(Projection)]` input.
#[derive(Debug)]
pub struct ProjectionDef {
    pub name: Ident,
    pub generics: Generics,
    pub outputs: Vec<OutputDef>,
}

/// One projection output and the target column it fills.
#[derive(Debug)]
pub struct OutputDef {
    pub name: Ident,
    pub ty: Type,
    pub target: String,
}

/// Parse a struct deriving `Entity`.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();
    let attrs = parse_struct_attrs(&input.attrs)?;
    let fields = named_fields(input, "Entity")?
        .into_iter()
        .map(parse_field)
        .collect::<Result<Vec<_>>>()?;

    if attrs.keyless {
        if let Some(pk) = fields.iter().find(|f| f.primary_key) {
            return Err(Error::new_spanned(
                &pk.name,
                "`keyless` entities cannot declare a `primary_key` field",
            ));
        }
    }

    let table_name = attrs
        .table
        .unwrap_or_else(|| derive_table_name(&name.to_string()));

    Ok(EntityDef {
        name,
        generics,
        table_name,
        schema: attrs.schema,
        keyless: attrs.keyless,
        fields,
    })
}

/// Parse a struct deriving `Projection`.
pub fn parse_projection(input: &DeriveInput) -> Result<ProjectionDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();
    let mut outputs = Vec::new();

    for field in named_fields(input, "Projection")? {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
        let mut target: Option<String> = None;

        for attr in &field.attrs {
            if !attr.path().is_ident("bulk") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("target") {
                    if target.is_some() {
                        return Err(Error::new_spanned(
                            meta.path,
                            "duplicate bulk attribute: target",
                        ));
                    }
                    target = Some(string_value(&meta, "target")?);
                    Ok(())
                } else {
                    Err(Error::new_spanned(
                        meta.path,
                        "unknown bulk projection attribute (supported: target)",
                    ))
                }
            })?;
        }

        let target = target.unwrap_or_else(|| ident.unraw_string());
        outputs.push(OutputDef {
            name: ident,
            ty: field.ty.clone(),
            target,
        });
    }

    Ok(ProjectionDef {
        name,
        generics,
        outputs,
    })
}

fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> Result<Vec<&'a Field>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => Ok(named.named.iter().collect()),
            Fields::Unnamed(_) => Err(Error::new(
                Span::call_site(),
                format!("{derive} requires a struct with named fields, not a tuple struct"),
            )),
            Fields::Unit => Err(Error::new(
                Span::call_site(),
                format!("{derive} requires a struct with fields, not a unit struct"),
            )),
        },
        Data::Enum(_) => Err(Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs, not enums"),
        )),
        Data::Union(_) => Err(Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs, not unions"),
        )),
    }
}

#[derive(Default)]
struct StructAttrs {
    table: Option<String>,
    schema: Option<String>,
    keyless: bool,
}

/// Parse struct-level `#[bulk(...)]` attributes.
///
/// Supported keys:
/// - `table = "name"` (overrides derived table name)
/// - `schema = "name"`
/// - `keyless`
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut result = StructAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("bulk") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                if result.table.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate bulk attribute: table",
                    ));
                }
                result.table = Some(string_value(&meta, "table name")?);
                Ok(())
            } else if meta.path.is_ident("schema") {
                if result.schema.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate bulk attribute: schema",
                    ));
                }
                result.schema = Some(string_value(&meta, "schema")?);
                Ok(())
            } else if meta.path.is_ident("keyless") {
                result.keyless = true;
                Ok(())
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown bulk struct attribute (supported: table, schema, keyless)",
                ))
            }
        })?;
    }

    Ok(result)
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>, what: &str) -> Result<String> {
    let value: Lit = meta.value()?.parse()?;
    if let Lit::Str(lit_str) = value {
        Ok(lit_str.value())
    } else {
        Err(Error::new_spanned(
            value,
            format!("expected string literal for {what}"),
        ))
    }
}

/// Derive table name from struct name: convert to snake_case and pluralize.
///
/// Examples:
/// - `User` -> `users`
/// - `OrderItem` -> `order_items`
/// - `Category` -> `categories`
fn derive_table_name(struct_name: &str) -> String {
    pluralize(&to_snake_case(struct_name))
}

/// Convert PascalCase to snake_case.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();
                // Word boundary, or the last capital of an acronym before a word
                let should_underscore = prev.is_lowercase()
                    || (prev.is_uppercase() && next.is_some_and(|n| n.is_lowercase()));
                if should_underscore {
                    result.push('_');
                }
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

/// Simple English pluralization.
fn pluralize(word: &str) -> String {
    match word {
        "person" => return "people".to_string(),
        "child" => return "children".to_string(),
        "datum" => return "data".to_string(),
        "index" => return "indices".to_string(),
        _ => {}
    }

    if word.is_empty() {
        return word.to_string();
    }

    if word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{word}es");
    }

    if let Some(stripped) = word.strip_suffix('y') {
        if stripped.chars().last().is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{stripped}ies");
        }
    }

    format!("{word}s")
}

#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    sql_type: Option<String>,
    nullable: Option<bool>,
    primary_key: bool,
    identity: bool,
    computed: bool,
    ordinal: Option<u16>,
    foreign_key: Option<String>,
    on_delete: Option<String>,
    skip: bool,
}

/// Parse a single field and its attributes.
fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let ty = field.ty.clone();
    let attrs = parse_field_attrs(&field.attrs)?;
    validate_field_attrs(&attrs, &name)?;

    let column_name = attrs.column.unwrap_or_else(|| name.unraw_string());

    Ok(FieldDef {
        name,
        column_name,
        nullable: attrs.nullable.unwrap_or_else(|| is_option_type(&ty)),
        ty,
        sql_type: attrs.sql_type,
        primary_key: attrs.primary_key,
        identity: attrs.identity,
        computed: attrs.computed,
        ordinal: attrs.ordinal,
        foreign_key: attrs.foreign_key,
        on_delete: attrs.on_delete,
        skip: attrs.skip,
    })
}

/// Parse all `#[bulk(...)]` attributes on a field.
fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("bulk") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                result.primary_key = true;
            } else if path.is_ident("identity") || path.is_ident("auto_increment") {
                result.identity = true;
            } else if path.is_ident("computed") {
                result.computed = true;
            } else if path.is_ident("nullable") {
                result.nullable = Some(true);
            } else if path.is_ident("skip") {
                result.skip = true;
            } else if path.is_ident("column") {
                result.column = Some(string_value(&meta, "column name")?);
            } else if path.is_ident("sql_type") {
                result.sql_type = Some(string_value(&meta, "sql_type")?);
            } else if path.is_ident("foreign_key") {
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    let fk = lit_str.value();
                    if !fk.contains('.') {
                        return Err(Error::new_spanned(
                            lit_str,
                            "foreign_key must be in format 'table.column'",
                        ));
                    }
                    result.foreign_key = Some(fk);
                } else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for foreign_key",
                    ));
                }
            } else if path.is_ident("on_delete") {
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    let action = lit_str.value();
                    if referential_action_known(&action) {
                        result.on_delete = Some(action);
                    } else {
                        return Err(Error::new_spanned(
                            lit_str,
                            "on_delete must be one of: NO ACTION, RESTRICT, CASCADE, SET NULL, SET DEFAULT",
                        ));
                    }
                } else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for on_delete",
                    ));
                }
            } else if path.is_ident("ordinal") {
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Int(lit_int) = value {
                    result.ordinal = Some(lit_int.base10_parse::<u16>()?);
                } else {
                    return Err(Error::new_spanned(
                        value,
                        "expected integer literal for ordinal",
                    ));
                }
            } else {
                return Err(Error::new_spanned(
                    path,
                    "unknown bulk field attribute (supported: primary_key, identity, \
                     auto_increment, computed, nullable, skip, column, sql_type, \
                     foreign_key, on_delete, ordinal)",
                ));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn referential_action_known(action: &str) -> bool {
    matches!(
        action.to_uppercase().as_str(),
        "NO ACTION"
            | "NOACTION"
            | "NO_ACTION"
            | "RESTRICT"
            | "CASCADE"
            | "SET NULL"
            | "SETNULL"
            | "SET_NULL"
            | "SET DEFAULT"
            | "SETDEFAULT"
            | "SET_DEFAULT"
    )
}

/// Validate that attribute combinations make sense.
fn validate_field_attrs(attrs: &FieldAttrs, field_name: &Ident) -> Result<()> {
    if attrs.skip && (attrs.primary_key || attrs.identity || attrs.computed) {
        return Err(Error::new_spanned(
            field_name,
            "`skip` fields are not mapped and cannot carry column flags",
        ));
    }
    if attrs.identity && attrs.computed {
        return Err(Error::new_spanned(
            field_name,
            "a column is either `identity` or `computed`, not both",
        ));
    }
    if attrs.on_delete.is_some() && attrs.foreign_key.is_none() {
        return Err(Error::new_spanned(
            field_name,
            "`on_delete` requires `foreign_key`",
        ));
    }
    Ok(())
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

trait UnrawString {
    fn unraw_string(&self) -> String;
}

impl UnrawString for Ident {
    fn unraw_string(&self) -> String {
        use syn::ext::IdentExt;
        self.unraw().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("OrderItem"), "order_item");
        assert_eq!(to_snake_case("HTTPLog"), "http_log");
    }

    #[test]
    fn test_derive_table_name() {
        assert_eq!(derive_table_name("User"), "users");
        assert_eq!(derive_table_name("Category"), "categories");
        assert_eq!(derive_table_name("Box"), "boxes");
        assert_eq!(derive_table_name("Person"), "people");
    }

    #[test]
    fn test_parse_entity_attrs() {
        let input: DeriveInput = parse_quote! {
            #[bulk(table = "accounts", schema = "main")]
            struct Account {
                #[bulk(primary_key, identity)]
                id: Option<i64>,
                #[bulk(column = "display_name", ordinal = 2)]
                name: String,
                #[bulk(foreign_key = "owners.id", on_delete = "cascade")]
                owner_id: i64,
                #[bulk(computed)]
                balance: f64,
                #[bulk(skip)]
                scratch: u8,
            }
        };
        let def = parse_entity(&input).unwrap();
        assert_eq!(def.table_name, "accounts");
        assert_eq!(def.schema.as_deref(), Some("main"));
        assert_eq!(def.mapped_fields().count(), 4);

        let id = &def.fields[0];
        assert!(id.primary_key && id.identity && id.nullable);
        let name = &def.fields[1];
        assert_eq!(name.column_name, "display_name");
        assert_eq!(name.ordinal, Some(2));
        assert_eq!(def.fields[2].on_delete.as_deref(), Some("cascade"));
        assert!(def.fields[3].computed);
    }

    #[test]
    fn test_keyless_with_primary_key_is_rejected() {
        let input: DeriveInput = parse_quote! {
            #[bulk(keyless)]
            struct Event {
                #[bulk(primary_key)]
                id: i64,
            }
        };
        assert!(parse_entity(&input).is_err());
    }

    #[test]
    fn test_bad_foreign_key_format() {
        let input: DeriveInput = parse_quote! {
            struct Order {
                #[bulk(primary_key)]
                id: i64,
                #[bulk(foreign_key = "customers")]
                customer_id: i64,
            }
        };
        assert!(parse_entity(&input).is_err());
    }

    #[test]
    fn test_identity_and_computed_conflict() {
        let input: DeriveInput = parse_quote! {
            struct Thing {
                #[bulk(primary_key, identity, computed)]
                id: i64,
            }
        };
        assert!(parse_entity(&input).is_err());
    }

    #[test]
    fn test_projection_targets() {
        let input: DeriveInput = parse_quote! {
            struct Archived {
                #[bulk(target = "display_name")]
                name: String,
                owner_id: i64,
            }
        };
        let def = parse_projection(&input).unwrap();
        assert_eq!(def.outputs[0].target, "display_name");
        assert_eq!(def.outputs[1].target, "owner_id");
    }

    #[test]
    fn test_unknown_attribute() {
        let input: DeriveInput = parse_quote! {
            struct Thing {
                #[bulk(primary_key, unique)]
                id: i64,
            }
        };
        assert!(parse_entity(&input).is_err());
    }
}
