//! Table mappings resolved from entity metadata.
//!
//! A `DbContext` lists the entities of one logical database. The
//! `MetadataFactory` turns that list into `ContextTableMappings`: for every
//! entity, the table it lives in, its columns in ordinal order, its keys,
//! and the foreign keys between tables of the context. Mappings are built
//! once and never change afterwards.

use sqlbulk_core::error::{ConfigError, Error};
use sqlbulk_core::{
    Entity, FieldInfo, ReferentialAction, Result, SqlType, TableName, is_valid_identifier,
};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};

/// A logical database: a named set of entity types.
///
/// ```ignore
/// struct Shop;
///
/// impl DbContext for Shop {
///     const NAME: &'static str = "shop";
///
///     fn configure(model: &mut ModelBuilder) {
///         model.entity::<Customer>().entity::<Order>();
///     }
/// }
/// ```
pub trait DbContext: 'static {
    /// Context name, used for timeout lookup and diagnostics.
    const NAME: &'static str;

    /// Register the entity types of this context.
    fn configure(model: &mut ModelBuilder);
}

#[derive(Debug, Clone)]
struct Registration {
    type_id: TypeId,
    entity_name: &'static str,
    table: &'static str,
    schema: Option<&'static str>,
    keyless: bool,
    fields: &'static [FieldInfo],
}

/// Collects entity registrations for one context.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    registrations: Vec<Registration>,
}

impl ModelBuilder {
    /// Register entity `E`.
    pub fn entity<E: Entity>(&mut self) -> &mut Self {
        self.registrations.push(Registration {
            type_id: TypeId::of::<E>(),
            entity_name: short_type_name::<E>(),
            table: E::TABLE_NAME,
            schema: E::SCHEMA,
            keyless: E::KEYLESS,
            fields: E::fields(),
        });
        self
    }
}

// `app::model::User` → `User`
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// One mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Column name in the database
    pub name: String,
    /// Rust field name on the entity
    pub field: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub primary_key: bool,
    pub identity: bool,
    pub computed: bool,
    /// Effective position: explicit ordinal or declaration index
    pub ordinal: u16,
}

impl ColumnMapping {
    /// The engine may write this column in INSERT or UPDATE statements.
    pub const fn is_assignable(&self) -> bool {
        !self.identity && !self.computed
    }
}

/// A foreign key declared by a column of this table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyReference {
    /// Referencing column in this table
    pub column: String,
    /// Referenced table, as written in the declaration
    pub references_table: String,
    pub references_column: String,
    pub on_delete: ReferentialAction,
}

/// A column of another table in the same context that references this table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencingColumn {
    pub table: TableName,
    pub column: String,
    pub on_delete: ReferentialAction,
}

impl ReferencingColumn {
    /// `table.column`, for diagnostics.
    pub fn describe(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Resolved mapping of one entity type to its table.
#[derive(Debug, Clone)]
pub struct TableMapping {
    pub entity: TypeId,
    pub entity_name: &'static str,
    pub table: TableName,
    /// Columns ordered by ordinal
    pub columns: Vec<ColumnMapping>,
    pub foreign_keys: Vec<ForeignKeyReference>,
    /// Columns of other tables in the context that reference this one
    pub referenced_by: Vec<ReferencingColumn>,
    pub keyless: bool,
}

impl TableMapping {
    /// Column mapped from the given Rust field.
    pub fn column_for_field(&self, field: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Column with the given database name.
    pub fn column(&self, name: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key columns in ordinal order.
    pub fn primary_key(&self) -> Vec<&ColumnMapping> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Columns written by a bulk insert: everything except identity and
    /// computed columns.
    pub fn insertable_columns(&self) -> Vec<&ColumnMapping> {
        self.columns.iter().filter(|c| c.is_assignable()).collect()
    }

    /// Columns an update may assign: assignable and not part of the key.
    pub fn updatable_columns(&self) -> Vec<&ColumnMapping> {
        self.columns
            .iter()
            .filter(|c| c.is_assignable() && !c.primary_key)
            .collect()
    }

    /// Whether another table of the context holds a foreign key to this one.
    ///
    /// Self references do not count.
    pub fn is_referenced(&self) -> bool {
        self.referenced_by.iter().any(|r| r.table != self.table)
    }

    /// The foreign-key referents other than this table itself.
    pub fn external_referents(&self) -> Vec<&ReferencingColumn> {
        self.referenced_by
            .iter()
            .filter(|r| r.table != self.table)
            .collect()
    }
}

/// All table mappings of one context.
#[derive(Debug, Clone)]
pub struct ContextTableMappings {
    context: &'static str,
    tables: HashMap<TypeId, TableMapping>,
    order: Vec<TypeId>,
}

impl ContextTableMappings {
    /// Name of the context these mappings belong to.
    pub fn context(&self) -> &'static str {
        self.context
    }

    /// Mapping for entity `E`.
    pub fn get<E: Entity>(&self) -> Result<&TableMapping> {
        self.get_by_type_id(TypeId::of::<E>()).ok_or_else(|| {
            Error::config(format!(
                "entity {} is not mapped in context '{}'",
                std::any::type_name::<E>(),
                self.context
            ))
        })
    }

    /// Mapping for the entity with the given type id.
    pub fn get_by_type_id(&self, id: TypeId) -> Option<&TableMapping> {
        self.tables.get(&id)
    }

    /// Mappings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TableMapping> {
        self.order.iter().filter_map(|id| self.tables.get(id))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Builds `ContextTableMappings` from a `DbContext`.
pub struct MetadataFactory;

impl MetadataFactory {
    /// Resolve the mappings of every entity registered by `Ctx`.
    pub fn build_mappings<Ctx: DbContext>() -> Result<ContextTableMappings> {
        let mut model = ModelBuilder::default();
        Ctx::configure(&mut model);
        build_from_registrations(Ctx::NAME, model.registrations)
    }
}

fn build_from_registrations(
    context: &'static str,
    registrations: Vec<Registration>,
) -> Result<ContextTableMappings> {
    let mut tables = HashMap::with_capacity(registrations.len());
    let mut order = Vec::with_capacity(registrations.len());

    for registration in &registrations {
        if tables.contains_key(&registration.type_id) {
            return Err(config_error(
                context,
                format!(
                    "entity {} is registered more than once",
                    registration.entity_name
                ),
            ));
        }
        let mapping = build_table(context, registration)?;
        order.push(mapping.entity);
        tables.insert(mapping.entity, mapping);
    }

    link_references(&mut tables);

    tracing::debug!(
        context = context,
        tables = tables.len(),
        "Built table mappings"
    );

    Ok(ContextTableMappings {
        context,
        tables,
        order,
    })
}

fn build_table(context: &'static str, reg: &Registration) -> Result<TableMapping> {
    if !is_valid_identifier(reg.table) {
        return Err(config_error(
            context,
            format!(
                "entity {} has no resolvable table (got {:?})",
                reg.entity_name, reg.table
            ),
        ));
    }
    if let Some(schema) = reg.schema {
        if !is_valid_identifier(schema) {
            return Err(config_error(
                context,
                format!("entity {} has invalid schema {:?}", reg.entity_name, schema),
            ));
        }
    }

    let mut columns = Vec::with_capacity(reg.fields.len());
    let mut foreign_keys = Vec::new();
    let mut seen_names: HashSet<&str> = HashSet::new();
    let mut seen_ordinals: HashMap<u16, &str> = HashMap::new();

    for (index, field) in reg.fields.iter().enumerate() {
        if !is_valid_identifier(field.column_name) {
            return Err(config_error(
                context,
                format!(
                    "{}.{} maps to invalid column name {:?}",
                    reg.entity_name, field.name, field.column_name
                ),
            ));
        }
        if !seen_names.insert(field.column_name) {
            return Err(config_error(
                context,
                format!(
                    "{} maps column '{}' more than once",
                    reg.entity_name, field.column_name
                ),
            ));
        }

        let ordinal = match field.ordinal {
            Some(explicit) => explicit,
            None => u16::try_from(index).map_err(|_| {
                config_error(
                    context,
                    format!("{} has too many columns", reg.entity_name),
                )
            })?,
        };
        if let Some(other) = seen_ordinals.insert(ordinal, field.column_name) {
            return Err(config_error(
                context,
                format!(
                    "{} has conflicting column ordinals: '{}' and '{}' both at {}",
                    reg.entity_name, other, field.column_name, ordinal
                ),
            ));
        }

        if field.foreign_key.is_some() {
            let (table, column) = field.foreign_key_parts().ok_or_else(|| {
                config_error(
                    context,
                    format!(
                        "{}.{} foreign key must be of the form 'table.column'",
                        reg.entity_name, field.name
                    ),
                )
            })?;
            foreign_keys.push(ForeignKeyReference {
                column: field.column_name.to_string(),
                references_table: table.to_string(),
                references_column: column.to_string(),
                on_delete: field.on_delete.unwrap_or_default(),
            });
        }

        columns.push(ColumnMapping {
            name: field.column_name.to_string(),
            field: field.name,
            sql_type: field.sql_type,
            nullable: field.nullable,
            primary_key: field.primary_key,
            identity: field.identity,
            computed: field.computed,
            ordinal,
        });
    }

    let has_key = columns.iter().any(|c| c.primary_key);
    match (has_key, reg.keyless) {
        (false, false) => {
            return Err(config_error(
                context,
                format!(
                    "entity {} has no primary key; declare one or mark the entity keyless",
                    reg.entity_name
                ),
            ));
        }
        (true, true) => {
            return Err(config_error(
                context,
                format!(
                    "entity {} is declared keyless but has a primary key",
                    reg.entity_name
                ),
            ));
        }
        _ => {}
    }

    columns.sort_by_key(|c| c.ordinal);

    let table = match reg.schema {
        Some(schema) => TableName::qualified(schema, reg.table),
        None => TableName::new(reg.table),
    };

    Ok(TableMapping {
        entity: reg.type_id,
        entity_name: reg.entity_name,
        table,
        columns,
        foreign_keys,
        referenced_by: Vec::new(),
        keyless: reg.keyless,
    })
}

/// Fill `referenced_by` from every table's foreign keys.
fn link_references(tables: &mut HashMap<TypeId, TableMapping>) {
    let mut edges: Vec<(String, ReferencingColumn)> = Vec::new();
    for mapping in tables.values() {
        for fk in &mapping.foreign_keys {
            edges.push((
                fk.references_table.clone(),
                ReferencingColumn {
                    table: mapping.table.clone(),
                    column: fk.column.clone(),
                    on_delete: fk.on_delete,
                },
            ));
        }
    }

    for mapping in tables.values_mut() {
        let qualified = mapping.table.to_string();
        for (target, referencing) in &edges {
            if *target == mapping.table.name || *target == qualified {
                mapping.referenced_by.push(referencing.clone());
            }
        }
        mapping
            .referenced_by
            .sort_by(|a, b| a.describe().cmp(&b.describe()));
    }
}

fn config_error(context: &str, message: String) -> Error {
    Error::Config(ConfigError {
        message: format!("context '{}': {}", context, message),
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbulk_core::{Row, Value};

    macro_rules! entity {
        ($name:ident, $table:expr, $keyless:expr, [$($field:expr),* $(,)?]) => {
            struct $name;

            impl Entity for $name {
                const TABLE_NAME: &'static str = $table;
                const KEYLESS: bool = $keyless;

                fn fields() -> &'static [FieldInfo] {
                    static FIELDS: &[FieldInfo] = &[$($field),*];
                    FIELDS
                }

                fn to_row(&self) -> Vec<(&'static str, Value)> {
                    Vec::new()
                }

                fn from_row(_row: &Row) -> Result<Self> {
                    Ok($name)
                }
            }
        };
    }

    entity!(Customer, "customers", false, [
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true).identity(true),
        FieldInfo::new("name", "name", SqlType::Text),
        FieldInfo::new("score", "score", SqlType::Double).computed(true),
    ]);

    entity!(Order, "orders", false, [
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true).identity(true),
        FieldInfo::new("customer_id", "customer_id", SqlType::BigInt)
            .foreign_key("customers.id")
            .on_delete(ReferentialAction::Cascade),
        FieldInfo::new("total", "total", SqlType::Double),
    ]);

    entity!(Reordered, "reordered", false, [
        FieldInfo::new("b", "b", SqlType::Text).ordinal(2),
        FieldInfo::new("a", "a", SqlType::Text).ordinal(1),
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true).ordinal(0),
    ]);

    entity!(NoKey, "no_key", false, [FieldInfo::new("x", "x", SqlType::Text)]);

    entity!(Log, "logs", true, [FieldInfo::new("msg", "msg", SqlType::Text)]);

    entity!(DupColumn, "dup", false, [
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
        FieldInfo::new("other", "id", SqlType::BigInt),
    ]);

    entity!(DupOrdinal, "dup_ord", false, [
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
        FieldInfo::new("x", "x", SqlType::Text).ordinal(0),
    ]);

    entity!(BadTable, "", false, [FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]);

    entity!(BadFk, "bad_fk", false, [
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
        FieldInfo::new("x", "x", SqlType::BigInt).foreign_key("nowhere"),
    ]);

    macro_rules! context {
        ($name:ident, [$($entity:ty),*]) => {
            struct $name;

            impl DbContext for $name {
                const NAME: &'static str = stringify!($name);

                fn configure(model: &mut ModelBuilder) {
                    $(model.entity::<$entity>();)*
                }
            }
        };
    }

    context!(Shop, [Customer, Order, Log]);
    context!(Ordered, [Reordered]);
    context!(Twice, [Customer, Customer]);
    context!(Keyless, [NoKey]);
    context!(Dups, [DupColumn]);
    context!(DupOrd, [DupOrdinal]);
    context!(NoTable, [BadTable]);
    context!(Fk, [BadFk]);

    fn config_message(result: Result<ContextTableMappings>) -> String {
        match result {
            Err(Error::Config(e)) => e.message,
            Err(other) => panic!("expected configuration error, got {other:?}"),
            Ok(_) => panic!("expected configuration error, got mappings"),
        }
    }

    #[test]
    fn builds_columns_and_keys() {
        let mappings = MetadataFactory::build_mappings::<Shop>().unwrap();
        assert_eq!(mappings.context(), "Shop");
        assert_eq!(mappings.len(), 3);

        let customers = mappings.get::<Customer>().unwrap();
        assert_eq!(customers.table, TableName::new("customers"));
        assert_eq!(customers.primary_key().len(), 1);
        let insertable: Vec<_> = customers
            .insertable_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(insertable, ["name"]);
        assert_eq!(customers.column_for_field("name").map(|c| c.ordinal), Some(1));
    }

    #[test]
    fn referenced_by_is_linked() {
        let mappings = MetadataFactory::build_mappings::<Shop>().unwrap();
        let customers = mappings.get::<Customer>().unwrap();
        assert!(customers.is_referenced());
        assert_eq!(customers.referenced_by[0].describe(), "orders.customer_id");
        assert_eq!(customers.referenced_by[0].on_delete, ReferentialAction::Cascade);

        let orders = mappings.get::<Order>().unwrap();
        assert!(!orders.is_referenced());
        assert_eq!(orders.foreign_keys[0].references_table, "customers");
    }

    #[test]
    fn explicit_ordinals_define_column_order() {
        let mappings = MetadataFactory::build_mappings::<Ordered>().unwrap();
        let names: Vec<_> = mappings
            .get::<Reordered>()
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["id", "a", "b"]);
    }

    #[test]
    fn keyless_entities_are_allowed_when_declared() {
        let mappings = MetadataFactory::build_mappings::<Shop>().unwrap();
        let logs = mappings.get::<Log>().unwrap();
        assert!(logs.keyless);
        assert!(logs.primary_key().is_empty());
    }

    #[test]
    fn configuration_errors() {
        assert!(config_message(MetadataFactory::build_mappings::<Twice>()).contains("more than once"));
        assert!(config_message(MetadataFactory::build_mappings::<Keyless>()).contains("no primary key"));
        assert!(config_message(MetadataFactory::build_mappings::<Dups>()).contains("more than once"));
        assert!(
            config_message(MetadataFactory::build_mappings::<DupOrd>())
                .contains("conflicting column ordinals")
        );
        assert!(
            config_message(MetadataFactory::build_mappings::<NoTable>())
                .contains("no resolvable table")
        );
        assert!(config_message(MetadataFactory::build_mappings::<Fk>()).contains("table.column"));
    }

    #[test]
    fn missing_entity_is_a_configuration_error() {
        let mappings = MetadataFactory::build_mappings::<Ordered>().unwrap();
        assert!(matches!(mappings.get::<Customer>(), Err(Error::Config(_))));
    }
}
