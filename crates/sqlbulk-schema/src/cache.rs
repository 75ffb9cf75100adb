//! Process-wide metadata cache.
//!
//! Mappings are built in one phase by a single writer
//! (`MetadataCacheBuilder`) and then frozen into a `MetadataCache` handle
//! that any number of threads read without locking.

use crate::mapping::{ContextTableMappings, DbContext, MetadataFactory};
use sqlbulk_core::error::{Error, NotInitializedError};
use sqlbulk_core::Result;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

type Contexts = HashMap<TypeId, Arc<ContextTableMappings>>;

/// Build phase of the metadata cache.
#[derive(Debug, Default)]
pub struct MetadataCacheBuilder {
    contexts: Contexts,
}

impl MetadataCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and add the mappings of context `Ctx`.
    ///
    /// Registering the same context twice is a configuration error.
    pub fn register<Ctx: DbContext>(mut self) -> Result<Self> {
        let id = TypeId::of::<Ctx>();
        if self.contexts.contains_key(&id) {
            return Err(Error::config(format!(
                "context '{}' is already registered",
                Ctx::NAME
            )));
        }
        let mappings = MetadataFactory::build_mappings::<Ctx>()?;
        self.contexts.insert(id, Arc::new(mappings));
        Ok(self)
    }

    /// Freeze into a shareable read-only handle.
    pub fn freeze(self) -> MetadataCache {
        MetadataCache {
            inner: Arc::new(OnceLock::from(self.contexts)),
        }
    }
}

/// Read-only handle to the built mappings.
///
/// Cloning is cheap; all clones see the same snapshot. A handle created with
/// [`MetadataCache::uninitialized`] can be populated exactly once.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    inner: Arc<OnceLock<Contexts>>,
}

impl MetadataCache {
    /// A handle with nothing in it yet.
    pub fn uninitialized() -> Self {
        Self {
            inner: Arc::new(OnceLock::new()),
        }
    }

    /// Populate an uninitialized handle (and every clone of it).
    pub fn initialize(&self, builder: MetadataCacheBuilder) -> Result<()> {
        self.inner
            .set(builder.contexts)
            .map_err(|_| Error::config("metadata cache is already initialized"))?;
        tracing::debug!("Metadata cache initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Mappings of context `Ctx`.
    pub fn mappings<Ctx: DbContext>(&self) -> Result<Arc<ContextTableMappings>> {
        let contexts = self.inner.get().ok_or_else(|| {
            Error::NotInitialized(NotInitializedError {
                what: "metadata cache".to_string(),
            })
        })?;
        contexts.get(&TypeId::of::<Ctx>()).cloned().ok_or_else(|| {
            Error::NotInitialized(NotInitializedError {
                what: format!("mappings for context '{}'", Ctx::NAME),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ModelBuilder;
    use sqlbulk_core::{Entity, FieldInfo, Row, SqlType, Value};

    struct Widget;

    impl Entity for Widget {
        const TABLE_NAME: &'static str = "widgets";

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] =
                &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            Vec::new()
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Ok(Widget)
        }
    }

    struct Inventory;

    impl DbContext for Inventory {
        const NAME: &'static str = "inventory";

        fn configure(model: &mut ModelBuilder) {
            model.entity::<Widget>();
        }
    }

    struct Unbuilt;

    impl DbContext for Unbuilt {
        const NAME: &'static str = "unbuilt";

        fn configure(_model: &mut ModelBuilder) {}
    }

    #[test]
    fn frozen_cache_serves_mappings() {
        let cache = MetadataCacheBuilder::new()
            .register::<Inventory>()
            .unwrap()
            .freeze();
        let mappings = cache.mappings::<Inventory>().unwrap();
        assert_eq!(mappings.get::<Widget>().unwrap().table.name, "widgets");

        let clone = cache.clone();
        assert!(Arc::ptr_eq(&mappings, &clone.mappings::<Inventory>().unwrap()));
    }

    #[test]
    fn lookups_before_population_fail() {
        let cache = MetadataCache::uninitialized();
        assert!(matches!(
            cache.mappings::<Inventory>(),
            Err(Error::NotInitialized(_))
        ));

        let reader = cache.clone();
        cache
            .initialize(MetadataCacheBuilder::new().register::<Inventory>().unwrap())
            .unwrap();
        assert!(reader.is_initialized());
        assert!(reader.mappings::<Inventory>().is_ok());
    }

    #[test]
    fn unknown_context_is_not_initialized() {
        let cache = MetadataCacheBuilder::new()
            .register::<Inventory>()
            .unwrap()
            .freeze();
        assert!(matches!(
            cache.mappings::<Unbuilt>(),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn second_population_is_rejected() {
        let cache = MetadataCacheBuilder::new().freeze();
        let err = cache.initialize(MetadataCacheBuilder::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn duplicate_context_registration() {
        let result = MetadataCacheBuilder::new()
            .register::<Inventory>()
            .and_then(MetadataCacheBuilder::register::<Inventory>);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
