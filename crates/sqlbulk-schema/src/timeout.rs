//! Command timeouts per context and entity.
//!
//! Resolution order for a statement against entity table `t` in context `c`:
//! the entity override for `(c, t)`, then the context override for `c`, then
//! the registry default. A registry with no default and no overrides yields
//! no timeout at all.

use crate::mapping::DbContext;
use serde::{Deserialize, Serialize};
use sqlbulk_core::error::{ConfigError, Error};
use sqlbulk_core::{Entity, Result};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Immutable timeout lookup table.
#[derive(Debug, Clone, Default)]
pub struct TimeoutRegistry {
    default: Option<Duration>,
    contexts: HashMap<String, Duration>,
    entities: HashMap<(String, String), Duration>,
}

impl TimeoutRegistry {
    pub fn builder() -> TimeoutRegistryBuilder {
        TimeoutRegistryBuilder::default()
    }

    /// A registry that never arms a timeout.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Resolve the timeout for `table` in `context`.
    pub fn resolve(&self, context: &str, table: &str) -> Option<Duration> {
        self.entities
            .get(&(context.to_string(), table.to_string()))
            .or_else(|| self.contexts.get(context))
            .copied()
            .or(self.default)
    }

    /// Resolve the timeout for entity `E` in context `Ctx`.
    pub fn resolve_for<Ctx: DbContext, E: Entity>(&self) -> Option<Duration> {
        self.resolve(Ctx::NAME, E::TABLE_NAME)
    }

    /// Build from a deserialized configuration.
    pub fn from_config(config: &TimeoutConfig) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(ms) = config.default_ms {
            builder = builder.default_timeout(Duration::from_millis(ms));
        }
        for (context, settings) in &config.contexts {
            if let Some(ms) = settings.timeout_ms {
                builder = builder.context(context, Duration::from_millis(ms));
            }
            for (table, ms) in &settings.entities {
                builder = builder.entity(context, table, Duration::from_millis(*ms));
            }
        }
        builder.build()
    }

    /// Parse a JSON configuration document.
    ///
    /// ```
    /// use sqlbulk_schema::TimeoutRegistry;
    ///
    /// let registry = TimeoutRegistry::from_json(
    ///     r#"{"default_ms": 30000, "contexts": {"shop": {"timeout_ms": 5000, "entities": {"orders": 60000}}}}"#,
    /// ).unwrap();
    /// assert_eq!(registry.resolve("shop", "orders").map(|d| d.as_secs()), Some(60));
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TimeoutConfig = serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid timeout configuration: {}", e),
                source: Some(Box::new(e)),
            })
        })?;
        Self::from_config(&config)
    }
}

/// Builder for [`TimeoutRegistry`].
#[derive(Debug, Default)]
pub struct TimeoutRegistryBuilder {
    registry: TimeoutRegistry,
}

impl TimeoutRegistryBuilder {
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.registry.default = Some(timeout);
        self
    }

    pub fn context(mut self, context: impl Into<String>, timeout: Duration) -> Self {
        self.registry.contexts.insert(context.into(), timeout);
        self
    }

    pub fn entity(
        mut self,
        context: impl Into<String>,
        table: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        self.registry
            .entities
            .insert((context.into(), table.into()), timeout);
        self
    }

    /// Validate and freeze. Zero durations are rejected.
    pub fn build(self) -> Result<TimeoutRegistry> {
        let registry = self.registry;
        if registry.default.is_some_and(|d| d.is_zero()) {
            return Err(Error::config("default timeout must be greater than zero"));
        }
        if let Some((context, _)) = registry.contexts.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::config(format!(
                "timeout for context '{}' must be greater than zero",
                context
            )));
        }
        if let Some(((context, table), _)) = registry.entities.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::config(format!(
                "timeout for '{}' in context '{}' must be greater than zero",
                table, context
            )));
        }
        Ok(registry)
    }
}

/// Serialized form of the timeout registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default)]
    pub default_ms: Option<u64>,
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextTimeouts>,
}

/// Per-context section of [`TimeoutConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextTimeouts {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Table name to milliseconds
    #[serde(default)]
    pub entities: BTreeMap<String, u64>,
}
