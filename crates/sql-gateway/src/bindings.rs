use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::db::{QueryExecutor, SqliteExecutor};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("Unknown database binding '{0}'")]
    Unknown(String),

    #[error("Failed to open binding '{name}' at {path}: {reason}")]
    Open {
        name: String,
        path: String,
        reason: String,
    },
}

/// Named database bindings, fixed at startup.
#[derive(Clone)]
pub struct BindingTable {
    bindings: BTreeMap<String, Arc<dyn QueryExecutor>>,
    default: String,
    supports_multiple: bool,
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("bindings", &self.names())
            .field("default", &self.default)
            .field("supports_multiple", &self.supports_multiple)
            .finish()
    }
}

impl BindingTable {
    /// A table with one binding; any requested name is ignored.
    pub fn single(name: impl Into<String>, executor: Arc<dyn QueryExecutor>) -> Self {
        let name = name.into();
        let mut bindings = BTreeMap::new();
        bindings.insert(name.clone(), executor);
        Self {
            bindings,
            default: name,
            supports_multiple: false,
        }
    }

    /// An empty table that resolves client-supplied names.
    pub fn multiple(default: impl Into<String>) -> Self {
        Self {
            bindings: BTreeMap::new(),
            default: default.into(),
            supports_multiple: true,
        }
    }

    pub fn with_binding(mut self, name: impl Into<String>, executor: Arc<dyn QueryExecutor>) -> Self {
        self.bindings.insert(name.into(), executor);
        self
    }

    /// Open a SQLite executor for every usable binding in the configuration.
    ///
    /// Without multi-binding support only the default binding can ever be
    /// resolved, so the others are not opened.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, BindingError> {
        let mut table = if config.supports_multiple_bindings {
            Self::multiple(config.default_binding.clone())
        } else {
            Self {
                bindings: BTreeMap::new(),
                default: config.default_binding.clone(),
                supports_multiple: false,
            }
        };
        for (name, path) in &config.databases {
            if !table.supports_multiple && *name != table.default {
                tracing::warn!(binding = %name, "multi-binding disabled, binding not opened");
                continue;
            }
            let executor = SqliteExecutor::open(path).map_err(|e| BindingError::Open {
                name: name.clone(),
                path: path.clone(),
                reason: e.to_string(),
            })?;
            tracing::info!(binding = %name, path = %path, "database binding opened");
            table.bindings.insert(name.clone(), Arc::new(executor));
        }
        Ok(table)
    }

    pub fn supports_multiple(&self) -> bool {
        self.supports_multiple
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    /// Executor registered under `name`, regardless of multi-binding support.
    pub fn get(&self, name: &str) -> Option<Arc<dyn QueryExecutor>> {
        self.bindings.get(name).cloned()
    }

    /// Pick the executor for a request.
    ///
    /// Without multi-binding support the requested name is ignored and the
    /// default binding is always used.
    pub fn resolve(
        &self,
        requested: Option<&str>,
    ) -> Result<(&str, Arc<dyn QueryExecutor>), BindingError> {
        let name = match requested {
            Some(name) if self.supports_multiple => name,
            _ => self.default.as_str(),
        };
        self.bindings
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), Arc::clone(v)))
            .ok_or_else(|| BindingError::Unknown(name.to_string()))
    }
}
