//! Store lookup by name.
//!
//! Replaces a process-global cache facade: callers hold a registry and
//! resolve the handle their configuration names.

use std::collections::HashMap;
use std::sync::Arc;

use super::config::{CacheLength, CacheOptions};
use super::handle::StoreHandle;
use super::store::{CacheStore, MemoryStore};
use crate::config::CacheSettings;
use crate::error::QueryCacheError;

/// Named store handles with one default, plus the options and length every
/// cache resolved from the registry starts with.
#[derive(Debug, Clone)]
pub struct StoreRegistry {
    default: String,
    stores: HashMap<String, StoreHandle>,
    options: CacheOptions,
    default_length: CacheLength,
}

impl StoreRegistry {
    /// Create a registry whose default store is `backend`, registered as `name`.
    pub fn new(name: impl Into<String>, backend: Arc<dyn CacheStore>) -> Self {
        let name = name.into();
        let mut stores = HashMap::new();
        stores.insert(name.clone(), StoreHandle::new(name.clone(), backend));
        Self {
            default: name,
            stores,
            options: CacheOptions::default(),
            default_length: CacheLength::DEFAULT,
        }
    }

    /// Build the registry described by the cache settings: a single memory
    /// store registered under the configured default name, carrying the
    /// configured options and length.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let store = MemoryStore::with_tagging(settings.capacity, settings.tagging);
        Self::new(settings.default_store.clone(), Arc::new(store))
            .with_options(settings.options())
            .with_default_length(settings.length)
    }

    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_default_length(mut self, length: CacheLength) -> Self {
        self.default_length = length;
        self
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    /// Length for caches whose configuration does not pick one.
    pub fn default_length(&self) -> CacheLength {
        self.default_length
    }

    /// Register another store. Replaces any store with the same name.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn CacheStore>) {
        let name = name.into();
        self.stores
            .insert(name.clone(), StoreHandle::new(name, backend));
    }

    pub fn with_store(mut self, name: impl Into<String>, backend: Arc<dyn CacheStore>) -> Self {
        self.register(name, backend);
        self
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Resolve `name`, or the default store when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<StoreHandle, QueryCacheError> {
        let name = name.unwrap_or(self.default.as_str());
        self.stores.get(name).cloned().ok_or_else(|| {
            QueryCacheError::configuration("store", format!("no cache store named `{name}`"))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }
}
