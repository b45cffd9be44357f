//! Cache wiring for persisted entities.
//!
//! An entity embeds a [`CacheBinding`] and implements [`Cacheable`] to get
//! decorated queries for its table and tag invalidation after writes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::config::{CacheConfiguration, CacheLength};
use super::decorator::QueryDecorator;
use super::query_cache::{FlushScope, QueryCache};
use super::registry::StoreRegistry;
use crate::error::QueryCacheError;
use crate::query::{QueryExecutor, SelectQuery};

/// Per-entity cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Named store; `None` uses the registry default.
    pub store: Option<String>,
    /// `None` uses the registry's default length.
    pub length_minutes: Option<i64>,
    /// Flush the entity's table tag after every successful write.
    pub busting: bool,
}

impl CachePolicy {
    fn configuration(&self, default: CacheLength) -> Result<CacheConfiguration, QueryCacheError> {
        let length = match self.length_minutes {
            Some(minutes) => CacheLength::minutes(minutes)?,
            None => default,
        };
        Ok(CacheConfiguration::new(self.store.clone(), length))
    }
}

/// Everything an entity needs to build cached queries. Store options and
/// the fallback length come from the registry.
#[derive(Clone)]
pub struct CacheBinding {
    policy: CachePolicy,
    registry: Arc<StoreRegistry>,
    executor: Arc<dyn QueryExecutor>,
}

impl CacheBinding {
    pub fn new(
        policy: CachePolicy,
        registry: Arc<StoreRegistry>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            policy,
            registry,
            executor,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn executor(&self) -> Arc<dyn QueryExecutor> {
        Arc::clone(&self.executor)
    }

    /// A fresh cache for one builder. Length changes on it never leak back
    /// into the binding.
    pub fn query_cache(&self) -> Result<QueryCache, QueryCacheError> {
        let configuration = self.policy.configuration(self.registry.default_length())?;
        QueryCache::from_configuration(&self.registry, &configuration)
    }

    pub fn bust(&mut self) {
        self.policy.busting = true;
    }

    pub fn dont_bust(&mut self) {
        self.policy.busting = false;
    }

    pub fn is_busting(&self) -> bool {
        self.policy.busting
    }
}

/// An entity whose reads go through the query cache.
#[async_trait]
pub trait Cacheable: Send + Sync {
    /// Table the entity is stored in. Doubles as its invalidation tag.
    fn table_name(&self) -> &str;

    fn cache_binding(&self) -> &CacheBinding;

    fn cache_binding_mut(&mut self) -> &mut CacheBinding;

    /// A new decorated select against the entity's table.
    fn query(&self) -> Result<QueryDecorator, QueryCacheError> {
        let binding = self.cache_binding();
        Ok(QueryDecorator::new(
            SelectQuery::table(self.table_name()),
            binding.query_cache()?,
            binding.executor(),
        ))
    }

    fn bust(&mut self) {
        self.cache_binding_mut().bust();
    }

    fn dont_bust(&mut self) {
        self.cache_binding_mut().dont_bust();
    }

    fn is_busting(&self) -> bool {
        self.cache_binding().is_busting()
    }

    /// Call after a successful insert or update.
    async fn finish_save(&self) -> Result<Option<FlushScope>, QueryCacheError> {
        self.flush_after_write("save").await
    }

    /// Call after a successful delete.
    async fn finish_delete(&self) -> Result<Option<FlushScope>, QueryCacheError> {
        self.flush_after_write("delete").await
    }

    #[doc(hidden)]
    async fn flush_after_write(
        &self,
        event: &'static str,
    ) -> Result<Option<FlushScope>, QueryCacheError> {
        if !self.is_busting() {
            debug!(table = self.table_name(), event, "Busting disabled, keeping cache");
            return Ok(None);
        }
        let cache = self.cache_binding().query_cache()?;
        cache.flush(self.table_name()).await.map(Some)
    }
}
