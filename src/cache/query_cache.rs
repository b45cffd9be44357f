//! Read-through caching policy for a single query builder.

use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use super::config::{CacheConfiguration, CacheLength, CacheOptions, StoreErrorPolicy};
use super::handle::StoreHandle;
use super::keys::{CacheKey, StoreScope};
use super::registry::StoreRegistry;
use crate::error::{QueryCacheError, StoreError};
use crate::query::{Projection, QueryDescriptor, QueryExecutor, ResultSet};

pub(crate) const METRIC_HIT: &str = "query_cache_hit_total";
pub(crate) const METRIC_MISS: &str = "query_cache_miss_total";
pub(crate) const METRIC_BYPASS: &str = "query_cache_bypass_total";
pub(crate) const METRIC_FLUSH: &str = "query_cache_flush_total";
pub(crate) const METRIC_STORE_ERROR: &str = "query_cache_store_error_total";
pub(crate) const METRIC_EXECUTE_MS: &str = "query_cache_execute_ms";

/// Which invalidation a [`QueryCache::flush`] performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushScope {
    /// Only entries under the requested tag were dropped.
    Tag,
    /// The store cannot scope invalidation, so everything was dropped.
    Global,
}

impl FlushScope {
    fn as_str(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Global => "global",
        }
    }
}

/// Caching policy owned by one query builder.
///
/// Holds the length (zero means disabled) and the resolved store. Each
/// decorated builder gets its own instance; the store behind it is shared.
#[derive(Debug, Clone)]
pub struct QueryCache {
    store: StoreHandle,
    length: CacheLength,
    options: CacheOptions,
}

impl QueryCache {
    pub fn new(store: StoreHandle, length: CacheLength) -> Self {
        Self {
            store,
            length,
            options: CacheOptions::default(),
        }
    }

    /// Resolve the configured store from `registry`. The cache starts with
    /// the registry's options.
    pub fn from_configuration(
        registry: &StoreRegistry,
        configuration: &CacheConfiguration,
    ) -> Result<Self, QueryCacheError> {
        let store = registry.resolve(configuration.store.as_deref())?;
        Ok(Self::new(store, configuration.length).with_options(registry.options()))
    }

    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    pub fn enabled(&self) -> bool {
        self.length.is_enabled()
    }

    pub fn length(&self) -> CacheLength {
        self.length
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    /// Set the cache length in minutes. Zero disables caching.
    pub fn set_length(&mut self, minutes: i64) -> Result<(), QueryCacheError> {
        self.length = CacheLength::minutes(minutes)?;
        Ok(())
    }

    pub fn set_cache_length(&mut self, length: CacheLength) {
        self.length = length;
    }

    /// Enable caching for the default 30 minutes.
    pub fn enable(&mut self) {
        self.length = CacheLength::DEFAULT;
    }

    /// Enable caching for `minutes`.
    pub fn enable_for(&mut self, minutes: i64) -> Result<(), QueryCacheError> {
        self.set_length(minutes)
    }

    pub fn disable(&mut self) {
        self.length = CacheLength::DISABLED;
    }

    /// Scope entries for `query` are stored under on this cache's store.
    pub fn scope_for(&self, query: &dyn QueryDescriptor) -> StoreScope {
        if self.store.supports_tags() {
            StoreScope::tag(query.target())
        } else {
            StoreScope::Global
        }
    }

    /// Fetch results for `query`, serving them from the store when a live
    /// entry exists and populating the store otherwise.
    ///
    /// When caching is disabled the store is not touched at all. Execution
    /// errors are returned as-is and nothing is cached for them.
    #[instrument(
        skip_all,
        fields(store = %self.store.name(), table = %query.target(), length = %self.length)
    )]
    pub async fn get(
        &self,
        query: &dyn QueryDescriptor,
        projection: &Projection,
        executor: &dyn QueryExecutor,
    ) -> Result<ResultSet, QueryCacheError> {
        if !self.enabled() {
            counter!(METRIC_BYPASS).increment(1);
            debug!(outcome = "bypass", "Caching disabled, executing directly");
            return execute(query, projection, executor).await;
        }

        let key = CacheKey::for_query(query, projection)?;
        let scope = self.scope_for(query);

        let cached = match self.read(&scope, &key).await {
            Ok(cached) => cached,
            Err(err) => return self.degrade(err, query, projection, executor).await,
        };
        if let Some(rows) = cached {
            counter!(METRIC_HIT).increment(1);
            debug!(outcome = "hit", %scope, %key, "Serving cached result");
            return Ok(rows);
        }

        let _flight = if self.options.single_flight {
            let guard = self.store.acquire(&scope, &key).await;
            // Another caller may have filled the slot while we waited.
            match self.read(&scope, &key).await {
                Ok(Some(rows)) => {
                    counter!(METRIC_HIT).increment(1);
                    debug!(outcome = "hit", %scope, %key, "Served result computed by peer");
                    return Ok(rows);
                }
                Ok(None) => {}
                Err(err) => return self.degrade(err, query, projection, executor).await,
            }
            Some(guard)
        } else {
            None
        };

        counter!(METRIC_MISS).increment(1);
        debug!(outcome = "miss", %scope, %key, "Executing and caching result");

        let rows = execute(query, projection, executor).await?;
        if let Err(err) = self.write(&scope, &key, rows.clone()).await {
            match self.options.on_store_error {
                StoreErrorPolicy::Propagate => return Err(err),
                StoreErrorPolicy::Bypass => {
                    warn!(error = %err, %key, "Cache write failed, returning uncached result");
                }
            }
        }
        Ok(rows)
    }

    /// Invalidate cached results for `tag`.
    ///
    /// Stores without tag support cannot drop a single tag, so the whole
    /// store is flushed instead.
    #[instrument(skip(self), fields(store = %self.store.name()))]
    pub async fn flush(&self, tag: &str) -> Result<FlushScope, QueryCacheError> {
        let backend = self.store.backend();
        let scope = if self.store.supports_tags() {
            backend
                .invalidate_tag(tag)
                .await
                .map_err(|err| self.store_error("invalidate_tag", err))?;
            FlushScope::Tag
        } else {
            backend
                .invalidate_all()
                .await
                .map_err(|err| self.store_error("invalidate_all", err))?;
            FlushScope::Global
        };

        counter!(METRIC_FLUSH, "scope" => scope.as_str()).increment(1);
        info!(tag, scope = scope.as_str(), "Flushed query cache");
        Ok(scope)
    }

    async fn read(
        &self,
        scope: &StoreScope,
        key: &CacheKey,
    ) -> Result<Option<ResultSet>, QueryCacheError> {
        self.store
            .backend()
            .read(scope, key)
            .await
            .map_err(|err| self.store_error("read", err))
    }

    async fn write(
        &self,
        scope: &StoreScope,
        key: &CacheKey,
        rows: ResultSet,
    ) -> Result<(), QueryCacheError> {
        self.store
            .backend()
            .write(scope, key, rows, self.length)
            .await
            .map_err(|err| self.store_error("write", err))
    }

    fn store_error(&self, op: &'static str, source: StoreError) -> QueryCacheError {
        counter!(METRIC_STORE_ERROR, "op" => op).increment(1);
        QueryCacheError::store(self.store.name(), op, source)
    }

    async fn degrade(
        &self,
        err: QueryCacheError,
        query: &dyn QueryDescriptor,
        projection: &Projection,
        executor: &dyn QueryExecutor,
    ) -> Result<ResultSet, QueryCacheError> {
        match self.options.on_store_error {
            StoreErrorPolicy::Propagate => Err(err),
            StoreErrorPolicy::Bypass => {
                warn!(error = %err, "Cache read failed, executing directly");
                counter!(METRIC_BYPASS).increment(1);
                execute(query, projection, executor).await
            }
        }
    }
}

async fn execute(
    query: &dyn QueryDescriptor,
    projection: &Projection,
    executor: &dyn QueryExecutor,
) -> Result<ResultSet, QueryCacheError> {
    let started_at = Instant::now();
    let result = executor.execute(query, projection).await;
    histogram!(METRIC_EXECUTE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
    Ok(result?)
}
