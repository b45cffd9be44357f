//! Fluent wrapper that routes a builder's terminal fetch through the cache.

use std::sync::Arc;

use super::config::CacheLength;
use super::query_cache::QueryCache;
use crate::error::QueryCacheError;
use crate::query::{
    Direction, Projection, QueryDescriptor, QueryExecutor, ResultSet, SelectQuery, Value,
};

/// A query builder paired with its own [`QueryCache`].
///
/// Builder calls pass through to the wrapped query; [`fetch`](Self::fetch)
/// is the only way results come back out.
///
/// ```
/// # use std::num::NonZeroUsize;
/// # use std::sync::Arc;
/// # use async_trait::async_trait;
/// # use query_remember::cache::{CacheLength, MemoryStore, QueryCache, QueryDecorator, StoreHandle};
/// # use query_remember::error::ExecutionError;
/// # use query_remember::{Projection, QueryDescriptor, QueryExecutor, ResultSet, SelectQuery};
/// # struct Engine;
/// # #[async_trait]
/// # impl QueryExecutor for Engine {
/// #     async fn execute(&self, _: &dyn QueryDescriptor, _: &Projection) -> Result<ResultSet, ExecutionError> {
/// #         Ok(ResultSet::empty())
/// #     }
/// # }
/// # async fn run() -> Result<(), query_remember::error::QueryCacheError> {
/// let store = StoreHandle::new(
///     "memory",
///     Arc::new(MemoryStore::tagged(NonZeroUsize::new(64).unwrap())),
/// );
/// let cache = QueryCache::new(store, CacheLength::DEFAULT);
///
/// let rows = QueryDecorator::new(SelectQuery::table("users"), cache, Arc::new(Engine))
///     .where_eq("id", 5)
///     .remember(10)?
///     .fetch(&Projection::All)
///     .await?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryDecorator<Q = SelectQuery> {
    query: Q,
    cache: QueryCache,
    executor: Arc<dyn QueryExecutor>,
}

impl<Q: QueryDescriptor> QueryDecorator<Q> {
    pub fn new(query: Q, cache: QueryCache, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            query,
            cache,
            executor,
        }
    }

    /// Cache results for `minutes`. Zero disables caching.
    pub fn remember(mut self, minutes: i64) -> Result<Self, QueryCacheError> {
        self.cache.set_length(minutes)?;
        Ok(self)
    }

    /// Cache results for ten years, which stands in for "never expire".
    pub fn remember_forever(mut self) -> Self {
        self.cache.set_cache_length(CacheLength::FOREVER);
        self
    }

    /// Stop caching for every later fetch on this decorator.
    pub fn dont_remember(mut self) -> Self {
        self.cache.disable();
        self
    }

    pub fn describe(&self) -> &Q {
        &self.query
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn into_inner(self) -> Q {
        self.query
    }

    pub async fn fetch(&self, projection: &Projection) -> Result<ResultSet, QueryCacheError> {
        self.cache
            .get(&self.query, projection, self.executor.as_ref())
            .await
    }

    /// Shorthand for fetching every column.
    pub async fn fetch_all(&self) -> Result<ResultSet, QueryCacheError> {
        self.fetch(&Projection::All).await
    }

    fn map_query(self, f: impl FnOnce(Q) -> Q) -> Self {
        Self {
            query: f(self.query),
            cache: self.cache,
            executor: self.executor,
        }
    }
}

impl QueryDecorator<SelectQuery> {
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map_query(|query| query.where_eq(column, value))
    }

    pub fn where_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, QueryCacheError> {
        let Self {
            query,
            cache,
            executor,
        } = self;
        Ok(Self {
            query: query.where_op(column, operator, value)?,
            cache,
            executor,
        })
    }

    pub fn where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.map_query(|query| query.where_in(column, values))
    }

    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.map_query(|query| query.where_null(column))
    }

    pub fn order_by(self, column: impl Into<String>, direction: Direction) -> Self {
        self.map_query(|query| query.order_by(column, direction))
    }

    pub fn limit(self, limit: u64) -> Self {
        self.map_query(|query| query.limit(limit))
    }

    pub fn offset(self, offset: u64) -> Self {
        self.map_query(|query| query.offset(offset))
    }
}
