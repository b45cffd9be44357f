//! Read-through result caching for parameterized queries.
//!
//! A [`QueryDecorator`](cache::QueryDecorator) wraps a query builder and
//! serves its results from a [`CacheStore`](cache::CacheStore) for a
//! configurable number of minutes. Writes invalidate by table tag, or flush
//! the whole store when it cannot scope invalidation.

pub mod cache;
pub mod config;
pub mod error;
pub mod infra;
pub mod query;

pub use query::{
    Direction, Projection, QueryDescriptor, QueryExecutor, ResultSet, SelectQuery, Value,
};
