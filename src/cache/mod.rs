//! Read-through query caching.
//!
//! - [`QueryCache`] owns the policy for one builder: length, store, key
//!   derivation, tag scoping and the flush fallback for stores without tags.
//! - [`QueryDecorator`] wraps a builder and routes its fetch through the cache.
//! - [`Cacheable`] gives entities decorated queries and flush-on-write.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! default_store = "memory"
//! length_minutes = 30
//! capacity = 1024
//! tagging = true
//! single_flight = true
//! on_store_error = "propagate"
//! ```

mod cacheable;
mod config;
mod decorator;
mod handle;
mod keys;
mod lock;
mod query_cache;
mod registry;
mod store;

pub use cacheable::{CacheBinding, CachePolicy, Cacheable};
pub use config::{
    CacheConfiguration, CacheLength, CacheOptions, DEFAULT_LENGTH_MINUTES, FOREVER_MINUTES,
    StoreErrorPolicy,
};
pub use decorator::QueryDecorator;
pub use handle::StoreHandle;
pub use keys::{CacheKey, StoreScope};
pub use query_cache::{FlushScope, QueryCache};
pub use registry::StoreRegistry;
pub use store::{CacheStore, MemoryStore};
