//! Cache backends.
//!
//! [`CacheStore`] is the seam the core talks to. [`MemoryStore`] is the
//! in-process implementation: a bounded LRU with per-entry expiry that can
//! run with or without tag scoping.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::config::CacheLength;
use super::keys::{CacheKey, StoreScope};
use super::lock::mutex_lock;
use crate::error::StoreError;
use crate::query::ResultSet;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_STORE_EVICT: &str = "query_cache_store_evict_total";

/// Key/value backend holding cached result sets.
///
/// Stores that report `supports_tags() == false` are only ever handed
/// [`StoreScope::Global`]; the core falls back to [`invalidate_all`] when
/// asked to flush a tag on them.
///
/// [`invalidate_all`]: CacheStore::invalidate_all
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether entries can be namespaced and flushed per tag.
    fn supports_tags(&self) -> bool;

    /// Return the live entry for `key`, if any.
    async fn read(
        &self,
        scope: &StoreScope,
        key: &CacheKey,
    ) -> Result<Option<ResultSet>, StoreError>;

    /// Store `value` under `key`, expiring after `length`.
    async fn write(
        &self,
        scope: &StoreScope,
        key: &CacheKey,
        value: ResultSet,
        length: CacheLength,
    ) -> Result<(), StoreError>;

    /// Drop every entry stored under `tag`.
    async fn invalidate_tag(&self, tag: &str) -> Result<(), StoreError>;

    /// Drop every entry.
    async fn invalidate_all(&self) -> Result<(), StoreError>;
}

struct StoredEntry {
    value: ResultSet,
    /// `None` when the expiry does not fit the clock.
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// In-memory LRU store.
pub struct MemoryStore {
    tagging: bool,
    entries: Mutex<LruCache<(StoreScope, CacheKey), StoredEntry>>,
}

impl MemoryStore {
    /// A store that namespaces entries by tag and can flush a single tag.
    pub fn tagged(capacity: NonZeroUsize) -> Self {
        Self::with_tagging(capacity, true)
    }

    /// A store without tag support; a flush always clears everything.
    pub fn untagged(capacity: NonZeroUsize) -> Self {
        Self::with_tagging(capacity, false)
    }

    pub fn with_tagging(capacity: NonZeroUsize, tagging: bool) -> Self {
        Self {
            tagging,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored entries, including ones that expired but were not
    /// read since.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_scope(&self, scope: &StoreScope) -> Result<(), StoreError> {
        match scope {
            StoreScope::Tag(_) if !self.tagging => Err(StoreError::TagsUnsupported),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn supports_tags(&self) -> bool {
        self.tagging
    }

    async fn read(
        &self,
        scope: &StoreScope,
        key: &CacheKey,
    ) -> Result<Option<ResultSet>, StoreError> {
        self.check_scope(scope)?;

        let slot = (scope.clone(), key.clone());
        let mut entries = mutex_lock(&self.entries, SOURCE, "read");
        match entries.get(&slot) {
            Some(entry) if entry.is_live(Instant::now()) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        entries.pop(&slot);
        debug!(%scope, key = %key, "Dropped expired entry");
        Ok(None)
    }

    async fn write(
        &self,
        scope: &StoreScope,
        key: &CacheKey,
        value: ResultSet,
        length: CacheLength,
    ) -> Result<(), StoreError> {
        self.check_scope(scope)?;
        if !length.is_enabled() {
            return Ok(());
        }

        let entry = StoredEntry {
            value,
            expires_at: Instant::now().checked_add(length.as_duration()),
        };
        let slot = (scope.clone(), key.clone());
        let evicted = mutex_lock(&self.entries, SOURCE, "write").push(slot.clone(), entry);
        if let Some((evicted_slot, _)) = evicted.filter(|(evicted_slot, _)| *evicted_slot != slot) {
            counter!(METRIC_STORE_EVICT).increment(1);
            debug!(scope = %evicted_slot.0, key = %evicted_slot.1, "Evicted entry at capacity");
        }
        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<(), StoreError> {
        if !self.tagging {
            return Err(StoreError::TagsUnsupported);
        }

        let mut entries = mutex_lock(&self.entries, SOURCE, "invalidate_tag");
        let doomed: Vec<(StoreScope, CacheKey)> = entries
            .iter()
            .filter(|((scope, _), _)| scope.as_tag() == Some(tag))
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in &doomed {
            entries.pop(slot);
        }
        debug!(tag, removed = doomed.len(), "Invalidated tagged entries");
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<(), StoreError> {
        mutex_lock(&self.entries, SOURCE, "invalidate_all").clear();
        Ok(())
    }
}
