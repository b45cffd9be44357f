#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use query_remember::cache::{
    CacheKey, CacheLength, CacheStore, MemoryStore, QueryCache, StoreHandle, StoreScope,
};
use query_remember::error::{ExecutionError, StoreError};
use query_remember::{Projection, QueryDescriptor, QueryExecutor, ResultSet, Value};

pub fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).expect("non-zero capacity")
}

/// Engine stand-in that counts executions and stamps each result with the
/// call number, so a cached result can be told apart from a fresh one.
#[derive(Default)]
pub struct CountingExecutor {
    calls: AtomicUsize,
    fail_next: AtomicBool,
    delay: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
#[error("connection reset by peer")]
pub struct EngineFailure;

impl CountingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueryExecutor for CountingExecutor {
    async fn execute(
        &self,
        query: &dyn QueryDescriptor,
        _projection: &Projection,
    ) -> Result<ResultSet, ExecutionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ExecutionError::new(EngineFailure));
        }
        Ok(ResultSet::new(
            vec!["call".to_string(), "target".to_string()],
            vec![vec![Value::from(call), Value::from(query.target())]],
        ))
    }
}

/// Call number stamped into a result by [`CountingExecutor`].
pub fn call_number(rows: &ResultSet) -> Option<i64> {
    match rows.get(0, "call") {
        Some(Value::Int(call)) => Some(*call),
        _ => None,
    }
}

/// Memory store that counts every operation it receives.
pub struct RecordingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
    flushes: AtomicUsize,
}

impl RecordingStore {
    pub fn tagged() -> Arc<Self> {
        Self::new(MemoryStore::tagged(capacity(64)))
    }

    pub fn untagged() -> Arc<Self> {
        Self::new(MemoryStore::untagged(capacity(64)))
    }

    fn new(inner: MemoryStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn interactions(&self) -> usize {
        self.reads() + self.writes() + self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    fn supports_tags(&self) -> bool {
        self.inner.supports_tags()
    }

    async fn read(
        &self,
        scope: &StoreScope,
        key: &CacheKey,
    ) -> Result<Option<ResultSet>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(scope, key).await
    }

    async fn write(
        &self,
        scope: &StoreScope,
        key: &CacheKey,
        value: ResultSet,
        length: CacheLength,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(scope, key, value, length).await
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<(), StoreError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_tag(tag).await
    }

    async fn invalidate_all(&self) -> Result<(), StoreError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_all().await
    }
}

/// Store whose backend is permanently down.
pub struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    fn supports_tags(&self) -> bool {
        true
    }

    async fn read(
        &self,
        _scope: &StoreScope,
        _key: &CacheKey,
    ) -> Result<Option<ResultSet>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn write(
        &self,
        _scope: &StoreScope,
        _key: &CacheKey,
        _value: ResultSet,
        _length: CacheLength,
    ) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn invalidate_tag(&self, _tag: &str) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn invalidate_all(&self) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }
}

pub fn cache_on(name: &str, store: Arc<dyn CacheStore>, minutes: i64) -> QueryCache {
    let length = CacheLength::minutes(minutes).expect("valid length");
    QueryCache::new(StoreHandle::new(name, store), length)
}
