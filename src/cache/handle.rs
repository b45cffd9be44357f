//! Named store handles and per-key recomputation locks.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::keys::{CacheKey, StoreScope};
use super::store::CacheStore;

type FlightSlot = (StoreScope, CacheKey);
type FlightTable = DashMap<FlightSlot, Arc<Mutex<()>>>;

/// A backend plus the name it was registered under.
///
/// Cloning is cheap and clones share the backend and the in-flight table, so
/// every [`QueryCache`](super::QueryCache) resolved from the same handle
/// serializes recomputation of the same key.
#[derive(Clone)]
pub struct StoreHandle {
    name: Arc<str>,
    backend: Arc<dyn CacheStore>,
    in_flight: Arc<FlightTable>,
}

impl StoreHandle {
    pub fn new(name: impl Into<String>, backend: Arc<dyn CacheStore>) -> Self {
        Self {
            name: Arc::from(name.into()),
            backend,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports_tags(&self) -> bool {
        self.backend.supports_tags()
    }

    pub fn backend(&self) -> &dyn CacheStore {
        self.backend.as_ref()
    }

    /// Wait for exclusive recomputation rights on `key` within `scope`.
    pub(crate) async fn acquire(&self, scope: &StoreScope, key: &CacheKey) -> FlightGuard {
        let slot = (scope.clone(), key.clone());
        let lock = self
            .in_flight
            .entry(slot.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        FlightGuard {
            slot,
            table: Arc::clone(&self.in_flight),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("name", &self.name)
            .field("supports_tags", &self.supports_tags())
            .finish_non_exhaustive()
    }
}

/// Held by the caller recomputing a key. Dropping it wakes the next waiter
/// and removes the table entry once nobody else is queued.
pub(crate) struct FlightGuard {
    slot: FlightSlot,
    table: Arc<FlightTable>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.guard.take();
        // One reference is the table's own; anything more is a queued waiter.
        self.table
            .remove_if(&self.slot, |_, lock| Arc::strong_count(lock) == 1);
    }
}
