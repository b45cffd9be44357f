//! Poison-tolerant locking for store internals.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock `lock`, recovering from poisoning.
///
/// Stores only hold plain data behind their locks, so a panic elsewhere can
/// leave an entry stale but never structurally broken. The poison flag is
/// cleared so the warning is logged once per panic.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    source: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(
            source,
            op,
            result = "poisoned_recovered",
            "Recovered from poisoned store lock"
        );
        lock.clear_poison();
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn recovers_and_clears_poison() {
        let lock = Mutex::new(1);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.lock().expect("first lock");
            panic!("poison");
        }));
        assert!(lock.is_poisoned());

        *mutex_lock(&lock, "test", "write") += 1;

        assert!(!lock.is_poisoned());
        assert_eq!(*mutex_lock(&lock, "test", "read"), 2);
    }
}
