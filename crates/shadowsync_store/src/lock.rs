//! Per-shadow locks.
//!
//! Executors serialize access to a shadow's document and sync row by
//! holding its lock for the whole reconcile. The registry hands out scoped
//! guards; release happens on drop, so a panicking executor cannot strand
//! a shadow.

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use shadowsync_document::ShadowKey;
use std::collections::HashMap;
use std::sync::Arc;

/// An exclusive lock over one shadow, released on drop.
pub struct ShadowLock {
    _guard: ArcMutexGuard<RawMutex, ()>,
}

/// Registry of per-shadow locks.
///
/// Lock entries are created on first use and kept for the registry's
/// lifetime; the population is bounded by the synced-shadow set.
#[derive(Default)]
pub struct LockRegistry {
    entries: Mutex<HashMap<ShadowKey, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the exclusive lock for `key`, blocking until available.
    pub fn acquire(&self, key: &ShadowKey) -> ShadowLock {
        let entry = {
            let mut entries = self.entries.lock();
            Arc::clone(entries.entry(key.clone()).or_default())
        };
        ShadowLock {
            _guard: entry.lock_arc(),
        }
    }

    /// Number of shadows that have ever been locked.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no shadow has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let registry = LockRegistry::new();
        let key = ShadowKey::classic("t1");

        let guard = registry.acquire(&key);
        drop(guard);
        // Re-acquiring must not deadlock.
        let _guard = registry.acquire(&key);
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let registry = LockRegistry::new();
        let _a = registry.acquire(&ShadowKey::classic("t1"));
        let _b = registry.acquire(&ShadowKey::classic("t2"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn same_key_is_mutually_exclusive() {
        let registry = Arc::new(LockRegistry::new());
        let key = ShadowKey::classic("t1");
        let concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            let concurrent = Arc::clone(&concurrent);
            let key = key.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..25 {
                    let _guard = registry.acquire(&key);
                    let holders = concurrent.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(holders, 0, "two holders inside the same shadow lock");
                    thread::sleep(Duration::from_micros(50));
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
