use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use cfc_types::StoreKey;

/// Per-key mutual exclusion for load-or-compute calls over one store.
///
/// Every project state store over the same store must share one `KeyLocks`
/// so that racing calls for a key are serialized regardless of which store
/// they go through. A key's lock exists only while some call holds or waits
/// for it.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<StoreKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` while holding the lock for `key`.
    ///
    /// A panic in an earlier holder does not make the key unusable: the lock
    /// guards no data.
    pub fn with_lock<R>(&self, key: &StoreKey, operation: impl FnOnce() -> R) -> R {
        let held = Held {
            owner: self,
            key,
            lock: self.acquire(key),
        };
        let _guard = held.lock.lock().unwrap_or_else(PoisonError::into_inner);
        operation()
    }

    /// Number of keys currently locked or waited on.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn acquire(&self, key: &StoreKey) -> Arc<Mutex<()>> {
        Arc::clone(self.table().entry(key.clone()).or_default())
    }

    fn release(&self, key: &StoreKey, lock: &Arc<Mutex<()>>) {
        let mut locks = self.table();
        // One reference in the table and one held by the caller: nobody waits.
        if Arc::strong_count(lock) == 2 {
            locks.remove(key);
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<StoreKey, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for KeyLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLocks").field("locked", &self.len()).finish()
    }
}

/// Drops the table entry for a key once its last user is done, including
/// when the operation panics.
struct Held<'a> {
    owner: &'a KeyLocks,
    key: &'a StoreKey,
    lock: Arc<Mutex<()>>,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.owner.release(self.key, &self.lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfc_types::{ProjectPath, StateType};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn key(path: &str) -> StoreKey {
        StoreKey::new(StateType::Model, ProjectPath::parse(path).unwrap())
    }

    #[test]
    fn entry_removed_after_use() {
        let locks = KeyLocks::new();
        let inside = locks.with_lock(&key(":app"), || locks.len());
        assert_eq!(inside, 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let active = Arc::clone(&active);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    locks.with_lock(&key(":app"), || {
                        if active.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(5));
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert!(locks.is_empty());
    }

    #[test]
    fn panicking_holder_leaves_key_usable() {
        let locks = KeyLocks::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            locks.with_lock(&key(":app"), || panic!("supplier failed"))
        }));
        assert!(result.is_err());
        assert!(locks.is_empty());
        assert_eq!(locks.with_lock(&key(":app"), || 7), 7);
    }
}
