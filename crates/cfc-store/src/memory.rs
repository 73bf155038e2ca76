use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use cfc_types::StoreKey;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::handle::{ReadHandle, Reservations, WriteHandle};
use crate::traits::StateStore;

/// In-memory, HashMap-based state store.
///
/// Intended for tests and embedding. Entries live behind a `RwLock`; a
/// discard simply clears the map.
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<StoreKey, Arc<[u8]>>>,
    reservations: Arc<Reservations>,
    generation: AtomicU64,
}

impl InMemoryStateStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            reservations: Arc::new(Reservations::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Total payload bytes across all committed entries.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|bytes| bytes.len() as u64)
            .sum()
    }

    /// Number of writes begun but neither committed nor dropped.
    pub fn in_flight(&self) -> usize {
        self.reservations.in_flight()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for InMemoryStateStore {
    fn begin_write(&self, key: &StoreKey) -> StoreResult<WriteHandle> {
        let generation = self.generation.load(Ordering::Acquire);
        self.reservations
            .begin_write(key, generation, |key| self.contains(key))
    }

    fn commit(&self, handle: WriteHandle) -> StoreResult<()> {
        let generation = handle.generation();
        let (key, bytes, _reservation) = handle.into_parts();
        let mut entries = self.entries.write().expect("lock poisoned");
        if generation != self.generation.load(Ordering::Acquire) {
            return Err(StoreError::StaleWrite(key));
        }
        if entries.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        debug!(key = %key, len = bytes.len(), "entry committed");
        entries.insert(key, bytes.into());
        Ok(())
    }

    fn begin_read(&self, key: &StoreKey) -> StoreResult<Option<ReadHandle>> {
        let entries = self.entries.read().expect("lock poisoned");
        Ok(entries
            .get(key)
            .map(|bytes| ReadHandle::new(key.clone(), Arc::clone(bytes))))
    }

    fn discard_generation(&self) -> StoreResult<()> {
        let mut entries = self.entries.write().expect("lock poisoned");
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let dropped = entries.len();
        entries.clear();
        info!(generation, dropped, "in-memory generation discarded");
        Ok(())
    }

    fn contains(&self, key: &StoreKey) -> bool {
        self.entries
            .read()
            .expect("lock poisoned")
            .contains_key(key)
    }

    fn keys(&self) -> Vec<StoreKey> {
        let mut keys: Vec<StoreKey> = self
            .entries
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for InMemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateStore")
            .field("entry_count", &self.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfc_types::{ProjectPath, StateType};

    fn key(kind: StateType, path: &str) -> StoreKey {
        StoreKey::new(kind, ProjectPath::parse(path).unwrap())
    }

    fn put(store: &InMemoryStateStore, key: &StoreKey, bytes: &[u8]) {
        let mut handle = store.begin_write(key).unwrap();
        handle.write(bytes);
        store.commit(handle).unwrap();
    }

    #[test]
    fn commit_then_read() {
        let store = InMemoryStateStore::new();
        let k = key(StateType::ProjectMetadata, ":app");
        put(&store, &k, b"payload");

        let handle = store.begin_read(&k).unwrap().unwrap();
        assert_eq!(handle.bytes(), b"payload");
        assert_eq!(handle.key(), &k);
        assert!(store.contains(&k));
        assert_eq!(store.total_bytes(), 7);
    }

    #[test]
    fn read_missing_returns_none() {
        let store = InMemoryStateStore::new();
        assert!(store
            .begin_read(&key(StateType::Work, ":"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn uncommitted_write_is_invisible() {
        let store = InMemoryStateStore::new();
        let k = key(StateType::Model, ":app");
        let mut handle = store.begin_write(&k).unwrap();
        handle.write(b"partial");
        assert!(store.begin_read(&k).unwrap().is_none());
        assert!(!store.contains(&k));
        assert_eq!(store.in_flight(), 1);
    }

    #[test]
    fn second_write_is_duplicate() {
        let store = InMemoryStateStore::new();
        let k = key(StateType::ProjectMetadata, ":app");
        put(&store, &k, b"first");
        assert!(matches!(store.begin_write(&k), Err(StoreError::DuplicateKey(_))));
        assert_eq!(store.begin_read(&k).unwrap().unwrap().bytes(), b"first");
    }

    #[test]
    fn concurrent_write_to_same_key_is_duplicate() {
        let store = InMemoryStateStore::new();
        let k = key(StateType::ProjectMetadata, ":app");
        let _first = store.begin_write(&k).unwrap();
        assert!(matches!(store.begin_write(&k), Err(StoreError::DuplicateKey(_))));
    }

    #[test]
    fn abandoned_write_frees_the_key() {
        let store = InMemoryStateStore::new();
        let k = key(StateType::ProjectMetadata, ":app");
        drop(store.begin_write(&k).unwrap());
        assert_eq!(store.in_flight(), 0);
        put(&store, &k, b"second attempt");
        assert!(store.contains(&k));
    }

    #[test]
    fn same_path_different_kind_are_distinct() {
        let store = InMemoryStateStore::new();
        put(&store, &key(StateType::ProjectMetadata, ":app"), b"a");
        put(&store, &key(StateType::IntermediateModels, ":app"), b"b");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn discard_clears_and_allows_rewrite() {
        let store = InMemoryStateStore::new();
        let k = key(StateType::ProjectMetadata, ":app");
        put(&store, &k, b"old");
        store.discard_generation().unwrap();
        assert!(store.is_empty());
        assert!(store.begin_read(&k).unwrap().is_none());
        put(&store, &k, b"new");
        assert_eq!(store.begin_read(&k).unwrap().unwrap().bytes(), b"new");
    }

    #[test]
    fn write_begun_before_discard_is_stale() {
        let store = InMemoryStateStore::new();
        let k = key(StateType::ProjectMetadata, ":app");
        let handle = store.begin_write(&k).unwrap();
        store.discard_generation().unwrap();
        assert!(matches!(store.commit(handle), Err(StoreError::StaleWrite(_))));
        assert!(!store.contains(&k));
    }

    #[test]
    fn keys_are_sorted() {
        let store = InMemoryStateStore::new();
        put(&store, &key(StateType::ProjectMetadata, ":b"), b"");
        put(&store, &key(StateType::ProjectMetadata, ":a"), b"");
        let keys = store.keys();
        assert_eq!(keys[0].path.to_string(), ":a");
        assert_eq!(keys[1].path.to_string(), ":b");
    }

    #[test]
    fn concurrent_writers_of_distinct_keys() {
        use std::thread;

        let store = Arc::new(InMemoryStateStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let k = key(StateType::ProjectMetadata, &format!(":p{i}"));
                    put(&store, &k, format!("value {i}").as_bytes());
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.len(), 8);
    }
}
