//! Project-keyed load-or-compute over a state store.

use std::fmt;
use std::sync::Arc;

use cfc_codec::{CodecResult, ReadContext, WriteContext};
use cfc_store::{StateStore, StoreError};
use cfc_types::{IsolateOwner, ProjectPath, StateType, StoreKey};
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::exceptions::ExceptionCollector;
use crate::io::CacheIo;
use crate::locks::KeyLocks;

/// How the values of one kind of project state are keyed and serialized.
///
/// Every key maps to one project path; two keys with the same project path
/// share one entry.
pub trait ProjectStateCodec: Send + Sync {
    type Key;
    type Value;

    /// The entry kind this codec stores.
    fn state_type(&self) -> StateType;

    fn project_path_for_key(&self, key: &Self::Key) -> ProjectPath;

    /// The owner serialization runs for.
    fn owner_for_key(&self, key: &Self::Key) -> IsolateOwner;

    fn write(&self, ctx: &mut WriteContext, value: &Self::Value) -> CodecResult<()>;

    fn read(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Self::Value>;
}

/// Load-or-compute access to one kind of project state.
///
/// A value is computed at most once per key and generation: the first call
/// runs the supplier and stores the result, later calls decode the stored
/// entry. Calls for the same key are serialized; a caller that arrives while
/// the value is being computed waits and then loads it. Stores sharing one
/// [`KeyLocks`] (see [`with_key_locks`](Self::with_key_locks)) serialize
/// against each other too.
///
/// Stored entries that cannot be decoded make the whole generation unusable.
/// It is discarded and the call falls through to the supplier, so a damaged
/// cache costs a recomputation and never yields a wrong value.
pub struct ProjectStateStore<C: ProjectStateCodec> {
    codec: C,
    store: Arc<dyn StateStore>,
    io: Arc<CacheIo>,
    problems: Arc<ExceptionCollector>,
    key_locks: Arc<KeyLocks>,
}

impl<C: ProjectStateCodec> ProjectStateStore<C> {
    pub fn new(
        codec: C,
        store: Arc<dyn StateStore>,
        io: Arc<CacheIo>,
        problems: Arc<ExceptionCollector>,
    ) -> Self {
        Self {
            codec,
            store,
            io,
            problems,
            key_locks: Arc::new(KeyLocks::new()),
        }
    }

    /// Serialize calls for a key with every other store using `key_locks`.
    pub fn with_key_locks(mut self, key_locks: Arc<KeyLocks>) -> Self {
        self.key_locks = key_locks;
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Whether a stored entry exists for `key`.
    pub fn contains(&self, key: &C::Key) -> bool {
        self.store.contains(&self.store_key(key))
    }

    /// The stored value for `key`, or the result of `supplier`, which is then
    /// stored.
    pub fn load_or_compute(
        &self,
        key: &C::Key,
        supplier: impl FnOnce() -> C::Value,
    ) -> CacheResult<C::Value> {
        self.try_load_or_compute(key, || Ok::<_, CacheError>(supplier()))
    }

    /// Like [`load_or_compute`](Self::load_or_compute) with a supplier that
    /// may fail. A failed supplier stores nothing.
    pub fn try_load_or_compute<E>(
        &self,
        key: &C::Key,
        supplier: impl FnOnce() -> Result<C::Value, E>,
    ) -> Result<C::Value, E>
    where
        E: From<CacheError>,
    {
        let store_key = self.store_key(key);
        self.key_locks.with_lock(&store_key, || -> Result<C::Value, E> {
            if let Some(value) = self.load(&store_key, key)? {
                debug!(key = %store_key, "configuration cache hit");
                return Ok(value);
            }

            debug!(key = %store_key, "configuration cache miss");
            let value = supplier()?;
            self.save(&store_key, key, &value)?;
            Ok(value)
        })
    }

    fn store_key(&self, key: &C::Key) -> StoreKey {
        StoreKey::new(self.codec.state_type(), self.codec.project_path_for_key(key))
    }

    /// Decode the stored entry, treating unusable data as a miss after
    /// discarding the generation.
    fn load(&self, store_key: &StoreKey, key: &C::Key) -> CacheResult<Option<C::Value>> {
        let loaded = self.store.begin_read(store_key).map_err(CacheError::from).and_then(|handle| {
            handle
                .map(|handle| {
                    self.io
                        .read_entry(handle.bytes(), self.codec.owner_for_key(key), |ctx| {
                            self.codec.read(ctx)
                        })
                        .map_err(CacheError::from)
                })
                .transpose()
        });

        match loaded {
            Ok(value) => Ok(value),
            Err(e) if e.is_recoverable() => {
                warn!(
                    key = %store_key,
                    error = %e,
                    "configuration cache entry unusable, discarding generation"
                );
                self.store.discard_generation()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Encode and commit `value`. Failures to store are routed through the
    /// exception collector; codec defects always propagate.
    fn save(&self, store_key: &StoreKey, key: &C::Key, value: &C::Value) -> CacheResult<()> {
        let bytes = self
            .io
            .write_entry(self.codec.owner_for_key(key), |ctx| self.codec.write(ctx, value))?;

        let stored = self.store.begin_write(store_key).and_then(|mut handle| {
            handle.write(&bytes);
            self.store.commit(handle)
        });
        match stored {
            Ok(()) => {
                debug!(key = %store_key, len = bytes.len(), "configuration cache entry stored");
                Ok(())
            }
            Err(e) => {
                if let StoreError::DuplicateKey(_) = &e {
                    warn!(key = %store_key, "entry written concurrently, returning value uncached");
                }
                self.problems.collect(Err(CacheError::from(e))).map(|_: Option<()>| ())
            }
        }
    }
}

impl<C: ProjectStateCodec + fmt::Debug> fmt::Debug for ProjectStateStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectStateStore")
            .field("codec", &self.codec)
            .field("entries", &self.store.len())
            .finish()
    }
}
