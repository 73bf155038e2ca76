use cfc_types::StoreKey;

use crate::error::StoreResult;
use crate::handle::{ReadHandle, WriteHandle};

/// Write-once keyed storage for the entries of one cache generation.
///
/// All implementations must satisfy these invariants:
/// - An entry is written at most once per generation. A key that is
///   committed, or has a write in flight, cannot be written again until the
///   generation is discarded.
/// - An entry becomes readable only once its write has been committed; a
///   reader never sees a partially written entry.
/// - A commit is visible to every read that starts after it returns.
/// - [`discard_generation`](StateStore::discard_generation) is the only way
///   entries disappear.
pub trait StateStore: Send + Sync {
    /// Start the exclusive write of `key`.
    ///
    /// Fails with [`StoreError::DuplicateKey`](crate::StoreError::DuplicateKey)
    /// if the key is committed or being written.
    fn begin_write(&self, key: &StoreKey) -> StoreResult<WriteHandle>;

    /// Make the bytes written through `handle` durable and visible.
    fn commit(&self, handle: WriteHandle) -> StoreResult<()>;

    /// Open the committed entry for `key`, or `Ok(None)` on a miss.
    ///
    /// Returns `Err` when the entry exists but its bytes cannot be trusted.
    fn begin_read(&self, key: &StoreKey) -> StoreResult<Option<ReadHandle>>;

    /// Drop every entry of the current generation and start an empty one.
    ///
    /// Writes begun before the discard fail to commit.
    fn discard_generation(&self) -> StoreResult<()>;

    /// Whether `key` has a committed entry.
    fn contains(&self, key: &StoreKey) -> bool;

    /// Keys of every committed entry, sorted.
    fn keys(&self) -> Vec<StoreKey>;

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
