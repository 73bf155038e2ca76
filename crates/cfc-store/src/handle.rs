//! Handles returned by [`StateStore`](crate::StateStore) operations.

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

use cfc_types::StoreKey;

use crate::error::{StoreError, StoreResult};

/// Keys with a write in flight.
#[derive(Debug, Default)]
pub(crate) struct Reservations {
    keys: Mutex<HashSet<StoreKey>>,
}

impl Reservations {
    /// Reserve `key` and hand out a write handle, unless the key is reserved
    /// already or `committed` reports it as written.
    ///
    /// The reservation is taken before `committed` is consulted and stores
    /// publish a commit before releasing its reservation, so at every instant
    /// a written key is visible in at least one of the two places.
    pub(crate) fn begin_write(
        self: &Arc<Self>,
        key: &StoreKey,
        generation: u64,
        committed: impl FnOnce(&StoreKey) -> bool,
    ) -> StoreResult<WriteHandle> {
        let inserted = self
            .keys
            .lock()
            .expect("lock poisoned")
            .insert(key.clone());
        if !inserted {
            return Err(StoreError::DuplicateKey(key.clone()));
        }
        let reservation = Reservation {
            key: key.clone(),
            owner: Arc::clone(self),
        };
        if committed(key) {
            return Err(StoreError::DuplicateKey(key.clone()));
        }
        Ok(WriteHandle {
            key: key.clone(),
            generation,
            buffer: Vec::new(),
            reservation,
        })
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.keys.lock().expect("lock poisoned").len()
    }
}

/// Releases a key reservation when dropped.
pub(crate) struct Reservation {
    key: StoreKey,
    owner: Arc<Reservations>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.owner
            .keys
            .lock()
            .expect("lock poisoned")
            .remove(&self.key);
    }
}

/// Exclusive, uncommitted write to one key.
///
/// Bytes accumulate in the handle and reach the store only on commit.
/// Dropping the handle abandons the write and frees the key.
pub struct WriteHandle {
    key: StoreKey,
    generation: u64,
    buffer: Vec<u8>,
    reservation: Reservation,
}

impl WriteHandle {
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Append bytes to the pending entry.
    pub fn write(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Split into key, payload, and the reservation, which the committing
    /// store keeps alive until the entry is published.
    pub(crate) fn into_parts(self) -> (StoreKey, Vec<u8>, Reservation) {
        (self.key, self.buffer, self.reservation)
    }
}

impl io::Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("len", &self.buffer.len())
            .finish()
    }
}

/// The committed bytes of one entry.
#[derive(Clone)]
pub struct ReadHandle {
    key: StoreKey,
    bytes: Arc<[u8]>,
}

impl ReadHandle {
    pub(crate) fn new(key: StoreKey, bytes: Arc<[u8]>) -> Self {
        Self { key, bytes }
    }

    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("key", &self.key)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfc_types::{ProjectPath, StateType};
    use std::io::Write;

    fn key(path: &str) -> StoreKey {
        StoreKey::new(StateType::ProjectMetadata, ProjectPath::parse(path).unwrap())
    }

    #[test]
    fn reservation_is_exclusive_until_dropped() {
        let reservations = Arc::new(Reservations::default());
        let handle = reservations.begin_write(&key(":app"), 0, |_| false).unwrap();
        assert!(matches!(
            reservations.begin_write(&key(":app"), 0, |_| false),
            Err(StoreError::DuplicateKey(_))
        ));
        assert!(reservations.begin_write(&key(":lib"), 0, |_| false).is_ok());
        assert_eq!(reservations.in_flight(), 1);

        drop(handle);
        assert_eq!(reservations.in_flight(), 0);
        assert!(reservations.begin_write(&key(":app"), 0, |_| false).is_ok());
    }

    #[test]
    fn committed_key_is_rejected_and_reservation_released() {
        let reservations = Arc::new(Reservations::default());
        let result = reservations.begin_write(&key(":app"), 0, |_| true);
        assert!(matches!(result, Err(StoreError::DuplicateKey(_))));
        assert_eq!(reservations.in_flight(), 0);
    }

    #[test]
    fn writes_accumulate() {
        let reservations = Arc::new(Reservations::default());
        let mut handle = reservations.begin_write(&key(":app"), 3, |_| false).unwrap();
        handle.write(b"abc");
        Write::write_all(&mut handle, b"def").unwrap();
        assert_eq!(handle.len(), 6);
        assert_eq!(handle.generation(), 3);

        let (k, bytes, _reservation) = handle.into_parts();
        assert_eq!(k, key(":app"));
        assert_eq!(bytes, b"abcdef");
        assert_eq!(reservations.in_flight(), 1);
    }
}
