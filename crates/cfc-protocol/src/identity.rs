//! Identity tables for shared object graphs.
//!
//! A write session assigns each shared object a stable integer the first time
//! it is seen. Entries carry the id of the session that wrote them, and the
//! read session maps `(session, id)` back to the single instance it has
//! reconstructed, so two entries that both referenced the same object decode
//! to one shared instance.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// A type-erased shared value held by an identity table.
pub type SharedValue = Arc<dyn Any + Send + Sync>;

/// Identifies one write session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn address(value: &SharedValue) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

#[derive(Default)]
struct WriteTable {
    ids: HashMap<usize, u64>,
    // Keeps every identified value alive so its address is not reused for
    // a different object within the session.
    retained: Vec<SharedValue>,
}

/// Write-session identity table: object reference → id.
///
/// Shared across all entries written in one session and safe to use from
/// several worker threads.
pub struct WriteIdentities {
    session: SessionId,
    table: Mutex<WriteTable>,
}

impl WriteIdentities {
    pub fn new() -> Self {
        Self::with_session(SessionId::new())
    }

    pub fn with_session(session: SessionId) -> Self {
        Self {
            session,
            table: Mutex::new(WriteTable::default()),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The id of `value`, assigning the next free id on first occurrence.
    pub fn identify(&self, value: &SharedValue) -> u64 {
        let mut table = self.table.lock().expect("identity table lock poisoned");
        let key = address(value);
        if let Some(id) = table.ids.get(&key) {
            return *id;
        }
        let id = table.retained.len() as u64;
        table.ids.insert(key, id);
        table.retained.push(Arc::clone(value));
        id
    }

    /// Number of distinct objects identified so far.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .expect("identity table lock poisoned")
            .retained
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WriteIdentities {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WriteIdentities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteIdentities")
            .field("session", &self.session)
            .field("len", &self.len())
            .finish()
    }
}

/// Read-session identity table: `(session, id)` → reconstructed instance.
#[derive(Default)]
pub struct ReadIdentities {
    table: Mutex<HashMap<(SessionId, u64), SharedValue>>,
}

impl ReadIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    /// The instance already reconstructed for `(session, id)`, if any.
    pub fn get(&self, session: SessionId, id: u64) -> Option<SharedValue> {
        self.table
            .lock()
            .expect("identity table lock poisoned")
            .get(&(session, id))
            .cloned()
    }

    /// Record `value` for `(session, id)` unless an instance is already
    /// known, and return whichever instance the table now holds.
    pub fn insert_or_get(&self, session: SessionId, id: u64, value: SharedValue) -> SharedValue {
        let mut table = self.table.lock().expect("identity table lock poisoned");
        Arc::clone(table.entry((session, id)).or_insert(value))
    }

    pub fn len(&self) -> usize {
        self.table.lock().expect("identity table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ReadIdentities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadIdentities")
            .field("len", &self.len())
            .finish()
    }
}
