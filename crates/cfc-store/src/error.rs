use cfc_types::StoreKey;

/// Errors from state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is already committed in this generation, or another write for
    /// it is in flight.
    #[error("entry {0} has already been written")]
    DuplicateKey(StoreKey),

    /// The stored bytes for a key cannot be trusted.
    #[error("corrupt entry {key}: {reason}")]
    CorruptEntry { key: StoreKey, reason: String },

    /// The write was started in a generation that has since been discarded.
    #[error("write for {0} belongs to a discarded generation")]
    StaleWrite(StoreKey),

    /// The generation directory could not be re-created after a discard.
    #[error("store is unavailable: {0}")]
    Unavailable(String),

    /// Serialization or deserialization of store metadata failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn corrupt(key: &StoreKey, reason: impl Into<String>) -> Self {
        Self::CorruptEntry {
            key: key.clone(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
