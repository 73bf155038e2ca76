use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte stream does not hold what its paired write produced.
    #[error("corrupt entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },
}

impl ProtocolError {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Self::CorruptEntry {
            offset: offset as u64,
            reason: reason.into(),
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
