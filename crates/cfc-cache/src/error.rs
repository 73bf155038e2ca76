use std::path::PathBuf;

use cfc_codec::CodecError;
use cfc_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Whether the error means cached data is unusable, as opposed to a
    /// defect in the registered codecs or the calling code.
    ///
    /// Unusable data is handled by discarding the generation and
    /// recomputing.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Codec(e) => e.is_recoverable(),
            Self::Store(StoreError::CorruptEntry { .. }) => true,
            Self::Store(_) | Self::Config { .. } | Self::Io(_) => false,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
