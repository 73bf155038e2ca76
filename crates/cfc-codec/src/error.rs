use cfc_protocol::ProtocolError;
use cfc_types::{ProjectPath, TypeError};

use crate::codec::TypeTag;

/// Errors raised while encoding or decoding through the codec registry.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// No codec is registered for the type being written.
    #[error("no codec registered for type {type_name}")]
    UnsupportedType { type_name: String },

    /// The stream names a type tag this registry does not know.
    #[error("unknown type tag {tag} in cache entry")]
    UnknownFormat { tag: u64 },

    /// The stream holds a value of a different type than the caller asked for.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    /// A null was read where a value is required.
    #[error("unexpected null, expected {expected}")]
    UnexpectedNull { expected: &'static str },

    /// A decoded value failed validation.
    #[error("invalid value: {0}")]
    InvalidValue(#[from] TypeError),

    /// A project reference could not be resolved through the build host.
    #[error("project {path} is not known to the build host")]
    UnresolvedProject { path: ProjectPath },

    /// A codec was used outside of any isolate.
    #[error("no isolate has been pushed on this context")]
    NoIsolate,

    /// A tag or type was registered twice.
    #[error("duplicate codec registration for tag {tag} ({type_name})")]
    DuplicateRegistration { tag: TypeTag, type_name: &'static str },

    /// The underlying byte stream is malformed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CodecError {
    /// A malformed stream detected by a codec rather than by the decoder.
    pub fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::CorruptEntry {
            offset: offset as u64,
            reason: reason.into(),
        })
    }

    /// Whether the error describes unusable cached data rather than a
    /// programming error.
    ///
    /// Recoverable errors mean the cached state cannot be trusted and should be
    /// discarded; the others mean the registry or the calling code is wrong.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnknownFormat { .. }
            | Self::TypeMismatch { .. }
            | Self::UnexpectedNull { .. }
            | Self::InvalidValue(_)
            | Self::UnresolvedProject { .. }
            | Self::Protocol(_) => true,
            Self::UnsupportedType { .. } | Self::NoIsolate | Self::DuplicateRegistration { .. } => {
                false
            }
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
