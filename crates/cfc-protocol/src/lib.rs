//! Binary protocol primitives for the configuration cache.
//!
//! Everything the cache persists goes through the primitives in this crate:
//!
//! - [`Encoder`] appends integers, strings, byte blocks, and back-references
//!   to a forward-only buffer
//! - [`Decoder`] consumes exactly the bytes its paired write produced, so the
//!   format is self-delimiting without an external schema
//! - [`WriteIdentities`] / [`ReadIdentities`] map shared objects to integer
//!   back-references and back
//! - [`frame`] wraps a payload as `[type-tag][length][payload]`
//!
//! Malformed length prefixes and truncated input are reported as
//! [`ProtocolError::CorruptEntry`], never as partial data.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod identity;

pub use decoder::Decoder;
pub use encoder::{Encoder, RefMarker};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::Frame;
pub use identity::{ReadIdentities, SessionId, SharedValue, WriteIdentities};
