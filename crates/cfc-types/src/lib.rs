//! Foundation types for the configuration cache.
//!
//! Every other `cfc-*` crate depends on `cfc-types`.
//!
//! # Key Types
//!
//! - [`ProjectPath`] -- colon-delimited path of a project in the build tree
//! - [`StateType`] / [`StoreKey`] -- kind and address of a cache entry
//! - [`IsolateOwner`] -- who a serialization operation runs on behalf of
//! - [`ComponentIdentifier`] / [`ModuleVersionIdentifier`] -- component identities
//! - [`LocalComponentMetadata`] -- the cached per-project component metadata
//! - [`Fingerprint`] -- identifies one cache generation

pub mod component;
pub mod error;
pub mod fingerprint;
pub mod key;
pub mod owner;
pub mod path;

pub use component::{
    AttributesSchema, ComponentIdentifier, LocalComponentMetadata, ModuleIdentifier,
    ModuleVersionIdentifier, ProjectHandle,
};
pub use error::TypeError;
pub use fingerprint::Fingerprint;
pub use key::{StateType, StoreKey};
pub use owner::IsolateOwner;
pub use path::ProjectPath;
