//! Codec registry and isolate contexts for the configuration cache.
//!
//! Values are written through a [`WriteContext`] and read back through a
//! [`ReadContext`]. Each value is preceded by the [`TypeTag`] of the codec that
//! wrote it, so readers can reconstruct values polymorphically. Codecs are
//! chosen from the innermost [`Isolate`] of the context, which also names the
//! [`IsolateOwner`](cfc_types::IsolateOwner) the operation runs for.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use cfc_codec::{Codecs, IsolateContext, ProjectRegistry, ReadContext, WriteContext};
//! use cfc_protocol::{ReadIdentities, WriteIdentities};
//! use cfc_types::{IsolateOwner, ProjectPath};
//!
//! let codecs = Codecs::new().unwrap().user_types();
//! let host = Arc::new(ProjectRegistry::root());
//! let owner = IsolateOwner::project(ProjectPath::parse(":app").unwrap());
//!
//! let mut write = WriteContext::new(Arc::new(WriteIdentities::new()), host.clone());
//! write
//!     .run_in_isolate(owner.clone(), codecs.clone(), |ctx| {
//!         ctx.write(&ProjectPath::parse(":app:lib").unwrap())
//!     })
//!     .unwrap();
//! let bytes = write.finish();
//!
//! let mut read = ReadContext::new(&bytes, Arc::new(ReadIdentities::new()), host).unwrap();
//! let path: ProjectPath = read
//!     .run_in_isolate(owner, codecs, |ctx| ctx.read())
//!     .unwrap();
//! assert_eq!(path.to_string(), ":app:lib");
//! ```

pub mod builtins;
pub mod codec;
pub mod composite;
pub mod context;
pub mod error;
pub mod host;
pub mod isolate;
pub mod registry;

pub use builtins::{tags, Codecs};
pub use codec::{Codec, TypeTag};
pub use composite::{ListCodec, OptionCodec, PairCodec, SharedCodec};
pub use context::{ReadContext, WriteContext};
pub use error::{CodecError, CodecResult};
pub use host::{BuildHost, ProjectRegistry};
pub use isolate::{Isolate, IsolateContext, IsolateGuard, IsolateStack};
pub use registry::{CodecRegistry, CodecRegistryBuilder};
