//! Configuration cache for the build.
//!
//! [`ConfigurationCache`] opens the on-disk generation matching a build
//! fingerprint. Project state is read through [`ProjectStateStore`]s: the
//! first request for a key computes the value and stores it, later requests
//! (in this run or the next one with the same fingerprint) load it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use cfc_cache::{CacheConfig, ConfigurationCache};
//! use cfc_codec::ProjectRegistry;
//! use cfc_types::{
//!     ComponentIdentifier, Fingerprint, LocalComponentMetadata, ModuleVersionIdentifier,
//!     ProjectPath,
//! };
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = CacheConfig::with_root(dir.path());
//! let fingerprint = Fingerprint::of(b"build inputs");
//! let app = ProjectPath::parse(":app").unwrap();
//!
//! let cache =
//!     ConfigurationCache::open(config.clone(), fingerprint, Arc::new(ProjectRegistry::root()))
//!         .unwrap();
//! cache
//!     .project_metadata()
//!     .load_or_compute(&app, || {
//!         LocalComponentMetadata::new(
//!             ComponentIdentifier::project(app.clone()),
//!             ModuleVersionIdentifier::parse("app:app:1.0").unwrap(),
//!         )
//!     })
//!     .unwrap();
//! cache.close();
//!
//! let cache =
//!     ConfigurationCache::open(config, fingerprint, Arc::new(ProjectRegistry::root())).unwrap();
//! let metadata = cache
//!     .project_metadata()
//!     .load_or_compute(&app, || unreachable!())
//!     .unwrap();
//! assert_eq!(metadata.module_version_id.version, "1.0");
//! ```
//!
//! # Failure Handling
//!
//! An entry that cannot be read back discards the whole generation and is
//! recomputed. Failures to store an entry are recorded in the
//! [`ExceptionCollector`] and the computed value is returned uncached, unless
//! [`CacheConfig::suppress_write_failures`] is off. Codec defects such as an
//! unregistered type always fail.

pub mod cache;
pub mod config;
pub mod error;
pub mod exceptions;
pub mod io;
pub mod locks;
pub mod metadata;
pub mod project_store;

pub use cache::ConfigurationCache;
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use exceptions::ExceptionCollector;
pub use io::CacheIo;
pub use locks::KeyLocks;
pub use metadata::{ProjectMetadataController, ProjectMetadataStore};
pub use project_store::{ProjectStateCodec, ProjectStateStore};
