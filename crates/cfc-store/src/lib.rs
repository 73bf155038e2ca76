//! Write-once keyed entry storage for the configuration cache.
//!
//! A store holds the entries of one cache generation. Each entry is addressed
//! by a [`StoreKey`](cfc_types::StoreKey), written exactly once through a
//! [`WriteHandle`], and readable after commit through a [`ReadHandle`].
//!
//! # Storage Backends
//!
//! All backends implement the [`StateStore`] trait:
//!
//! - [`InMemoryStateStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileStateStore`] -- one directory per generation with an append-only
//!   data file and commit log
//!
//! # Design Rules
//!
//! 1. Entries are immutable once committed.
//! 2. A key is written at most once per generation.
//! 3. Commit publishes the entry; readers never see partial writes.
//! 4. Discarding the whole generation is the only invalidation.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod file;
pub mod generation;
pub mod handle;
pub mod index;
pub mod memory;
pub mod traits;

pub use config::{Compression, StoreConfig, SyncMode};
pub use error::{StoreError, StoreResult};
pub use file::FileStateStore;
pub use generation::{GenerationMetadata, GenerationStatus, FORMAT_VERSION};
pub use handle::{ReadHandle, WriteHandle};
pub use index::IndexRecord;
pub use memory::InMemoryStateStore;
pub use traits::StateStore;
