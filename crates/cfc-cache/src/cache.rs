use std::sync::Arc;

use cfc_codec::{BuildHost, CodecRegistry, Codecs};
use cfc_store::{FileStateStore, GenerationStatus, StateStore};
use cfc_types::Fingerprint;
use tracing::info;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::exceptions::ExceptionCollector;
use crate::io::CacheIo;
use crate::locks::KeyLocks;
use crate::metadata::{ProjectMetadataController, ProjectMetadataStore};
use crate::project_store::{ProjectStateCodec, ProjectStateStore};

/// The configuration cache of one build invocation.
///
/// Opening the cache selects the on-disk generation for a fingerprint; every
/// project state store created from it reads and writes that generation and
/// shares one serialization session. Calls for the same key are serialized
/// across all of those stores.
pub struct ConfigurationCache {
    config: CacheConfig,
    store: Arc<FileStateStore>,
    io: Arc<CacheIo>,
    problems: Arc<ExceptionCollector>,
    key_locks: Arc<KeyLocks>,
    project_metadata: ProjectMetadataStore,
}

impl ConfigurationCache {
    /// Open the generation for `fingerprint` with the built-in codecs.
    pub fn open(
        config: CacheConfig,
        fingerprint: Fingerprint,
        host: Arc<dyn BuildHost>,
    ) -> CacheResult<Self> {
        let codecs = Codecs::new()?.user_types();
        Self::open_with_codecs(config, fingerprint, host, codecs)
    }

    /// Open the generation for `fingerprint` with a caller-supplied registry.
    pub fn open_with_codecs(
        config: CacheConfig,
        fingerprint: Fingerprint,
        host: Arc<dyn BuildHost>,
        codecs: Arc<CodecRegistry>,
    ) -> CacheResult<Self> {
        let store = Arc::new(FileStateStore::open(
            &config.root_dir,
            fingerprint,
            config.tool_version.clone(),
            config.store.clone(),
        )?);
        let problems = Arc::new(ExceptionCollector::new(config.suppress_write_failures));
        let build_path = host.build_path().clone();
        let io = Arc::new(CacheIo::new(codecs, host));
        let key_locks = Arc::new(KeyLocks::new());
        let project_metadata = ProjectStateStore::new(
            ProjectMetadataController::new(build_path),
            store.clone(),
            Arc::clone(&io),
            Arc::clone(&problems),
        )
        .with_key_locks(Arc::clone(&key_locks));

        Ok(Self {
            config,
            store,
            io,
            problems,
            key_locks,
            project_metadata,
        })
    }

    /// Component metadata of the projects of this build.
    pub fn project_metadata(&self) -> &ProjectMetadataStore {
        &self.project_metadata
    }

    /// A project-keyed store for another kind of state.
    pub fn project_state_store<C: ProjectStateCodec>(&self, codec: C) -> ProjectStateStore<C> {
        ProjectStateStore::new(
            codec,
            self.store.clone(),
            Arc::clone(&self.io),
            Arc::clone(&self.problems),
        )
        .with_key_locks(Arc::clone(&self.key_locks))
    }

    /// What happened to the on-disk generation, see [`FileStateStore::status`].
    pub fn status(&self) -> GenerationStatus {
        self.store.status()
    }

    /// Problems recorded instead of failing, oldest first.
    pub fn problems(&self) -> Vec<Arc<CacheError>> {
        self.problems.problems()
    }

    /// Throw away every entry of the current generation.
    pub fn discard(&self) -> CacheResult<()> {
        info!(fingerprint = %self.store.fingerprint().short_hex(), "discarding configuration cache");
        self.store.discard_generation()?;
        Ok(())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn io(&self) -> &Arc<CacheIo> {
        &self.io
    }

    pub fn store(&self) -> &Arc<FileStateStore> {
        &self.store
    }

    /// Close the cache, returning the problems recorded while it was open.
    pub fn close(self) -> Vec<Arc<CacheError>> {
        let problems = self.problems.problems();
        self.problems.stop();
        info!(
            entries = self.store.len(),
            problems = problems.len(),
            "configuration cache closed"
        );
        problems
    }
}

impl std::fmt::Debug for ConfigurationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationCache")
            .field("dir", &self.store.dir())
            .field("status", &self.store.status())
            .field("entries", &self.store.len())
            .finish()
    }
}
