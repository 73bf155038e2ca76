//! Cached component metadata of the projects of a build.

use cfc_codec::{CodecResult, ReadContext, WriteContext};
use cfc_types::{IsolateOwner, LocalComponentMetadata, ProjectPath, StateType};

use crate::project_store::{ProjectStateCodec, ProjectStateStore};

/// Stores one [`LocalComponentMetadata`] per project path.
///
/// Only the component id and module version are written. Status and schema
/// come back as their defaults, so a loaded value equals
/// [`LocalComponentMetadata::cached_form`] of the stored one.
#[derive(Clone, Debug)]
pub struct ProjectMetadataController {
    build_path: ProjectPath,
}

impl ProjectMetadataController {
    pub fn new(build_path: ProjectPath) -> Self {
        Self { build_path }
    }

    pub fn build_path(&self) -> &ProjectPath {
        &self.build_path
    }
}

impl ProjectStateCodec for ProjectMetadataController {
    type Key = ProjectPath;
    type Value = LocalComponentMetadata;

    fn state_type(&self) -> StateType {
        StateType::ProjectMetadata
    }

    fn project_path_for_key(&self, key: &ProjectPath) -> ProjectPath {
        key.clone()
    }

    fn owner_for_key(&self, _key: &ProjectPath) -> IsolateOwner {
        IsolateOwner::Build {
            build_path: self.build_path.clone(),
        }
    }

    fn write(&self, ctx: &mut WriteContext, value: &LocalComponentMetadata) -> CodecResult<()> {
        ctx.write(&value.id)?;
        ctx.write(&value.module_version_id)
    }

    fn read(&self, ctx: &mut ReadContext<'_>) -> CodecResult<LocalComponentMetadata> {
        let id = ctx.read()?;
        let module_version_id = ctx.read()?;
        Ok(LocalComponentMetadata::new(id, module_version_id))
    }
}

/// Project-keyed store of component metadata.
pub type ProjectMetadataStore = ProjectStateStore<ProjectMetadataController>;
