use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::ProjectPath;

/// The logical subject a serialization operation runs on behalf of.
///
/// Codecs consult the owner to decide how owner-sensitive values are written
/// (for example, project paths are stored relative to the owning project) and
/// which live objects they may resolve on read.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolateOwner {
    /// The build itself, identified by the path of the build in the build tree.
    Build { build_path: ProjectPath },
    /// A single project.
    Project { path: ProjectPath },
    /// A task of a project.
    Task { project: ProjectPath, name: String },
}

impl IsolateOwner {
    /// Owner for the root build.
    pub fn root_build() -> Self {
        Self::Build {
            build_path: ProjectPath::root(),
        }
    }

    /// Owner for a project.
    pub fn project(path: ProjectPath) -> Self {
        Self::Project { path }
    }

    /// Owner for a task of a project.
    pub fn task(project: ProjectPath, name: impl Into<String>) -> Self {
        Self::Task {
            project,
            name: name.into(),
        }
    }

    /// The project path that relative paths are resolved against.
    ///
    /// A build owner resolves against the root project of the build.
    pub fn base_path(&self) -> ProjectPath {
        match self {
            Self::Build { .. } => ProjectPath::root(),
            Self::Project { path } => path.clone(),
            Self::Task { project, .. } => project.clone(),
        }
    }

    /// The owning project, if the owner is scoped to one.
    pub fn project_path(&self) -> Option<&ProjectPath> {
        match self {
            Self::Build { .. } => None,
            Self::Project { path } => Some(path),
            Self::Task { project, .. } => Some(project),
        }
    }
}

impl fmt::Display for IsolateOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build { build_path } => write!(f, "build {build_path}"),
            Self::Project { path } => write!(f, "project {path}"),
            Self::Task { project, name } if project.is_root() => write!(f, "task :{name}"),
            Self::Task { project, name } => write!(f, "task {project}:{name}"),
        }
    }
}
