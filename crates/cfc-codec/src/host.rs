use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use cfc_types::{ProjectHandle, ProjectPath};
use tracing::debug;

/// Services of the running build that codecs may consult.
///
/// Values that stand for live objects of the build (such as a project) are
/// written as references and resolved through the host on read.
pub trait BuildHost: Send + Sync {
    /// Path of this build within the build tree.
    fn build_path(&self) -> &ProjectPath;

    /// The live object for the project at `path`, if the build has one.
    fn project(&self, path: &ProjectPath) -> Option<Arc<ProjectHandle>>;
}

/// Thread-safe registry of the projects of one build.
pub struct ProjectRegistry {
    build_path: ProjectPath,
    projects: RwLock<HashMap<ProjectPath, Arc<ProjectHandle>>>,
}

impl ProjectRegistry {
    pub fn new(build_path: ProjectPath) -> Self {
        Self {
            build_path,
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Registry for the root build.
    pub fn root() -> Self {
        Self::new(ProjectPath::root())
    }

    /// Register a project, returning the live handle.
    ///
    /// Registering a path twice returns the handle registered first.
    pub fn register(&self, path: ProjectPath) -> Arc<ProjectHandle> {
        let mut projects = self.projects.write().expect("lock poisoned");
        let handle = projects
            .entry(path.clone())
            .or_insert_with(|| Arc::new(ProjectHandle::new(path.clone())));
        debug!(project = %path, "project registered");
        Arc::clone(handle)
    }

    pub fn len(&self) -> usize {
        self.projects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BuildHost for ProjectRegistry {
    fn build_path(&self) -> &ProjectPath {
        &self.build_path
    }

    fn project(&self, path: &ProjectPath) -> Option<Arc<ProjectHandle>> {
        self.projects.read().expect("lock poisoned").get(path).cloned()
    }
}

impl fmt::Debug for ProjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectRegistry")
            .field("build_path", &self.build_path)
            .field("project_count", &self.len())
            .finish()
    }
}
