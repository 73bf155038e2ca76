//! Component identities and the cached local component metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::path::ProjectPath;

/// Module coordinates without a version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentifier {
    pub group: String,
    pub name: String,
}

impl ModuleIdentifier {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// Fully versioned module coordinates, `group:name:version`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleVersionIdentifier {
    pub module: ModuleIdentifier,
    pub version: String,
}

impl ModuleVersionIdentifier {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            module: ModuleIdentifier::new(group, name),
            version: version.into(),
        }
    }

    /// Parse `group:name:version`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cfc_types::ModuleVersionIdentifier;
    ///
    /// let id = ModuleVersionIdentifier::parse("app:app:1.0").unwrap();
    /// assert_eq!(id.version, "1.0");
    /// assert!(ModuleVersionIdentifier::parse("app:1.0").is_err());
    /// ```
    pub fn parse(coordinates: &str) -> Result<Self, TypeError> {
        let parts: Vec<&str> = coordinates.split(':').collect();
        match parts.as_slice() {
            [group, name, version] if !name.is_empty() && !version.is_empty() => {
                Ok(Self::new(*group, *name, *version))
            }
            _ => Err(TypeError::InvalidCoordinates {
                coordinates: coordinates.to_string(),
            }),
        }
    }

    pub fn group(&self) -> &str {
        &self.module.group
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }
}

impl fmt::Display for ModuleVersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

/// Identity of a component in the dependency graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentIdentifier {
    /// A published module, addressed by its coordinates.
    Module(ModuleVersionIdentifier),
    /// A project of some build in the build tree.
    Project {
        build_path: ProjectPath,
        project_path: ProjectPath,
    },
}

impl ComponentIdentifier {
    /// Module component identifier from `group:name:version`.
    pub fn module(coordinates: &str) -> Result<Self, TypeError> {
        ModuleVersionIdentifier::parse(coordinates).map(Self::Module)
    }

    /// Project component identifier in the root build.
    pub fn project(project_path: ProjectPath) -> Self {
        Self::Project {
            build_path: ProjectPath::root(),
            project_path,
        }
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(id) => write!(f, "{id}"),
            Self::Project {
                build_path,
                project_path,
            } if build_path.is_root() => write!(f, "project {project_path}"),
            Self::Project {
                build_path,
                project_path,
            } => write!(f, "project {build_path}{project_path}"),
        }
    }
}

/// Attribute schema of a component.
///
/// The cache never stores the schema; a cached component gets the empty
/// schema back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributesSchema {
    pub attributes: Vec<String>,
}

impl AttributesSchema {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Metadata of a component produced by a project of the current build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalComponentMetadata {
    pub id: ComponentIdentifier,
    pub module_version_id: ModuleVersionIdentifier,
    pub status: String,
    pub schema: AttributesSchema,
}

impl LocalComponentMetadata {
    /// Status assigned to project components that do not declare one.
    pub const DEFAULT_STATUS: &'static str = "integration";

    /// Metadata with the default status and an empty schema.
    pub fn new(id: ComponentIdentifier, module_version_id: ModuleVersionIdentifier) -> Self {
        Self {
            id,
            module_version_id,
            status: Self::DEFAULT_STATUS.to_string(),
            schema: AttributesSchema::empty(),
        }
    }

    /// Returns a copy carrying only what the cache keeps: the identity and
    /// module version, with status and schema reset to their defaults.
    pub fn cached_form(&self) -> Self {
        Self::new(self.id.clone(), self.module_version_id.clone())
    }
}

/// The live object representing a project of the running build.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProjectHandle {
    pub path: ProjectPath,
    pub name: String,
}

impl ProjectHandle {
    pub fn new(path: ProjectPath) -> Self {
        let name = path.name().unwrap_or("root").to_string();
        Self { path, name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_module_version() {
        let id = ModuleVersionIdentifier::parse("org.example:core:2.1").unwrap();
        assert_eq!(id.group(), "org.example");
        assert_eq!(id.name(), "core");
        assert_eq!(id.version, "2.1");
        assert_eq!(id.to_string(), "org.example:core:2.1");
    }

    #[test]
    fn parse_rejects_bad_coordinates() {
        for bad in ["", "a", "a:b", "a:b:c:d", "a::1.0", "a:b:"] {
            assert!(
                ModuleVersionIdentifier::parse(bad).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_group_is_allowed() {
        let id = ModuleVersionIdentifier::parse(":core:1.0").unwrap();
        assert_eq!(id.group(), "");
    }

    #[test]
    fn component_display() {
        let module = ComponentIdentifier::module("app:app:1.0").unwrap();
        assert_eq!(module.to_string(), "app:app:1.0");
        let project = ComponentIdentifier::project(ProjectPath::parse(":app").unwrap());
        assert_eq!(project.to_string(), "project :app");
    }

    #[test]
    fn cached_form_drops_status_and_schema() {
        let mut metadata = LocalComponentMetadata::new(
            ComponentIdentifier::module("app:app:1.0").unwrap(),
            ModuleVersionIdentifier::parse("app:app:1.0").unwrap(),
        );
        metadata.status = "release".into();
        metadata.schema.attributes.push("org.gradle.usage".into());

        let cached = metadata.cached_form();
        assert_eq!(cached.id, metadata.id);
        assert_eq!(cached.module_version_id, metadata.module_version_id);
        assert_eq!(cached.status, LocalComponentMetadata::DEFAULT_STATUS);
        assert!(cached.schema.is_empty());
    }

    #[test]
    fn project_handle_name() {
        assert_eq!(ProjectHandle::new(ProjectPath::parse(":app:lib").unwrap()).name, "lib");
        assert_eq!(ProjectHandle::new(ProjectPath::root()).name, "root");
    }
}
