use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::path::ProjectPath;

/// The kind of state held by a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateType {
    /// The scheduled work graph of the build.
    Work,
    /// A tooling model requested by an IDE or other client.
    Model,
    /// Resolved component metadata of a single project.
    ProjectMetadata,
    /// Models produced while configuring individual projects.
    IntermediateModels,
    /// Inputs that decide whether the whole build entry is reusable.
    BuildFingerprint,
    /// Inputs that decide whether a single project's entries are reusable.
    ProjectFingerprint,
}

impl StateType {
    /// Every entry kind, in tag order.
    pub const ALL: [StateType; 6] = [
        Self::Work,
        Self::Model,
        Self::ProjectMetadata,
        Self::IntermediateModels,
        Self::BuildFingerprint,
        Self::ProjectFingerprint,
    ];

    /// Stable one-byte tag used in entry frames and index records.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Work => 1,
            Self::Model => 2,
            Self::ProjectMetadata => 3,
            Self::IntermediateModels => 4,
            Self::BuildFingerprint => 5,
            Self::ProjectFingerprint => 6,
        }
    }

    /// Parse from a tag byte.
    pub fn from_tag(tag: u8) -> Result<Self, TypeError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or(TypeError::UnknownStateType(tag))
    }

    /// Kebab-case name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Model => "model",
            Self::ProjectMetadata => "project-metadata",
            Self::IntermediateModels => "intermediate-models",
            Self::BuildFingerprint => "build-fingerprint",
            Self::ProjectFingerprint => "project-fingerprint",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Address of a cache entry: the entry kind plus the project it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    pub kind: StateType,
    pub path: ProjectPath,
}

impl StoreKey {
    pub fn new(kind: StateType, path: ProjectPath) -> Self {
        Self { kind, path }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.path)
    }
}
