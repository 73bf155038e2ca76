//! Generation metadata: the marker that decides whether an on-disk
//! generation may be reused.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use cfc_types::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Version of the on-disk layout. Generations written with another version
/// are discarded on open.
pub const FORMAT_VERSION: u32 = 1;

pub(crate) const METADATA_FILE: &str = "generation.json";

/// Contents of `generation.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub format_version: u32,
    pub tool_version: String,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
}

impl GenerationMetadata {
    pub fn new(fingerprint: Fingerprint, tool_version: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            tool_version: tool_version.into(),
            fingerprint,
            created_at: Utc::now(),
        }
    }

    /// Why this generation cannot be used by `tool_version` for
    /// `fingerprint`, or `None` if it can.
    pub fn mismatch(&self, fingerprint: &Fingerprint, tool_version: &str) -> Option<String> {
        if self.format_version != FORMAT_VERSION {
            return Some(format!(
                "format version {} does not match {FORMAT_VERSION}",
                self.format_version
            ));
        }
        if self.tool_version != tool_version {
            return Some(format!(
                "written by tool version {}, running {tool_version}",
                self.tool_version
            ));
        }
        if &self.fingerprint != fingerprint {
            return Some(format!(
                "fingerprint {} does not match {}",
                self.fingerprint.short_hex(),
                fingerprint.short_hex()
            ));
        }
        None
    }

    /// Read the metadata file of the generation in `dir`.
    pub fn load(dir: &Path) -> StoreResult<Self> {
        let bytes = fs::read(dir.join(METADATA_FILE))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Write the metadata file of the generation in `dir`.
    ///
    /// The file is written to a temporary file and renamed into place, so a
    /// reader sees either the old contents or the new ones.
    pub fn store(&self, dir: &Path) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(dir.join(METADATA_FILE))
            .map_err(|e| StoreError::Io(io::Error::from(e)))?;
        Ok(())
    }
}

/// What happened to the on-disk generation when a store was opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationStatus {
    /// A matching generation was found and its committed entries are
    /// readable.
    Reused { entries: usize },
    /// No generation existed for the fingerprint.
    Created,
    /// A generation existed but could not be used; it was deleted and an
    /// empty one created in its place.
    Discarded { reason: String },
}

impl GenerationStatus {
    pub fn is_reused(&self) -> bool {
        matches!(self, Self::Reused { .. })
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reused { entries } => write!(f, "reused ({entries} entries)"),
            Self::Created => f.write_str("created"),
            Self::Discarded { reason } => write!(f, "discarded: {reason}"),
        }
    }
}
