//! Hierarchical, colon-delimited project paths.
//!
//! Paths identify a project within the build's project tree:
//!
//! - `:` is the root project
//! - `:app` and `:app:lib` are absolute paths below the root
//! - `app:lib` is a relative path, resolved against some base path
//!
//! Segments must be non-empty and must not contain whitespace or `:`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator between path segments.
pub const SEPARATOR: char = ':';

/// A project path such as `:app:lib`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectPath {
    absolute: bool,
    segments: Vec<String>,
}

impl ProjectPath {
    /// The root path `:`.
    pub fn root() -> Self {
        Self {
            absolute: true,
            segments: Vec::new(),
        }
    }

    /// Parse a path from its textual form.
    ///
    /// # Examples
    ///
    /// ```
    /// use cfc_types::ProjectPath;
    ///
    /// let path = ProjectPath::parse(":app:lib").unwrap();
    /// assert_eq!(path.name(), Some("lib"));
    /// assert!(ProjectPath::parse("").is_err());
    /// assert!(ProjectPath::parse(":app::lib").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        if text.is_empty() {
            return Err(invalid(text, "path must not be empty"));
        }
        if text == ":" {
            return Ok(Self::root());
        }

        let (absolute, rest) = match text.strip_prefix(SEPARATOR) {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let mut segments = Vec::new();
        for segment in rest.split(SEPARATOR) {
            validate_segment(text, segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { absolute, segments })
    }

    /// Returns `true` if this path starts at the root.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Returns `true` for the root path `:`.
    pub fn is_root(&self) -> bool {
        self.absolute && self.segments.is_empty()
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The enclosing path, or `None` for the root and single-segment
    /// relative paths.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() || (!self.absolute && self.segments.len() == 1) {
            return None;
        }
        Some(Self {
            absolute: self.absolute,
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append a single segment.
    pub fn child(&self, name: &str) -> Result<Self, TypeError> {
        validate_segment(name, name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self {
            absolute: self.absolute,
            segments,
        })
    }

    /// Resolve `other` against this path.
    ///
    /// An absolute `other` is returned unchanged; a relative one is appended.
    pub fn resolve(&self, other: &ProjectPath) -> ProjectPath {
        if other.absolute {
            return other.clone();
        }
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self {
            absolute: self.absolute,
            segments,
        }
    }

    /// Express this path relative to `base` when it is a strict descendant of
    /// it; any other path is returned unchanged.
    pub fn relative_to(&self, base: &ProjectPath) -> ProjectPath {
        if self.absolute == base.absolute
            && self.segments.len() > base.segments.len()
            && self.segments.starts_with(&base.segments)
        {
            return Self {
                absolute: false,
                segments: self.segments[base.segments.len()..].to_vec(),
            };
        }
        self.clone()
    }

    /// Returns `true` if `other` is this path or lies below it.
    pub fn contains(&self, other: &ProjectPath) -> bool {
        self.absolute == other.absolute && other.segments.starts_with(&self.segments)
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn validate_segment(path: &str, segment: &str) -> Result<(), TypeError> {
    if segment.is_empty() {
        return Err(invalid(path, "segments must not be empty"));
    }
    if let Some(ch) = segment
        .chars()
        .find(|c| *c == SEPARATOR || c.is_whitespace())
    {
        return Err(invalid(path, format!("segment contains forbidden character {ch:?}")));
    }
    Ok(())
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "{SEPARATOR}")?;
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectPath({self})")
    }
}

impl FromStr for ProjectPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProjectPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.to_string()
    }
}
