use std::fs;
use std::path::{Path, PathBuf};

use cfc_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Settings of the configuration cache.
///
/// Loadable from TOML:
///
/// ```toml
/// root_dir = ".cache/configuration-cache"
/// tool_version = "8.5"
/// suppress_write_failures = true
///
/// [store]
/// sync_mode = "every-write"
/// compression = { algorithm = "zstd", level = 3 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one subdirectory per generation.
    pub root_dir: PathBuf,
    /// Version of the tool writing the cache; a generation written by
    /// another version is discarded.
    pub tool_version: String,
    /// Record failures to store an entry instead of failing the build.
    pub suppress_write_failures: bool,
    pub store: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("configuration-cache"),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            suppress_write_failures: true,
            store: StoreConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Configuration with every default except the cache root.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> CacheResult<Self> {
        toml::from_str(text).map_err(|e| CacheError::Config {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> CacheResult<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| CacheError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn to_toml_string(&self) -> CacheResult<String> {
        toml::to_string_pretty(self).map_err(|e| CacheError::Config {
            path: self.root_dir.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfc_store::{Compression, SyncMode};

    #[test]
    fn default_config() {
        let c = CacheConfig::default();
        assert_eq!(c.root_dir, PathBuf::from("configuration-cache"));
        assert_eq!(c.tool_version, env!("CARGO_PKG_VERSION"));
        assert!(c.suppress_write_failures);
        assert_eq!(c.store, StoreConfig::default());
    }

    #[test]
    fn parse_full_toml() {
        let c = CacheConfig::from_toml_str(
            r#"
            root_dir = "/tmp/cc"
            tool_version = "8.5"
            suppress_write_failures = false

            [store]
            sync_mode = "every-write"
            compression = { algorithm = "zstd", level = 7 }
            "#,
        )
        .unwrap();
        assert_eq!(c.root_dir, PathBuf::from("/tmp/cc"));
        assert_eq!(c.tool_version, "8.5");
        assert!(!c.suppress_write_failures);
        assert_eq!(c.store.sync_mode, SyncMode::EveryWrite);
        assert_eq!(c.store.compression, Compression::Zstd { level: 7 });
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = CacheConfig::from_toml_str("tool_version = \"9.0\"").unwrap();
        assert_eq!(c.tool_version, "9.0");
        assert!(c.suppress_write_failures);
        assert_eq!(c.store.compression, Compression::None);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = CacheConfig::from_toml_str("suppress_write_failures = \"maybe\"").unwrap_err();
        assert!(matches!(err, CacheError::Config { .. }));
    }

    #[test]
    fn load_from_file_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.toml");
        let mut c = CacheConfig::with_root(dir.path().join("cc"));
        c.store.compression = Compression::Zstd { level: 1 };
        fs::write(&path, c.to_toml_string().unwrap()).unwrap();
        assert_eq!(CacheConfig::load(&path).unwrap(), c);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CacheConfig::load(&dir.path().join("absent.toml")),
            Err(CacheError::Io(_))
        ));
    }
}
