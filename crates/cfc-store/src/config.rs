use serde::{Deserialize, Serialize};

/// Flush strategy for generation files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` the data file and the index after every commit.
    EveryWrite,
    /// Flush to the OS after every commit and let it decide when to sync.
    #[default]
    OsDefault,
}

/// Compression applied to entry payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum Compression {
    #[default]
    None,
    Zstd { level: i32 },
}

/// Settings for the on-disk store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub sync_mode: SyncMode,
    pub compression: Compression,
}
