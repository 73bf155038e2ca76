//! On-disk generations.
//!
//! Each generation lives in its own directory under the cache root, named by
//! the hex fingerprint it was created for:
//!
//! ```text
//! <root>/<fingerprint>/generation.json   metadata, replaced atomically
//! <root>/<fingerprint>/entries.bin       entry frames, append only
//! <root>/<fingerprint>/index.log         commit records, append only
//! ```
//!
//! A commit appends the entry frame to `entries.bin` and then its record to
//! `index.log`. Only keys with a complete index record exist after a reopen,
//! so a crash between the two appends leaves unreferenced bytes in the data
//! file and no visible entry.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use cfc_protocol::{Encoder, Frame};
use cfc_types::{Fingerprint, StoreKey};
use tracing::{debug, info, warn};

use crate::config::{Compression, StoreConfig, SyncMode};
use crate::error::{StoreError, StoreResult};
use crate::generation::{GenerationMetadata, GenerationStatus};
use crate::handle::{ReadHandle, Reservations, WriteHandle};
use crate::index::{IndexLog, IndexRecord};
use crate::traits::StateStore;

pub(crate) const DATA_FILE: &str = "entries.bin";

/// Open files of the current generation.
struct Appender {
    data: File,
    log: IndexLog,
}

impl Appender {
    fn open(dir: &Path) -> StoreResult<(Self, Vec<IndexRecord>)> {
        let data = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(DATA_FILE))?;
        let (log, records) = IndexLog::open(dir)?;
        Ok((Self { data, log }, records))
    }
}

/// File-backed state store holding one generation.
pub struct FileStateStore {
    dir: PathBuf,
    fingerprint: Fingerprint,
    tool_version: String,
    config: StoreConfig,
    status: RwLock<GenerationStatus>,
    index: RwLock<HashMap<StoreKey, IndexRecord>>,
    /// `None` after a discard failed to re-create the generation.
    appender: Mutex<Option<Appender>>,
    reservations: Arc<Reservations>,
    generation: AtomicU64,
}

impl FileStateStore {
    /// Open the generation for `fingerprint` under `root`.
    ///
    /// An existing generation is reused when its metadata matches the format
    /// version, `tool_version`, and fingerprint; otherwise it is deleted and
    /// an empty one is created. [`status`](Self::status) tells which
    /// happened.
    pub fn open(
        root: &Path,
        fingerprint: Fingerprint,
        tool_version: impl Into<String>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let tool_version = tool_version.into();
        let dir = root.join(fingerprint.to_hex());
        let status = prepare(&dir, &fingerprint, &tool_version)?;

        let (appender, records) = Appender::open(&dir)?;
        let mut index = HashMap::with_capacity(records.len());
        for record in records {
            match index.entry(record.key.clone()) {
                Entry::Occupied(_) => {
                    warn!(key = %record.key, "ignoring second index record for key");
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }

        let status = match status {
            GenerationStatus::Reused { .. } => GenerationStatus::Reused {
                entries: index.len(),
            },
            other => other,
        };
        info!(
            fingerprint = %fingerprint.short_hex(),
            status = %status,
            "configuration cache generation opened"
        );

        Ok(Self {
            dir,
            fingerprint,
            tool_version,
            config,
            status: RwLock::new(status),
            index: RwLock::new(index),
            appender: Mutex::new(Some(appender)),
            reservations: Arc::new(Reservations::default()),
            generation: AtomicU64::new(0),
        })
    }

    /// Directory of the generation.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// What happened to the on-disk generation: how it was found when the
    /// store was opened, or `Discarded` once it has been discarded since.
    pub fn status(&self) -> GenerationStatus {
        self.status.read().expect("lock poisoned").clone()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn read_record(&self, record: &IndexRecord) -> StoreResult<Vec<u8>> {
        let key = &record.key;
        let mut file = match File::open(self.dir.join(DATA_FILE)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::corrupt(key, "data file is missing"));
            }
            Err(e) => return Err(e.into()),
        };
        let file_len = file.metadata()?.len();
        if record.end() > file_len {
            return Err(StoreError::corrupt(
                key,
                format!(
                    "entry ends at byte {} but the data file has {file_len} bytes",
                    record.end()
                ),
            ));
        }

        let mut frame = vec![0u8; record.length as usize];
        file.seek(SeekFrom::Start(record.offset))?;
        file.read_exact(&mut frame)?;

        let frame = Frame::decode_exact(&frame, key.kind.tag())
            .map_err(|e| StoreError::corrupt(key, e.to_string()))?;
        let actual_crc = crc32fast::hash(frame.payload);
        if actual_crc != record.crc {
            return Err(StoreError::corrupt(
                key,
                format!(
                    "checksum mismatch: expected {:08x}, computed {actual_crc:08x}",
                    record.crc
                ),
            ));
        }
        if record.compressed {
            zstd::decode_all(frame.payload)
                .map_err(|e| StoreError::corrupt(key, format!("decompression failed: {e}")))
        } else {
            Ok(frame.payload.to_vec())
        }
    }
}

/// Make `dir` hold a usable generation for `fingerprint`.
fn prepare(dir: &Path, fingerprint: &Fingerprint, tool_version: &str) -> StoreResult<GenerationStatus> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        GenerationMetadata::new(*fingerprint, tool_version).store(dir)?;
        return Ok(GenerationStatus::Created);
    }

    let reason = match GenerationMetadata::load(dir) {
        Ok(metadata) => match metadata.mismatch(fingerprint, tool_version) {
            None => return Ok(GenerationStatus::Reused { entries: 0 }),
            Some(reason) => reason,
        },
        Err(e) => format!("unreadable generation metadata: {e}"),
    };
    warn!(dir = %dir.display(), reason = %reason, "discarding configuration cache generation");
    reset(dir, fingerprint, tool_version)?;
    Ok(GenerationStatus::Discarded { reason })
}

/// Delete the generation in `dir` and create an empty one.
fn reset(dir: &Path, fingerprint: &Fingerprint, tool_version: &str) -> StoreResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir)?;
    GenerationMetadata::new(*fingerprint, tool_version).store(dir)
}

impl StateStore for FileStateStore {
    fn begin_write(&self, key: &StoreKey) -> StoreResult<WriteHandle> {
        let generation = self.generation.load(Ordering::Acquire);
        self.reservations
            .begin_write(key, generation, |key| self.contains(key))
    }

    fn commit(&self, handle: WriteHandle) -> StoreResult<()> {
        let generation = handle.generation();
        let (key, payload, _reservation) = handle.into_parts();

        let (stored, compressed) = match self.config.compression {
            Compression::None => (payload, false),
            Compression::Zstd { level } => (zstd::encode_all(payload.as_slice(), level)?, true),
        };
        let crc = crc32fast::hash(&stored);
        let mut frame = Encoder::with_capacity(Frame::encoded_len(stored.len()));
        Frame::encode(&mut frame, key.kind.tag(), &stored);
        let frame = frame.into_bytes();

        let mut appender = self.appender.lock().expect("lock poisoned");
        if generation != self.generation.load(Ordering::Acquire) {
            return Err(StoreError::StaleWrite(key));
        }
        let appender = appender.as_mut().ok_or_else(|| {
            StoreError::Unavailable(format!("generation {} was not re-created", self.dir.display()))
        })?;
        if self.contains(&key) {
            return Err(StoreError::DuplicateKey(key));
        }

        // The file is in append mode, so the frame lands at the current end.
        let offset = appender.data.metadata()?.len();
        appender.data.write_all(&frame)?;
        appender.data.flush()?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            appender.data.sync_data()?;
        }

        let record = IndexRecord {
            key: key.clone(),
            offset,
            length: frame.len() as u64,
            crc,
            compressed,
        };
        appender.log.append(&record, self.config.sync_mode)?;
        self.index
            .write()
            .expect("lock poisoned")
            .insert(key.clone(), record);

        debug!(key = %key, offset, len = frame.len(), compressed, "entry committed");
        Ok(())
    }

    fn begin_read(&self, key: &StoreKey) -> StoreResult<Option<ReadHandle>> {
        let record = self.index.read().expect("lock poisoned").get(key).cloned();
        let Some(record) = record else {
            return Ok(None);
        };
        let bytes = self.read_record(&record)?;
        debug!(key = %key, len = bytes.len(), "entry read");
        Ok(Some(ReadHandle::new(key.clone(), bytes.into())))
    }

    fn discard_generation(&self) -> StoreResult<()> {
        let mut appender = self.appender.lock().expect("lock poisoned");
        let mut index = self.index.write().expect("lock poisoned");
        *appender = None;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let dropped = index.len();
        index.clear();

        reset(&self.dir, &self.fingerprint, &self.tool_version)?;
        let (fresh, _) = Appender::open(&self.dir)?;
        *appender = Some(fresh);
        *self.status.write().expect("lock poisoned") = GenerationStatus::Discarded {
            reason: format!("discarded while open, {dropped} entries dropped"),
        };

        info!(
            fingerprint = %self.fingerprint.short_hex(),
            generation,
            dropped,
            "configuration cache generation discarded"
        );
        Ok(())
    }

    fn contains(&self, key: &StoreKey) -> bool {
        self.index.read().expect("lock poisoned").contains_key(key)
    }

    fn keys(&self) -> Vec<StoreKey> {
        let mut keys: Vec<StoreKey> = self
            .index
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for FileStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStateStore")
            .field("dir", &self.dir)
            .field("status", &self.status())
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::FORMAT_VERSION;
    use crate::index::INDEX_FILE;
    use cfc_types::{ProjectPath, StateType};

    const VERSION: &str = "8.5";

    fn fingerprint() -> Fingerprint {
        Fingerprint::of(b"build inputs")
    }

    fn open(root: &Path) -> FileStateStore {
        FileStateStore::open(root, fingerprint(), VERSION, StoreConfig::default()).unwrap()
    }

    fn key(path: &str) -> StoreKey {
        StoreKey::new(StateType::ProjectMetadata, ProjectPath::parse(path).unwrap())
    }

    fn put(store: &FileStateStore, key: &StoreKey, bytes: &[u8]) {
        let mut handle = store.begin_write(key).unwrap();
        handle.write(bytes);
        store.commit(handle).unwrap();
    }

    fn get(store: &FileStateStore, key: &StoreKey) -> Option<Vec<u8>> {
        store
            .begin_read(key)
            .unwrap()
            .map(|handle| handle.bytes().to_vec())
    }

    #[test]
    fn first_open_creates_generation() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        assert_eq!(store.status(), GenerationStatus::Created);
        assert_eq!(store.dir(), root.path().join(fingerprint().to_hex()));
        assert!(store.dir().join("generation.json").exists());
        assert!(store.is_empty());
    }

    #[test]
    fn committed_entries_survive_reopen() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        put(&store, &key(":app"), b"app metadata");
        put(&store, &key(":lib"), b"lib metadata");
        assert_eq!(get(&store, &key(":app")).unwrap(), b"app metadata");
        drop(store);

        let store = open(root.path());
        assert_eq!(store.status(), GenerationStatus::Reused { entries: 2 });
        assert_eq!(get(&store, &key(":app")).unwrap(), b"app metadata");
        assert_eq!(get(&store, &key(":lib")).unwrap(), b"lib metadata");
        assert!(get(&store, &key(":other")).is_none());
    }

    #[test]
    fn reopened_entries_are_still_write_once() {
        let root = tempfile::tempdir().unwrap();
        put(&open(root.path()), &key(":app"), b"first");

        let store = open(root.path());
        assert!(matches!(
            store.begin_write(&key(":app")),
            Err(StoreError::DuplicateKey(_))
        ));
    }

    #[test]
    fn tool_version_change_discards_generation() {
        let root = tempfile::tempdir().unwrap();
        put(&open(root.path()), &key(":app"), b"old");

        let store =
            FileStateStore::open(root.path(), fingerprint(), "9.0", StoreConfig::default()).unwrap();
        match store.status() {
            GenerationStatus::Discarded { reason } => assert!(reason.contains("tool version")),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(get(&store, &key(":app")).is_none());
    }

    #[test]
    fn format_version_change_discards_generation() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        put(&store, &key(":app"), b"old");
        let mut metadata = GenerationMetadata::load(store.dir()).unwrap();
        metadata.format_version = FORMAT_VERSION + 1;
        metadata.store(store.dir()).unwrap();
        drop(store);

        let store = open(root.path());
        assert!(matches!(store.status(), GenerationStatus::Discarded { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn unreadable_metadata_discards_generation() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(fingerprint().to_hex());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(INDEX_FILE), b"leftover").unwrap();

        let store = open(root.path());
        match store.status() {
            GenerationStatus::Discarded { reason } => assert!(reason.contains("unreadable")),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(store.is_empty());
        put(&store, &key(":app"), b"fresh");
        drop(store);
        assert_eq!(get(&open(root.path()), &key(":app")).unwrap(), b"fresh");
    }

    #[test]
    fn fingerprints_get_separate_generations() {
        let root = tempfile::tempdir().unwrap();
        put(&open(root.path()), &key(":app"), b"one");

        let other = FileStateStore::open(
            root.path(),
            Fingerprint::of(b"different inputs"),
            VERSION,
            StoreConfig::default(),
        )
        .unwrap();
        assert_eq!(other.status(), GenerationStatus::Created);
        assert!(get(&other, &key(":app")).is_none());
        assert!(get(&open(root.path()), &key(":app")).is_some());
    }

    #[test]
    fn write_without_commit_is_absent_after_reopen() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        put(&store, &key(":committed"), b"kept");
        let mut pending = store.begin_write(&key(":pending")).unwrap();
        pending.write(b"never committed");
        drop(store);
        drop(pending);

        let store = open(root.path());
        assert_eq!(store.keys(), vec![key(":committed")]);
    }

    #[test]
    fn crash_between_data_append_and_index_append() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        put(&store, &key(":a"), b"committed");
        let data_path = store.dir().join(DATA_FILE);
        drop(store);

        // A frame that reached the data file without its index record.
        let mut orphan = Encoder::new();
        Frame::encode(&mut orphan, StateType::ProjectMetadata.tag(), b"orphaned payload");
        let mut data = OpenOptions::new().append(true).open(&data_path).unwrap();
        data.write_all(orphan.as_bytes()).unwrap();
        drop(data);

        let store = open(root.path());
        assert_eq!(store.keys(), vec![key(":a")]);
        put(&store, &key(":b"), b"after recovery");
        drop(store);

        let store = open(root.path());
        assert_eq!(get(&store, &key(":a")).unwrap(), b"committed");
        assert_eq!(get(&store, &key(":b")).unwrap(), b"after recovery");
    }

    #[test]
    fn torn_index_tail_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        put(&store, &key(":a"), b"first");
        put(&store, &key(":b"), b"second");
        let index_path = store.dir().join(INDEX_FILE);
        drop(store);

        let len = fs::metadata(&index_path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&index_path)
            .unwrap()
            .set_len(len - 5)
            .unwrap();

        let store = open(root.path());
        assert_eq!(store.status(), GenerationStatus::Reused { entries: 1 });
        assert_eq!(get(&store, &key(":a")).unwrap(), b"first");
        assert!(get(&store, &key(":b")).is_none());
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        put(&store, &key(":app"), b"component metadata payload");
        let data_path = store.dir().join(DATA_FILE);
        drop(store);

        let len = fs::metadata(&data_path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&data_path)
            .unwrap()
            .set_len(len - 3)
            .unwrap();

        let store = open(root.path());
        assert!(store.contains(&key(":app")));
        assert!(matches!(
            store.begin_read(&key(":app")),
            Err(StoreError::CorruptEntry { .. })
        ));
    }

    #[test]
    fn flipped_payload_byte_is_corrupt() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        put(&store, &key(":app"), b"component metadata payload");
        let data_path = store.dir().join(DATA_FILE);

        let mut bytes = fs::read(&data_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(&data_path, &bytes).unwrap();

        let err = store.begin_read(&key(":app")).unwrap_err();
        match err {
            StoreError::CorruptEntry { key: k, reason } => {
                assert_eq!(k, key(":app"));
                assert!(reason.contains("checksum"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn zstd_compression_roundtrip() {
        let root = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            sync_mode: SyncMode::EveryWrite,
            compression: Compression::Zstd { level: 3 },
        };
        let payload = b"repetitive ".repeat(200);
        let store = FileStateStore::open(root.path(), fingerprint(), VERSION, config.clone()).unwrap();
        put(&store, &key(":app"), &payload);
        let data_len = fs::metadata(store.dir().join(DATA_FILE)).unwrap().len();
        assert!(data_len < payload.len() as u64);
        drop(store);

        let store = FileStateStore::open(root.path(), fingerprint(), VERSION, config).unwrap();
        assert_eq!(get(&store, &key(":app")).unwrap(), payload);
    }

    #[test]
    fn discard_starts_empty_generation_on_disk() {
        let root = tempfile::tempdir().unwrap();
        let store = open(root.path());
        put(&store, &key(":old"), b"old");
        let stale = store.begin_write(&key(":stale")).unwrap();

        store.discard_generation().unwrap();
        assert!(store.is_empty());
        match store.status() {
            GenerationStatus::Discarded { reason } => assert!(reason.contains("1 entries dropped")),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(matches!(store.commit(stale), Err(StoreError::StaleWrite(_))));

        put(&store, &key(":old"), b"rewritten");
        put(&store, &key(":new"), b"new");
        drop(store);

        let store = open(root.path());
        assert_eq!(store.status(), GenerationStatus::Reused { entries: 2 });
        assert_eq!(get(&store, &key(":old")).unwrap(), b"rewritten");
    }

    #[test]
    fn concurrent_commits_of_distinct_keys() {
        use std::thread;

        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(open(root.path()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..10 {
                        let k = key(&format!(":p{i}:m{j}"));
                        put(&store, &k, format!("value {i}/{j}").as_bytes());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        drop(store);

        let store = open(root.path());
        assert_eq!(store.len(), 80);
        assert_eq!(get(&store, &key(":p3:m7")).unwrap(), b"value 3/7");
    }
}
