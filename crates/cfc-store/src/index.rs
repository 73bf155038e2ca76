//! The commit log of a generation.
//!
//! Every committed entry has one record in `index.log`. A key exists in the
//! generation exactly when its record was appended completely, which makes
//! appending the record the commit point.
//!
//! On-disk format, repeated:
//! ```text
//! [4 bytes: record length (little-endian u32)]
//! [4 bytes: CRC32 of record (little-endian u32)]
//! [N bytes: record (bincode-serialized IndexRecord)]
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use cfc_types::StoreKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};

pub(crate) const INDEX_FILE: &str = "index.log";

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// Location and checksum of one committed entry in `entries.bin`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: StoreKey,
    /// Offset of the entry frame in the data file.
    pub offset: u64,
    /// Length of the whole frame.
    pub length: u64,
    /// CRC32 of the stored payload.
    pub crc: u32,
    /// Whether the stored payload is zstd-compressed.
    pub compressed: bool,
}

impl IndexRecord {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Append-only writer for `index.log`.
pub(crate) struct IndexLog {
    path: PathBuf,
    writer: BufWriter<File>,
    len: u64,
}

impl IndexLog {
    /// Open the log in `dir`, recovering every complete record.
    ///
    /// Recovery reads front to back and stops at the first record that is
    /// incomplete or fails its checksum: such a tail is a commit that never
    /// finished. The tail is cut off so later appends follow the last good
    /// record.
    pub(crate) fn open(dir: &Path) -> StoreResult<(Self, Vec<IndexRecord>)> {
        let path = dir.join(INDEX_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let file_len = file.metadata()?.len();
        let (records, valid_len) = recover(&path, file_len)?;

        if valid_len < file_len {
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                "discarding torn tail of index log"
            );
            file.set_len(valid_len)?;
        }

        debug!(records = records.len(), "index log recovered");
        Ok((
            Self {
                path,
                writer: BufWriter::new(file),
                len: valid_len,
            },
            records,
        ))
    }

    /// Append one record; once this returns the record survives a reopen.
    pub(crate) fn append(&mut self, record: &IndexRecord, sync: SyncMode) -> StoreResult<()> {
        let payload =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("index record too large".to_string()))?;
        let crc = crc32fast::hash(&payload);

        self.writer.write_all(&length.to_le_bytes())?;
        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.write_all(&payload)?;
        self.writer.flush()?;
        if sync == SyncMode::EveryWrite {
            self.writer.get_ref().sync_all()?;
        }

        self.len += HEADER_SIZE + payload.len() as u64;
        debug!(
            path = %self.path.display(),
            key = %record.key,
            offset = record.offset,
            log_len = self.len,
            "index record appended"
        );
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

fn recover(path: &Path, file_len: u64) -> StoreResult<(Vec<IndexRecord>, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut offset = 0u64;

    while offset + HEADER_SIZE <= file_len {
        let mut header = [0u8; HEADER_SIZE as usize];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + HEADER_SIZE + u64::from(length) > file_len {
            warn!(offset, length, file_len, "incomplete index record; stopping recovery");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload)?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "index record checksum mismatch; stopping recovery"
            );
            break;
        }

        match bincode::deserialize::<IndexRecord>(&payload) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(offset, error = %e, "undecodable index record; stopping recovery");
                break;
            }
        }
        offset += HEADER_SIZE + u64::from(length);
    }

    Ok((records, offset))
}
