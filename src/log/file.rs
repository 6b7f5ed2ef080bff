//! Record log file
//!
//! One shard's physical storage: a single append-oriented file of record
//! envelopes addressed by byte offset. All methods take `&self`; the file
//! handle lives behind a mutex so readers holding a shard's shared lock can
//! still seek. `None` in the handle slot means the log has been closed.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::SyncPolicy;
use crate::error::{DiskMapError, Result};

use super::record::{Location, Record, RecordState};
use super::{HEADER_SIZE, MAGIC, RECORD_HEADER_SIZE, STATE_OFFSET, VERSION};

/// Extension of the temporary file a compaction rewrites into
const COMPACT_EXT: &str = "compact";

/// Decides the fate of each record during compaction.
///
/// `accept` is asked once per record in log order; accepted records are
/// copied into the replacement log and reported through `relocate` with
/// their new offset before the replacement becomes visible. If the
/// compaction fails, every reported relocation is void — callers must not
/// apply relocations until `vacuum` has returned success.
pub trait RecordFilter {
    /// Keep the record at `location`?
    fn accept(&mut self, record: &Record, location: Location) -> bool;

    /// An accepted record was copied from `from` to `to` in the
    /// replacement log.
    fn relocate(&mut self, record: &Record, from: Location, to: Location);
}

/// Offset-addressed record storage for one shard
pub struct RecordLog {
    path: PathBuf,
    sync: SyncPolicy,
    /// Open handle; `None` once closed
    file: Mutex<Option<File>>,
}

impl RecordLog {
    /// Open or create a log file.
    ///
    /// A fresh file gets the format header; an existing file has its header
    /// validated. Record contents are not verified here — point reads and
    /// scans check CRCs as they go.
    pub fn open(path: impl Into<PathBuf>, sync: SyncPolicy) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if file.metadata()?.len() == 0 {
            write_header(&mut file)?;
            if sync == SyncPolicy::EveryWrite {
                file.sync_data()?;
            }
        } else {
            validate_header(&mut file)?;
        }

        Ok(Self {
            path,
            sync,
            file: Mutex::new(Some(file)),
        })
    }

    /// Run `op` against the open file handle, or fail `Closed`
    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> Result<T>) -> Result<T> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(DiskMapError::Closed)?;
        op(file)
    }

    fn sync_if_eager(&self, file: &mut File) -> Result<()> {
        if self.sync == SyncPolicy::EveryWrite {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Append a record to the end of the log, returning its location
    pub fn append(&self, record: &Record) -> Result<Location> {
        let buf = record.encode();
        self.with_file(|file| {
            let location = file.seek(SeekFrom::End(0))?;
            file.write_all(&buf)?;
            self.sync_if_eager(file)?;
            Ok(location)
        })
    }

    /// Read and validate the record at `location`
    pub fn read_at(&self, location: Location) -> Result<Record> {
        self.with_file(|file| read_record(file, location))
    }

    /// Rewrite the record at `location` in place.
    ///
    /// Only legal when the new envelope is exactly the size of the one
    /// already stored there; anything larger must be appended as a fresh
    /// record instead.
    pub fn update_at(&self, location: Location, record: &Record) -> Result<()> {
        self.with_file(|file| {
            let (key_len, val_len, _, _) = read_envelope_header(file, location)?;
            let existing = RECORD_HEADER_SIZE + key_len as u64 + val_len as u64;
            if record.encoded_len() != existing {
                return Err(DiskMapError::Corruption(format!(
                    "in-place update at offset {} needs {} bytes but record occupies {}",
                    location,
                    record.encoded_len(),
                    existing
                )));
            }
            file.seek(SeekFrom::Start(location))?;
            file.write_all(&record.encode())?;
            self.sync_if_eager(file)
        })
    }

    /// Flip the record at `location` to superseded.
    ///
    /// A one-byte write; the CRC does not cover the state flag.
    pub fn supersede(&self, location: Location) -> Result<()> {
        self.with_file(|file| {
            read_envelope_header(file, location)?;
            file.seek(SeekFrom::Start(location + STATE_OFFSET))?;
            file.write_all(&[RecordState::Superseded as u8])?;
            self.sync_if_eager(file)
        })
    }

    /// Total size of the underlying file in bytes
    pub fn size(&self) -> Result<u64> {
        self.with_file(|file| Ok(file.metadata()?.len()))
    }

    /// Discard all records, returning the log to empty
    pub fn clear(&self) -> Result<()> {
        self.with_file(|file| {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            write_header(file)?;
            self.sync_if_eager(file)
        })
    }

    /// Close the log. Idempotent; later operations fail `Closed`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.file.lock();
        if let Some(file) = guard.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Walk every record in log order
    pub fn scan<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(Location, Record) -> Result<()>,
    {
        self.with_file(|file| {
            let end = file.metadata()?.len();
            let mut offset = HEADER_SIZE;
            while offset < end {
                let record = read_record(file, offset)?;
                let next = offset + record.encoded_len();
                visit(offset, record)?;
                offset = next;
            }
            Ok(())
        })
    }

    /// Compact the log through `filter`.
    ///
    /// Surviving records are copied in order into a freshly written file,
    /// which is renamed over the original only after it is fully flushed —
    /// the rename is the sole crash-consistency boundary, so a consumer
    /// observes either the complete old log or the complete new one. On any
    /// failure the original log stays authoritative and the temp file is
    /// removed.
    pub fn vacuum<F: RecordFilter>(&self, filter: &mut F) -> Result<()> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(DiskMapError::Closed)?;

        let tmp_path = self.path.with_extension(COMPACT_EXT);
        if let Err(e) = rewrite_into(file, &tmp_path, filter) {
            let _ = fs::remove_file(&tmp_path);
            return Err(DiskMapError::Vacuum(e.to_string()));
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(DiskMapError::Vacuum(e.to_string()));
        }

        // The old handle now points at the unlinked pre-compaction inode;
        // swap in a handle on the renamed file. If the reopen fails the old
        // handle stays in place, which still reads consistent pre-compaction
        // data for the rest of this process lifetime.
        match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(new_file) => {
                *guard = Some(new_file);
                debug!(path = %self.path.display(), "log compacted");
                Ok(())
            }
            Err(e) => Err(DiskMapError::Vacuum(format!(
                "compacted log could not be reopened: {}",
                e
            ))),
        }
    }
}

// =============================================================================
// File-level helpers
// =============================================================================

fn write_header(file: &mut File) -> Result<()> {
    file.write_all(MAGIC)?;
    file.write_all(&VERSION.to_le_bytes())?;
    file.write_all(&[0u8; 2])?; // Reserved
    Ok(())
}

fn validate_header(file: &mut File) -> Result<()> {
    let len = file.metadata()?.len();
    if len < HEADER_SIZE {
        return Err(DiskMapError::Corruption(format!(
            "log file truncated below header size ({} bytes)",
            len
        )));
    }

    let mut header = [0u8; HEADER_SIZE as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut header)?;

    if &header[0..4] != MAGIC {
        return Err(DiskMapError::Corruption(format!(
            "invalid log magic: expected DMLG, got {:?}",
            &header[0..4]
        )));
    }

    let version = u16::from_le_bytes(header[4..6].try_into().unwrap());
    if version != VERSION {
        return Err(DiskMapError::Corruption(format!(
            "unsupported log version: {}",
            version
        )));
    }

    Ok(())
}

/// Read and bounds-check a record envelope header: (key_len, val_len, state, crc)
fn read_envelope_header(file: &mut File, location: Location) -> Result<(u32, u32, u8, u32)> {
    let end = file.metadata()?.len();
    if location < HEADER_SIZE || location + RECORD_HEADER_SIZE > end {
        return Err(DiskMapError::Corruption(format!(
            "record offset {} out of bounds (log size {})",
            location, end
        )));
    }

    let mut header = [0u8; RECORD_HEADER_SIZE as usize];
    file.seek(SeekFrom::Start(location))?;
    file.read_exact(&mut header)?;

    let key_len = u32::from_le_bytes(header[0..4].try_into().unwrap());
    let val_len = u32::from_le_bytes(header[4..8].try_into().unwrap());
    let state = header[8];
    let crc = u32::from_le_bytes(header[9..13].try_into().unwrap());

    if location + RECORD_HEADER_SIZE + key_len as u64 + val_len as u64 > end {
        return Err(DiskMapError::Corruption(format!(
            "record at offset {} extends past end of log",
            location
        )));
    }

    Ok((key_len, val_len, state, crc))
}

fn read_record(file: &mut File, location: Location) -> Result<Record> {
    let (key_len, val_len, state_byte, stored_crc) = read_envelope_header(file, location)?;
    let state = RecordState::from_byte(state_byte)?;

    let mut key = vec![0u8; key_len as usize];
    file.read_exact(&mut key)?;
    let mut value = vec![0u8; val_len as usize];
    file.read_exact(&mut value)?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&key);
    hasher.update(&value);
    let actual_crc = hasher.finalize();
    if actual_crc != stored_crc {
        return Err(DiskMapError::Corruption(format!(
            "CRC mismatch at offset {}: stored {:#010x}, computed {:#010x}",
            location, stored_crc, actual_crc
        )));
    }

    Ok(Record { key, value, state })
}

/// Copy surviving records into a fresh file at `tmp_path`, fully flushed
fn rewrite_into<F: RecordFilter>(file: &mut File, tmp_path: &Path, filter: &mut F) -> Result<()> {
    let tmp = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp_path)?;
    let mut writer = BufWriter::new(tmp);

    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&[0u8; 2])?;

    let end = file.metadata()?.len();
    let mut offset = HEADER_SIZE;
    let mut out_offset = HEADER_SIZE;
    while offset < end {
        let record = read_record(file, offset)?;
        let next = offset + record.encoded_len();
        if filter.accept(&record, offset) {
            writer.write_all(&record.encode())?;
            filter.relocate(&record, offset, out_offset);
            out_offset += record.encoded_len();
        }
        offset = next;
    }

    writer.flush()?;
    let tmp = writer
        .into_inner()
        .map_err(|e| DiskMapError::Io(e.into_error()))?;
    tmp.sync_all()?;
    Ok(())
}
