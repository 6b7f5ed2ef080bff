//! Page (shard)
//!
//! One independently-locked partition of the keyspace: a record log plus an
//! in-memory index mapping serialized key bytes to the offset of the current
//! live record. The log and index move in lockstep — every mutation that
//! moves or invalidates an offset updates the index before the mutation is
//! visible to readers.
//!
//! ## Concurrency
//! One `RwLock` guards the (log, index) pair. Point reads take it shared;
//! `save`/`remove`/`vacuum` and the compound check-then-act operations take
//! it exclusive for their full duration, so a vacuum can never race with
//! relocation bookkeeping and a compound operation is a single critical
//! section on its shard.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::config::SyncPolicy;
use crate::error::{DiskMapError, Result};
use crate::log::{Location, Record, RecordFilter, RecordLog};

/// One shard: a record log and the index over its live records
pub struct Page {
    inner: RwLock<PageInner>,
}

impl Page {
    /// Open a shard, rebuilding its index from the log.
    ///
    /// The log is scanned in order: a live record (re)indexes its key, so a
    /// later record for the same key wins; superseded records are skipped.
    /// This is what makes a removed key stay removed across restarts — its
    /// last record carries the superseded flag and indexes nothing.
    pub fn open(path: impl Into<PathBuf>, sync: SyncPolicy) -> Result<Self> {
        let log = RecordLog::open(path, sync)?;

        let mut index = HashMap::new();
        log.scan(|location, record| {
            if record.is_live() {
                index.insert(record.key, location);
            }
            Ok(())
        })?;
        debug!(keys = index.len(), "page opened");

        Ok(Self {
            inner: RwLock::new(PageInner {
                log,
                index,
                closed: false,
            }),
        })
    }

    /// Write a value for `key`, returning the previous value if any.
    ///
    /// The new record is appended first; only once the append has fully
    /// succeeded is the prior record flipped to superseded and the index
    /// repointed, so a failed write never leaves the index at a
    /// nonexistent offset.
    pub fn save(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.save(key, value)
    }

    /// Read the value for `key`. The index is authoritative for existence:
    /// a key not in the index never touches the log.
    pub fn load(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner.load(key)
    }

    /// Remove `key`, returning the previous value if any. An absent key is
    /// not an error and performs no log mutation.
    pub fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.remove(key)
    }

    /// Number of live keys (not physical records)
    pub fn key_count(&self) -> Result<usize> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(inner.index.len())
    }

    /// Bytes on disk, obsolete records included until the next vacuum
    pub fn size(&self) -> Result<u64> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner.log.size()
    }

    /// Discard all records and index entries
    pub fn clear(&self) -> Result<()> {
        self.inner.write().clear()
    }

    /// Compact the log down to the live set, holding the exclusive lock for
    /// the full run
    pub fn vacuum(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.vacuum()
    }

    /// Close the shard. Idempotent; later operations fail `Closed`.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.close()
    }

    // =========================================================================
    // Compound operations — one exclusive-lock acquisition each
    // =========================================================================

    /// Insert only if `key` is absent. Returns the existing value when
    /// present (and writes nothing), `None` when the insert happened.
    pub fn save_absent(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        match inner.load(key)? {
            Some(existing) => Ok(Some(existing)),
            None => {
                inner.save(key, value)?;
                Ok(None)
            }
        }
    }

    /// Overwrite only if `key` is present, returning the previous value
    pub fn replace(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        if inner.index.contains_key(key) {
            inner.save(key, value)
        } else {
            Ok(None)
        }
    }

    /// Overwrite only if the current value equals `expected`
    pub fn replace_if(&self, key: &[u8], expected: &[u8], value: &[u8]) -> Result<bool> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        match inner.load(key)? {
            Some(current) if current == expected => {
                inner.save(key, value)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Remove only if the current value equals `expected`
    pub fn remove_if(&self, key: &[u8], expected: &[u8]) -> Result<bool> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        match inner.load(key)? {
            Some(current) if current == expected => {
                inner.remove(key)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Take this shard's exclusive guard. Whole-store operations collect
    /// every shard's guard in ascending shard order before mutating any.
    pub(crate) fn lock_exclusive(&self) -> RwLockWriteGuard<'_, PageInner> {
        self.inner.write()
    }
}

/// The (log, index) pair a page's lock protects
pub(crate) struct PageInner {
    log: RecordLog,
    index: HashMap<Vec<u8>, Location>,
    closed: bool,
}

impl PageInner {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(DiskMapError::Closed)
        } else {
            Ok(())
        }
    }

    fn save(&mut self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let previous = match self.index.get(key) {
            Some(&location) => Some((location, self.log.read_at(location)?.value)),
            None => None,
        };

        let record = Record::live(key.to_vec(), value.to_vec());
        let location = self.log.append(&record)?;
        if let Some((old_location, _)) = previous {
            self.log.supersede(old_location)?;
        }
        self.index.insert(key.to_vec(), location);

        Ok(previous.map(|(_, value)| value))
    }

    fn load(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.index.get(key) {
            None => Ok(None),
            Some(&location) => Ok(Some(self.log.read_at(location)?.value)),
        }
    }

    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(&location) = self.index.get(key) else {
            return Ok(None);
        };
        let value = self.log.read_at(location)?.value;
        self.log.supersede(location)?;
        self.index.remove(key);
        Ok(Some(value))
    }

    pub(crate) fn clear(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.log.clear()?;
        self.index.clear();
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.log.close()?;
        self.closed = true;
        Ok(())
    }

    fn vacuum(&mut self) -> Result<()> {
        // Relocations are buffered and applied only after the swap has
        // succeeded: a failed vacuum leaves both the log and the index
        // exactly as they were.
        let moves = {
            let mut filter = LiveSetFilter {
                index: &self.index,
                moves: Vec::new(),
            };
            self.log.vacuum(&mut filter)?;
            filter.moves
        };
        for (key, location) in moves {
            self.index.insert(key, location);
        }
        Ok(())
    }
}

/// Keeps exactly the records the index currently points at
struct LiveSetFilter<'a> {
    index: &'a HashMap<Vec<u8>, Location>,
    moves: Vec<(Vec<u8>, Location)>,
}

impl RecordFilter for LiveSetFilter<'_> {
    fn accept(&mut self, record: &Record, location: Location) -> bool {
        self.index
            .get(&record.key)
            .map_or(false, |&current| current == location)
    }

    fn relocate(&mut self, record: &Record, _from: Location, to: Location) {
        self.moves.push((record.key.clone(), to));
    }
}
