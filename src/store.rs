//! Store (shard router)
//!
//! Owns a fixed collection of pages and routes every key to exactly one of
//! them by a stable hash, so unrelated keys never contend. Whole-store
//! operations aggregate across shards; `clear` and `close` take every
//! shard's exclusive lock in ascending order before mutating any.
//!
//! ## Layout on disk
//! One log file per shard under the data directory, named by shard index
//! (`page_000.log`, `page_001.log`, ...). Shard count and routing are
//! supplied by configuration at open time; reopening an existing directory
//! with a different shard count is unsupported (see [`Config::shard_count`]).

use std::fs;
use std::hash::Hasher;
use std::time::Instant;

use fnv::FnvHasher;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{DiskMapError, Result};
use crate::page::Page;

/// Routes keys across a fixed set of independently-locked pages
pub struct Store {
    pages: Vec<Page>,
}

impl Store {
    /// Open or create a store in the configured data directory.
    ///
    /// All shards are opened eagerly; each rebuilds its index from its log
    /// file, so an existing directory comes back with its full contents.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let mut pages = Vec::with_capacity(config.shard_count);
        for shard in 0..config.shard_count {
            let path = config
                .data_dir
                .join(format!("{}_{:03}.log", config.file_prefix, shard));
            pages.push(Page::open(path, config.sync)?);
        }

        info!(
            shards = config.shard_count,
            dir = %config.data_dir.display(),
            "store opened"
        );
        Ok(Self { pages })
    }

    /// The page owning `key`.
    ///
    /// FNV-1a over the serialized key bytes: keyless, well-mixed, and
    /// stable across processes — the same key must find the same shard
    /// file after a reopen. The unsigned modulo can never go negative.
    pub(crate) fn page_of(&self, key: &[u8]) -> &Page {
        let mut hasher = FnvHasher::default();
        hasher.write(key);
        let shard = (hasher.finish() % self.pages.len() as u64) as usize;
        &self.pages[shard]
    }

    /// Write a value, returning the previous one if any
    pub fn save(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        self.page_of(key).save(key, value)
    }

    /// Read the value for `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.page_of(key).load(key)
    }

    /// Remove `key`, returning the previous value if any
    pub fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.page_of(key).remove(key)
    }

    /// Number of live keys, summed over every shard
    pub fn len(&self) -> Result<usize> {
        let mut total = 0;
        for page in &self.pages {
            total += page.key_count()?;
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Total bytes on disk across every shard, obsolete records included
    pub fn size_on_disk(&self) -> Result<u64> {
        let mut total = 0;
        for page in &self.pages {
            total += page.size()?;
        }
        Ok(total)
    }

    /// Number of shards the keyspace is split across
    pub fn shard_count(&self) -> usize {
        self.pages.len()
    }

    /// Clear every shard.
    ///
    /// All shard locks are taken in ascending order first, so the store is
    /// never observable half-cleared. Best-effort: every shard is cleared
    /// even if one fails; the first failure is returned.
    pub fn clear(&self) -> Result<()> {
        let mut guards: Vec<_> = self.pages.iter().map(|p| p.lock_exclusive()).collect();

        let mut first_failure = None;
        for (shard, guard) in guards.iter_mut().enumerate() {
            if let Err(e) = guard.clear() {
                warn!(shard, error = %e, "clear failed");
                if first_failure.is_none() {
                    first_failure = Some((shard, e));
                }
            }
        }

        match first_failure {
            None => Ok(()),
            Some((index, source)) => Err(DiskMapError::Shard {
                index,
                source: Box::new(source),
            }),
        }
    }

    /// Compact every shard, one at a time.
    ///
    /// Sequential on purpose: compaction is maintenance, not a request
    /// path, and one shard's rewrite should not contend for disk bandwidth
    /// with another's.
    pub fn vacuum_all(&self) -> Result<()> {
        info!(shards = self.pages.len(), "starting vacuum");
        let started = Instant::now();

        for (shard, page) in self.pages.iter().enumerate() {
            let shard_started = Instant::now();
            page.vacuum().map_err(|e| DiskMapError::Shard {
                index: shard,
                source: Box::new(e),
            })?;
            debug!(
                shard,
                elapsed_ms = shard_started.elapsed().as_millis() as u64,
                "shard vacuumed"
            );
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vacuum complete"
        );
        Ok(())
    }

    /// Close every shard. Idempotent.
    ///
    /// Every shard is closed even if one fails; failures are logged and the
    /// first is returned, so a single broken shard cannot keep the rest
    /// from releasing their files.
    pub fn close(&self) -> Result<()> {
        let mut guards: Vec<_> = self.pages.iter().map(|p| p.lock_exclusive()).collect();

        let mut first_failure = None;
        for (shard, guard) in guards.iter_mut().enumerate() {
            if let Err(e) = guard.close() {
                warn!(shard, error = %e, "close failed");
                if first_failure.is_none() {
                    first_failure = Some((shard, e));
                }
            }
        }

        match first_failure {
            None => Ok(()),
            Some((index, source)) => Err(DiskMapError::Shard {
                index,
                source: Box::new(source),
            }),
        }
    }

    // =========================================================================
    // Compound operations — routed, single shard-lock acquisition each
    // =========================================================================

    pub fn save_absent(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        self.page_of(key).save_absent(key, value)
    }

    pub fn replace(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        self.page_of(key).replace(key, value)
    }

    pub fn replace_if(&self, key: &[u8], expected: &[u8], value: &[u8]) -> Result<bool> {
        self.page_of(key).replace_if(key, expected, value)
    }

    pub fn remove_if(&self, key: &[u8], expected: &[u8]) -> Result<bool> {
        self.page_of(key).remove_if(key, expected)
    }
}
