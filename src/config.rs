//! Configuration for diskmap
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{DiskMapError, Result};

/// Main configuration for a diskmap store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all shard files.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── page_000.log
    ///     ├── page_001.log
    ///     └── ... one log per shard ...
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Sharding Configuration
    // -------------------------------------------------------------------------
    /// Number of shards the keyspace is split across.
    ///
    /// Fixed once a data directory has been created: keys are routed by
    /// `hash(key) % shard_count`, so reopening an existing directory with a
    /// different count strands previously written keys in shards the router
    /// no longer selects. Changing this without rebuilding the directory
    /// from scratch is unsupported.
    pub shard_count: usize,

    /// Filename prefix for shard log files ("page" → `page_000.log`).
    pub file_prefix: String,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how eagerly shard logs are fsynced
    pub sync: SyncPolicy,
}

/// Shard log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// fsync after every log mutation (safest, slowest)
    EveryWrite,

    /// fsync only on close; the OS decides when dirty pages reach disk
    OnClose,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./diskmap_data"),
            shard_count: 13,
            file_prefix: "page".to_string(),
            sync: SyncPolicy::EveryWrite,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the configuration is usable before opening a store
    pub(crate) fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(DiskMapError::Config(
                "shard_count must be at least 1".to_string(),
            ));
        }
        if self.file_prefix.is_empty() {
            return Err(DiskMapError::Config(
                "file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all shard files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the shard count (see [`Config::shard_count`] for the caveat on
    /// reopening existing directories)
    pub fn shard_count(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    /// Set the shard filename prefix
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// Set the sync policy
    pub fn sync(mut self, sync: SyncPolicy) -> Self {
        self.config.sync = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
