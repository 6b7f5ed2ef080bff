//! Error types for diskmap
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using DiskMapError
pub type Result<T> = std::result::Result<T, DiskMapError>;

/// Unified error type for diskmap operations
#[derive(Debug, Error)]
pub enum DiskMapError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    /// On-disk bytes could not be decoded into a record or value.
    #[error("corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    /// A value could not be encoded for storage.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    /// Operation attempted on a shard or store after `close()`.
    #[error("store is closed")]
    Closed,

    /// Compaction aborted; the original log is untouched and the caller
    /// may retry.
    #[error("vacuum aborted: {0}")]
    Vacuum(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Aggregate Errors
    // -------------------------------------------------------------------------
    /// A whole-store operation failed on one shard. Carries the first
    /// failure; remaining shards were still attempted.
    #[error("shard {index}: {source}")]
    Shard {
        index: usize,
        source: Box<DiskMapError>,
    },
}
