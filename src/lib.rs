//! # diskmap
//!
//! A sharded, disk-backed key-value map with:
//! - Log-structured shard files addressed by byte offset
//! - Online compaction ("vacuum") that reclaims obsolete records
//! - Per-shard read-write locking — unrelated keys never contend
//! - Pluggable value serialization
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DiskMap<K, V, C>                        │
//! │          (typed facade, compound atomic operations)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Store                                │
//! │          (routes key hash → one of N fixed shards)          │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │    Page     │    │    Page     │    │    Page     │
//! │ (RwLock:    │    │             │    │             │
//! │  index +    │    │     ...     │    │     ...     │
//! │  RecordLog) │    │             │    │             │
//! └──────┬──────┘    └──────┬──────┘    └──────┬──────┘
//!        ▼                  ▼                  ▼
//!   page_000.log       page_001.log       page_00N.log
//! ```
//!
//! Overwrites and removals never rewrite old data in place — the prior
//! record is flagged superseded and its bytes stay on disk until `vacuum`
//! rewrites the shard's log down to the live set.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod log;
pub mod page;
pub mod store;
pub mod map;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DiskMapError, Result};
pub use config::{Config, SyncPolicy};
pub use codec::{BincodeCodec, Codec};
pub use map::DiskMap;
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of diskmap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
