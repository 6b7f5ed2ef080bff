//! Record Log Module
//!
//! Append-oriented, offset-addressed record storage for one shard.
//!
//! ## Responsibilities
//! - Durable appends returning the record's byte offset (its Location)
//! - Point reads by offset with CRC32 validation
//! - In-place same-size rewrites (liveness flips)
//! - Compaction: rewrite the log through a filter, swapped in atomically
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                   │
//! │   Magic: "DMLG" (4) | Version: u16 (2) | Rsvd (2)  │
//! ├────────────────────────────────────────────────────┤
//! │ Record                                             │
//! │ ┌────────┬────────┬─────────┬───────┬─────┬──────┐ │
//! │ │KeyLen 4│ValLen 4│ State 1 │ CRC 4 │ Key │Value │ │
//! │ └────────┴────────┴─────────┴───────┴─────┴──────┘ │
//! │ ... repeated, each addressed by its start offset   │
//! └────────────────────────────────────────────────────┘
//! ```
//! The CRC covers key and value only, so a liveness flip is a one-byte
//! in-place write that cannot invalidate the checksum.

mod file;
mod record;

pub use file::{RecordFilter, RecordLog};
pub use record::{Location, Record, RecordState};

// =============================================================================
// Shared Constants (used by the log file and record codec)
// =============================================================================

/// Magic bytes identifying a diskmap shard log
pub(crate) const MAGIC: &[u8; 4] = b"DMLG";

/// Current log format version
pub(crate) const VERSION: u16 = 1;

/// File header size: Magic (4) + Version (2) + Reserved (2) = 8 bytes
pub(crate) const HEADER_SIZE: u64 = 8;

/// Record envelope header: KeyLen (4) + ValLen (4) + State (1) + CRC (4)
pub(crate) const RECORD_HEADER_SIZE: u64 = 13;

/// Byte offset of the state flag within a record envelope
pub(crate) const STATE_OFFSET: u64 = 8;
