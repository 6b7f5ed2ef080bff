//! Record envelope
//!
//! The on-disk unit of one key/value pair at one point in time. Records are
//! immutable once written apart from their liveness flag; a logical update
//! appends a fresh record and the old one is flipped to superseded.

use crate::error::{DiskMapError, Result};

use super::RECORD_HEADER_SIZE;

/// Byte offset identifying a record within a shard's log
pub type Location = u64;

/// Liveness of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Current value for its key (unless a later live record replaces it)
    Live = 0,

    /// Overwritten or removed; reclaimed by the next vacuum
    Superseded = 1,
}

impl RecordState {
    pub(crate) fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(RecordState::Live),
            1 => Ok(RecordState::Superseded),
            other => Err(DiskMapError::Corruption(format!(
                "invalid record state byte: {}",
                other
            ))),
        }
    }
}

/// One key/value pair as stored in a shard log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Serialized key bytes
    pub key: Vec<u8>,

    /// Serialized value bytes
    pub value: Vec<u8>,

    /// Liveness flag
    pub state: RecordState,
}

impl Record {
    /// Create a live record
    pub fn live(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
            state: RecordState::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state == RecordState::Live
    }

    /// Size of the full envelope (header + key + value) on disk
    pub fn encoded_len(&self) -> u64 {
        RECORD_HEADER_SIZE + self.key.len() as u64 + self.value.len() as u64
    }

    /// Encode the envelope: [key_len][val_len][state][crc][key][value]
    ///
    /// The CRC covers key and value; the state byte stays outside it so a
    /// liveness flip never touches the checksum.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.push(self.state as u8);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.key);
        hasher.update(&self.value);
        buf.extend_from_slice(&hasher.finalize().to_le_bytes());

        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        buf
    }
}
