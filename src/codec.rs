//! Value codec
//!
//! Pluggable conversion between domain values and the opaque byte buffers
//! stored in shard logs. The default codec uses bincode; callers with their
//! own wire format supply an implementation at map construction.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DiskMapError, Result};

/// Converts values to and from stored bytes.
///
/// Implementations must be deterministic: the compound map operations
/// (`replace_if`, `remove_if`) compare values by their encoded form.
pub trait Codec<T> {
    /// Encode a value for storage. Failure surfaces as
    /// [`DiskMapError::Serialization`].
    fn serialize(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode stored bytes back into a value. Malformed or
    /// codec-mismatched bytes surface as [`DiskMapError::Corruption`];
    /// a default value is never substituted.
    fn deserialize(&self, bytes: &[u8]) -> Result<T>;
}

/// Default codec: compact binary encoding via bincode
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl<T> Codec<T> for BincodeCodec
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| DiskMapError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes)
            .map_err(|e| DiskMapError::Corruption(format!("value decode failed: {}", e)))
    }
}
