//! Map facade
//!
//! Typed key-value surface over the byte-oriented store. Keys are encoded
//! with bincode (deterministic, so routing and index lookups agree across
//! restarts); values go through the pluggable [`Codec`]. The compound
//! operations run as a single critical section on the owning shard — never
//! under a store-wide lock, which would serialize unrelated shards.

use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{BincodeCodec, Codec};
use crate::config::Config;
use crate::error::{DiskMapError, Result};
use crate::store::Store;

/// A sharded, disk-backed key-value map.
///
/// Cheap point operations, previous-value-preserving writes, and an online
/// `vacuum` that reclaims the space of overwritten and removed entries.
/// Unordered: there is no range or iteration surface.
pub struct DiskMap<K, V, C = BincodeCodec> {
    store: Store,
    codec: C,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> DiskMap<K, V, BincodeCodec>
where
    K: Serialize,
    V: Serialize + DeserializeOwned,
{
    /// Open a map in `data_dir` with default configuration and codec
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(Config::builder().data_dir(data_dir).build())
    }

    /// Open a map with the given configuration and the default codec
    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_codec(config, BincodeCodec)
    }
}

impl<K, V, C> DiskMap<K, V, C>
where
    K: Serialize,
    C: Codec<V>,
{
    /// Open a map with a caller-supplied value codec
    pub fn with_codec(config: Config, codec: C) -> Result<Self> {
        Ok(Self {
            store: Store::open(config)?,
            codec,
            _types: PhantomData,
        })
    }

    fn encode_key(&self, key: &K) -> Result<Vec<u8>> {
        bincode::serialize(key).map_err(|e| DiskMapError::Serialization(e.to_string()))
    }

    fn decode_value(&self, bytes: Option<Vec<u8>>) -> Result<Option<V>> {
        match bytes {
            Some(bytes) => Ok(Some(self.codec.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite, returning the previous value if any
    pub fn insert(&self, key: &K, value: &V) -> Result<Option<V>> {
        let key = self.encode_key(key)?;
        let value = self.codec.serialize(value)?;
        let previous = self.store.save(&key, &value)?;
        self.decode_value(previous)
    }

    /// Read the value for `key`; an absent key is `Ok(None)`, not an error
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let key = self.encode_key(key)?;
        let bytes = self.store.get(&key)?;
        self.decode_value(bytes)
    }

    /// Remove `key`, returning the previous value if any
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        let key = self.encode_key(key)?;
        let previous = self.store.remove(&key)?;
        self.decode_value(previous)
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        let key = self.encode_key(key)?;
        Ok(self.store.get(&key)?.is_some())
    }

    /// Number of live keys across all shards
    pub fn len(&self) -> Result<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.store.is_empty()
    }

    /// Total bytes on disk, obsolete records included until vacuum
    pub fn size_on_disk(&self) -> Result<u64> {
        self.store.size_on_disk()
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    /// Compact every shard, reclaiming the space of overwritten and
    /// removed entries
    pub fn vacuum(&self) -> Result<()> {
        self.store.vacuum_all()
    }

    /// Close the map; any further operation fails `Closed`
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }

    // =========================================================================
    // Compound atomic operations
    // =========================================================================

    /// Insert only if `key` is absent; returns the existing value when one
    /// was already present
    pub fn insert_absent(&self, key: &K, value: &V) -> Result<Option<V>> {
        let key = self.encode_key(key)?;
        let value = self.codec.serialize(value)?;
        let existing = self.store.save_absent(&key, &value)?;
        self.decode_value(existing)
    }

    /// Overwrite only if `key` is present, returning the previous value
    pub fn replace(&self, key: &K, value: &V) -> Result<Option<V>> {
        let key = self.encode_key(key)?;
        let value = self.codec.serialize(value)?;
        let previous = self.store.replace(&key, &value)?;
        self.decode_value(previous)
    }

    /// Overwrite only if the current value equals `expected` (compared by
    /// encoded form)
    pub fn replace_if(&self, key: &K, expected: &V, value: &V) -> Result<bool> {
        let key = self.encode_key(key)?;
        let expected = self.codec.serialize(expected)?;
        let value = self.codec.serialize(value)?;
        self.store.replace_if(&key, &expected, &value)
    }

    /// Remove only if the current value equals `expected` (compared by
    /// encoded form)
    pub fn remove_if(&self, key: &K, expected: &V) -> Result<bool> {
        let key = self.encode_key(key)?;
        let expected = self.codec.serialize(expected)?;
        self.store.remove_if(&key, &expected)
    }
}
