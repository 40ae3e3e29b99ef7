//! Thread-safe dictionary handle.
//!
//! Writers (insert, remove, rebuilds) take the write lock; lookups and
//! prefix searches share the read lock, so pruning never races a walk.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::config::{DictConfig, LookupFilter};
use super::dictionary::{InsertOutcome, Lookup, OwnedDictionary, Result};
use super::metrics::MetricsSnapshot;
use crate::filter::{KeccakHasher, KeyHasher};

/// Prefix matches copied out from under the lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopiedMatches {
    /// Matching keys in lexicographic order.
    pub keys: Vec<Vec<u8>>,
    /// True if more keys matched than were collected.
    pub truncated: bool,
}

/// A cloneable, lock-protected owned-mode dictionary.
#[derive(Debug)]
pub struct SharedDictionary<H = KeccakHasher> {
    inner: Arc<RwLock<OwnedDictionary<H>>>,
}

impl<H> Clone for SharedDictionary<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedDictionary {
    /// Creates a shared dictionary with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(DictConfig::default())
    }

    /// Creates a shared dictionary with `config`.
    pub fn with_config(config: DictConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, KeccakHasher)
    }
}

impl<H: KeyHasher + Clone> SharedDictionary<H> {
    /// Creates a shared dictionary whose filters hash with `hasher`.
    pub fn with_config_and_hasher(config: DictConfig, hasher: H) -> Result<Self> {
        Ok(Self::from_dictionary(OwnedDictionary::with_config_and_hasher(
            config, hasher,
        )?))
    }

    /// Wraps an existing dictionary.
    pub fn from_dictionary(dict: OwnedDictionary<H>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(dict)),
        }
    }

    /// Inserts a copy of `key`.
    pub fn insert(&self, key: &[u8]) -> Result<InsertOutcome> {
        self.inner.write().insert(key)
    }

    /// Inserts every key under one write lock, returning how many were new.
    pub fn load<I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.inner.write().load(keys)
    }

    /// Removes `key`.
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        self.inner.write().remove(key)
    }

    /// Looks `key` up through the configured filter.
    pub fn lookup(&self, key: &[u8]) -> Result<Lookup> {
        self.inner.read().lookup(key)
    }

    /// Looks `key` up through `filter`.
    pub fn lookup_via(&self, key: &[u8], filter: LookupFilter) -> Result<Lookup> {
        self.inner.read().lookup_via(key, filter)
    }

    /// Returns true if `key` is stored.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.inner.read().contains(key)
    }

    /// Collects up to `capacity` keys starting with `prefix`.
    pub fn search_prefix(&self, prefix: &[u8], capacity: usize) -> Result<CopiedMatches> {
        let dict = self.inner.read();
        let matches = dict.search_prefix(prefix, capacity)?;
        Ok(CopiedMatches {
            keys: matches.iter().map(<[u8]>::to_vec).collect(),
            truncated: matches.is_truncated(),
        })
    }

    /// Rebuilds the static filter from the current key set.
    pub fn rebuild_static_filter(&self) -> Result<()>
    where
        H: Sync,
    {
        self.inner.write().rebuild_static_filter()
    }

    /// Rebuilds the Bloom filter from the current key set.
    pub fn rebuild_bloom(&self) {
        self.inner.write().rebuild_bloom();
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns a snapshot of the routing metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.read().metrics()
    }

    /// Locks the dictionary for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, OwnedDictionary<H>> {
        self.inner.read()
    }

    /// Locks the dictionary for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, OwnedDictionary<H>> {
        self.inner.write()
    }

    /// Releases the dictionary if this is the last handle, otherwise hands
    /// the handle back.
    pub fn release_all(self) -> std::result::Result<(), Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(lock) => {
                lock.into_inner().release_all();
                Ok(())
            }
            Err(inner) => Err(Self { inner }),
        }
    }
}
