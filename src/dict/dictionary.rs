//! The dictionary: a ternary search tree fronted by two filters.
//!
//! The tree is the source of truth. The Bloom filter tracks every key ever
//! added and the Xor filter is a snapshot built on demand; either can be
//! consulted before the tree so that most absent keys are rejected without
//! a traversal. Neither filter supports removal, so after deletes they only
//! grow more optimistic until rebuilt.

use thiserror::Error;
use tracing::{debug, trace, warn};

use super::config::{DictConfig, LookupFilter};
use super::metrics::{DictMetrics, MetricsSnapshot};
use crate::filter::{
    BloomError, BloomFilter, ConstructionError, KeccakHasher, KeyHasher, Xor8, XorBuilder,
};
use crate::tree::{
    copy_key, validate_key, Insertion, KeyHandle, OwnershipMode, PrefixMatches, StoredKey,
    TernaryTree, TreeError,
};

/// Dictionary errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DictError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("Bloom filter error: {0}")]
    Bloom(#[from] BloomError),
    #[error("Static filter construction failed: {0}")]
    Construction(#[from] ConstructionError),
    #[error("No static filter has been built")]
    StaticFilterMissing,
}

impl DictError {
    /// Returns true for a plain miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DictError::Tree(TreeError::NotFound))
    }
}

/// Result type for dictionary operations.
pub type Result<T> = std::result::Result<T, DictError>;

/// Outcome of [`Dictionary::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was added.
    Inserted(KeyHandle),
    /// The key was already stored.
    AlreadyPresent(KeyHandle),
    /// The Bloom pre-check reported the key as present and the tree was
    /// not touched. The key may in fact be new.
    SkippedByFilter,
}

impl InsertOutcome {
    /// Returns true if the key was added.
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Outcome of a lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// The key is stored.
    Found(KeyHandle),
    /// The filter proved the key absent; the tree was not searched.
    Rejected,
    /// The filter passed the key but the tree does not hold it.
    FalsePositive,
    /// No filter was consulted and the tree does not hold the key.
    Absent,
}

impl Lookup {
    /// Returns true if the key is stored.
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Returns the handle of a found key.
    pub fn handle(&self) -> Option<KeyHandle> {
        match *self {
            Lookup::Found(handle) => Some(handle),
            _ => None,
        }
    }
}

/// String dictionary with exact, Bloom-filtered and Xor-filtered lookups.
///
/// `K` is the key ownership mode of the underlying tree: see
/// [`BorrowedDictionary`] and [`OwnedDictionary`].
#[derive(Debug)]
pub struct Dictionary<K, H = KeccakHasher> {
    tree: TernaryTree<K>,
    bloom: BloomFilter<H>,
    xor: Option<Xor8<H>>,
    /// Set when a key was added after the Xor filter was built.
    xor_stale: bool,
    config: DictConfig,
    metrics: DictMetrics,
}

/// A dictionary that references keys owned by the caller.
pub type BorrowedDictionary<'a, H = KeccakHasher> = Dictionary<&'a [u8], H>;

/// A dictionary that owns copies of its keys.
pub type OwnedDictionary<H = KeccakHasher> = Dictionary<Box<[u8]>, H>;

impl<K: StoredKey> Dictionary<K> {
    /// Creates a dictionary with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(DictConfig::default())
    }

    /// Creates a dictionary with `config`.
    pub fn with_config(config: DictConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, KeccakHasher)
    }
}

impl<K: StoredKey, H: KeyHasher + Clone> Dictionary<K, H> {
    /// Creates a dictionary whose filters hash keys with `hasher`.
    pub fn with_config_and_hasher(config: DictConfig, hasher: H) -> Result<Self> {
        let bloom =
            BloomFilter::try_with_size_and_hasher(config.bloom_bits, config.bloom_hashes, hasher)?;
        let tree = match config.node_limit {
            Some(limit) => TernaryTree::with_node_limit(limit),
            None => TernaryTree::new(),
        };

        Ok(Self {
            tree,
            bloom,
            xor: None,
            xor_stale: false,
            config,
            metrics: DictMetrics::new(),
        })
    }

    fn insert_with<'k, A>(&mut self, key: &'k [u8], adopt: A) -> Result<InsertOutcome>
    where
        A: FnOnce(&'k [u8]) -> std::result::Result<K, TreeError>,
    {
        validate_key(key)?;

        if self.config.bloom_precheck && self.bloom.may_contain(key) {
            trace!(len = key.len(), "insert skipped by bloom pre-check");
            self.metrics.inc_precheck_skips();
            return Ok(InsertOutcome::SkippedByFilter);
        }

        match self.tree.insert_with(key, adopt)? {
            Insertion::New(handle) => {
                self.bloom.insert(key);
                if self.xor.is_some() {
                    self.xor_stale = true;
                }
                self.metrics.inc_inserts();
                Ok(InsertOutcome::Inserted(handle))
            }
            Insertion::Existing(handle) => {
                self.metrics.inc_duplicate_inserts();
                Ok(InsertOutcome::AlreadyPresent(handle))
            }
        }
    }

    /// Looks `key` up through the configured [`LookupFilter`].
    pub fn lookup(&self, key: &[u8]) -> Result<Lookup> {
        self.lookup_via(key, self.config.lookup_filter)
    }

    /// Looks `key` up, consulting `filter` before the tree.
    ///
    /// A filter negative is final. A positive is confirmed against the
    /// tree. A stale Xor filter is skipped rather than trusted, since keys
    /// added after its build would otherwise be rejected.
    pub fn lookup_via(&self, key: &[u8], filter: LookupFilter) -> Result<Lookup> {
        self.metrics.inc_lookups();

        let filtered = match filter {
            LookupFilter::None => false,
            LookupFilter::Bloom => {
                if !self.bloom.may_contain(key) {
                    self.metrics.inc_bloom_rejections();
                    return Ok(Lookup::Rejected);
                }
                true
            }
            LookupFilter::Xor => {
                let xor = self.xor.as_ref().ok_or(DictError::StaticFilterMissing)?;
                if self.xor_stale {
                    self.metrics.inc_stale_bypasses();
                    false
                } else if !xor.contains(key) {
                    self.metrics.inc_xor_rejections();
                    return Ok(Lookup::Rejected);
                } else {
                    true
                }
            }
        };

        match self.tree.search(key) {
            Ok(handle) => {
                self.metrics.inc_hits();
                Ok(Lookup::Found(handle))
            }
            Err(TreeError::NotFound) if filtered => {
                self.metrics.inc_false_positives();
                Ok(Lookup::FalsePositive)
            }
            Err(TreeError::NotFound) => Ok(Lookup::Absent),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes `key` from the tree. The filters are left as they are.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.tree.remove(key)?;
        self.metrics.inc_removals();
        Ok(())
    }

    /// Rebuilds the Xor filter from the current key set.
    ///
    /// On failure the previous filter is discarded, so Xor lookups report
    /// [`DictError::StaticFilterMissing`] until a build succeeds.
    pub fn rebuild_static_filter(&mut self) -> Result<()>
    where
        H: Sync,
    {
        self.xor = None;
        self.xor_stale = false;

        let keys = self.tree.keys();
        let count = keys.len();
        let built = XorBuilder::allocate_with_hasher(count, self.bloom.hasher().clone())
            .and_then(|builder| {
                builder
                    .with_max_attempts(self.config.max_attempts)
                    .populate(keys)
            });

        match built {
            Ok(filter) => {
                debug!(
                    keys = count,
                    slots = filter.slots(),
                    seed = filter.seed(),
                    "static filter rebuilt"
                );
                self.xor = Some(filter);
                self.metrics.inc_static_builds();
                Ok(())
            }
            Err(err) => {
                warn!(keys = count, error = %err, "static filter rebuild failed");
                self.metrics.inc_static_build_failures();
                Err(err.into())
            }
        }
    }

    /// Clears the Bloom filter and re-adds every stored key, dropping the
    /// positives left behind by removals.
    pub fn rebuild_bloom(&mut self) {
        self.bloom.clear();
        for key in self.tree.keys() {
            self.bloom.insert(key);
        }
        debug!(keys = self.tree.len(), "bloom filter rebuilt");
    }

    /// Collects up to `capacity` stored keys starting with `prefix`.
    pub fn search_prefix(&self, prefix: &[u8], capacity: usize) -> Result<PrefixMatches<'_>> {
        Ok(self.tree.search_prefix(prefix, capacity)?)
    }

    /// Returns true if `key` is stored. Always exact.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.tree.contains(key)
    }

    /// Returns the bytes of a stored key.
    pub fn resolve(&self, handle: KeyHandle) -> Option<&[u8]> {
        self.tree.resolve(handle)
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the key ownership mode.
    pub fn mode(&self) -> OwnershipMode {
        self.tree.mode()
    }

    /// Returns the Bloom filter's predicted false positive rate for the
    /// keys added to it so far.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        self.bloom.estimated_false_positive_rate()
    }

    /// Returns the exact index.
    pub fn tree(&self) -> &TernaryTree<K> {
        &self.tree
    }

    /// Returns the Bloom filter.
    pub fn bloom(&self) -> &BloomFilter<H> {
        &self.bloom
    }

    /// Returns the current static filter, if one has been built.
    pub fn static_filter(&self) -> Option<&Xor8<H>> {
        self.xor.as_ref()
    }

    /// Returns true if keys were added after the static filter was built.
    pub fn is_static_filter_stale(&self) -> bool {
        self.xor_stale
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    /// Returns a snapshot of the routing metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Resets the routing metrics.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

impl<'a, H: KeyHasher + Clone> Dictionary<&'a [u8], H> {
    /// Inserts a key borrowed from the caller.
    pub fn insert(&mut self, key: &'a [u8]) -> Result<InsertOutcome> {
        self.insert_with(key, Ok)
    }

    /// Inserts every key, returning how many were new.
    pub fn load<I, T>(&mut self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a T>,
        T: AsRef<[u8]> + ?Sized + 'a,
    {
        let mut added = 0;
        for key in keys {
            if self.insert(key.as_ref())?.is_inserted() {
                added += 1;
            }
        }
        debug!(added, total = self.len(), "keys loaded");
        Ok(added)
    }

    /// Releases the dictionary. Borrowed key bytes stay with the caller.
    pub fn release_structure(self) {
        self.tree.release_structure();
    }
}

impl<H: KeyHasher + Clone> Dictionary<Box<[u8]>, H> {
    /// Inserts a private copy of `key`.
    pub fn insert(&mut self, key: &[u8]) -> Result<InsertOutcome> {
        self.insert_with(key, copy_key)
    }

    /// Inserts every key, returning how many were new.
    pub fn load<I>(&mut self, keys: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut added = 0;
        for key in keys {
            if self.insert(key.as_ref())?.is_inserted() {
                added += 1;
            }
        }
        debug!(added, total = self.len(), "keys loaded");
        Ok(added)
    }

    /// Releases the dictionary together with every owned key copy.
    pub fn release_all(self) {
        self.tree.release_all();
    }
}
