//! Dictionary configuration.

use crate::filter::{DEFAULT_BITS, DEFAULT_HASHES, DEFAULT_MAX_ATTEMPTS};

/// Default number of Bloom filter bits.
pub const DEFAULT_BLOOM_BITS: usize = DEFAULT_BITS;

/// Default number of Bloom hash projections.
pub const DEFAULT_BLOOM_HASHES: u32 = DEFAULT_HASHES;

/// Which filter a lookup consults before the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LookupFilter {
    /// Search the tree directly.
    #[default]
    None,
    /// Consult the Bloom filter first.
    Bloom,
    /// Consult the static Xor filter first.
    Xor,
}

/// Dictionary configuration.
#[derive(Clone, Debug)]
pub struct DictConfig {
    /// Number of bits in the Bloom filter.
    pub bloom_bits: usize,
    /// Number of Bloom hash projections.
    pub bloom_hashes: u32,
    /// Skip tree inserts the Bloom filter already reports as present.
    ///
    /// Lossy: a Bloom false positive silently drops a new key.
    pub bloom_precheck: bool,
    /// Filter consulted by [`Dictionary::lookup`](super::Dictionary::lookup).
    pub lookup_filter: LookupFilter,
    /// Peeling attempts per static filter build.
    pub max_attempts: u32,
    /// Upper bound on tree nodes, or `None` for no bound.
    pub node_limit: Option<usize>,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            bloom_bits: DEFAULT_BLOOM_BITS,
            bloom_hashes: DEFAULT_BLOOM_HASHES,
            bloom_precheck: false,
            lookup_filter: LookupFilter::None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            node_limit: None,
        }
    }
}

impl DictConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Bloom filter geometry.
    pub fn with_bloom(mut self, bits: usize, hashes: u32) -> Self {
        self.bloom_bits = bits;
        self.bloom_hashes = hashes;
        self
    }

    /// Enables or disables the lossy Bloom pre-check on insert.
    pub fn with_bloom_precheck(mut self, enabled: bool) -> Self {
        self.bloom_precheck = enabled;
        self
    }

    /// Sets the filter used by default lookups.
    pub fn with_lookup_filter(mut self, filter: LookupFilter) -> Self {
        self.lookup_filter = filter;
        self
    }

    /// Sets the number of peeling attempts for static filter builds.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Bounds the number of tree nodes.
    pub fn with_node_limit(mut self, limit: usize) -> Self {
        self.node_limit = Some(limit);
        self
    }
}
