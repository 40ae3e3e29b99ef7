//! Lock-free Bloom filter for concurrent writers and readers.
//!
//! Same geometry and projections as [`BloomFilter`](super::BloomFilter), but
//! the bit words are `AtomicU64` so `insert` takes `&self`. Setting a bit is
//! a `fetch_or`, which commutes with every other `fetch_or`, so relaxed
//! ordering is enough: a key whose `insert` happened-before a `may_contain`
//! is always reported.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::bloom::{false_positive_rate, BloomError, Projections, Result};
use super::hash::{KeccakHasher, KeyHasher};

/// A Bloom filter whose bits can be set concurrently.
#[derive(Debug)]
pub struct AtomicBloomFilter<H = KeccakHasher> {
    bits: Vec<AtomicU64>,
    num_bits: usize,
    num_hashes: u32,
    count: AtomicUsize,
    hasher: H,
}

impl AtomicBloomFilter {
    /// Creates a new filter with the given geometry.
    pub fn with_size(num_bits: usize, num_hashes: u32) -> Result<Self> {
        Self::with_size_and_hasher(num_bits, num_hashes, KeccakHasher)
    }
}

impl<H: KeyHasher> AtomicBloomFilter<H> {
    /// Creates a new filter that hashes keys with `hasher`.
    pub fn with_size_and_hasher(num_bits: usize, num_hashes: u32, hasher: H) -> Result<Self> {
        if num_bits == 0 || num_hashes == 0 {
            return Err(BloomError::InvalidGeometry);
        }
        let num_words = num_bits.div_ceil(64);
        let mut bits = Vec::new();
        bits.try_reserve_exact(num_words)
            .map_err(|_| BloomError::AllocationFailure { bits: num_bits })?;
        bits.extend((0..num_words).map(|_| AtomicU64::new(0)));

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
            count: AtomicUsize::new(0),
            hasher,
        })
    }

    /// Inserts a key. Safe to call from many threads at once.
    pub fn insert(&self, key: &[u8]) {
        let projections = Projections::new(self.hasher.hash_key(key));
        for i in 0..self.num_hashes {
            let idx = projections.bit(i, self.num_bits);
            self.bits[idx / 64].fetch_or(1u64 << (idx % 64), Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Checks if a key might be in the filter.
    #[inline]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let projections = Projections::new(self.hasher.hash_key(key));
        (0..self.num_hashes).all(|i| {
            let idx = projections.bit(i, self.num_bits);
            self.bits[idx / 64].load(Ordering::Relaxed) & (1u64 << (idx % 64)) != 0
        })
    }

    /// Returns the number of insertions performed.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns the number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Returns the estimated false positive rate for the current count.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        false_positive_rate(self.num_bits, self.num_hashes, self.count())
    }

    /// Clears every bit. Requires exclusive access.
    pub fn clear(&mut self) {
        for word in &mut self.bits {
            *word.get_mut() = 0;
        }
        *self.count.get_mut() = 0;
    }
}
