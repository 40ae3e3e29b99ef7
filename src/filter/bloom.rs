//! Bloom filter for fast negative lookups.
//!
//! A Bloom filter is a probabilistic data structure that can tell you
//! definitely if a key is NOT in the set, or possibly in the set.
//! False positives are possible, but false negatives are not. Bits are
//! never cleared individually, so there is no removal: the only way back
//! is [`BloomFilter::clear`].

use thiserror::Error;

use super::hash::{murmur64, KeccakHasher, KeyHasher};

/// Default number of bits in the filter.
pub const DEFAULT_BITS: usize = 5_000_000;

/// Default number of hash projections per key.
pub const DEFAULT_HASHES: u32 = 2;

/// Bloom filter errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BloomError {
    #[error("Failed to allocate {bits} filter bits")]
    AllocationFailure { bits: usize },
    #[error("Bloom filter needs at least one bit and one hash projection")]
    InvalidGeometry,
}

/// Result type for Bloom filter construction.
pub type Result<T> = std::result::Result<T, BloomError>;

/// A Bloom filter over byte-string keys.
///
/// Each key is hashed once with the pluggable [`KeyHasher`]; the `k` bit
/// positions are derived from that digest by double hashing
/// (`h1 + i * h2 mod m`).
#[derive(Clone, Debug)]
pub struct BloomFilter<H = KeccakHasher> {
    /// Bit vector.
    bits: Vec<u64>,
    /// Number of bits in the filter.
    num_bits: usize,
    /// Number of hash projections.
    num_hashes: u32,
    /// Number of insertions performed.
    count: usize,
    hasher: H,
}

impl BloomFilter {
    /// Creates a new Bloom filter with the default geometry.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_BITS, DEFAULT_HASHES)
    }

    /// Creates a new Bloom filter with the specified number of bits and
    /// hash projections. Zero values are bumped to one.
    pub fn with_size(num_bits: usize, num_hashes: u32) -> Self {
        Self::with_size_and_hasher(num_bits, num_hashes, KeccakHasher)
    }

    /// Fallible form of [`BloomFilter::with_size`].
    pub fn try_with_size(num_bits: usize, num_hashes: u32) -> Result<Self> {
        Self::try_with_size_and_hasher(num_bits, num_hashes, KeccakHasher)
    }

    /// Creates a Bloom filter sized for an expected number of keys at the
    /// requested false positive rate.
    pub fn for_capacity(expected_elements: usize, false_positive_rate: f64) -> Self {
        let (num_bits, num_hashes) = optimal_geometry(expected_elements, false_positive_rate);
        Self::with_size(num_bits, num_hashes)
    }
}

impl<H: KeyHasher> BloomFilter<H> {
    /// Creates a filter that hashes keys with `hasher`.
    pub fn with_size_and_hasher(num_bits: usize, num_hashes: u32, hasher: H) -> Self {
        let num_bits = num_bits.max(1);
        Self {
            bits: vec![0u64; num_bits.div_ceil(64)],
            num_bits,
            num_hashes: num_hashes.max(1),
            count: 0,
            hasher,
        }
    }

    /// Creates a filter that hashes keys with `hasher`, reporting allocation
    /// failure instead of aborting.
    pub fn try_with_size_and_hasher(num_bits: usize, num_hashes: u32, hasher: H) -> Result<Self> {
        if num_bits == 0 || num_hashes == 0 {
            return Err(BloomError::InvalidGeometry);
        }
        let num_words = num_bits.div_ceil(64);
        let mut bits = Vec::new();
        bits.try_reserve_exact(num_words)
            .map_err(|_| BloomError::AllocationFailure { bits: num_bits })?;
        bits.resize(num_words, 0);

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
            count: 0,
            hasher,
        })
    }

    /// Inserts a key into the filter.
    pub fn insert(&mut self, key: &[u8]) {
        let projections = Projections::new(self.hasher.hash_key(key));
        for i in 0..self.num_hashes {
            let idx = projections.bit(i, self.num_bits);
            self.bits[idx / 64] |= 1u64 << (idx % 64);
        }
        self.count += 1;
    }

    /// Checks if a key might be in the filter.
    ///
    /// Returns `true` if the key might be present (could be false positive).
    /// Returns `false` if the key is definitely NOT present (no false negatives).
    #[inline]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let projections = Projections::new(self.hasher.hash_key(key));
        (0..self.num_hashes).all(|i| {
            let idx = projections.bit(i, self.num_bits);
            self.bits[idx / 64] & (1u64 << (idx % 64)) != 0
        })
    }

    /// Returns the number of insertions performed since creation or the last
    /// [`clear`](Self::clear).
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns the number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Returns the number of hash projections per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Returns the fraction of bits currently set.
    pub fn fill_ratio(&self) -> f64 {
        let set: u64 = self.bits.iter().map(|w| w.count_ones() as u64).sum();
        set as f64 / self.num_bits as f64
    }

    /// Returns the estimated false positive rate for the current count.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        false_positive_rate(self.num_bits, self.num_hashes, self.count)
    }

    /// Clears the filter.
    pub fn clear(&mut self) {
        self.bits.fill(0);
        self.count = 0;
    }

    /// Returns the key hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bit positions derived from one key digest.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Projections {
    h1: u64,
    h2: u64,
}

impl Projections {
    #[inline]
    pub(crate) fn new(hash: u64) -> Self {
        let h1 = murmur64(hash);
        let h2 = murmur64(h1 ^ 0x9e37_79b9_7f4a_7c15);
        Self { h1, h2 }
    }

    /// Bit index of projection `i` in a filter of `num_bits` bits.
    #[inline]
    pub(crate) fn bit(&self, i: u32, num_bits: usize) -> usize {
        let h = self.h1.wrapping_add((i as u64).wrapping_mul(self.h2));
        (h % num_bits as u64) as usize
    }
}

/// `(1 - e^(-k*n/m))^k`
pub(crate) fn false_positive_rate(num_bits: usize, num_hashes: u32, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let k = num_hashes as f64;
    let n = count as f64;
    let m = num_bits as f64;
    (1.0 - (-k * n / m).exp()).powf(k)
}

/// Optimal `(bits, hashes)` for `n` keys at false positive rate `p`.
pub(crate) fn optimal_geometry(n: usize, p: f64) -> (usize, u32) {
    let n = n.max(1) as f64;
    let p = p.clamp(1e-12, 0.5);
    let ln2 = std::f64::consts::LN_2;
    let m = (-(n * p.ln()) / (ln2 * ln2)).ceil().max(64.0);
    let k = ((m / n) * ln2).round().max(1.0);
    (m as usize, k as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::JenkinsHasher;

    #[test]
    fn test_bloom_basic() {
        let mut bloom = BloomFilter::new();

        bloom.insert(b"hello");
        bloom.insert(b"world");

        assert!(bloom.may_contain(b"hello"));
        assert!(bloom.may_contain(b"world"));
        assert_eq!(bloom.count(), 2);
    }

    #[test]
    fn test_bloom_small_table() {
        let mut bloom = BloomFilter::with_size(1000, 2);
        bloom.insert(b"cat");
        assert!(bloom.may_contain(b"cat"));
    }

    #[test]
    fn test_bloom_definitely_not_present() {
        let mut bloom = BloomFilter::for_capacity(100, 0.01);

        for i in 0u64..100 {
            bloom.insert(&i.to_be_bytes());
        }

        for i in 0u64..100 {
            assert!(bloom.may_contain(&i.to_be_bytes()));
        }
    }

    #[test]
    fn test_bloom_false_positive_rate() {
        let mut bloom = BloomFilter::for_capacity(1000, 0.01);

        for i in 0u64..1000 {
            bloom.insert(&i.to_be_bytes());
        }

        let mut false_positives = 0;
        for i in 10000u64..11000 {
            if bloom.may_contain(&i.to_be_bytes()) {
                false_positives += 1;
            }
        }

        // ~1% expected, allow up to 5%
        assert!(
            false_positives < 50,
            "Too many false positives: {} (expected < 50)",
            false_positives
        );
    }

    #[test]
    fn test_bloom_clear() {
        let mut bloom = BloomFilter::with_size(4096, 3);

        bloom.insert(b"test");
        assert!(bloom.may_contain(b"test"));

        bloom.clear();
        assert_eq!(bloom.count(), 0);
        assert_eq!(bloom.fill_ratio(), 0.0);
        assert!(!bloom.may_contain(b"test"));
    }

    #[test]
    fn test_estimated_rate_formula() {
        let mut bloom = BloomFilter::with_size(1000, 2);
        assert_eq!(bloom.estimated_false_positive_rate(), 0.0);

        for i in 0u32..500 {
            bloom.insert(&i.to_le_bytes());
        }
        let expected = (1.0 - (-2.0f64 * 500.0 / 1000.0).exp()).powi(2);
        assert!((bloom.estimated_false_positive_rate() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_try_with_size_rejects_empty_geometry() {
        assert_eq!(
            BloomFilter::try_with_size(0, 2).unwrap_err(),
            BloomError::InvalidGeometry
        );
        assert_eq!(
            BloomFilter::try_with_size(64, 0).unwrap_err(),
            BloomError::InvalidGeometry
        );
        assert!(BloomFilter::try_with_size(64, 1).is_ok());
    }

    #[test]
    fn test_with_size_clamps_zero() {
        let bloom = BloomFilter::with_size(0, 0);
        assert_eq!(bloom.num_bits(), 1);
        assert_eq!(bloom.num_hashes(), 1);
    }

    #[test]
    fn test_optimal_geometry() {
        let (bits, hashes) = optimal_geometry(1000, 0.01);
        // ~9.6 bits per key, ~7 hashes
        assert!((9500..9700).contains(&bits), "bits = {bits}");
        assert_eq!(hashes, 7);
    }

    #[test]
    fn test_custom_hasher() {
        let mut bloom = BloomFilter::with_size_and_hasher(2048, 3, JenkinsHasher);
        bloom.insert(b"Kaohsiung");
        assert!(bloom.may_contain(b"Kaohsiung"));
    }

    #[test]
    fn test_projections_stay_in_range() {
        let p = Projections::new(0xdead_beef);
        for i in 0..16 {
            assert!(p.bit(i, 1000) < 1000);
        }
    }
}
