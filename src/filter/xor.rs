//! Xor filter: static approximate membership built by hypergraph peeling.
//!
//! Every key is mapped to three slots, one per block of the fingerprint
//! array. Construction peels the resulting 3-uniform hypergraph: a slot
//! touched by exactly one remaining key pins that key, which is removed and
//! pushed on a stack. Fingerprints are then assigned in reverse peel order
//! so that for every key
//!
//! ```text
//! fp[h0] ^ fp[h1] ^ fp[h2] == fingerprint(hash(key))
//! ```
//!
//! A seed that leaves a non-empty 2-core stalls peeling; construction then
//! reseeds and retries a bounded number of times.
//!
//! The filter is immutable. A [`XorBuilder`] is consumed by `populate`, so a
//! failed build leaves nothing that could be queried.

use std::fmt::Debug;
use std::ops::BitXor;

use hashbrown::HashSet;
use rayon::prelude::*;
use rustc_hash::FxBuildHasher;
use thiserror::Error;
use tracing::{debug, warn};

use super::hash::{murmur64, splitmix64, KeccakHasher, KeyHasher};

/// Default number of peeling attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Starting splitmix64 state; each attempt draws its seed from it.
const INITIAL_SEED_STATE: u64 = 0x726b_2b9d_438b_9d4d;

/// Key sets at least this large are hashed on the rayon pool.
const PARALLEL_HASH_THRESHOLD: usize = 4096;

/// Xor filter construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("Failed to allocate {bytes} bytes of filter storage")]
    AllocationFailure { bytes: usize },
    #[error("Filter sized for {capacity} keys cannot hold {keys}")]
    TooManyKeys { keys: usize, capacity: usize },
    #[error("Build set contains duplicate keys")]
    DuplicateKeys,
    #[error("Peeling did not complete after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Result type for Xor filter construction.
pub type Result<T> = std::result::Result<T, ConstructionError>;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
}

/// Fixed-width fingerprint stored in each slot.
pub trait Fingerprint:
    sealed::Sealed + Copy + Default + Eq + Debug + Send + Sync + BitXor<Output = Self>
{
    /// Width in bits; the false positive rate is about `2^-BITS`.
    const BITS: u32;

    /// Derives the fingerprint of a mixed key hash.
    fn from_hash(hash: u64) -> Self;
}

impl Fingerprint for u8 {
    const BITS: u32 = 8;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        (hash ^ (hash >> 32)) as u8
    }
}

impl Fingerprint for u16 {
    const BITS: u32 = 16;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        (hash ^ (hash >> 32)) as u16
    }
}

/// Largest block `reduce` can address from a 32-bit hash.
const MAX_BLOCK_LENGTH: usize = u32::MAX as usize;

/// Three equal blocks of fingerprint slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Layout {
    block_length: usize,
}

impl Layout {
    /// About 1.23 slots per key plus a small constant, rounded down to a
    /// whole number of blocks. Fails when the blocks would be too long to
    /// address.
    fn for_capacity(capacity: usize) -> Result<Self> {
        let scaled = (1.23 * capacity as f64).ceil();
        let slots = if scaled < usize::MAX as f64 {
            (scaled as usize).checked_add(32)
        } else {
            None
        };
        slots
            .map(|slots| slots / 3)
            .filter(|&block_length| block_length <= MAX_BLOCK_LENGTH)
            .map(|block_length| Self { block_length })
            .ok_or(ConstructionError::AllocationFailure { bytes: usize::MAX })
    }

    #[inline]
    fn slots(&self) -> usize {
        self.block_length * 3
    }

    /// The hyperedge of a mixed hash: one slot in each block.
    #[inline]
    fn edge(&self, hash: u64) -> [usize; 3] {
        let bl = self.block_length;
        [
            reduce(hash as u32, bl),
            reduce(hash.rotate_left(21) as u32, bl) + bl,
            reduce(hash.rotate_left(42) as u32, bl) + 2 * bl,
        ]
    }
}

/// Maps `hash` uniformly onto `0..n` without a division.
#[inline]
fn reduce(hash: u32, n: usize) -> usize {
    debug_assert!(n <= MAX_BLOCK_LENGTH);
    ((hash as u64 * n as u64) >> 32) as usize
}

#[inline]
fn mix(key_hash: u64, seed: u64) -> u64 {
    murmur64(key_hash.wrapping_add(seed))
}

/// Running XOR and degree of the keys touching one slot.
#[derive(Clone, Copy, Debug, Default)]
struct XorSet {
    mask: u64,
    count: u32,
}

/// A key removed during peeling and the slot that pinned it.
#[derive(Clone, Copy, Debug)]
struct Peeled {
    hash: u64,
    slot: usize,
}

/// Allocated fingerprint storage waiting for its key set.
#[derive(Debug)]
pub struct XorBuilder<F = u8, H = KeccakHasher> {
    fingerprints: Vec<F>,
    layout: Layout,
    capacity: usize,
    max_attempts: u32,
    seed_state: u64,
    hasher: H,
}

impl<F: Fingerprint> XorBuilder<F> {
    /// Reserves fingerprint storage for up to `capacity` keys.
    pub fn allocate(capacity: usize) -> Result<Self> {
        Self::allocate_with_hasher(capacity, KeccakHasher)
    }
}

impl<F: Fingerprint, H: KeyHasher> XorBuilder<F, H> {
    /// Reserves fingerprint storage for up to `capacity` keys hashed with
    /// `hasher`.
    pub fn allocate_with_hasher(capacity: usize, hasher: H) -> Result<Self> {
        let layout = Layout::for_capacity(capacity)?;
        let fingerprints = try_filled(layout.slots(), F::default())?;

        Ok(Self {
            fingerprints,
            layout,
            capacity,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed_state: INITIAL_SEED_STATE,
            hasher,
        })
    }

    /// Sets the number of peeling attempts (at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the splitmix64 state the per-attempt seeds are drawn from.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_state = seed;
        self
    }

    /// Returns the number of keys this builder was sized for.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of fingerprint slots.
    pub fn slots(&self) -> usize {
        self.layout.slots()
    }

    /// Hashes `keys` and builds the filter.
    pub fn populate<I>(self, keys: I) -> Result<XorFilter<F, H>>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]> + Sync,
        H: Sync,
    {
        let keys: Vec<I::Item> = keys.into_iter().collect();
        let hasher = &self.hasher;
        let hashes: Vec<u64> = if keys.len() >= PARALLEL_HASH_THRESHOLD {
            keys.par_iter().map(|k| hasher.hash_key(k.as_ref())).collect()
        } else {
            keys.iter().map(|k| hasher.hash_key(k.as_ref())).collect()
        };
        self.populate_hashes(&hashes)
    }

    /// Builds the filter from pre-hashed keys.
    ///
    /// Hashes must come from the same [`KeyHasher`] the filter will be
    /// queried with. Two equal hashes are treated as duplicate keys.
    pub fn populate_hashes(mut self, hashes: &[u64]) -> Result<XorFilter<F, H>> {
        if hashes.len() > self.capacity {
            return Err(ConstructionError::TooManyKeys {
                keys: hashes.len(),
                capacity: self.capacity,
            });
        }

        let layout = self.layout;
        let mut sets = try_filled(layout.slots(), XorSet::default())?;
        let mut queue: Vec<usize> = try_with_capacity(layout.slots())?;
        let mut stack: Vec<Peeled> = try_with_capacity(hashes.len())?;

        for attempt in 1..=self.max_attempts {
            let seed = splitmix64(&mut self.seed_state);
            if peel(&layout, hashes, seed, &mut sets, &mut queue, &mut stack) {
                assign(&layout, &stack, &mut self.fingerprints);
                debug!(
                    keys = hashes.len(),
                    slots = layout.slots(),
                    attempts = attempt,
                    "xor filter built"
                );
                return Ok(XorFilter {
                    seed,
                    layout,
                    fingerprints: self.fingerprints.into_boxed_slice(),
                    len: hashes.len(),
                    hasher: self.hasher,
                });
            }

            debug!(
                attempt,
                peeled = stack.len(),
                keys = hashes.len(),
                "xor filter peeling stalled, reseeding"
            );

            if attempt == 1 && has_duplicates(hashes)? {
                warn!(keys = hashes.len(), "xor filter build set has duplicate keys");
                return Err(ConstructionError::DuplicateKeys);
            }
        }

        warn!(
            attempts = self.max_attempts,
            keys = hashes.len(),
            "xor filter construction exhausted its retry budget"
        );
        Err(ConstructionError::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// One peeling attempt. Returns true when every key was peeled; the peel
/// order is left in `stack`.
fn peel(
    layout: &Layout,
    hashes: &[u64],
    seed: u64,
    sets: &mut [XorSet],
    queue: &mut Vec<usize>,
    stack: &mut Vec<Peeled>,
) -> bool {
    sets.fill(XorSet::default());
    queue.clear();
    stack.clear();

    for &key in hashes {
        let hash = mix(key, seed);
        for slot in layout.edge(hash) {
            sets[slot].mask ^= hash;
            sets[slot].count += 1;
        }
    }

    queue.extend((0..sets.len()).filter(|&slot| sets[slot].count == 1));

    while let Some(slot) = queue.pop() {
        // Degree may have dropped to zero since the slot was queued.
        if sets[slot].count != 1 {
            continue;
        }
        let hash = sets[slot].mask;
        stack.push(Peeled { hash, slot });

        for other in layout.edge(hash) {
            let set = &mut sets[other];
            set.mask ^= hash;
            set.count -= 1;
            if set.count == 1 {
                queue.push(other);
            }
        }
    }

    stack.len() == hashes.len()
}

/// Assigns fingerprints in reverse peel order.
fn assign<F: Fingerprint>(layout: &Layout, stack: &[Peeled], fingerprints: &mut [F]) {
    fingerprints.fill(F::default());
    for peeled in stack.iter().rev() {
        let [a, b, c] = layout.edge(peeled.hash);
        // fingerprints[peeled.slot] is still zero, so it drops out of the XOR.
        fingerprints[peeled.slot] =
            F::from_hash(peeled.hash) ^ fingerprints[a] ^ fingerprints[b] ^ fingerprints[c];
    }
}

fn has_duplicates(hashes: &[u64]) -> Result<bool> {
    let mut seen: HashSet<u64, FxBuildHasher> = HashSet::with_hasher(FxBuildHasher);
    seen.try_reserve(hashes.len())
        .map_err(|_| ConstructionError::AllocationFailure {
            bytes: hashes.len().saturating_mul(std::mem::size_of::<u64>()),
        })?;
    Ok(!hashes.iter().all(|&h| seen.insert(h)))
}

fn try_with_capacity<T>(len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| ConstructionError::AllocationFailure {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(v)
}

fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut v = try_with_capacity(len)?;
    v.resize(len, value);
    Ok(v)
}

/// A built, immutable Xor filter.
#[derive(Clone, Debug)]
pub struct XorFilter<F = u8, H = KeccakHasher> {
    seed: u64,
    layout: Layout,
    fingerprints: Box<[F]>,
    len: usize,
    hasher: H,
}

/// Xor filter with 8-bit fingerprints (~0.39% false positives).
pub type Xor8<H = KeccakHasher> = XorFilter<u8, H>;

/// Xor filter with 16-bit fingerprints (~0.0015% false positives).
pub type Xor16<H = KeccakHasher> = XorFilter<u16, H>;

impl<F: Fingerprint> XorFilter<F> {
    /// Allocates and populates a filter over `keys` in one step.
    pub fn from_keys<I>(keys: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]> + Sync,
    {
        let keys: Vec<I::Item> = keys.into_iter().collect();
        XorBuilder::allocate(keys.len())?.populate(keys)
    }
}

impl<F: Fingerprint, H: KeyHasher> XorFilter<F, H> {
    /// Returns `true` if the filter probably contains `key`.
    ///
    /// Never a false negative for a key of the build set.
    #[inline]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.contains_hash(self.hasher.hash_key(key))
    }

    /// Same as [`contains`](Self::contains) for a key already hashed with
    /// this filter's hasher.
    #[inline]
    pub fn contains_hash(&self, key_hash: u64) -> bool {
        let hash = mix(key_hash, self.seed);
        let [a, b, c] = self.layout.edge(hash);
        let fp = &self.fingerprints;
        F::from_hash(hash) ^ fp[a] ^ fp[b] ^ fp[c] == F::default()
    }

    /// Returns the number of keys the filter was built from.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the build set was empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of fingerprint slots.
    pub fn slots(&self) -> usize {
        self.fingerprints.len()
    }

    /// Returns the seed of the successful attempt.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the theoretical false positive rate, `2^-BITS`.
    pub fn false_positive_rate(&self) -> f64 {
        1.0 / (1u64 << F::BITS) as f64
    }

    /// Returns the storage cost in bits per build key.
    pub fn bits_per_entry(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        (self.slots() as f64 * F::BITS as f64) / self.len as f64
    }

    /// Returns the key hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}
