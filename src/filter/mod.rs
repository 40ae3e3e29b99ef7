//! Approximate membership filters.
//!
//! Two complementary filters answer "definitely absent" cheaply so that
//! most negative lookups never reach the exact index:
//!
//! - [`BloomFilter`]: mutable, monotone, no removal.
//! - [`XorFilter`]: built once from a finalized key set, immutable, smaller
//!   and with a lower false positive rate.
//!
//! Both hash keys through the pluggable [`KeyHasher`].

mod atomic_bloom;
mod bloom;
mod hash;
mod xor;


pub use atomic_bloom::AtomicBloomFilter;
pub use bloom::{BloomError, BloomFilter, DEFAULT_BITS, DEFAULT_HASHES};
pub use hash::{keccak256, FnHasher, FxKeyHasher, JenkinsHasher, KeccakHasher, KeyHasher};
pub use xor::{
    ConstructionError, Fingerprint, Xor16, Xor8, XorBuilder, XorFilter, DEFAULT_MAX_ATTEMPTS,
};
