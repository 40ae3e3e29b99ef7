//! Pluggable key hashing shared by both filters.
//!
//! Filters only ever see a 64-bit digest of a key. Anything that maps the
//! same bytes to the same `u64` for the lifetime of the process can be
//! plugged in through [`KeyHasher`].

use std::fmt;
use std::hash::Hasher;

use rustc_hash::FxHasher;
use tiny_keccak::{Hasher as _, Keccak};

/// Maps a key to a deterministic 64-bit digest.
pub trait KeyHasher {
    /// Hashes `key`. Identical bytes must always produce identical output.
    fn hash_key(&self, key: &[u8]) -> u64;
}

/// Keccak-256 truncated to its first 8 bytes (little-endian).
///
/// Slow compared to the others, but collisions between distinct keys are
/// practically impossible, which matters for Xor filter construction.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeccakHasher;

impl KeyHasher for KeccakHasher {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        let digest = keccak256(key);
        u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3],
            digest[4], digest[5], digest[6], digest[7],
        ])
    }
}

/// Bob Jenkins' one-at-a-time hash over a 64-bit accumulator.
///
/// Bytes are sign-extended before they are added, as a signed `char` is,
/// so keys with bytes at or above 0x80 hash the same as under C.
///
/// Cheap, but weak: distinct keys can collide, in which case an Xor filter
/// build reports them as duplicates.
#[derive(Clone, Copy, Debug, Default)]
pub struct JenkinsHasher;

impl KeyHasher for JenkinsHasher {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        let mut hash: u64 = 0;
        for &byte in key {
            hash = hash.wrapping_add(byte as i8 as i64 as u64);
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash.wrapping_add(hash << 15)
    }
}

/// `rustc_hash::FxHasher` over the raw key bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct FxKeyHasher;

impl KeyHasher for FxKeyHasher {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(key);
        hasher.write_usize(key.len());
        hasher.finish()
    }
}

/// Adapts any `Fn(&[u8]) -> u64` into a [`KeyHasher`].
#[derive(Clone, Copy)]
pub struct FnHasher<F>(pub F);

impl<F> fmt::Debug for FnHasher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHasher(..)")
    }
}

impl<F> KeyHasher for FnHasher<F>
where
    F: Fn(&[u8]) -> u64,
{
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        (self.0)(key)
    }
}

/// Computes the Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// MurmurHash3 64-bit finalizer.
#[inline]
pub(crate) fn murmur64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 33)
}

/// Advances a splitmix64 state and returns the next output.
#[inline]
pub(crate) fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashers_are_deterministic() {
        let key = b"Taipei";
        assert_eq!(KeccakHasher.hash_key(key), KeccakHasher.hash_key(key));
        assert_eq!(JenkinsHasher.hash_key(key), JenkinsHasher.hash_key(key));
        assert_eq!(FxKeyHasher.hash_key(key), FxKeyHasher.hash_key(key));
    }

    #[test]
    fn test_hashers_distinguish_keys() {
        assert_ne!(KeccakHasher.hash_key(b"cat"), KeccakHasher.hash_key(b"act"));
        assert_ne!(JenkinsHasher.hash_key(b"cat"), JenkinsHasher.hash_key(b"act"));
        assert_ne!(FxKeyHasher.hash_key(b"cat"), FxKeyHasher.hash_key(b"cats"));
    }

    #[test]
    fn test_jenkins_known_value() {
        // Low 32 bits agree with the classic 32-bit one-at-a-time digest.
        assert_eq!(JenkinsHasher.hash_key(b"a"), 0x6_ca2e_9442);
        assert_eq!(JenkinsHasher.hash_key(b"a") as u32, 0xca2e_9442);
    }

    #[test]
    fn test_jenkins_sign_extends_high_bytes() {
        // "é" is 0xc3 0xa9; both bytes are negative as a signed char.
        assert_eq!(JenkinsHasher.hash_key("é".as_bytes()), 0xf66f_ff2a_f5ac_a6ae);
    }

    #[test]
    fn test_keccak_empty() {
        let hash = keccak256(&[]);
        assert_eq!(hash[0], 0xc5);
        assert_eq!(hash[31], 0x70);
    }

    #[test]
    fn test_fn_hasher() {
        let hasher = FnHasher(|key: &[u8]| key.len() as u64);
        assert_eq!(hasher.hash_key(b"four"), 4);
        assert_eq!(format!("{hasher:?}"), "FnHasher(..)");
    }

    #[test]
    fn test_splitmix_sequence_advances() {
        let mut state = 0u64;
        let a = splitmix64(&mut state);
        let b = splitmix64(&mut state);
        assert_ne!(a, b);
        assert_eq!(a, 0xe220_a839_7b1d_cdaf);
    }
}
