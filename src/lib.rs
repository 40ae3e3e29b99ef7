//! # prefix_dict
//!
//! An in-memory string dictionary with exact membership, removal and
//! ordered prefix enumeration, fronted by approximate membership filters
//! that reject most absent keys before the exact index is searched.
//!
//! ## Architecture
//!
//! 1. **Tree** - ternary search tree over byte-string keys, either
//!    borrowing keys from the caller or owning copies of them
//! 2. **Filters** - a mutable Bloom filter and a static Xor filter built by
//!    hypergraph peeling
//! 3. **Dictionary** - routes inserts, lookups and removals across the three
//!
//! ## Modules
//!
//! - `tree` - Exact index (TernaryTree, KeyHandle, PrefixMatches)
//! - `filter` - Bloom and Xor filters with pluggable key hashing
//! - `dict` - Orchestration, configuration and metrics
//!
//! ## Example
//!
//! ```
//! use prefix_dict::{DictConfig, LookupFilter, OwnedDictionary};
//!
//! let config = DictConfig::new().with_bloom(1 << 16, 3);
//! let mut dict = OwnedDictionary::with_config(config).unwrap();
//! dict.load(["apple", "app", "apply"]).unwrap();
//!
//! let matches = dict.search_prefix(b"app", 10).unwrap();
//! assert_eq!(matches.len(), 3);
//!
//! dict.rebuild_static_filter().unwrap();
//! assert!(dict.lookup_via(b"apply", LookupFilter::Xor).unwrap().is_found());
//! ```

pub mod dict;
pub mod filter;
pub mod tree;

pub use dict::{
    BorrowedDictionary, DictConfig, DictError, Dictionary, InsertOutcome, Lookup, LookupFilter,
    OwnedDictionary, SharedDictionary,
};
pub use filter::{BloomFilter, KeyHasher, Xor16, Xor8, XorBuilder, XorFilter};
pub use tree::{BorrowedTree, KeyHandle, OwnedTree, TernaryTree, TreeError};
