//! Dictionary orchestration.
//!
//! [`Dictionary`] is the only component that knows about the tree and both
//! filters. It decides which structure answers each operation:
//!
//! - insert: tree first, then the Bloom filter for new keys;
//! - lookup: optional filter first, tree to confirm;
//! - remove: tree only.

mod config;
mod dictionary;
mod metrics;
mod shared;

pub use config::{DictConfig, LookupFilter, DEFAULT_BLOOM_BITS, DEFAULT_BLOOM_HASHES};
pub use dictionary::{
    BorrowedDictionary, DictError, Dictionary, InsertOutcome, Lookup, OwnedDictionary, Result,
};
pub use metrics::{DictMetrics, MetricsSnapshot};
pub use shared::{CopiedMatches, SharedDictionary};
