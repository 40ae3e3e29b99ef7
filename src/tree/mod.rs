//! Exact index.
//!
//! A ternary search tree answering exact membership, removal and ordered
//! prefix enumeration over byte-string keys. Nodes live in an index-based
//! arena and every traversal is iterative.

mod node;
mod ownership;
mod tst;

#[cfg(test)]
mod tests;

pub use node::KeyHandle;
pub use ownership::{BorrowedTree, OwnedTree, OwnershipMode, StoredKey};
pub use tst::{Insertion, PrefixMatches, TernaryTree, TreeError, MAX_KEY_LEN};

pub(crate) use ownership::copy_key;
pub(crate) use tst::validate_key;
