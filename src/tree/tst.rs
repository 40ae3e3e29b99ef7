//! Ternary search tree.
//!
//! Each node compares one byte: smaller bytes go `low`, larger go `high`,
//! and a match advances to the next byte of the key through `mid`. A key is
//! stored iff the node reached by its last byte carries a terminal marker.
//!
//! Every traversal is iterative, so deep trees cannot exhaust the call
//! stack.

use std::cmp::Ordering;

use thiserror::Error;

use super::node::{Arena, KeyHandle, Link, Node, NodeId};
use super::ownership::{copy_key, OwnershipMode, StoredKey};

/// Longest key accepted, in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Tree errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Key not found")]
    NotFound,
    #[error("Node or key storage exhausted")]
    AllocationFailure,
    #[error("Key is empty")]
    EmptyKey,
    #[error("Key of {len} bytes exceeds the {max}-byte limit")]
    KeyTooLong { len: usize, max: usize },
    #[error("Key contains a NUL byte at position {position}")]
    EmbeddedTerminator { position: usize },
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Outcome of an insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The key was added.
    New(KeyHandle),
    /// The key was already stored; nothing changed.
    Existing(KeyHandle),
}

impl Insertion {
    /// Returns the handle of the stored key.
    pub fn handle(&self) -> KeyHandle {
        match *self {
            Insertion::New(handle) | Insertion::Existing(handle) => handle,
        }
    }

    /// Returns true if the insert added the key.
    pub fn is_new(&self) -> bool {
        matches!(self, Insertion::New(_))
    }
}

/// Keys sharing a prefix, in lexicographic byte order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixMatches<'t> {
    keys: Vec<&'t [u8]>,
    truncated: bool,
}

impl<'t> PrefixMatches<'t> {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            truncated: false,
        }
    }

    /// Returns the number of keys collected.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if more keys matched than the capacity allowed.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Returns the collected keys.
    pub fn keys(&self) -> &[&'t [u8]] {
        &self.keys
    }

    /// Consumes the matches, returning the keys.
    pub fn into_keys(self) -> Vec<&'t [u8]> {
        self.keys
    }

    /// Iterates over the collected keys.
    pub fn iter(&self) -> impl Iterator<Item = &'t [u8]> + '_ {
        self.keys.iter().copied()
    }
}

/// Pending work in the iterative in-order walk.
enum Visit {
    Enter(NodeId),
    Emit(KeyHandle),
}

/// Ternary search tree over byte-string keys.
///
/// `K` fixes the ownership mode: see [`BorrowedTree`](super::BorrowedTree)
/// and [`OwnedTree`](super::OwnedTree).
#[derive(Clone, Debug)]
pub struct TernaryTree<K> {
    arena: Arena,
    root: Option<NodeId>,
    /// Key slab indexed by `KeyHandle`.
    keys: Vec<Option<K>>,
    free_keys: Vec<KeyHandle>,
    len: usize,
    node_limit: usize,
}

impl<K: StoredKey> TernaryTree<K> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::with_node_limit(NodeId::MAX)
    }

    /// Creates an empty tree that refuses to grow beyond `limit` nodes.
    /// Inserts that would need more fail with
    /// [`TreeError::AllocationFailure`].
    pub fn with_node_limit(limit: usize) -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            keys: Vec::new(),
            free_keys: Vec::new(),
            len: 0,
            node_limit: limit.min(NodeId::MAX),
        }
    }

    /// Returns the ownership mode of this tree.
    pub fn mode(&self) -> OwnershipMode {
        K::MODE
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of live nodes.
    pub fn node_count(&self) -> usize {
        self.arena.live()
    }

    /// Inserts `key`, storing it through `adopt`.
    ///
    /// All storage is reserved before the first link is written, so a
    /// failed insert leaves the tree exactly as it was.
    pub(crate) fn insert_with<'k, A>(&mut self, key: &'k [u8], adopt: A) -> Result<Insertion>
    where
        A: FnOnce(&'k [u8]) -> Result<K>,
    {
        validate_key(key)?;

        let mut link = Link::Root;
        let mut depth = 0;
        while let Some(id) = self.child(link) {
            let (byte, terminal) = {
                let node = self.arena.get(id);
                (node.byte, node.key)
            };
            match key[depth].cmp(&byte) {
                Ordering::Less => link = Link::Low(id),
                Ordering::Greater => link = Link::High(id),
                Ordering::Equal => {
                    depth += 1;
                    if depth == key.len() {
                        if let Some(handle) = terminal {
                            return Ok(Insertion::Existing(handle));
                        }
                        let handle = self.store_key(key, adopt)?;
                        self.arena.get_mut(id).key = Some(handle);
                        self.len += 1;
                        return Ok(Insertion::New(handle));
                    }
                    link = Link::Mid(id);
                }
            }
        }

        // The unmatched suffix becomes a fresh mid chain hanging off `link`.
        let suffix = &key[depth..];
        self.arena.reserve(suffix.len(), self.node_limit)?;
        let handle = self.store_key(key, adopt)?;

        for &byte in suffix {
            let id = self.arena.alloc(Node::new(byte));
            self.set_child(link, Some(id));
            link = Link::Mid(id);
        }
        if let Link::Mid(last) = link {
            self.arena.get_mut(last).key = Some(handle);
        }
        self.len += 1;
        Ok(Insertion::New(handle))
    }

    /// Removes `key`, pruning nodes that no longer lead to any key.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(TreeError::NotFound);
        }

        let mut path: Vec<Link> = Vec::with_capacity(key.len());
        let mut link = Link::Root;
        let mut depth = 0;
        let target = loop {
            let id = self.child(link).ok_or(TreeError::NotFound)?;
            path.push(link);
            match key[depth].cmp(&self.arena.get(id).byte) {
                Ordering::Less => link = Link::Low(id),
                Ordering::Greater => link = Link::High(id),
                Ordering::Equal => {
                    depth += 1;
                    if depth == key.len() {
                        break id;
                    }
                    link = Link::Mid(id);
                }
            }
        };

        let handle = self
            .arena
            .get_mut(target)
            .key
            .take()
            .ok_or(TreeError::NotFound)?;
        // Dropping the slot frees the copy in owned mode.
        self.keys[handle.index()] = None;
        self.free_keys.push(handle);
        self.len -= 1;

        self.prune(path);
        Ok(())
    }

    /// Walks `path` bottom-up removing nodes that carry no key and lead
    /// nowhere. A keyless node with no `mid` and a single lateral child is
    /// replaced by that child.
    fn prune(&mut self, mut path: Vec<Link>) {
        while let Some(link) = path.pop() {
            let Some(id) = self.child(link) else {
                break;
            };
            let node = self.arena.get(id);
            if node.key.is_some() || node.mid.is_some() {
                break;
            }
            match (node.low, node.high) {
                (None, None) => {
                    self.set_child(link, None);
                    self.arena.release(id);
                }
                (Some(only), None) | (None, Some(only)) => {
                    self.set_child(link, Some(only));
                    self.arena.release(id);
                    break;
                }
                (Some(_), Some(_)) => break,
            }
        }
    }

    /// Looks up `key` exactly.
    pub fn search(&self, key: &[u8]) -> Result<KeyHandle> {
        self.locate(key)
            .and_then(|id| self.arena.get(id).key)
            .ok_or(TreeError::NotFound)
    }

    /// Returns true if `key` is stored.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.search(key).is_ok()
    }

    /// Returns the bytes of a stored key.
    pub fn resolve(&self, handle: KeyHandle) -> Option<&[u8]> {
        self.keys
            .get(handle.index())
            .and_then(|slot| slot.as_ref())
            .map(|key| key.as_ref())
    }

    /// Collects up to `capacity` keys starting with `prefix`, in order.
    ///
    /// An empty prefix matches every key. Returns [`TreeError::NotFound`]
    /// when no stored key has the prefix. Hitting `capacity` is not an
    /// error; it is reported by [`PrefixMatches::is_truncated`].
    pub fn search_prefix(&self, prefix: &[u8], capacity: usize) -> Result<PrefixMatches<'_>> {
        let mut matches = PrefixMatches::new();

        let start = if prefix.is_empty() {
            self.root
        } else {
            let id = self.locate(prefix).ok_or(TreeError::NotFound)?;
            let node = self.arena.get(id);
            if let Some(handle) = node.key {
                if !self.push_match(&mut matches, handle, capacity) {
                    return Ok(matches);
                }
            }
            node.mid
        };
        self.walk(start, capacity, &mut matches);

        if matches.is_empty() && !matches.truncated {
            return Err(TreeError::NotFound);
        }
        Ok(matches)
    }

    /// Returns every stored key in order.
    pub fn keys(&self) -> Vec<&[u8]> {
        let mut matches = PrefixMatches::new();
        self.walk(self.root, usize::MAX, &mut matches);
        matches.keys
    }

    /// Drops every node and key, keeping the ownership mode.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
        self.keys.clear();
        self.free_keys.clear();
        self.len = 0;
    }

    /// In-order walk of the subtree at `start`: low, self, mid, high.
    fn walk<'t>(&'t self, start: Option<NodeId>, capacity: usize, matches: &mut PrefixMatches<'t>) {
        let mut stack: Vec<Visit> = start.map(Visit::Enter).into_iter().collect();

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => {
                    let node = self.arena.get(id);
                    // Pushed in reverse so that low is visited first.
                    if let Some(high) = node.high {
                        stack.push(Visit::Enter(high));
                    }
                    if let Some(mid) = node.mid {
                        stack.push(Visit::Enter(mid));
                    }
                    if let Some(handle) = node.key {
                        stack.push(Visit::Emit(handle));
                    }
                    if let Some(low) = node.low {
                        stack.push(Visit::Enter(low));
                    }
                }
                Visit::Emit(handle) => {
                    if !self.push_match(matches, handle, capacity) {
                        return;
                    }
                }
            }
        }
    }

    /// Appends a match unless `capacity` is reached, in which case the
    /// matches are flagged truncated and false is returned.
    fn push_match<'t>(
        &'t self,
        matches: &mut PrefixMatches<'t>,
        handle: KeyHandle,
        capacity: usize,
    ) -> bool {
        if matches.keys.len() >= capacity {
            matches.truncated = true;
            return false;
        }
        if let Some(key) = self.resolve(handle) {
            matches.keys.push(key);
        }
        true
    }

    /// Finds the node reached by the last byte of `key`.
    fn locate(&self, key: &[u8]) -> Option<NodeId> {
        if key.is_empty() {
            return None;
        }
        let mut current = self.root;
        let mut depth = 0;
        while let Some(id) = current {
            let node = self.arena.get(id);
            match key[depth].cmp(&node.byte) {
                Ordering::Less => current = node.low,
                Ordering::Greater => current = node.high,
                Ordering::Equal => {
                    depth += 1;
                    if depth == key.len() {
                        return Some(id);
                    }
                    current = node.mid;
                }
            }
        }
        None
    }

    /// Stores the key bytes in a free or new slab slot.
    fn store_key<'k, A>(&mut self, key: &'k [u8], adopt: A) -> Result<KeyHandle>
    where
        A: FnOnce(&'k [u8]) -> Result<K>,
    {
        if self.free_keys.is_empty() {
            if self.keys.len() >= KeyHandle::MAX {
                return Err(TreeError::AllocationFailure);
            }
            self.keys
                .try_reserve(1)
                .map_err(|_| TreeError::AllocationFailure)?;
        }

        let stored = adopt(key)?;
        match self.free_keys.pop() {
            Some(handle) => {
                self.keys[handle.index()] = Some(stored);
                Ok(handle)
            }
            None => {
                let handle = KeyHandle::from_index(self.keys.len());
                self.keys.push(Some(stored));
                Ok(handle)
            }
        }
    }

    #[inline]
    fn child(&self, link: Link) -> Option<NodeId> {
        match link {
            Link::Root => self.root,
            Link::Low(id) => self.arena.get(id).low,
            Link::High(id) => self.arena.get(id).high,
            Link::Mid(id) => self.arena.get(id).mid,
        }
    }

    #[inline]
    fn set_child(&mut self, link: Link, child: Option<NodeId>) {
        match link {
            Link::Root => self.root = child,
            Link::Low(id) => self.arena.get_mut(id).low = child,
            Link::High(id) => self.arena.get_mut(id).high = child,
            Link::Mid(id) => self.arena.get_mut(id).mid = child,
        }
    }

    /// Asserts the structural invariants: byte ordering under `low` and
    /// `high`, one terminal per stored key whose path spells the key, no
    /// prunable leaf, and no leaked nodes.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut stack: Vec<(NodeId, Option<u8>, Option<u8>, Vec<u8>)> = Vec::new();
        if let Some(root) = self.root {
            stack.push((root, None, None, Vec::new()));
        }

        let mut reachable = 0usize;
        let mut terminals = 0usize;
        while let Some((id, lo, hi, prefix)) = stack.pop() {
            reachable += 1;
            let node = self.arena.get(id);
            if let Some(lo) = lo {
                assert!(node.byte > lo, "byte {} not above bound {}", node.byte, lo);
            }
            if let Some(hi) = hi {
                assert!(node.byte < hi, "byte {} not below bound {}", node.byte, hi);
            }

            let mut path = prefix.clone();
            path.push(node.byte);
            if let Some(handle) = node.key {
                terminals += 1;
                assert_eq!(self.resolve(handle), Some(path.as_slice()));
            }
            assert!(
                node.key.is_some() || node.mid.is_some() || node.low.is_some() || node.high.is_some(),
                "childless non-terminal node left behind"
            );

            if let Some(low) = node.low {
                stack.push((low, lo, Some(node.byte), prefix.clone()));
            }
            if let Some(high) = node.high {
                stack.push((high, Some(node.byte), hi, prefix.clone()));
            }
            if let Some(mid) = node.mid {
                stack.push((mid, None, None, path));
            }
        }

        assert_eq!(terminals, self.len, "terminal count differs from len");
        assert_eq!(reachable, self.arena.live(), "unreachable nodes");
        let stored = self.keys.iter().filter(|slot| slot.is_some()).count();
        assert_eq!(stored, self.len, "key slab out of sync");
    }
}

impl<K: StoredKey> Default for TernaryTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TernaryTree<&'a [u8]> {
    /// Inserts a key borrowed from the caller. The tree keeps only the
    /// reference.
    pub fn insert(&mut self, key: &'a [u8]) -> Result<Insertion> {
        self.insert_with(key, Ok)
    }

    /// Releases the tree structure. The borrowed key bytes are left
    /// untouched for the caller.
    pub fn release_structure(self) {
        drop(self);
    }
}

impl TernaryTree<Box<[u8]>> {
    /// Inserts a private copy of `key`.
    pub fn insert(&mut self, key: &[u8]) -> Result<Insertion> {
        self.insert_with(key, copy_key)
    }

    /// Releases the tree structure together with every owned key copy.
    pub fn release_all(self) {
        drop(self);
    }
}

/// Checks the key constraints shared by every insert.
pub(crate) fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(TreeError::EmptyKey);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(TreeError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_LEN,
        });
    }
    if let Some(position) = key.iter().position(|&b| b == 0) {
        return Err(TreeError::EmbeddedTerminator { position });
    }
    Ok(())
}
