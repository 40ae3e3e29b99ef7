//! Arena-backed tree nodes.
//!
//! Nodes refer to each other by [`NodeId`] index into an [`Arena`], so
//! removing a node can never leave a dangling reference behind; a released
//! slot is simply recycled by the next allocation.

use super::tst::TreeError;

/// Index of a node in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct NodeId(u32);

impl NodeId {
    /// Largest number of nodes an arena can address.
    pub(crate) const MAX: usize = u32::MAX as usize;

    #[inline]
    fn from_index(index: usize) -> Self {
        debug_assert!(index < Self::MAX);
        NodeId(index as u32)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable handle to a key stored in a tree.
///
/// Valid from the insert that returned it until that key is removed. After
/// removal the handle may be reused for a different key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct KeyHandle(u32);

impl KeyHandle {
    /// Largest number of key slots a tree can address.
    pub(crate) const MAX: usize = u32::MAX as usize;

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < Self::MAX);
        KeyHandle(index as u32)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw slot number.
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

/// One byte of comparison with low/high/mid children.
///
/// `key` is the terminal marker: set iff a stored key ends at this node.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) byte: u8,
    pub(crate) low: Option<NodeId>,
    pub(crate) high: Option<NodeId>,
    pub(crate) mid: Option<NodeId>,
    pub(crate) key: Option<KeyHandle>,
}

impl Node {
    pub(crate) fn new(byte: u8) -> Self {
        Self {
            byte,
            low: None,
            high: None,
            mid: None,
            key: None,
        }
    }
}

/// Where a child reference lives: the tree root or one of a node's three
/// child fields.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Link {
    Root,
    Low(NodeId),
    High(NodeId),
    Mid(NodeId),
}

/// Slab of nodes with a free list.
#[derive(Clone, Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Number of nodes currently in use.
    pub(crate) fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Makes room for `additional` allocations without exceeding `limit`
    /// live nodes. Nothing observable changes on failure.
    pub(crate) fn reserve(&mut self, additional: usize, limit: usize) -> Result<(), TreeError> {
        if self.live() + additional > limit {
            return Err(TreeError::AllocationFailure);
        }
        let fresh = additional.saturating_sub(self.free.len());
        self.nodes
            .try_reserve(fresh)
            .map_err(|_| TreeError::AllocationFailure)
    }

    /// Stores `node`, reusing a released slot when one is available.
    /// Callers reserve first.
    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                let id = NodeId::from_index(self.nodes.len());
                self.nodes.push(node);
                id
            }
        }
    }

    /// Returns a node's slot to the free list.
    pub(crate) fn release(&mut self, id: NodeId) {
        self.nodes[id.index()] = Node::new(0);
        self.free.push(id);
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_reuses_released_slots() {
        let mut arena = Arena::new();
        arena.reserve(2, usize::MAX).unwrap();
        let a = arena.alloc(Node::new(b'a'));
        let b = arena.alloc(Node::new(b'b'));
        assert_eq!(arena.live(), 2);

        arena.release(a);
        assert_eq!(arena.live(), 1);

        arena.reserve(1, usize::MAX).unwrap();
        let c = arena.alloc(Node::new(b'c'));
        assert_eq!(c, a);
        assert_eq!(arena.get(c).byte, b'c');
        assert_eq!(arena.get(b).byte, b'b');
    }

    #[test]
    fn test_arena_limit() {
        let mut arena = Arena::new();
        arena.reserve(3, 3).unwrap();
        for byte in 0..3 {
            arena.alloc(Node::new(byte));
        }
        assert_eq!(arena.reserve(1, 3), Err(TreeError::AllocationFailure));
        assert_eq!(arena.live(), 3);
    }

    #[test]
    fn test_key_handle_raw() {
        assert_eq!(KeyHandle::from_index(7).raw(), 7);
        assert_eq!(KeyHandle::from_index(7).index(), 7);
    }
}
