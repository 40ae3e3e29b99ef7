//! Key ownership modes.
//!
//! A tree either borrows every key from the caller (`&'a [u8]`) or owns a
//! private copy of each (`Box<[u8]>`). The mode is the tree's type
//! parameter, so it is fixed at construction and cannot be mixed.

use super::tst::{Result, TernaryTree, TreeError};

/// Which side owns the key bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnershipMode {
    /// The tree references caller memory and never frees it.
    Borrowed,
    /// The tree allocates, owns and frees its own copies.
    Owned,
}

mod sealed {
    pub trait Sealed {}
    impl<'a> Sealed for &'a [u8] {}
    impl Sealed for Box<[u8]> {}
}

/// Storage form of a key inside a [`TernaryTree`].
pub trait StoredKey: AsRef<[u8]> + sealed::Sealed {
    /// The ownership mode this storage form implies.
    const MODE: OwnershipMode;
}

impl<'a> StoredKey for &'a [u8] {
    const MODE: OwnershipMode = OwnershipMode::Borrowed;
}

impl StoredKey for Box<[u8]> {
    const MODE: OwnershipMode = OwnershipMode::Owned;
}

/// A tree that references keys owned by the caller.
pub type BorrowedTree<'a> = TernaryTree<&'a [u8]>;

/// A tree that owns copies of its keys.
pub type OwnedTree = TernaryTree<Box<[u8]>>;

/// Copies `key` into a fresh allocation, reporting exhaustion as an error.
pub(crate) fn copy_key(key: &[u8]) -> Result<Box<[u8]>> {
    let mut owned = Vec::new();
    owned
        .try_reserve_exact(key.len())
        .map_err(|_| TreeError::AllocationFailure)?;
    owned.extend_from_slice(key);
    Ok(owned.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        assert_eq!(<&[u8] as StoredKey>::MODE, OwnershipMode::Borrowed);
        assert_eq!(<Box<[u8]> as StoredKey>::MODE, OwnershipMode::Owned);
    }

    #[test]
    fn test_copy_key_is_independent() {
        let mut source = b"Hsinchu".to_vec();
        let copy = copy_key(&source).unwrap();
        source[0] = b'X';
        assert_eq!(&*copy, b"Hsinchu");
    }
}
