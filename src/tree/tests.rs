//! Property-based tests for the ternary search tree.

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    use crate::tree::{BorrowedTree, OwnedTree, TreeError};

    /// Non-empty keys without NUL over a small alphabet so that keys share
    /// prefixes often.
    fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(b'a'..=b'e', 1..8)
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(Vec<u8>),
        Remove(Vec<u8>),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => key_strategy().prop_map(Op::Insert),
            2 => key_strategy().prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn tree_matches_model(ops in proptest::collection::vec(op_strategy(), 1..200)) {
            let mut tree = OwnedTree::new();
            let mut model = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Insert(key) => {
                        let outcome = tree.insert(&key).unwrap();
                        prop_assert_eq!(outcome.is_new(), model.insert(key));
                    }
                    Op::Remove(key) => {
                        let removed = tree.remove(&key);
                        if model.remove(&key) {
                            prop_assert_eq!(removed, Ok(()));
                        } else {
                            prop_assert_eq!(removed, Err(TreeError::NotFound));
                        }
                    }
                }
                tree.check_invariants();
            }

            prop_assert_eq!(tree.len(), model.len());
            let keys: Vec<Vec<u8>> = tree.keys().into_iter().map(|k| k.to_vec()).collect();
            let expected: Vec<Vec<u8>> = model.into_iter().collect();
            prop_assert_eq!(keys, expected);
        }

        #[test]
        fn prefix_search_matches_model(
            keys in proptest::collection::btree_set(key_strategy(), 1..100),
            prefix in proptest::collection::vec(b'a'..=b'e', 0..3),
            capacity in 0usize..40
        ) {
            let mut tree = BorrowedTree::new();
            for key in &keys {
                tree.insert(key).unwrap();
            }

            let expected: Vec<&[u8]> = keys
                .iter()
                .filter(|k| k.starts_with(&prefix))
                .map(|k| k.as_slice())
                .collect();

            match tree.search_prefix(&prefix, capacity) {
                Ok(matches) => {
                    let take = expected.len().min(capacity);
                    prop_assert_eq!(matches.keys(), &expected[..take]);
                    prop_assert_eq!(matches.is_truncated(), expected.len() > capacity);
                }
                Err(err) => {
                    prop_assert_eq!(err, TreeError::NotFound);
                    prop_assert!(expected.is_empty());
                }
            }
        }

        #[test]
        fn insertion_order_does_not_change_contents(
            keys in proptest::collection::vec(key_strategy(), 1..60)
        ) {
            let mut forward = OwnedTree::new();
            let mut backward = OwnedTree::new();
            for key in &keys {
                forward.insert(key).unwrap();
            }
            for key in keys.iter().rev() {
                backward.insert(key).unwrap();
            }
            prop_assert_eq!(forward.keys(), backward.keys());
        }

        #[test]
        fn removing_everything_frees_every_node(
            keys in proptest::collection::btree_set(key_strategy(), 1..80)
        ) {
            let mut tree = OwnedTree::new();
            for key in &keys {
                tree.insert(key).unwrap();
            }
            for key in keys.iter().rev() {
                tree.remove(key).unwrap();
            }
            prop_assert!(tree.is_empty());
            prop_assert_eq!(tree.node_count(), 0);
        }
    }
}
