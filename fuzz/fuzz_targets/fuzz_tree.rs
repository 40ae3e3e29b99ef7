#![no_main]

use std::collections::BTreeSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use prefix_dict::tree::{OwnedTree, TreeError, MAX_KEY_LEN};

#[derive(Arbitrary, Debug)]
struct TreeInput {
    operations: Vec<TreeOp>,
}

#[derive(Arbitrary, Debug)]
enum TreeOp {
    Insert { key: Vec<u8> },
    Search { key: Vec<u8> },
    Remove { key: Vec<u8> },
    Prefix { prefix: Vec<u8>, capacity: u8 },
    Len,
}

fn is_valid(key: &[u8]) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LEN && !key.contains(&0)
}

fuzz_target!(|input: TreeInput| {
    if input.operations.len() > 500 {
        return;
    }

    let mut tree = OwnedTree::new();
    let mut expected: BTreeSet<Vec<u8>> = BTreeSet::new();

    for op in input.operations {
        match op {
            TreeOp::Insert { key } => {
                let result = tree.insert(&key);
                if is_valid(&key) {
                    let outcome = result.expect("valid key rejected");
                    assert_eq!(outcome.is_new(), expected.insert(key));
                } else {
                    assert!(result.is_err());
                }
            }
            TreeOp::Search { key } => {
                let result = tree.search(&key);
                if expected.contains(&key) {
                    let handle = result.expect("stored key not found");
                    assert_eq!(tree.resolve(handle), Some(key.as_slice()));
                } else {
                    assert_eq!(result, Err(TreeError::NotFound));
                }
            }
            TreeOp::Remove { key } => {
                let result = tree.remove(&key);
                assert_eq!(result.is_ok(), expected.remove(&key));
                assert!(!tree.contains(&key));
            }
            TreeOp::Prefix { prefix, capacity } => {
                let capacity = capacity as usize;
                let want: Vec<&[u8]> = expected
                    .iter()
                    .filter(|k| k.starts_with(&prefix))
                    .map(|k| k.as_slice())
                    .collect();
                match tree.search_prefix(&prefix, capacity) {
                    Ok(matches) => {
                        assert_eq!(matches.keys(), &want[..want.len().min(capacity)]);
                        assert_eq!(matches.is_truncated(), want.len() > capacity);
                    }
                    Err(err) => {
                        assert_eq!(err, TreeError::NotFound);
                        assert!(want.is_empty());
                    }
                }
            }
            TreeOp::Len => {
                assert_eq!(tree.len(), expected.len());
            }
        }
    }

    let keys: Vec<&[u8]> = tree.keys();
    let want: Vec<&[u8]> = expected.iter().map(|k| k.as_slice()).collect();
    assert_eq!(keys, want);
});
