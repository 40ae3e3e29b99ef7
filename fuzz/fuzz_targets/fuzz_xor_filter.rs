#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use prefix_dict::filter::{ConstructionError, XorBuilder};

#[derive(Arbitrary, Debug)]
struct XorInput {
    hashes: Vec<u64>,
    seed: u64,
    probes: Vec<u64>,
}

fuzz_target!(|input: XorInput| {
    if input.hashes.len() > 10_000 {
        return;
    }

    let mut unique = input.hashes.clone();
    unique.sort_unstable();
    unique.dedup();
    let has_duplicates = unique.len() != input.hashes.len();

    let builder = XorBuilder::<u8>::allocate(input.hashes.len())
        .expect("allocation failed")
        .with_seed(input.seed);

    match builder.populate_hashes(&input.hashes) {
        Ok(filter) => {
            assert!(!has_duplicates, "duplicate hashes accepted");
            assert_eq!(filter.len(), input.hashes.len());
            for &hash in &input.hashes {
                assert!(filter.contains_hash(hash), "false negative for {hash:#x}");
            }
            for &probe in &input.probes {
                let _ = filter.contains_hash(probe);
            }
        }
        Err(ConstructionError::DuplicateKeys) => assert!(has_duplicates),
        Err(ConstructionError::RetriesExhausted { .. }) => {}
        Err(err) => panic!("unexpected construction error: {err}"),
    }
});
