//! Integration tests for prefix_dict.

use rand::distributions::Alphanumeric;
use rand::prelude::*;
use rand::rngs::StdRng;

use prefix_dict::dict::MetricsSnapshot;
use prefix_dict::filter::{
    BloomFilter, ConstructionError, JenkinsHasher, Xor16, Xor8, XorBuilder,
};
use prefix_dict::tree::{BorrowedTree, OwnedTree, TreeError};
use prefix_dict::{DictConfig, Lookup, LookupFilter, OwnedDictionary, SharedDictionary};

fn random_words(rng: &mut StdRng, prefix: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let tail: String = (&mut *rng)
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            format!("{prefix}{i}-{tail}")
        })
        .collect()
}

#[test]
fn test_prefix_scenario_with_delete() {
    let mut tree = OwnedTree::new();
    for word in ["apple", "app", "apply"] {
        tree.insert(word.as_bytes()).unwrap();
    }

    let matches = tree.search_prefix(b"app", 10).unwrap();
    assert_eq!(matches.keys(), &[&b"app"[..], &b"apple"[..], &b"apply"[..]]);

    tree.remove(b"app").unwrap();
    assert_eq!(tree.search(b"app"), Err(TreeError::NotFound));

    let matches = tree.search_prefix(b"app", 10).unwrap();
    assert_eq!(matches.keys(), &[&b"apple"[..], &b"apply"[..]]);
}

#[test]
fn test_inserted_keys_are_found() {
    let mut rng = StdRng::seed_from_u64(7);
    let words = random_words(&mut rng, "w", 5_000);
    let strangers = random_words(&mut rng, "s", 1_000);

    let mut tree = BorrowedTree::new();
    for word in &words {
        assert!(tree.insert(word.as_bytes()).unwrap().is_new());
    }
    assert_eq!(tree.len(), words.len());

    for word in &words {
        let handle = tree.search(word.as_bytes()).unwrap();
        assert_eq!(tree.resolve(handle), Some(word.as_bytes()));
    }
    for stranger in &strangers {
        assert_eq!(tree.search(stranger.as_bytes()), Err(TreeError::NotFound));
    }
}

#[test]
fn test_delete_then_reinsert() {
    let mut tree = OwnedTree::new();
    let words = ["Taoyuan", "Taoyuan-Airport", "Tao"];
    for word in words {
        tree.insert(word.as_bytes()).unwrap();
    }

    for word in words {
        tree.remove(word.as_bytes()).unwrap();
        assert_eq!(tree.search(word.as_bytes()), Err(TreeError::NotFound));
        assert!(tree.insert(word.as_bytes()).unwrap().is_new());
        assert!(tree.contains(word.as_bytes()));
    }
    assert_eq!(tree.len(), words.len());
}

#[test]
fn test_sorted_enumeration() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut words = random_words(&mut rng, "", 2_000);

    let mut tree = OwnedTree::new();
    for word in &words {
        tree.insert(word.as_bytes()).unwrap();
    }

    words.sort();
    let keys: Vec<&[u8]> = tree.keys();
    let expected: Vec<&[u8]> = words.iter().map(|w| w.as_bytes()).collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_bloom_cat() {
    let mut bloom = BloomFilter::with_size(1000, 2);
    bloom.insert(b"cat");
    assert!(bloom.may_contain(b"cat"));
}

#[test]
fn test_bloom_false_positive_rate_matches_formula() {
    let mut rng = StdRng::seed_from_u64(42);
    let members = random_words(&mut rng, "member-", 500);
    let probes = random_words(&mut rng, "probe-", 10_000);

    let mut bloom = BloomFilter::with_size(1000, 2);
    for key in &members {
        bloom.insert(key.as_bytes());
    }
    for key in &members {
        assert!(bloom.may_contain(key.as_bytes()));
    }

    let false_positives = probes
        .iter()
        .filter(|p| bloom.may_contain(p.as_bytes()))
        .count();
    let observed = false_positives as f64 / probes.len() as f64;
    let predicted = bloom.estimated_false_positive_rate();

    assert!((predicted - 0.3996).abs() < 0.001, "predicted {predicted}");
    assert!(
        (observed - predicted).abs() < 0.06,
        "observed {observed}, predicted {predicted}"
    );
}

#[test]
fn test_xor8_large_build() {
    let keys: Vec<String> = (0..100_000).map(|i| format!("key-{i}")).collect();
    let filter = Xor8::from_keys(&keys).unwrap();

    assert_eq!(filter.len(), 100_000);
    for key in &keys {
        assert!(filter.contains(key.as_bytes()));
    }

    let probes = 100_000;
    let false_positives = (0..probes)
        .filter(|i| filter.contains(format!("probe-{i}").as_bytes()))
        .count();
    let observed = false_positives as f64 / probes as f64;

    assert!(
        (0.0025..0.0055).contains(&observed),
        "observed false positive rate {observed}"
    );
    assert!(filter.bits_per_entry() < 10.0);
}

#[test]
fn test_xor16_is_tighter() {
    let keys: Vec<String> = (0..20_000).map(|i| format!("city-{i}")).collect();
    let filter = Xor16::from_keys(&keys).unwrap();

    let false_positives = (0..20_000)
        .filter(|i| filter.contains(format!("town-{i}").as_bytes()))
        .count();
    assert!(false_positives <= 5, "{false_positives} false positives");
}

#[test]
fn test_xor_rejects_duplicates() {
    let keys = ["Hualien", "Taitung", "Hualien"];
    let result = XorBuilder::<u8, _>::allocate_with_hasher(keys.len(), JenkinsHasher)
        .unwrap()
        .populate(keys);
    assert_eq!(result.unwrap_err(), ConstructionError::DuplicateKeys);
}

#[test]
fn test_xor_rejects_overflow() {
    let result = XorBuilder::<u8>::allocate(2)
        .unwrap()
        .populate(["a", "b", "c"]);
    assert_eq!(
        result.unwrap_err(),
        ConstructionError::TooManyKeys { keys: 3, capacity: 2 }
    );
}

#[test]
fn test_dictionary_workflow() {
    let mut rng = StdRng::seed_from_u64(3);
    let words = random_words(&mut rng, "dict-", 3_000);
    let strangers = random_words(&mut rng, "none-", 3_000);

    let config = DictConfig::new().with_bloom(1 << 16, 4);
    let mut dict = OwnedDictionary::with_config(config).unwrap();
    assert_eq!(dict.load(&words).unwrap(), words.len());
    dict.rebuild_static_filter().unwrap();

    for filter in [LookupFilter::None, LookupFilter::Bloom, LookupFilter::Xor] {
        for word in &words {
            assert!(dict.lookup_via(word.as_bytes(), filter).unwrap().is_found());
        }
        for stranger in &strangers {
            let outcome = dict.lookup_via(stranger.as_bytes(), filter).unwrap();
            assert!(!outcome.is_found());
        }
    }

    let metrics = dict.metrics();
    assert_eq!(metrics.lookups, 18_000);
    assert_eq!(metrics.hits, 9_000);
    // Most strangers never reach the tree.
    assert!(metrics.bloom_rejections + metrics.xor_rejections > 5_500);
    assert_eq!(
        metrics.bloom_rejections + metrics.xor_rejections + metrics.false_positives,
        6_000
    );

    // Deleted keys linger in both filters but never in the tree.
    let gone = &words[0];
    dict.remove(gone.as_bytes()).unwrap();
    assert!(!dict.contains(gone.as_bytes()));
    assert_eq!(
        dict.lookup_via(gone.as_bytes(), LookupFilter::Xor).unwrap(),
        Lookup::FalsePositive
    );

    dict.rebuild_bloom();
    dict.rebuild_static_filter().unwrap();
    assert_eq!(dict.static_filter().unwrap().len(), words.len() - 1);
    assert_eq!(dict.bloom().count(), words.len() - 1);
}

#[test]
fn test_metrics_diff_between_phases() {
    let mut dict = OwnedDictionary::with_config(DictConfig::new().with_bloom(4096, 2)).unwrap();
    dict.load(["north", "south"]).unwrap();
    let before = dict.metrics();

    dict.lookup(b"north").unwrap();
    dict.lookup(b"east").unwrap();
    let delta = dict.metrics().diff(&before);

    assert_eq!(
        delta,
        MetricsSnapshot {
            lookups: 2,
            hits: 1,
            ..Default::default()
        }
    );
}

#[test]
fn test_shared_dictionary_across_threads() {
    let dict = SharedDictionary::with_config(DictConfig::new().with_bloom(1 << 15, 3)).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let dict = dict.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    dict.insert(format!("t{t}-{i}").as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(dict.len(), 400);
    let matches = dict.search_prefix(b"t2-", 1_000).unwrap();
    assert_eq!(matches.keys.len(), 100);
    assert!(!matches.truncated);
}
