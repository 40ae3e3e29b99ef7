//! Basic usage example for prefix_dict
//!
//! This example demonstrates building a dictionary, routing lookups through
//! each filter and enumerating keys by prefix.
//!
//! Run with: RUST_LOG=prefix_dict=debug cargo run --example basic_usage

use prefix_dict::dict::DictError;
use prefix_dict::{DictConfig, Lookup, LookupFilter, OwnedDictionary};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CITIES: &[&str] = &[
    "Taipei", "New Taipei", "Taoyuan", "Taichung", "Tainan", "Kaohsiung", "Keelung", "Hsinchu",
    "Miaoli", "Changhua", "Nantou", "Yunlin", "Chiayi", "Pingtung", "Yilan", "Hualien", "Taitung",
    "Penghu", "Kinmen", "Lienchiang",
];

fn main() -> Result<(), DictError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== prefix_dict Basic Usage ===\n");

    // 1. Build a dictionary that owns its keys
    let config = DictConfig::new().with_bloom(1 << 16, 3);
    let mut dict = OwnedDictionary::with_config(config)?;
    let added = dict.load(CITIES)?;
    println!("Loaded {} cities", added);
    println!(
        "Bloom filter estimate: {:.4}% false positives\n",
        dict.estimated_false_positive_rate() * 100.0
    );

    // 2. Freeze a static filter over the current keys
    dict.rebuild_static_filter()?;
    if let Some(xor) = dict.static_filter() {
        println!(
            "Static filter: {} keys, {} slots, {:.2} bits/key\n",
            xor.len(),
            xor.slots(),
            xor.bits_per_entry()
        );
    }

    // 3. Route lookups through each filter
    for probe in ["Tainan", "Tokyo"] {
        for filter in [LookupFilter::None, LookupFilter::Bloom, LookupFilter::Xor] {
            let outcome = match dict.lookup_via(probe.as_bytes(), filter)? {
                Lookup::Found(handle) => format!("found (handle {})", handle.raw()),
                Lookup::Rejected => "rejected by filter".to_string(),
                Lookup::FalsePositive => "filter false positive".to_string(),
                Lookup::Absent => "absent".to_string(),
            };
            println!("  {:<8} via {:<5?} -> {}", probe, filter, outcome);
        }
    }

    // 4. Prefix search
    println!("\nCities starting with \"Tai\":");
    let matches = dict.search_prefix(b"Tai", 3)?;
    for key in matches.iter() {
        println!("  {}", String::from_utf8_lossy(key));
    }
    if matches.is_truncated() {
        println!("  ...");
    }

    // 5. Removal only touches the tree
    dict.remove(b"Tainan")?;
    println!(
        "\nAfter removing Tainan: contains = {}, xor lookup = {:?}",
        dict.contains(b"Tainan"),
        dict.lookup_via(b"Tainan", LookupFilter::Xor)?
    );

    println!("\n{}", dict.metrics());
    dict.release_all();
    Ok(())
}
