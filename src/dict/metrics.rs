//! Dictionary metrics for observability.
//!
//! Tracks how operations were routed across the tree and the filters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Dictionary metrics container.
///
/// All counters are atomic so read-only lookups can record them.
#[derive(Debug, Default)]
pub struct DictMetrics {
    /// Keys added to the tree.
    pub inserts: AtomicU64,
    /// Inserts of keys that were already stored.
    pub duplicate_inserts: AtomicU64,
    /// Inserts skipped by the Bloom pre-check.
    pub precheck_skips: AtomicU64,
    /// Keys removed from the tree.
    pub removals: AtomicU64,
    /// Lookups performed.
    pub lookups: AtomicU64,
    /// Lookups answered by the tree with a match.
    pub hits: AtomicU64,
    /// Lookups rejected by the Bloom filter.
    pub bloom_rejections: AtomicU64,
    /// Lookups rejected by the Xor filter.
    pub xor_rejections: AtomicU64,
    /// Lookups a filter passed that the tree then missed.
    pub false_positives: AtomicU64,
    /// Xor lookups that went straight to the tree because the filter was stale.
    pub stale_bypasses: AtomicU64,
    /// Successful static filter builds.
    pub static_builds: AtomicU64,
    /// Failed static filter builds.
    pub static_build_failures: AtomicU64,
}

impl DictMetrics {
    /// Creates a new metrics container.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_inserts(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicate_inserts(&self) {
        self.duplicate_inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_precheck_skips(&self) {
        self.precheck_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_removals(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lookups(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bloom_rejections(&self) {
        self.bloom_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_xor_rejections(&self) {
        self.xor_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_false_positives(&self) {
        self.false_positives.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stale_bypasses(&self) {
        self.stale_bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_static_builds(&self) {
        self.static_builds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_static_build_failures(&self) {
        self.static_build_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            duplicate_inserts: self.duplicate_inserts.load(Ordering::Relaxed),
            precheck_skips: self.precheck_skips.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            bloom_rejections: self.bloom_rejections.load(Ordering::Relaxed),
            xor_rejections: self.xor_rejections.load(Ordering::Relaxed),
            false_positives: self.false_positives.load(Ordering::Relaxed),
            stale_bypasses: self.stale_bypasses.load(Ordering::Relaxed),
            static_builds: self.static_builds.load(Ordering::Relaxed),
            static_build_failures: self.static_build_failures.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics to zero.
    pub fn reset(&self) {
        self.inserts.store(0, Ordering::Relaxed);
        self.duplicate_inserts.store(0, Ordering::Relaxed);
        self.precheck_skips.store(0, Ordering::Relaxed);
        self.removals.store(0, Ordering::Relaxed);
        self.lookups.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.bloom_rejections.store(0, Ordering::Relaxed);
        self.xor_rejections.store(0, Ordering::Relaxed);
        self.false_positives.store(0, Ordering::Relaxed);
        self.stale_bypasses.store(0, Ordering::Relaxed);
        self.static_builds.store(0, Ordering::Relaxed);
        self.static_build_failures.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of metrics values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub inserts: u64,
    pub duplicate_inserts: u64,
    pub precheck_skips: u64,
    pub removals: u64,
    pub lookups: u64,
    pub hits: u64,
    pub bloom_rejections: u64,
    pub xor_rejections: u64,
    pub false_positives: u64,
    pub stale_bypasses: u64,
    pub static_builds: u64,
    pub static_build_failures: u64,
}

impl MetricsSnapshot {
    /// Calculates the difference between two snapshots.
    pub fn diff(&self, other: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts.saturating_sub(other.inserts),
            duplicate_inserts: self.duplicate_inserts.saturating_sub(other.duplicate_inserts),
            precheck_skips: self.precheck_skips.saturating_sub(other.precheck_skips),
            removals: self.removals.saturating_sub(other.removals),
            lookups: self.lookups.saturating_sub(other.lookups),
            hits: self.hits.saturating_sub(other.hits),
            bloom_rejections: self.bloom_rejections.saturating_sub(other.bloom_rejections),
            xor_rejections: self.xor_rejections.saturating_sub(other.xor_rejections),
            false_positives: self.false_positives.saturating_sub(other.false_positives),
            stale_bypasses: self.stale_bypasses.saturating_sub(other.stale_bypasses),
            static_builds: self.static_builds.saturating_sub(other.static_builds),
            static_build_failures: self
                .static_build_failures
                .saturating_sub(other.static_build_failures),
        }
    }

    /// Returns the share of lookups a filter rejected without touching the
    /// tree (0.0 - 1.0).
    pub fn rejection_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            (self.bloom_rejections + self.xor_rejections) as f64 / self.lookups as f64
        }
    }

    /// Returns the share of filter-passed lookups the tree then missed.
    pub fn observed_false_positive_rate(&self) -> f64 {
        let passed = self.false_positives + self.hits;
        if passed == 0 {
            0.0
        } else {
            self.false_positives as f64 / passed as f64
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dictionary Metrics:")?;
        writeln!(f, "  Inserts:           {}", self.inserts)?;
        writeln!(f, "  Duplicate inserts: {}", self.duplicate_inserts)?;
        writeln!(f, "  Pre-check skips:   {}", self.precheck_skips)?;
        writeln!(f, "  Removals:          {}", self.removals)?;
        writeln!(f, "  Lookups:           {}", self.lookups)?;
        writeln!(f, "  Hits:              {}", self.hits)?;
        writeln!(
            f,
            "  Filter rejections: {} bloom, {} xor ({:.1}%)",
            self.bloom_rejections,
            self.xor_rejections,
            self.rejection_rate() * 100.0
        )?;
        writeln!(f, "  False positives:   {}", self.false_positives)?;
        writeln!(f, "  Stale bypasses:    {}", self.stale_bypasses)?;
        writeln!(
            f,
            "  Static builds:     {} ({} failed)",
            self.static_builds, self.static_build_failures
        )?;
        Ok(())
    }
}
