//! Metrics registry for lineagedb
//!
//! Per LINEAGE.md §8:
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics registry containing all operational counters
///
/// Per LINEAGE.md §8, all values are exact.
///
/// # Thread Safety
///
/// All counters use atomic operations for thread-safe increments.
/// Uses Relaxed ordering for minimal overhead (eventual consistency is fine for metrics).
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Captures that produced a block
    captures_completed: AtomicU64,
    /// Captures flagged partial (degraded lineage)
    captures_partial: AtomicU64,
    /// Captures where no block could be built
    capture_failures: AtomicU64,
    /// Total lineage edges materialized into blocks
    edges_emitted: AtomicU64,
    /// Total synthetic tids interned into side tables
    synthetics_interned: AtomicU64,
    /// Operators skipped for lack of a propagation rule
    operators_skipped: AtomicU64,
    /// Scans over relations without stable row identity
    identities_unavailable: AtomicU64,
    /// Blocks stored in a registry
    blocks_stored: AtomicU64,
    /// Blocks read from a registry
    blocks_read: AtomicU64,
    /// Blocks evicted from a registry
    blocks_evicted: AtomicU64,
    /// Blocks serialized to a writer
    blocks_exported: AtomicU64,
    /// What-if evaluations completed
    whatif_evaluations: AtomicU64,
    /// What-if evaluations rejected
    whatif_rejections: AtomicU64,
    /// Blocks currently held (current value, not monotonic)
    blocks_live: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Capture metrics

    /// Increment completed captures
    pub fn increment_captures_completed(&self) {
        self.captures_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment partial captures
    pub fn increment_captures_partial(&self) {
        self.captures_partial.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment capture failures
    pub fn increment_capture_failures(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Add materialized edges
    pub fn add_edges_emitted(&self, edges: u64) {
        self.edges_emitted.fetch_add(edges, Ordering::Relaxed);
    }

    /// Add interned synthetic tids
    pub fn add_synthetics_interned(&self, count: u64) {
        self.synthetics_interned.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment skipped operators
    pub fn increment_operators_skipped(&self) {
        self.operators_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment unavailable-identity scans
    pub fn increment_identities_unavailable(&self) {
        self.identities_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total edges emitted
    pub fn edges_emitted(&self) -> u64 {
        self.edges_emitted.load(Ordering::Relaxed)
    }

    // Block registry metrics

    /// Increment stored blocks
    pub fn increment_blocks_stored(&self) {
        self.blocks_stored.fetch_add(1, Ordering::Relaxed);
        self.blocks_live.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment block reads
    pub fn increment_blocks_read(&self) {
        self.blocks_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment evicted blocks
    pub fn increment_blocks_evicted(&self) {
        self.blocks_evicted.fetch_add(1, Ordering::Relaxed);
        self.blocks_live.fetch_sub(1, Ordering::Relaxed);
    }

    /// Increment exported blocks
    pub fn increment_blocks_exported(&self) {
        self.blocks_exported.fetch_add(1, Ordering::Relaxed);
    }

    // What-if metrics

    /// Increment completed evaluations
    pub fn increment_whatif_evaluations(&self) {
        self.whatif_evaluations.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment rejected evaluations
    pub fn increment_whatif_rejections(&self) {
        self.whatif_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    ///
    /// Per LINEAGE.md §8, returns exact values.
    pub fn to_json(&self) -> String {
        format!(
            r#"{{"captures_completed":{},"captures_partial":{},"capture_failures":{},"edges_emitted":{},"synthetics_interned":{},"operators_skipped":{},"identities_unavailable":{},"blocks_stored":{},"blocks_read":{},"blocks_evicted":{},"blocks_exported":{},"whatif_evaluations":{},"whatif_rejections":{},"blocks_live":{}}}"#,
            self.captures_completed.load(Ordering::Relaxed),
            self.captures_partial.load(Ordering::Relaxed),
            self.capture_failures.load(Ordering::Relaxed),
            self.edges_emitted.load(Ordering::Relaxed),
            self.synthetics_interned.load(Ordering::Relaxed),
            self.operators_skipped.load(Ordering::Relaxed),
            self.identities_unavailable.load(Ordering::Relaxed),
            self.blocks_stored.load(Ordering::Relaxed),
            self.blocks_read.load(Ordering::Relaxed),
            self.blocks_evicted.load(Ordering::Relaxed),
            self.blocks_exported.load(Ordering::Relaxed),
            self.whatif_evaluations.load(Ordering::Relaxed),
            self.whatif_rejections.load(Ordering::Relaxed),
            self.blocks_live.load(Ordering::Relaxed),
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            captures_completed: self.captures_completed.load(Ordering::Relaxed),
            captures_partial: self.captures_partial.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            edges_emitted: self.edges_emitted.load(Ordering::Relaxed),
            synthetics_interned: self.synthetics_interned.load(Ordering::Relaxed),
            operators_skipped: self.operators_skipped.load(Ordering::Relaxed),
            identities_unavailable: self.identities_unavailable.load(Ordering::Relaxed),
            blocks_stored: self.blocks_stored.load(Ordering::Relaxed),
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_evicted: self.blocks_evicted.load(Ordering::Relaxed),
            blocks_exported: self.blocks_exported.load(Ordering::Relaxed),
            whatif_evaluations: self.whatif_evaluations.load(Ordering::Relaxed),
            whatif_rejections: self.whatif_rejections.load(Ordering::Relaxed),
            blocks_live: self.blocks_live.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub captures_completed: u64,
    pub captures_partial: u64,
    pub capture_failures: u64,
    pub edges_emitted: u64,
    pub synthetics_interned: u64,
    pub operators_skipped: u64,
    pub identities_unavailable: u64,
    pub blocks_stored: u64,
    pub blocks_read: u64,
    pub blocks_evicted: u64,
    pub blocks_exported: u64,
    pub whatif_evaluations: u64,
    pub whatif_rejections: u64,
    pub blocks_live: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let registry = MetricsRegistry::new();
        let snapshot = registry.snapshot();

        assert_eq!(snapshot.captures_completed, 0);
        assert_eq!(snapshot.edges_emitted, 0);
        assert_eq!(snapshot.blocks_stored, 0);
        assert_eq!(snapshot.whatif_evaluations, 0);
    }

    #[test]
    fn test_add_edges_emitted() {
        let registry = MetricsRegistry::new();

        registry.add_edges_emitted(100);
        assert_eq!(registry.edges_emitted(), 100);

        registry.add_edges_emitted(50);
        assert_eq!(registry.edges_emitted(), 150);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_captures_completed();
        registry.increment_captures_completed();
        registry.increment_captures_partial();
        registry.increment_capture_failures();
        registry.increment_operators_skipped();
        registry.increment_identities_unavailable();
        registry.increment_blocks_read();
        registry.increment_blocks_exported();
        registry.increment_whatif_evaluations();
        registry.increment_whatif_rejections();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.captures_completed, 2);
        assert_eq!(snapshot.captures_partial, 1);
        assert_eq!(snapshot.capture_failures, 1);
        assert_eq!(snapshot.operators_skipped, 1);
        assert_eq!(snapshot.identities_unavailable, 1);
        assert_eq!(snapshot.blocks_read, 1);
        assert_eq!(snapshot.blocks_exported, 1);
        assert_eq!(snapshot.whatif_evaluations, 1);
        assert_eq!(snapshot.whatif_rejections, 1);
    }

    #[test]
    fn test_blocks_live_tracks_store_and_evict() {
        let registry = MetricsRegistry::new();

        registry.increment_blocks_stored();
        registry.increment_blocks_stored();
        assert_eq!(registry.snapshot().blocks_live, 2);

        registry.increment_blocks_evicted();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.blocks_live, 1);
        assert_eq!(snapshot.blocks_stored, 2);
        assert_eq!(snapshot.blocks_evicted, 1);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.add_edges_emitted(1234);
        registry.increment_whatif_evaluations();

        let json = registry.to_json();

        // Should be valid JSON
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["edges_emitted"], 1234);
        assert_eq!(parsed["whatif_evaluations"], 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];

        // Spawn multiple threads incrementing counters
        for _ in 0..10 {
            let reg = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    reg.add_synthetics_interned(1);
                    reg.increment_captures_completed();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.synthetics_interned, 1000);
        assert_eq!(snapshot.captures_completed, 1000);
    }

    #[test]
    fn test_monotonic_increase() {
        let registry = MetricsRegistry::new();

        let mut prev = registry.snapshot().edges_emitted;
        for _ in 0..10 {
            registry.add_edges_emitted(10);
            let current = registry.snapshot().edges_emitted;
            assert!(current >= prev);
            prev = current;
        }
    }
}
