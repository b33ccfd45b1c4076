//! Global atomic counters for eventnet observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    events_committed: AtomicU64,
    batches_sorted: AtomicU64,
    key_fallbacks: AtomicU64,
    render_fallbacks: AtomicU64,
    dereference_failures: AtomicU64,
    duplicates_dropped: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            events_committed: AtomicU64::new(0),
            batches_sorted: AtomicU64::new(0),
            key_fallbacks: AtomicU64::new(0),
            render_fallbacks: AtomicU64::new(0),
            dereference_failures: AtomicU64::new(0),
            duplicates_dropped: AtomicU64::new(0),
        }
    }

    pub fn inc_events_committed(&self) {
        self.events_committed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_committed", "counter incremented");
    }

    pub fn inc_batches_sorted(&self) {
        self.batches_sorted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "batches_sorted", "counter incremented");
    }

    /// Render or parse failure that degraded one sort key.
    pub fn inc_key_fallbacks(&self) {
        self.key_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "key_fallbacks", "counter incremented");
    }

    /// Agent template rendered as its literal text.
    pub fn inc_render_fallbacks(&self) {
        self.render_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "render_fallbacks", "counter incremented");
    }

    pub fn inc_dereference_failures(&self) {
        self.dereference_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "dereference_failures", "counter incremented");
    }

    pub fn inc_duplicates_dropped(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "duplicates_dropped", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a run) rather than on every
    /// increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            events_committed = self.events_committed(),
            batches_sorted = self.batches_sorted(),
            key_fallbacks = self.key_fallbacks(),
            render_fallbacks = self.render_fallbacks(),
            dereference_failures = self.dereference_failures(),
            duplicates_dropped = self.duplicates_dropped(),
        );
    }

    pub fn events_committed(&self) -> u64 {
        self.events_committed.load(Ordering::Relaxed)
    }

    pub fn batches_sorted(&self) -> u64 {
        self.batches_sorted.load(Ordering::Relaxed)
    }

    pub fn key_fallbacks(&self) -> u64 {
        self.key_fallbacks.load(Ordering::Relaxed)
    }

    pub fn render_fallbacks(&self) -> u64 {
        self.render_fallbacks.load(Ordering::Relaxed)
    }

    pub fn dereference_failures(&self) -> u64 {
        self.dereference_failures.load(Ordering::Relaxed)
    }

    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.events_committed.store(0, Ordering::Relaxed);
        self.batches_sorted.store(0, Ordering::Relaxed);
        self.key_fallbacks.store(0, Ordering::Relaxed);
        self.render_fallbacks.store(0, Ordering::Relaxed);
        self.dereference_failures.store(0, Ordering::Relaxed);
        self.duplicates_dropped.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_events_committed();
        m.inc_events_committed();
        assert_eq!(m.events_committed(), 2);

        m.inc_key_fallbacks();
        m.inc_render_fallbacks();
        m.inc_dereference_failures();
        m.inc_duplicates_dropped();
        m.inc_batches_sorted();
        assert_eq!(m.key_fallbacks(), 1);
        assert_eq!(m.render_fallbacks(), 1);
        assert_eq!(m.dereference_failures(), 1);
        assert_eq!(m.duplicates_dropped(), 1);
        assert_eq!(m.batches_sorted(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_events_committed();
        m.inc_key_fallbacks();
        m.reset();
        assert_eq!(m.events_committed(), 0);
        assert_eq!(m.key_fallbacks(), 0);
    }
}
