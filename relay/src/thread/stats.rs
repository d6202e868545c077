use std::sync::atomic::{AtomicU64, Ordering};

/// Per-worker counters, shared between the worker thread and its handle.
#[derive(Debug, Default)]
pub struct WorkerStats {
    received: AtomicU64,
    dispatched: AtomicU64,
    unhandled: AtomicU64,
    malformed: AtomicU64,
    panics: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Packets taken off the inbox by the worker loop
    pub received: u64,
    /// Packets decoded and handled
    pub dispatched: u64,
    /// Packets with no registered handler
    pub unhandled: u64,
    /// Packets that failed to decode
    pub malformed: u64,
    /// Handler panics caught by the worker loop
    pub panics: u64,
    /// Pushes refused by the inbox
    pub rejected: u64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unhandled(&self) {
        self.unhandled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            unhandled: self.unhandled.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Field-wise sum, used for pool totals.
    pub fn merge(self, other: StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received + other.received,
            dispatched: self.dispatched + other.dispatched,
            unhandled: self.unhandled + other.unhandled,
            malformed: self.malformed + other.malformed,
            panics: self.panics + other.panics,
            rejected: self.rejected + other.rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_merge() {
        let stats = WorkerStats::new();
        stats.record_received();
        stats.record_received();
        stats.record_dispatched();
        stats.record_malformed();
        stats.record_rejected();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.dispatched, 1);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.unhandled, 0);
        assert_eq!(snapshot.rejected, 1);

        let total = snapshot.merge(snapshot);
        assert_eq!(total.received, 4);
        assert_eq!(total.panics, 0);
    }
}
