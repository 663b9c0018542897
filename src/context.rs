//! Process wide state shared by sources, workers and the monitor.
//!
//! Counters only move forward: they are incremented with relaxed atomics by exactly
//! one class of writer (sources for `queued`, workers for `processed` and `bad`)
//! and read by the monitor. Values read concurrently may be slightly stale.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub(crate) struct PipelineContext {
    started_at: Instant,
    queued: AtomicU64,
    processed: AtomicU64,
    bad: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CounterValues {
    pub(crate) queued: u64,
    pub(crate) processed: u64,
    pub(crate) bad: u64,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            queued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            bad: AtomicU64::new(0),
        }
    }

    pub(crate) fn started_at(&self) -> Instant {
        self.started_at
    }

    #[inline]
    pub(crate) fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_bad(&self) {
        self.bad.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CounterValues {
        CounterValues {
            queued: self.queued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            bad: self.bad.load(Ordering::Relaxed),
        }
    }
}
