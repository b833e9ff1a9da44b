//! Stats Module - Collector Performance Monitoring
//!
//! Running totals over every completed cycle, used for:
//! - Performance tuning
//! - Production monitoring
//! - Tests asserting that collection actually happened
//!
//! Metrics:
//! - Cycle count
//! - Records marked, words rejected
//! - Pages and words reclaimed
//! - Pause time (last, max, total)

pub mod timer;

pub use timer::GcTimer;

use crate::gc::CycleReport;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// CollectorStats - lock-free counters shared by every cycle
#[derive(Debug, Default)]
pub struct CollectorStats {
    cycles: AtomicU64,
    marked: AtomicU64,
    rejected: AtomicU64,
    pages_freed: AtomicU64,
    words_freed: AtomicU64,
    last_pause_ns: AtomicU64,
    max_pause_ns: AtomicU64,
    total_pause_ns: AtomicU64,
}

impl CollectorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished cycle into the totals
    pub fn record_cycle(&self, report: &CycleReport) {
        let pause = report.duration.as_nanos() as u64;

        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.marked.fetch_add(report.marked as u64, Ordering::Relaxed);
        self.rejected
            .fetch_add(report.rejected as u64, Ordering::Relaxed);
        self.pages_freed
            .fetch_add(report.pages_freed as u64, Ordering::Relaxed);
        self.words_freed
            .fetch_add(report.words_freed as u64, Ordering::Relaxed);
        self.last_pause_ns.store(pause, Ordering::Relaxed);
        self.max_pause_ns.fetch_max(pause, Ordering::Relaxed);
        self.total_pause_ns.fetch_add(pause, Ordering::Relaxed);
    }

    /// Completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        let cycles = self.cycles();
        let total_pause_ms = nanos_to_ms(self.total_pause_ns.load(Ordering::Relaxed));
        StatsSnapshot {
            cycles,
            marked: self.marked.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pages_freed: self.pages_freed.load(Ordering::Relaxed),
            words_freed: self.words_freed.load(Ordering::Relaxed),
            last_pause_ms: nanos_to_ms(self.last_pause_ns.load(Ordering::Relaxed)),
            max_pause_ms: nanos_to_ms(self.max_pause_ns.load(Ordering::Relaxed)),
            avg_pause_ms: if cycles == 0 {
                0.0
            } else {
                total_pause_ms / cycles as f64
            },
        }
    }

    /// Reset statistics
    pub fn reset(&self) {
        for counter in [
            &self.cycles,
            &self.marked,
            &self.rejected,
            &self.pages_freed,
            &self.words_freed,
            &self.last_pause_ns,
            &self.max_pause_ns,
            &self.total_pause_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

fn nanos_to_ms(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000.0
}

/// Summary statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub marked: u64,
    pub rejected: u64,
    pub pages_freed: u64,
    pub words_freed: u64,
    pub last_pause_ms: f64,
    pub max_pause_ms: f64,
    pub avg_pause_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Colour;
    use std::time::Duration;

    fn report(marked: usize, pages_freed: usize, millis: u64) -> CycleReport {
        CycleReport {
            cycle: 1,
            epoch: Colour::Blue,
            threads: 1,
            marked,
            rejected: 0,
            max_mark_stack: 1,
            pages_freed,
            words_freed: pages_freed * 64,
            duration: Duration::from_millis(millis),
        }
    }

    #[test]
    fn test_totals_accumulate() {
        let stats = CollectorStats::new();
        stats.record_cycle(&report(10, 1, 4));
        stats.record_cycle(&report(5, 2, 2));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cycles, 2);
        assert_eq!(snapshot.marked, 15);
        assert_eq!(snapshot.pages_freed, 3);
        assert_eq!(snapshot.words_freed, 192);
        assert_eq!(snapshot.last_pause_ms, 2.0);
        assert_eq!(snapshot.max_pause_ms, 4.0);
        assert_eq!(snapshot.avg_pause_ms, 3.0);
    }

    #[test]
    fn test_reset() {
        let stats = CollectorStats::new();
        stats.record_cycle(&report(1, 1, 1));
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
