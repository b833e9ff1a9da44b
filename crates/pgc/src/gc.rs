//! GC Core Module - Garbage Collection Cycle Management
//!
//! Implements the stop-the-heaps mark-and-sweep cycle over every registered
//! thread, and the background task that repeats it.
//!
//! Cycle:
//! ```text
//! lock cycle mutex
//!   └─ lock every heap (registry order)
//!        └─ flip epoch
//!        └─ snapshot each chain's last page
//!        └─ mark  ── pgc-mark-0 … pgc-mark-N  (joined)
//!        └─ sweep ── pgc-sweep-0 … pgc-sweep-N (joined)
//!   └─ unlock heaps
//! unlock cycle mutex
//! ```
//!
//! Mutators touching their heap during a cycle block at that call until the
//! cycle ends, so each worker sees a consistent root table and object graph.

use crate::allocator::Allocator;
use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::logging::{GcEvent, GcLogger};
use crate::marker::{mark_heap, MarkStats};
use crate::object::Colour;
use crate::runtime::ThreadRuntime;
use crate::stats::{CollectorStats, GcTimer};
use crate::sweep::{sweep_heap, SweepStats};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Epoch colour shared by the collector and every allocator
///
/// Flipped once per cycle while every heap is locked; allocators read it to
/// stain new records and pages.
#[derive(Debug)]
pub struct Epoch(AtomicU8);

impl Epoch {
    pub fn new(colour: Colour) -> Self {
        Self(AtomicU8::new(colour as u8))
    }

    #[inline]
    pub fn current(&self) -> Colour {
        Colour::from_bit(self.0.load(Ordering::Acquire) as usize)
    }

    /// Switch to the other colour and return it
    pub fn flip(&self) -> Colour {
        let previous = self.0.fetch_xor(1, Ordering::AcqRel);
        Colour::from_bit(previous as usize).flipped()
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new(Colour::Blue)
    }
}

/// GC cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GcState {
    /// No cycle in progress
    Idle,
    /// Marking every heap
    Marking,
    /// Sweeping every heap
    Sweeping,
}

/// Result of one collection cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    /// Colour everything reachable was stained with
    pub epoch: Colour,
    /// Heaps collected
    pub threads: usize,
    pub marked: usize,
    pub rejected: usize,
    pub max_mark_stack: usize,
    pub pages_freed: usize,
    pub words_freed: usize,
    /// Wall time with every heap locked
    pub duration: Duration,
}

/// Collector - serializes cycles and owns the epoch
pub struct Collector {
    config: Arc<GcConfig>,

    /// Shared with every allocator
    epoch: Arc<Epoch>,

    /// Held for a whole cycle; guards the cycle counter
    cycle_lock: Mutex<u64>,

    state: Mutex<GcState>,

    stats: CollectorStats,

    logger: Arc<GcLogger>,
}

impl Collector {
    pub fn new(config: Arc<GcConfig>, logger: Arc<GcLogger>) -> Self {
        Self {
            config,
            epoch: Arc::new(Epoch::default()),
            cycle_lock: Mutex::new(0),
            state: Mutex::new(GcState::Idle),
            stats: CollectorStats::new(),
            logger,
        }
    }

    pub fn epoch(&self) -> &Arc<Epoch> {
        &self.epoch
    }

    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    pub fn logger(&self) -> &Arc<GcLogger> {
        &self.logger
    }

    pub fn state(&self) -> GcState {
        *self.state.lock()
    }

    /// Completed cycles
    pub fn cycle_count(&self) -> u64 {
        self.stats.cycles()
    }

    /// Run one full cycle over `threads`
    ///
    /// The caller must not hold any of the threads' heap locks.
    ///
    /// # Errors
    /// `ThreadSpawn` when a worker could not be started, `Internal` when a
    /// worker panicked. Heaps are unlocked either way.
    pub fn collect(&self, threads: &[Arc<ThreadRuntime>]) -> Result<CycleReport> {
        let mut cycle = self.cycle_lock.lock();
        *cycle += 1;

        let mut guards: Vec<MutexGuard<'_, Allocator>> =
            threads.iter().map(|thread| thread.lock_allocator()).collect();

        let timer = GcTimer::new();
        let epoch = self.epoch.flip();
        self.logger.log(GcEvent::CycleStart {
            cycle: *cycle,
            epoch,
            threads: guards.len(),
        });

        let ends: Vec<usize> = guards.iter().map(|a| a.heap().last_page()).collect();
        let mut heaps: Vec<&mut Allocator> = guards.iter_mut().map(|a| &mut **a).collect();

        let outcome = self.run_phases(*cycle, epoch, &ends, &mut heaps);
        *self.state.lock() = GcState::Idle;
        let (mark, sweep) = outcome?;

        let report = CycleReport {
            cycle: *cycle,
            epoch,
            threads: heaps.len(),
            marked: mark.marked,
            rejected: mark.rejected,
            max_mark_stack: mark.max_stack,
            pages_freed: sweep.pages_freed,
            words_freed: sweep.words_freed,
            duration: timer.elapsed(),
        };
        drop(heaps);
        drop(guards);

        self.finish_cycle(&report);
        Ok(report)
    }

    fn run_phases(
        &self,
        cycle: u64,
        epoch: Colour,
        ends: &[usize],
        heaps: &mut [&mut Allocator],
    ) -> Result<(MarkStats, SweepStats)> {
        let capacity = self.config.mark_stack_capacity;
        let mut timer = GcTimer::new();

        *self.state.lock() = GcState::Marking;
        let mark = fan_out("mark", heaps, |_, allocator| {
            mark_heap(allocator, epoch, capacity)
        })?
        .into_iter()
        .fold(MarkStats::default(), MarkStats::merge);
        self.phase_end(cycle, "mark", timer.lap());

        *self.state.lock() = GcState::Sweeping;
        let sweep = fan_out("sweep", heaps, |index, allocator| {
            sweep_heap(allocator, epoch, ends[index])
        })?
        .into_iter()
        .fold(SweepStats::default(), SweepStats::merge);
        self.phase_end(cycle, "sweep", timer.lap());

        Ok((mark, sweep))
    }

    fn phase_end(&self, cycle: u64, phase: &str, duration: Duration) {
        self.logger.log(GcEvent::PhaseEnd {
            cycle,
            phase: phase.to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
        });
    }

    /// Record stats and log completion
    fn finish_cycle(&self, report: &CycleReport) {
        self.stats.record_cycle(report);

        let duration_ms = report.duration.as_secs_f64() * 1000.0;
        self.logger.log(GcEvent::CycleEnd {
            cycle: report.cycle,
            duration_ms,
            marked: report.marked,
            pages_freed: report.pages_freed,
            words_freed: report.words_freed,
        });

        if self.config.verbose {
            log::info!(
                "GC cycle {} ({:?}): {} thread(s), marked {}, freed {} page(s) in {:.2}ms",
                report.cycle,
                report.epoch,
                report.threads,
                report.marked,
                report.pages_freed,
                duration_ms
            );
        } else {
            log::debug!(
                "GC cycle {}: marked {}, freed {} page(s) in {:.2}ms",
                report.cycle,
                report.marked,
                report.pages_freed,
                duration_ms
            );
        }
    }
}

/// Run `work` on every heap, one scoped worker thread per heap
fn fan_out<T, F>(phase: &str, heaps: &mut [&mut Allocator], work: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, &mut Allocator) -> T + Sync,
{
    let work = &work;
    crossbeam::thread::scope(|scope| {
        let mut workers = Vec::with_capacity(heaps.len());
        for (index, allocator) in heaps.iter_mut().enumerate() {
            let worker = scope
                .builder()
                .name(format!("pgc-{}-{}", phase, index))
                .spawn(move |_| work(index, &mut **allocator))
                .map_err(|e| GcError::ThreadSpawn(format!("{} worker {}: {}", phase, index, e)))?;
            workers.push(worker);
        }

        workers
            .into_iter()
            .enumerate()
            .map(|(index, worker)| {
                worker
                    .join()
                    .map_err(|_| GcError::Internal(format!("{} worker {} panicked", phase, index)))
            })
            .collect::<Result<Vec<T>>>()
    })
    .map_err(|_| GcError::Internal(format!("{} workers panicked", phase)))?
}

/// BackgroundCollector - the `pgc-collector` thread
///
/// Runs a cycle every interval until told to stop or until `cycle`
/// reports that the runtime is gone.
pub struct BackgroundCollector {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundCollector {
    /// Start the task
    ///
    /// `cycle` returns `None` once there is nothing left to collect for.
    pub fn start<F>(interval: Duration, mut cycle: F) -> Result<Self>
    where
        F: FnMut() -> Option<Result<CycleReport>> + Send + 'static,
    {
        let (shutdown, signal) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("pgc-collector".to_string())
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {},
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                match cycle() {
                    None => break,
                    Some(Ok(_)) => {},
                    Some(Err(e)) => log::error!("background GC cycle failed: {}", e),
                }
            })
            .map_err(|e| GcError::ThreadSpawn(format!("pgc-collector: {}", e)))?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Check if the task runs on the calling thread
    pub fn is_current_thread(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }

    /// Signal the task and wait for it; an in-flight cycle finishes first
    pub fn stop(mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("pgc-collector panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_epoch_flip_alternates() {
        let epoch = Epoch::default();
        assert_eq!(epoch.current(), Colour::Blue);
        assert_eq!(epoch.flip(), Colour::Green);
        assert_eq!(epoch.current(), Colour::Green);
        assert_eq!(epoch.flip(), Colour::Blue);
    }

    #[test]
    fn test_background_task_stops_on_signal() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = BackgroundCollector::start(Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(Err(GcError::Internal("test".into())))
        })
        .unwrap();

        while runs.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!task.is_current_thread());
        task.stop();

        let after = runs.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(runs.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_background_task_ends_when_cycle_says_so() {
        let task = BackgroundCollector::start(Duration::from_millis(1), || None).unwrap();
        // joins promptly because the loop already exited
        task.stop();
    }
}
