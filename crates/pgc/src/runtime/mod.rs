//! Runtime Module - GC Runtime Integration
//!
//! The runtime is the explicit context every mutator and the collector
//! share. It manages:
//! - The thread registry (main thread first)
//! - The collector and its background task
//! - Shutdown
//!
//! ```rust
//! use pgc::{GcConfig, Runtime, Type};
//!
//! static NODE: Type = Type::new("Node", 2, 1);
//!
//! let runtime = Runtime::new(GcConfig {
//!     background_collection: false,
//!     ..Default::default()
//! })?;
//! let main = runtime.main_thread()?;
//!
//! let head = main.alloc(&NODE)?;
//! let report = runtime.collect()?;
//! assert_eq!(report.marked, 1);
//! assert!(main.is_live(head));
//!
//! runtime.shutdown();
//! # Ok::<(), pgc::GcError>(())
//! ```

pub mod thread;

pub use thread::{ThreadHandle, ThreadRuntime};

use crate::allocator::Allocator;
use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::gc::{BackgroundCollector, Collector, CycleReport};
use crate::logging::GcLogger;
use crate::stats::StatsSnapshot;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

/// Runtime - GC runtime orchestrator
///
/// Cheap to clone; every clone and every `ThreadHandle` shares one state.
/// Shutdown runs explicitly through `shutdown` or when the last clone and
/// handle are dropped.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    config: Arc<GcConfig>,

    collector: Collector,

    /// Registered threads, main thread first
    registry: RwLock<Vec<Arc<ThreadRuntime>>>,

    main: Arc<ThreadRuntime>,

    main_taken: AtomicBool,

    next_thread_id: AtomicUsize,

    background: Mutex<Option<BackgroundCollector>>,

    shut_down: AtomicBool,
}

impl Runtime {
    /// Create a runtime, register the main thread and start collecting
    ///
    /// # Errors
    /// - `Configuration` when the configuration does not validate
    /// - `OutOfMemory` when the main thread's first page cannot be created
    /// - `ThreadSpawn` when the collector thread cannot be started
    pub fn new(config: GcConfig) -> Result<Self> {
        config.validate()?;

        let config = Arc::new(config);
        let logger = Arc::new(GcLogger::new(config.logger.clone()));
        let collector = Collector::new(config.clone(), logger.clone());
        let main = Arc::new(ThreadRuntime::new(
            0,
            Allocator::new(0, &config, collector.epoch().clone(), logger)?,
        ));

        let inner = Arc::new(RuntimeInner {
            config: config.clone(),
            collector,
            registry: RwLock::new(vec![main.clone()]),
            main,
            main_taken: AtomicBool::new(false),
            next_thread_id: AtomicUsize::new(1),
            background: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });

        if config.background_collection {
            let weak = Arc::downgrade(&inner);
            let task = BackgroundCollector::start(config.collection_interval, move || {
                background_cycle(&weak)
            })?;
            *inner.background.lock() = Some(task);
        }

        log::debug!(
            "runtime started (page {} words, {} root slots, background={})",
            config.page_size_words,
            config.root_table_capacity,
            config.background_collection
        );

        Ok(Self { inner })
    }

    pub fn config(&self) -> &GcConfig {
        &self.inner.config
    }

    pub fn collector(&self) -> &Collector {
        &self.inner.collector
    }

    pub fn logger(&self) -> &Arc<GcLogger> {
        self.inner.collector.logger()
    }

    /// Totals over every completed cycle
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.collector.stats().snapshot()
    }

    /// Handle of the main thread, available once
    ///
    /// # Errors
    /// `HandleTaken` on the second call, `ShutDown` after shutdown.
    pub fn main_thread(&self) -> Result<ThreadHandle> {
        if self.is_shut_down() {
            return Err(GcError::ShutDown);
        }
        if self.inner.main_taken.swap(true, Ordering::AcqRel) {
            return Err(GcError::HandleTaken);
        }
        Ok(ThreadHandle::new(self.clone(), self.inner.main.clone()))
    }

    /// Register a new mutator thread with its own heap
    ///
    /// It is appended to the registry and collected from the next cycle on.
    pub fn register_thread(&self) -> Result<ThreadHandle> {
        if self.is_shut_down() {
            return Err(GcError::ShutDown);
        }

        let id = self.inner.next_thread_id.fetch_add(1, Ordering::Relaxed);
        let allocator = Allocator::new(
            id,
            &self.inner.config,
            self.inner.collector.epoch().clone(),
            self.logger().clone(),
        )?;
        let thread = Arc::new(ThreadRuntime::new(id, allocator));
        {
            // shutdown drains the registry under this lock
            let mut registry = self.inner.registry.write();
            if self.is_shut_down() {
                return Err(GcError::ShutDown);
            }
            registry.push(thread.clone());
        }

        log::debug!("thread {} registered", id);
        Ok(ThreadHandle::new(self.clone(), thread))
    }

    /// Run `f` on a new registered OS thread
    ///
    /// The thread is retired when `f` returns or panics, and also when the OS
    /// thread cannot be started.
    pub fn spawn_mutator<F, T>(&self, f: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce(&ThreadHandle) -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.register_thread()?;
        let id = handle.id();

        std::thread::Builder::new()
            .name(format!("pgc-mutator-{}", id))
            .spawn(move || f(&handle))
            .map_err(|e| GcError::ThreadSpawn(format!("pgc-mutator-{}: {}", id, e)))
    }

    /// Deactivate `thread` and drop it from the registry; repeat calls are no-ops
    pub(crate) fn deregister(&self, thread: &Arc<ThreadRuntime>) {
        thread.deactivate();
        let mut registry = self.inner.registry.write();
        let before = registry.len();
        registry.retain(|entry| !Arc::ptr_eq(entry, thread));
        if registry.len() < before {
            log::debug!("thread {} retired", thread.id());
        }
    }

    /// Registered threads, main first
    pub fn threads(&self) -> Vec<Arc<ThreadRuntime>> {
        self.inner.registry.read().clone()
    }

    /// Number of registered threads
    pub fn thread_count(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Run one collection cycle now
    ///
    /// Must not be called from inside `ThreadHandle::with_allocator`.
    pub fn collect(&self) -> Result<CycleReport> {
        if self.is_shut_down() {
            return Err(GcError::ShutDown);
        }
        self.inner.collect()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Stop the collector, then release every page of every thread
    ///
    /// Blocks until the collector thread has joined. Later calls are no-ops.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl RuntimeInner {
    fn collect(&self) -> Result<CycleReport> {
        let threads = self.registry.read().clone();
        self.collector.collect(&threads)
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.main.deactivate();

        if let Some(task) = self.background.lock().take() {
            if task.is_current_thread() {
                // last reference dropped by the collector itself; it exits
                // on its own once `main` is inactive
                drop(task);
            } else {
                task.stop();
            }
        }

        let threads = std::mem::take(&mut *self.registry.write());
        let mut pages = 0;
        for thread in &threads {
            thread.deactivate();
            pages += thread.lock_allocator().release_all();
        }

        log::debug!(
            "runtime shut down after {} cycle(s), {} page(s) released",
            self.collector.cycle_count(),
            pages
        );
    }
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One background iteration; `None` stops the task
fn background_cycle(runtime: &Weak<RuntimeInner>) -> Option<Result<CycleReport>> {
    let runtime = runtime.upgrade()?;
    if !runtime.main.is_active() || runtime.shut_down.load(Ordering::Acquire) {
        return None;
    }
    Some(runtime.collect())
}
