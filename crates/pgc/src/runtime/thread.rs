//! Mutator Threads - registry entries and handles
//!
//! A `ThreadRuntime` is the registry entry of one mutator: its allocator
//! behind a lock plus an `is_active` flag. A `ThreadHandle` is what the
//! mutator itself holds; every heap operation goes through it.

use crate::allocator::{Allocator, RootScope};
use crate::error::{GcError, Result};
use crate::heap::{HeapDump, HeapSummary};
use crate::object::{ObjectRef, Type};
use crate::runtime::Runtime;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// ThreadRuntime - one registered mutator
pub struct ThreadRuntime {
    id: usize,
    allocator: Mutex<Allocator>,
    active: AtomicBool,
}

impl ThreadRuntime {
    pub(crate) fn new(id: usize, allocator: Allocator) -> Self {
        Self {
            id,
            allocator: Mutex::new(allocator),
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the thread still has a running mutator behind it
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Lock the allocator; blocks while a cycle is running
    pub(crate) fn lock_allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock()
    }
}

impl fmt::Debug for ThreadRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRuntime")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// ThreadHandle - a mutator's entry point to its heap
///
/// Each call takes the heap lock for its duration only, so a running
/// collection cycle makes the call wait. References are only valid on the
/// handle that allocated them.
///
/// Dropping the handle retires the thread, including during unwinding. For
/// the main thread this also ends background collection.
pub struct ThreadHandle {
    runtime: Runtime,
    thread: Arc<ThreadRuntime>,
}

impl ThreadHandle {
    pub(crate) fn new(runtime: Runtime, thread: Arc<ThreadRuntime>) -> Self {
        Self { runtime, thread }
    }

    pub fn id(&self) -> usize {
        self.thread.id()
    }

    /// Runtime this thread is registered with
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn is_active(&self) -> bool {
        self.thread.is_active()
    }

    /// Run `f` with the heap locked
    ///
    /// `f` must not start a collection or re-enter this handle.
    pub fn with_allocator<R>(&self, f: impl FnOnce(&mut Allocator) -> R) -> R {
        let mut allocator = self.thread.lock_allocator();
        f(&mut allocator)
    }

    /// Allocate a zeroed object, rooted until the enclosing scope exits
    ///
    /// # Errors
    /// - `OutOfMemory` when no page can be created for it
    /// - `RootTableFull` when no root slot is left
    /// - `ShutDown` after the runtime shut down
    pub fn alloc(&self, ty: &'static Type) -> Result<ObjectRef> {
        self.ensure_running()?;
        self.with_allocator(|allocator| allocator.alloc(ty))
    }

    /// Free a record manually; `None` and already-free records are ignored
    pub fn dealloc(&self, reference: Option<ObjectRef>) {
        self.with_allocator(|allocator| allocator.dealloc(reference));
    }

    /// Reserve `len` root slots until the returned scope is dropped
    pub fn scope(&self, len: usize) -> Result<RootScope<'_>> {
        self.ensure_running()?;
        RootScope::new(self, len)
    }

    pub fn read_word(&self, reference: ObjectRef, index: usize) -> Result<usize> {
        self.with_allocator(|allocator| allocator.read_word(reference, index))
    }

    pub fn write_word(&self, reference: ObjectRef, index: usize, value: usize) -> Result<()> {
        self.with_allocator(|allocator| allocator.write_word(reference, index, value))
    }

    pub fn read_ref(&self, reference: ObjectRef, index: usize) -> Result<Option<ObjectRef>> {
        self.with_allocator(|allocator| allocator.read_ref(reference, index))
    }

    pub fn write_ref(
        &self,
        reference: ObjectRef,
        index: usize,
        target: Option<ObjectRef>,
    ) -> Result<()> {
        self.with_allocator(|allocator| allocator.write_ref(reference, index, target))
    }

    /// Copy of an object's payload
    pub fn data(&self, reference: ObjectRef) -> Result<Vec<usize>> {
        self.with_allocator(|allocator| allocator.data(reference).map(<[usize]>::to_vec))
    }

    pub fn type_of(&self, reference: ObjectRef) -> Result<&'static Type> {
        self.with_allocator(|allocator| allocator.type_of(reference))
    }

    /// Check if `reference` names a live record of this heap
    pub fn is_live(&self, reference: ObjectRef) -> bool {
        self.with_allocator(|allocator| allocator.resolve(reference).is_ok())
    }

    /// Root slots in use
    pub fn root_height(&self) -> usize {
        self.with_allocator(|allocator| allocator.roots().height())
    }

    /// Every page and record of this thread's heap
    pub fn heap_dump(&self) -> HeapDump {
        self.with_allocator(|allocator| allocator.heap_dump())
    }

    /// Aggregate counts of this thread's heap
    pub fn heap_summary(&self) -> HeapSummary {
        self.with_allocator(|allocator| allocator.heap_summary())
    }

    /// Check page tiling, chain bookkeeping and the root table
    pub fn verify(&self) -> bool {
        self.with_allocator(|allocator| allocator.verify())
    }

    /// Mark the thread inactive and leave the registry
    ///
    /// Same as dropping the handle. Its heap is released once no cycle holds
    /// it any more.
    pub fn retire(self) {
        drop(self);
    }

    fn ensure_running(&self) -> Result<()> {
        if self.runtime.is_shut_down() {
            Err(GcError::ShutDown)
        } else {
            Ok(())
        }
    }
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        self.runtime.deregister(&self.thread);
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.thread.id())
            .finish()
    }
}
