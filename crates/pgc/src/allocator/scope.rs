//! Root Scope - RAII frames of root slots
//!
//! A scope reserves `n` contiguous root slots when it is created and
//! releases them when it is dropped, on every exit path (normal return,
//! `?` propagation and unwinding). Released slots are zeroed before the
//! root height drops back to the scope's base, so nothing allocated inside
//! the scope stays reachable through it.
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
//! let thread = runtime.main_thread()?;
//! {
//!     let scope = thread.scope(2)?;
//!     let head = scope.alloc(&NODE, 0)?;
//!     let tail = scope.alloc(&NODE, 1)?;
//!     thread.write_ref(head, 0, Some(tail))?;
//! }
//! assert_eq!(thread.root_height(), 0);
//! # Ok::<(), pgc::GcError>(())
//! ```

use crate::error::{GcError, Result};
use crate::object::{ObjectRef, Type};
use crate::runtime::ThreadHandle;

/// RootScope - a reserved frame `[base, base + len)` of root slots
#[must_use = "dropping a scope releases its root slots immediately"]
pub struct RootScope<'a> {
    thread: &'a ThreadHandle,
    base: usize,
    len: usize,
}

impl<'a> RootScope<'a> {
    /// Reserve `len` zeroed root slots on `thread`
    ///
    /// # Errors
    /// `RootTableFull` when the slots do not fit.
    pub fn new(thread: &'a ThreadHandle, len: usize) -> Result<Self> {
        let base = thread.with_allocator(|allocator| allocator.roots_mut().reserve(len))?;
        Ok(Self { thread, base, len })
    }

    /// First root slot of the frame
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot_index(&self, slot: usize) -> Result<usize> {
        if slot < self.len {
            Ok(self.base + slot)
        } else {
            Err(GcError::SlotOutOfRange {
                slot,
                len: self.len,
            })
        }
    }

    /// Allocate an object and root it in frame slot `slot`
    pub fn alloc(&self, ty: &'static Type, slot: usize) -> Result<ObjectRef> {
        let index = self.slot_index(slot)?;
        self.thread
            .with_allocator(|allocator| allocator.alloc_into_slot(ty, index))
    }

    /// Free a record manually; the frame slot still holds its old word
    pub fn dealloc(&self, reference: Option<ObjectRef>) {
        self.thread.dealloc(reference);
    }

    /// Store a reference (or null) in frame slot `slot`
    pub fn set(&self, slot: usize, reference: Option<ObjectRef>) -> Result<()> {
        let index = self.slot_index(slot)?;
        self.thread.with_allocator(|allocator| {
            allocator
                .roots_mut()
                .set(index, crate::object::word_of(reference))
        })
    }

    /// Reference held in frame slot `slot`
    pub fn get(&self, slot: usize) -> Result<Option<ObjectRef>> {
        let index = self.slot_index(slot)?;
        self.thread
            .with_allocator(|allocator| allocator.roots().get(index))
            .map(ObjectRef::from_word)
    }
}

impl Drop for RootScope<'_> {
    fn drop(&mut self) {
        self.thread
            .with_allocator(|allocator| allocator.roots_mut().release(self.base));
    }
}
