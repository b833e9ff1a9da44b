//! Allocator Module - Per-Thread Object Allocation
//!
//! Every mutator thread owns one Allocator: its page chain, its root table
//! and its type table. Allocation is synchronous and thread-local; the
//! collector only touches an allocator while holding its lock.
//!
//! ## Allocation Flow
//!
//! 1. Register the type (first use only) and find its type index
//! 2. Check the root table has a slot for the new reference
//! 3. Place the record: current page, then the chain, then a new page
//! 4. Record the reference as a root
//!
//! Every returned region is zeroed and stained with the current epoch.

pub mod roots;
pub mod scope;

pub use roots::RootTable;
pub use scope::RootScope;

use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::gc::Epoch;
use crate::heap::{Heap, HeapDump, HeapSummary};
use crate::logging::{GcEvent, GcLogger};
use crate::object::{Colour, ObjectRef, Type};
use indexmap::IndexMap;
use std::sync::Arc;

/// Allocator - one thread's heap, roots and type table
pub struct Allocator {
    /// Owning thread id, for diagnostics
    thread: usize,

    /// Page chain
    heap: Heap,

    /// Explicit root set
    roots: RootTable,

    /// Types seen by this heap, keyed by descriptor address
    ///
    /// Record tags store the index into this table.
    types: IndexMap<usize, &'static Type>,

    /// Colour new records and pages are stained with
    epoch: Arc<Epoch>,

    logger: Arc<GcLogger>,
}

impl Allocator {
    /// Create an allocator with one empty standard page
    pub fn new(
        thread: usize,
        config: &GcConfig,
        epoch: Arc<Epoch>,
        logger: Arc<GcLogger>,
    ) -> Result<Self> {
        let heap = Heap::new(config.page_size_words, epoch.current())?;
        Ok(Self {
            thread,
            heap,
            roots: RootTable::new(config.root_table_capacity),
            types: IndexMap::new(),
            epoch,
            logger,
        })
    }

    pub fn thread(&self) -> usize {
        self.thread
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub(crate) fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn roots(&self) -> &RootTable {
        &self.roots
    }

    pub(crate) fn roots_mut(&mut self) -> &mut RootTable {
        &mut self.roots
    }

    pub(crate) fn logger(&self) -> &Arc<GcLogger> {
        &self.logger
    }

    /// Colour of the current epoch
    pub fn epoch(&self) -> Colour {
        self.epoch.current()
    }

    /// Allocate an object and push its reference as a new root
    ///
    /// The root stays until the enclosing scope exits.
    ///
    /// # Errors
    /// - `RootTableFull` when no root slot is left (nothing is allocated)
    /// - `OutOfMemory` when no page can hold the object
    pub fn alloc(&mut self, ty: &'static Type) -> Result<ObjectRef> {
        if self.roots.remaining() == 0 {
            return Err(GcError::RootTableFull {
                capacity: self.roots.capacity(),
                requested: 1,
            });
        }
        let reference = self.allocate_unrooted(ty)?;
        self.roots.push(reference.to_word())?;
        Ok(reference)
    }

    /// Allocate an object and store its reference in root slot `slot`
    ///
    /// # Errors
    /// `SlotOutOfRange` when `slot` is not below the root height, plus the
    /// placement errors of `alloc`.
    pub fn alloc_into_slot(&mut self, ty: &'static Type, slot: usize) -> Result<ObjectRef> {
        if slot >= self.roots.height() {
            return Err(GcError::SlotOutOfRange {
                slot,
                len: self.roots.height(),
            });
        }
        let reference = self.allocate_unrooted(ty)?;
        self.roots.set(slot, reference.to_word())?;
        Ok(reference)
    }

    /// Place a record for `ty` without touching the root table
    ///
    /// The caller must root the reference before the heap lock is released,
    /// otherwise the next cycle may reclaim its page.
    pub(crate) fn allocate_unrooted(&mut self, ty: &'static Type) -> Result<ObjectRef> {
        let type_index = self.type_index(ty);
        let colour = self.epoch.current();
        let required = ty.required_words();

        match self.heap.allocate(required, type_index, colour) {
            Ok((reference, created)) => {
                if created {
                    self.page_created(reference.page_slot());
                }
                Ok(reference)
            }
            Err(e) => {
                self.logger.log(GcEvent::AllocationFailure {
                    thread: self.thread,
                    requested_words: required,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn page_created(&self, slot: usize) {
        if let Some(page) = self.heap.page(slot) {
            log::trace!(
                "thread {}: page {} created ({} words)",
                self.thread,
                slot,
                page.usable_words()
            );
            self.logger.log(GcEvent::PageCreated {
                thread: self.thread,
                slot,
                words: page.usable_words(),
                single_purpose: page.is_single_purpose(),
            });
        }
    }

    /// Index of `ty` in the type table, registering it on first use
    fn type_index(&mut self, ty: &'static Type) -> usize {
        let key = ty as *const Type as usize;
        match self.types.get_index_of(&key) {
            Some(index) => index,
            None => self.types.insert_full(key, ty).0,
        }
    }

    /// Type registered under `index`
    pub fn type_at(&self, index: usize) -> Option<&'static Type> {
        self.types.get_index(index).map(|(_, ty)| *ty)
    }

    /// `pointers_count` of every registered type, by type index
    pub(crate) fn pointer_counts(&self) -> Vec<usize> {
        self.types.values().map(|ty| ty.pointers_count()).collect()
    }

    /// Free a record manually
    ///
    /// `None`, a reference this heap cannot resolve and an already-free
    /// record are all ignored. The record is not merged with its
    /// neighbours until a later placement needs the room.
    pub fn dealloc(&mut self, reference: Option<ObjectRef>) {
        let Some((slot, offset)) = reference.and_then(|r| self.heap.resolve(r)) else {
            return;
        };
        if let Some(page) = self.heap.page_mut(slot) {
            page.free_record(offset);
        }
    }

    /// Resolve a reference to a live record
    ///
    /// # Errors
    /// `InvalidReference` when the reference does not name a live record of
    /// this heap.
    pub fn resolve(&self, reference: ObjectRef) -> Result<(usize, usize)> {
        self.heap
            .resolve(reference)
            .filter(|&(slot, offset)| {
                self.heap
                    .page(slot)
                    .is_some_and(|page| !page.header(offset).is_free())
            })
            .ok_or(GcError::InvalidReference {
                raw: reference.to_word(),
            })
    }

    /// Payload words of a live record
    pub fn data(&self, reference: ObjectRef) -> Result<&[usize]> {
        let (slot, offset) = self.resolve(reference)?;
        self.heap
            .page(slot)
            .map(|page| page.data(offset))
            .ok_or(GcError::InvalidReference {
                raw: reference.to_word(),
            })
    }

    /// Mutable payload words of a live record
    pub fn data_mut(&mut self, reference: ObjectRef) -> Result<&mut [usize]> {
        let (slot, offset) = self.resolve(reference)?;
        self.heap
            .page_mut(slot)
            .map(|page| page.data_mut(offset))
            .ok_or(GcError::InvalidReference {
                raw: reference.to_word(),
            })
    }

    /// Read payload word `index`
    pub fn read_word(&self, reference: ObjectRef, index: usize) -> Result<usize> {
        let data = self.data(reference)?;
        data.get(index).copied().ok_or(GcError::FieldOutOfBounds {
            index,
            len: data.len(),
        })
    }

    /// Write payload word `index`
    pub fn write_word(&mut self, reference: ObjectRef, index: usize, value: usize) -> Result<()> {
        let data = self.data_mut(reference)?;
        let len = data.len();
        let field = data
            .get_mut(index)
            .ok_or(GcError::FieldOutOfBounds { index, len })?;
        *field = value;
        Ok(())
    }

    /// Read payload word `index` as a reference; `0` is `None`
    pub fn read_ref(&self, reference: ObjectRef, index: usize) -> Result<Option<ObjectRef>> {
        self.read_word(reference, index).map(ObjectRef::from_word)
    }

    /// Store a reference (or null) in payload word `index`
    pub fn write_ref(
        &mut self,
        reference: ObjectRef,
        index: usize,
        target: Option<ObjectRef>,
    ) -> Result<()> {
        self.write_word(reference, index, crate::object::word_of(target))
    }

    /// Type of a live record
    pub fn type_of(&self, reference: ObjectRef) -> Result<&'static Type> {
        let (slot, offset) = self.resolve(reference)?;
        self.heap
            .page(slot)
            .and_then(|page| page.header(offset).type_index)
            .and_then(|index| self.type_at(index))
            .ok_or_else(|| GcError::Internal(format!("record {:?} has no registered type", reference)))
    }

    /// Epoch stain of a live record
    pub fn colour_of(&self, reference: ObjectRef) -> Result<Colour> {
        let (slot, offset) = self.resolve(reference)?;
        self.heap
            .page(slot)
            .map(|page| page.record_colour(offset))
            .ok_or(GcError::InvalidReference {
                raw: reference.to_word(),
            })
    }

    /// Usable words of a standard page
    pub fn page_size_words(&self) -> usize {
        self.heap.page_size_words()
    }

    /// Every page and record, in chain order
    pub fn heap_dump(&self) -> HeapDump {
        HeapDump::capture(&self.heap, |index| self.type_at(index).map(Type::name))
    }

    /// Aggregate counts, also logged as a `HeapSummary` event
    pub fn heap_summary(&self) -> HeapSummary {
        let summary = HeapSummary::capture(&self.heap);
        self.logger.log(GcEvent::HeapSummary {
            thread: self.thread,
            pages: summary.pages,
            live_allocations: summary.live_allocations,
            used_words: summary.used_words,
            total_words: summary.total_words,
        });
        summary
    }

    /// Check heap tiling, chain bookkeeping and the root table
    pub fn verify(&self) -> bool {
        self.heap.verify() && self.roots.verify()
    }

    /// Release every page and root; the allocator is unusable afterwards
    pub(crate) fn release_all(&mut self) -> usize {
        self.roots.release(0);
        self.heap.release_all()
    }
}
