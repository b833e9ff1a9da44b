//! Heap Management Module - Per-Thread Page Chains
//!
//! Every mutator thread owns one Heap: a chain of pages held in a page
//! table (an arena indexed by page slot). References name a page slot and a
//! word offset, so locating a record header is O(1) without raw addresses.
//!
//! Heap Structure:
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Heap                             │
//! │  first                     current               last     │
//! │    │                          │                    │      │
//! │  ┌─▼──────┐  next  ┌────────┐ ▼ ┌────────┐  next ┌─▼────┐ │
//! │  │ page 0 │ ─────► │ page 3 │──►│ page 1 │ ────► │ pg 2 │ │
//! │  │ (std)  │        │ (std)  │   │ (std)  │       │ (SP) │ │
//! │  └────────┘        └────────┘   └────────┘       └──────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Page Lifecycle:
//! 1. Created on demand when no page in the chain fits a request
//! 2. Appended at the chain tail
//! 3. Unlinked and released by sweep once nothing on it is reachable
//!
//! A chain always holds at least one page.

pub mod bitmap;
pub mod dump;
pub mod page;

pub use bitmap::RecordStartBitmap;
pub use dump::{AllocationDump, HeapDump, HeapSummary, PageDump};
pub use page::HeapPage;

use crate::error::{GcError, Result};
use crate::object::{Colour, ObjectRef, HEADER_WORDS, MAX_PAGE_SLOTS, MAX_PAGE_WORDS};

/// PageTable - arena of pages indexed by page slot
///
/// Vacated slots are recycled for new pages.
#[derive(Default)]
pub struct PageTable {
    slots: Vec<Option<HeapPage>>,
    vacant: Vec<usize>,
    live: usize,
}

impl PageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a page and return its slot
    pub fn insert(&mut self, page: HeapPage) -> Result<usize> {
        let slot = match self.vacant.pop() {
            Some(slot) => {
                self.slots[slot] = Some(page);
                slot
            }
            None => {
                if self.slots.len() >= MAX_PAGE_SLOTS {
                    return Err(GcError::OutOfMemory {
                        requested_words: page.usable_words(),
                    });
                }
                self.slots.push(Some(page));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        Ok(slot)
    }

    /// Take a page out of its slot
    pub fn remove(&mut self, slot: usize) -> Option<HeapPage> {
        let page = self.slots.get_mut(slot)?.take()?;
        self.vacant.push(slot);
        self.live -= 1;
        Some(page)
    }

    pub fn get(&self, slot: usize) -> Option<&HeapPage> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut HeapPage> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Number of pages currently stored
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

/// Heap - one thread's page chain
pub struct Heap {
    pages: PageTable,
    first: usize,
    last: usize,
    current: usize,
    page_size_words: usize,
}

impl Heap {
    /// Create a heap with one empty standard page
    pub fn new(page_size_words: usize, colour: Colour) -> Result<Self> {
        let mut pages = PageTable::new();
        let first = pages.insert(HeapPage::new(page_size_words, false, colour)?)?;

        Ok(Self {
            pages,
            first,
            last: first,
            current: first,
            page_size_words,
        })
    }

    /// Usable words of a standard page
    pub fn page_size_words(&self) -> usize {
        self.page_size_words
    }

    pub fn first_page(&self) -> usize {
        self.first
    }

    pub fn last_page(&self) -> usize {
        self.last
    }

    /// Standard page that satisfied the most recent request
    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn page(&self, slot: usize) -> Option<&HeapPage> {
        self.pages.get(slot)
    }

    pub fn page_mut(&mut self, slot: usize) -> Option<&mut HeapPage> {
        self.pages.get_mut(slot)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page slots in chain order
    pub fn chain(&self) -> Chain<'_> {
        Chain {
            pages: &self.pages,
            slot: Some(self.first),
        }
    }

    /// Locate the record a reference names
    ///
    /// Returns `(page slot, header offset)` only when the page exists and a
    /// record header starts exactly where the reference implies.
    pub fn resolve(&self, reference: ObjectRef) -> Option<(usize, usize)> {
        let slot = reference.page_slot();
        let offset = reference.header_offset()?;
        let page = self.pages.get(slot)?;
        page.is_record_start(offset).then_some((slot, offset))
    }

    /// Place a request somewhere in the chain, growing it if needed
    ///
    /// Tries the current page, then every other page in chain order, then a
    /// new page appended at the tail. Returns the reference and whether a
    /// page was created.
    pub fn allocate(
        &mut self,
        required: usize,
        type_index: usize,
        colour: Colour,
    ) -> Result<(ObjectRef, bool)> {
        let current = self.current;
        if let Some(offset) = self
            .pages
            .get_mut(current)
            .and_then(|page| page.try_allocate(required, type_index, colour, false))
        {
            return Ok((ObjectRef::new(current, offset + HEADER_WORDS), false));
        }

        let mut cursor = Some(self.first);
        while let Some(slot) = cursor {
            let Some(page) = self.pages.get_mut(slot) else {
                break;
            };
            cursor = page.next();
            if slot == current {
                continue;
            }
            if let Some(offset) = page.try_allocate(required, type_index, colour, false) {
                self.current = slot;
                return Ok((ObjectRef::new(slot, offset + HEADER_WORDS), false));
            }
        }

        let slot = self.append_page(required, colour)?;
        let offset = self
            .pages
            .get_mut(slot)
            .and_then(|page| page.try_allocate(required, type_index, colour, true))
            .ok_or_else(|| {
                GcError::Internal(format!(
                    "fresh page {} cannot hold {} words",
                    slot, required
                ))
            })?;

        Ok((ObjectRef::new(slot, offset + HEADER_WORDS), true))
    }

    /// Create a page for `required` words and link it at the tail
    fn append_page(&mut self, required: usize, colour: Colour) -> Result<usize> {
        let span = required
            .checked_add(HEADER_WORDS)
            .filter(|&span| span <= MAX_PAGE_WORDS)
            .ok_or(GcError::OutOfMemory {
                requested_words: required,
            })?;

        let single_purpose = span > self.page_size_words;
        let words = if single_purpose {
            span
        } else {
            self.page_size_words
        };

        let slot = self
            .pages
            .insert(HeapPage::new(words, single_purpose, colour)?)?;

        if let Some(tail) = self.pages.get_mut(self.last) {
            tail.set_next(Some(slot));
        }
        self.last = slot;
        if !single_purpose {
            self.current = slot;
        }

        log::trace!(
            "appended page {} ({} words, single_purpose={})",
            slot,
            words,
            single_purpose
        );
        Ok(slot)
    }

    /// Unlink `slot` from the chain and release it
    ///
    /// `prev` is the page before `slot` in the chain, `None` for the head.
    /// The head is only removed when it has a successor, which becomes the
    /// new head; otherwise nothing changes and `None` is returned.
    pub fn unlink(&mut self, prev: Option<usize>, slot: usize) -> Option<HeapPage> {
        let next = self.pages.get(slot)?.next();

        match prev {
            None => {
                if slot != self.first {
                    return None;
                }
                self.first = next?;
            }
            Some(prev) => self.pages.get_mut(prev)?.set_next(next),
        }

        if self.last == slot {
            // only reachable with a predecessor, the lone head is refused above
            self.last = prev.unwrap_or(self.first);
        }
        if self.current == slot {
            self.current = self.last;
        }

        self.pages.remove(slot)
    }

    /// Release every page, leaving the heap unusable
    pub(crate) fn release_all(&mut self) -> usize {
        let mut released = 0;
        let mut cursor = Some(self.first);
        while let Some(slot) = cursor {
            cursor = self.pages.remove(slot).and_then(|page| {
                released += 1;
                page.next()
            });
        }
        released
    }

    /// Check the tiling invariant on every page and the chain bookkeeping
    pub fn verify(&self) -> bool {
        let slots: Vec<usize> = self.chain().collect();
        slots.len() == self.pages.len()
            && slots.last() == Some(&self.last)
            && slots.contains(&self.current)
            && slots
                .iter()
                .all(|&slot| self.pages.get(slot).is_some_and(HeapPage::verify_tiling))
    }
}

/// Iterator over page slots in chain order
pub struct Chain<'a> {
    pages: &'a PageTable,
    slot: Option<usize>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let slot = self.slot?;
        self.slot = self.pages.get(slot).and_then(HeapPage::next);
        Some(slot)
    }
}
