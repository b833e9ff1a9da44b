//! Root Table - the explicit per-thread root set
//!
//! A fixed-capacity array of raw reference words plus a height cursor.
//! Every slot below `height` is a root; slots at or above `height` are
//! always zero. The mark phase scans exactly `[0, height)`.
//!
//! ```text
//! slots:  [ r0 | r1 | 0 | r3 | r4 | 0 | 0 | 0 ]
//!                                 ^ height = 5
//! ```
//!
//! Slots are reserved in contiguous runs (one per unscoped allocation, `n`
//! per scope) and released by lowering the cursor back to a saved base.

use crate::error::{GcError, Result};

/// RootTable - precise root slots of one thread
#[derive(Debug)]
pub struct RootTable {
    slots: Box<[usize]>,
    height: usize,
}

impl RootTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity].into_boxed_slice(),
            height: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently in use
    pub fn height(&self) -> usize {
        self.height
    }

    /// Slots still available
    pub fn remaining(&self) -> usize {
        self.slots.len() - self.height
    }

    /// Reserve `count` zeroed slots and return the first one
    ///
    /// # Errors
    /// `RootTableFull` when the reservation does not fit.
    pub fn reserve(&mut self, count: usize) -> Result<usize> {
        if count > self.remaining() {
            return Err(GcError::RootTableFull {
                capacity: self.capacity(),
                requested: count,
            });
        }
        let base = self.height;
        self.height += count;
        Ok(base)
    }

    /// Reserve one slot holding `word`
    pub fn push(&mut self, word: usize) -> Result<usize> {
        let index = self.reserve(1)?;
        self.slots[index] = word;
        Ok(index)
    }

    /// Zero `[base, height)` and lower the cursor to `base`
    ///
    /// A base at or above the current height is ignored.
    pub fn release(&mut self, base: usize) {
        if base >= self.height {
            return;
        }
        self.slots[base..self.height].fill(0);
        self.height = base;
    }

    /// Store `word` in an occupied slot
    pub fn set(&mut self, index: usize, word: usize) -> Result<()> {
        let len = self.height;
        let slot = self
            .slots
            .get_mut(..len)
            .and_then(|active| active.get_mut(index))
            .ok_or(GcError::SlotOutOfRange { slot: index, len })?;
        *slot = word;
        Ok(())
    }

    /// Word held by an occupied slot
    pub fn get(&self, index: usize) -> Result<usize> {
        self.active()
            .get(index)
            .copied()
            .ok_or(GcError::SlotOutOfRange {
                slot: index,
                len: self.height,
            })
    }

    /// Occupied slots, the root set
    pub fn active(&self) -> &[usize] {
        &self.slots[..self.height]
    }

    /// Check that nothing above the cursor holds a reference
    pub fn verify(&self) -> bool {
        self.slots[self.height..].iter().all(|&word| word == 0)
    }
}
