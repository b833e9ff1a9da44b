//! Marker Module - Reachability Staining
//!
//! The mark phase computes, for one thread's heap, the transitive closure
//! of reachability from its root slots and stains every reached record (and
//! its page) with the current epoch colour.
//!
//! Marking Algorithm:
//! - Two colours, flipped at the start of every cycle
//! - A record whose colour already equals the epoch is not revisited, which
//!   also terminates cycles in the object graph
//! - Exactly the first `pointers_count` payload words are traced
//!
//! Marks of distinct threads run concurrently, one worker per heap; one
//! heap's mark is sequential and driven by an explicit worklist.
//!
//! ```text
//! roots [0, height) ──push──► MarkStack ──pop──► resolve ──► stained?
//!                                 ▲                            │ no
//!                                 └──── pointer fields ◄── stain record + page
//! ```

pub mod mark_stack;

pub use mark_stack::MarkStack;

use crate::allocator::Allocator;
use crate::object::{Colour, ObjectRef};
use serde::Serialize;

/// Outcome of marking one heap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarkStats {
    /// Records stained this cycle
    pub marked: usize,
    /// Words that did not resolve to a record of this heap
    pub rejected: usize,
    /// Deepest the mark stack grew
    pub max_stack: usize,
}

impl MarkStats {
    /// Sum of two threads' results
    pub fn merge(self, other: MarkStats) -> MarkStats {
        MarkStats {
            marked: self.marked + other.marked,
            rejected: self.rejected + other.rejected,
            max_stack: self.max_stack.max(other.max_stack),
        }
    }
}

/// Mark everything reachable from `allocator`'s roots with `epoch`
///
/// Words that do not name a record start of this heap are skipped and
/// counted as rejected. Reached free records are stained but not traced.
pub fn mark_heap(allocator: &mut Allocator, epoch: Colour, stack_capacity: usize) -> MarkStats {
    let mut stack = MarkStack::with_capacity(stack_capacity);
    stack.extend_from(allocator.roots().active());

    let pointer_counts = allocator.pointer_counts();
    let thread = allocator.thread();
    let heap = allocator.heap_mut();
    let mut stats = MarkStats::default();

    while let Some(word) = stack.pop() {
        let Some((slot, offset)) = ObjectRef::from_word(word).and_then(|r| heap.resolve(r)) else {
            stats.rejected += 1;
            continue;
        };
        let Some(page) = heap.page_mut(slot) else {
            stats.rejected += 1;
            continue;
        };

        if page.record_colour(offset) == epoch {
            continue;
        }
        page.stain(offset, epoch);
        stats.marked += 1;

        let header = page.header(offset);
        let Some(type_index) = header.type_index else {
            continue;
        };
        let traced = pointer_counts
            .get(type_index)
            .copied()
            .unwrap_or(0)
            .min(header.usable_words);
        stack.extend_from(&page.data(offset)[..traced]);
    }

    stats.max_stack = stack.max_depth();

    if stats.rejected > 0 {
        log::warn!(
            "thread {}: {} word(s) did not resolve to a record",
            thread,
            stats.rejected
        );
    }
    log::trace!(
        "thread {}: marked {} record(s), max stack {}",
        thread,
        stats.marked,
        stats.max_stack
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use crate::gc::Epoch;
    use crate::logging::GcLogger;
    use crate::object::Type;
    use std::sync::Arc;

    static NODE: Type = Type::new("Node", 2, 1);
    static PAIR: Type = Type::new("Pair", 3, 2);
    static DATA: Type = Type::new("Data", 2, 0);

    fn allocator(epoch: Colour) -> Allocator {
        let config = GcConfig {
            page_size_words: 256,
            root_table_capacity: 16,
            ..Default::default()
        };
        Allocator::new(
            0,
            &config,
            Arc::new(Epoch::new(epoch)),
            Arc::new(GcLogger::default()),
        )
        .unwrap()
    }

    /// Allocate and drop the new root slot right away
    fn unrooted(a: &mut Allocator, ty: &'static Type) -> ObjectRef {
        let r = a.alloc(ty).unwrap();
        let top = a.roots().height() - 1;
        a.roots_mut().release(top);
        r
    }

    #[test]
    fn test_marks_transitive_closure() {
        let mut a = allocator(Colour::Green);
        let head = a.alloc(&NODE).unwrap();
        let mid = unrooted(&mut a, &NODE);
        let tail = unrooted(&mut a, &NODE);
        let lost = unrooted(&mut a, &NODE);
        a.write_ref(head, 0, Some(mid)).unwrap();
        a.write_ref(mid, 0, Some(tail)).unwrap();

        let stats = mark_heap(&mut a, Colour::Blue, 8);

        assert_eq!(stats.marked, 3);
        assert_eq!(stats.rejected, 0);
        for r in [head, mid, tail] {
            assert_eq!(a.colour_of(r).unwrap(), Colour::Blue);
        }
        assert_eq!(a.colour_of(lost).unwrap(), Colour::Green);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut a = allocator(Colour::Green);
        let x = a.alloc(&NODE).unwrap();
        let y = unrooted(&mut a, &NODE);
        a.write_ref(x, 0, Some(y)).unwrap();
        a.write_ref(y, 0, Some(x)).unwrap();

        let stats = mark_heap(&mut a, Colour::Blue, 8);
        assert_eq!(stats.marked, 2);
    }

    #[test]
    fn test_only_pointer_prefix_is_traced() {
        let mut a = allocator(Colour::Green);
        let pair = a.alloc(&PAIR).unwrap();
        let left = unrooted(&mut a, &DATA);
        let hidden = unrooted(&mut a, &DATA);
        a.write_ref(pair, 0, Some(left)).unwrap();
        // word 2 is payload, not a pointer field
        a.write_ref(pair, 2, Some(hidden)).unwrap();

        mark_heap(&mut a, Colour::Blue, 8);
        assert_eq!(a.colour_of(left).unwrap(), Colour::Blue);
        assert_eq!(a.colour_of(hidden).unwrap(), Colour::Green);
    }

    #[test]
    fn test_bogus_words_are_rejected() {
        let mut a = allocator(Colour::Green);
        let r = a.alloc(&DATA).unwrap();
        let inner = r.to_word() + 1;
        let foreign = ObjectRef::new(40, 8).to_word();
        a.roots_mut().push(inner).unwrap();
        a.roots_mut().push(foreign).unwrap();

        let stats = mark_heap(&mut a, Colour::Blue, 8);
        assert_eq!(stats.marked, 1);
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn test_freed_record_is_stained_not_traced() {
        let mut a = allocator(Colour::Green);
        let holder = a.alloc(&NODE).unwrap();
        let child = unrooted(&mut a, &NODE);
        a.write_ref(holder, 0, Some(child)).unwrap();
        a.dealloc(Some(holder));

        let stats = mark_heap(&mut a, Colour::Blue, 8);
        assert_eq!(stats.marked, 1);
        assert_eq!(a.colour_of(child).unwrap(), Colour::Green);
    }

    #[test]
    fn test_already_stained_is_skipped() {
        let mut a = allocator(Colour::Blue);
        a.alloc(&NODE).unwrap();
        let stats = mark_heap(&mut a, Colour::Blue, 8);
        assert_eq!(stats.marked, 0);
    }
}
