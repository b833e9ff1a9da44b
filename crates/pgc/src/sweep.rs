//! Sweep Phase - Page-Granularity Reclamation
//!
//! After marking, a page whose colour differs from the epoch holds nothing
//! reachable and is released whole. Records on surviving pages are never
//! touched: unreachable records there stay allocated until their page dies.
//!
//! The walk stops before the thread's last page as it was when the cycle
//! started, so a page created for the allocation in flight is never swept.

use crate::allocator::Allocator;
use crate::logging::GcEvent;
use crate::object::Colour;
use serde::Serialize;

/// Outcome of sweeping one heap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub pages_freed: usize,
    /// Words of the released pages
    pub words_freed: usize,
}

impl SweepStats {
    /// Sum of two threads' results
    pub fn merge(self, other: SweepStats) -> SweepStats {
        SweepStats {
            pages_freed: self.pages_freed + other.pages_freed,
            words_freed: self.words_freed + other.words_freed,
        }
    }
}

/// Release every unstained page before `end`
///
/// `end` is the page slot that was last in the chain when the cycle began.
/// The chain head is only released when another page can take its place.
pub fn sweep_heap(allocator: &mut Allocator, epoch: Colour, end: usize) -> SweepStats {
    let thread = allocator.thread();
    let logger = allocator.logger().clone();
    let heap = allocator.heap_mut();
    let mut stats = SweepStats::default();

    let mut prev = None;
    let mut cursor = Some(heap.first_page());

    while let Some(slot) = cursor.filter(|&slot| slot != end) {
        let Some(page) = heap.page(slot) else {
            break;
        };
        cursor = page.next();

        if page.colour() == epoch {
            prev = Some(slot);
            continue;
        }

        match heap.unlink(prev, slot) {
            Some(released) => {
                stats.pages_freed += 1;
                stats.words_freed += released.usable_words();
                log::trace!(
                    "thread {}: page {} freed ({} words)",
                    thread,
                    slot,
                    released.usable_words()
                );
                logger.log(GcEvent::PageFreed {
                    thread,
                    slot,
                    words: released.usable_words(),
                });
            }
            None => prev = Some(slot),
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use crate::gc::Epoch;
    use crate::logging::GcLogger;
    use crate::marker::mark_heap;
    use crate::object::Type;
    use std::sync::Arc;

    // one record fills a 6-word page
    static CELL: Type = Type::new("Cell", 4, 1);

    fn allocator() -> Allocator {
        let config = GcConfig {
            page_size_words: 8,
            root_table_capacity: 16,
            ..Default::default()
        };
        Allocator::new(
            0,
            &config,
            Arc::new(Epoch::new(Colour::Green)),
            Arc::new(GcLogger::default()),
        )
        .unwrap()
    }

    fn collect(a: &mut Allocator, epoch: Colour) -> SweepStats {
        let end = a.heap().last_page();
        mark_heap(a, epoch, 8);
        sweep_heap(a, epoch, end)
    }

    #[test]
    fn test_unreachable_pages_are_released() {
        let mut a = allocator();
        let kept = a.alloc(&CELL).unwrap();
        for _ in 0..3 {
            a.alloc(&CELL).unwrap();
        }
        // drop every root but the first
        a.roots_mut().release(1);
        assert_eq!(a.heap().page_count(), 4);

        let stats = collect(&mut a, Colour::Blue);

        // the last page is excluded, so only the two middle pages go
        assert_eq!(stats.pages_freed, 2);
        assert_eq!(a.heap().page_count(), 2);
        assert_eq!(a.colour_of(kept).unwrap(), Colour::Blue);
        assert!(a.verify());
    }

    #[test]
    fn test_unreachable_head_is_promoted_away() {
        let mut a = allocator();
        a.alloc(&CELL).unwrap();
        let second = a.alloc(&CELL).unwrap();
        a.alloc(&CELL).unwrap();
        a.roots_mut().release(0);
        a.roots_mut().push(second.to_word()).unwrap();

        let stats = collect(&mut a, Colour::Blue);

        assert_eq!(stats.pages_freed, 1);
        assert_eq!(a.heap().first_page(), second.page_slot());
        assert!(a.verify());
    }

    #[test]
    fn test_sole_page_is_never_released() {
        let mut a = allocator();
        a.alloc(&CELL).unwrap();
        a.roots_mut().release(0);

        for epoch in [Colour::Blue, Colour::Green, Colour::Blue] {
            let stats = collect(&mut a, epoch);
            assert_eq!(stats.pages_freed, 0);
            assert_eq!(a.heap().page_count(), 1);
        }
    }

    #[test]
    fn test_current_page_resets_to_last() {
        let mut a = allocator();
        let first = a.alloc(&CELL).unwrap();
        a.alloc(&CELL).unwrap();
        a.alloc(&CELL).unwrap();
        let last = a.heap().last_page();

        // refill the head page so it becomes current again
        a.dealloc(Some(first));
        a.alloc(&CELL).unwrap();
        assert_eq!(a.heap().current_page(), first.page_slot());
        a.roots_mut().release(0);

        collect(&mut a, Colour::Blue);
        assert_eq!(a.heap().current_page(), last);
        assert!(a.verify());
    }
}
