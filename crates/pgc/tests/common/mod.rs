//! Test Utilities for the PGC Test Suite
//!
//! This module provides test utilities that enforce STRICT assertions.
//! NO tolerances, NO excuses for partially working behaviour.
//!
//! ============================================================================
//! CRITICAL: These utilities are designed to FIND BUGS, not to have passing tests.
//! ============================================================================

#![allow(dead_code)]

use pgc::{CycleReport, GcConfig, ObjectRef, Runtime, ThreadHandle, Type};
use std::collections::HashSet;
use std::time::Duration;

/// Standard page size for tests (words)
pub const TEST_PAGE_WORDS: usize = 256;

/// Root slots per thread for tests
pub const TEST_ROOT_SLOTS: usize = 1024;

/// Maximum test duration before timeout
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Linked-list node: next pointer + payload word
pub static NODE: Type = Type::new("Node", 2, 1);

/// Two pointers + payload word
pub static PAIR: Type = Type::new("Pair", 3, 2);

/// Pointer-free payload
pub static LEAF: Type = Type::new("Leaf", 4, 0);

/// ============================================================================
/// GC FIXTURE
/// ============================================================================

/// Test fixture for runtime operations
///
/// Provides a runtime without background collection (cycles run only when
/// the test asks) and the main thread's handle. Shuts down on drop.
pub struct GcFixture {
    pub runtime: Runtime,
    pub main: ThreadHandle,
    pub config: GcConfig,
}

impl GcFixture {
    /// Create fixture with small pages and manual collection
    ///
    /// **Bug this finds:** Configuration validation bugs, initialization failures
    pub fn with_defaults() -> Self {
        Self::with_page_words(TEST_PAGE_WORDS)
    }

    /// Create fixture with a custom standard page size
    ///
    /// **Bug this finds:** Page sizing bugs, single-purpose threshold bugs
    pub fn with_page_words(page_size_words: usize) -> Self {
        Self::with_config(GcConfig {
            page_size_words,
            root_table_capacity: TEST_ROOT_SLOTS,
            background_collection: false,
            ..Default::default()
        })
    }

    /// Create fixture from a full configuration
    pub fn with_config(config: GcConfig) -> Self {
        let runtime = Runtime::new(config.clone())
            .expect("Runtime initialization should succeed with valid config");
        let main = runtime
            .main_thread()
            .expect("Main thread handle should be available once");

        Self {
            runtime,
            main,
            config,
        }
    }

    /// Allocate on the main thread
    ///
    /// **Bug this finds:** Allocation failures, root table bookkeeping bugs
    pub fn alloc(&self, ty: &'static Type) -> ObjectRef {
        self.main
            .alloc(ty)
            .unwrap_or_else(|e| panic!("Allocation of {} failed: {:?}", ty.name(), e))
    }

    /// Allocate `count` objects on the main thread
    pub fn alloc_many(&self, ty: &'static Type, count: usize) -> Vec<ObjectRef> {
        (0..count).map(|_| self.alloc(ty)).collect()
    }

    /// Build a singly linked list of `len` nodes; only the head is rooted
    /// by the caller's scope, every other node is reachable through it
    ///
    /// Each node's payload word holds its position.
    pub fn linked_list(&self, head_slot: &pgc::RootScope<'_>, len: usize) -> Vec<ObjectRef> {
        let mut nodes = Vec::with_capacity(len);
        let head = head_slot.alloc(&NODE, 0).expect("head allocation");
        self.main.write_word(head, 1, 0).expect("head payload");
        nodes.push(head);

        for position in 1..len {
            let scope = self.main.scope(1).expect("temporary frame");
            let node = scope.alloc(&NODE, 0).expect("node allocation");
            self.main.write_word(node, 1, position).expect("node payload");
            let prev = nodes[position - 1];
            self.main.write_ref(prev, 0, Some(node)).expect("link");
            nodes.push(node);
        }
        nodes
    }

    /// Run a cycle and wait for completion
    ///
    /// **Bug this finds:** Cycle not completing, worker failures, deadlock
    pub fn collect(&self) -> CycleReport {
        self.runtime
            .collect()
            .unwrap_or_else(|e| panic!("GC cycle should complete successfully: {:?}", e))
    }

    /// Completed cycles
    pub fn cycle_count(&self) -> u64 {
        self.runtime.collector().cycle_count()
    }
}

impl Drop for GcFixture {
    fn drop(&mut self) {
        self.runtime.shutdown();
    }
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

/// Assert that all references are unique
///
/// **Bug this finds:** Double placement, overlapping records
/// **Tolerance:** ZERO - Any duplicate is a bug
#[track_caller]
pub fn assert_all_refs_unique(refs: &[ObjectRef], context: &str) {
    let unique: HashSet<_> = refs.iter().collect();

    assert_eq!(
        unique.len(),
        refs.len(),
        "{}: Found {} duplicate references out of {} - two live objects share a record",
        context,
        refs.len() - unique.len(),
        refs.len()
    );
}

/// Assert that the heap passes every structural check
///
/// **Bug this finds:** Tiling gaps or overlaps, broken chain links, stale roots
/// **Tolerance:** ZERO - A broken heap corrupts every later allocation
#[track_caller]
pub fn assert_heap_valid(thread: &ThreadHandle, context: &str) {
    assert!(
        thread.verify(),
        "{}: heap verification failed - records no longer tile their pages \
         or roots above the height are not zero.\n{}",
        context,
        thread.heap_dump()
    );
}

/// Assert that an object is still a live record
///
/// **Bug this finds:** Reachable object reclaimed, page freed too early
#[track_caller]
pub fn assert_live(thread: &ThreadHandle, reference: ObjectRef, context: &str) {
    assert!(
        thread.is_live(reference),
        "{}: {:?} is no longer a live record - reachable object was reclaimed",
        context,
        reference
    );
}

/// Assert that an object's page was reclaimed
///
/// **Bug this finds:** Garbage kept alive, sweep skipping pages
#[track_caller]
pub fn assert_reclaimed(thread: &ThreadHandle, reference: ObjectRef, context: &str) {
    assert!(
        !thread.is_live(reference),
        "{}: {:?} is still live - unreachable page was not swept",
        context,
        reference
    );
}

/// Assert that GC cycle count increased
///
/// **Bug this finds:** GC not actually running, cycle counter bug
#[track_caller]
pub fn assert_gc_cycle_increased(before: u64, after: u64, context: &str) {
    assert!(
        after > before,
        "{}: GC cycle count did not increase (before={}, after={}) - GC did not execute",
        context,
        before,
        after
    );
}

/// Assert that operation completed within timeout
///
/// **Bug this finds:** Deadlock, infinite loop, performance regression
#[track_caller]
pub fn assert_completed_within_timeout<F, R>(operation: F, timeout: Duration, context: &str) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = operation();
    let elapsed = start.elapsed();

    assert!(
        elapsed < timeout,
        "{}: Operation took {:?}, exceeded timeout of {:?} - possible deadlock or performance bug",
        context,
        elapsed,
        timeout
    );

    result
}

/// ============================================================================
/// CONCURRENT TEST HELPERS
/// ============================================================================

/// Run `thread_count` mutators, each building and checking its own lists
///
/// Every mutator repeatedly builds a linked list of `list_len` nodes in a
/// scope, verifies every payload, then drops the scope. Returns the number
/// of lists each mutator verified.
///
/// **Bug this finds:** Cross-heap interference, cycles racing mutators
pub fn run_list_mutators(
    runtime: &Runtime,
    thread_count: usize,
    rounds: usize,
    list_len: usize,
) -> Vec<usize> {
    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            runtime
                .spawn_mutator(move |thread| {
                    let mut verified = 0;
                    for _ in 0..rounds {
                        let frame = thread.scope(1).expect("frame");
                        let mut prev = frame.alloc(&NODE, 0).expect("head");
                        thread.write_word(prev, 1, 0).expect("payload");
                        for position in 1..list_len {
                            // the unscoped alloc stays rooted until `frame` drops
                            let node = thread.alloc(&NODE).expect("node");
                            thread.write_word(node, 1, position).expect("payload");
                            thread.write_ref(prev, 0, Some(node)).expect("link");
                            prev = node;
                        }

                        let mut cursor = frame.get(0).expect("slot");
                        let mut position = 0;
                        while let Some(node) = cursor {
                            assert_eq!(
                                thread.read_word(node, 1).expect("payload"),
                                position,
                                "list payload corrupted"
                            );
                            cursor = thread.read_ref(node, 0).expect("next");
                            position += 1;
                        }
                        assert_eq!(position, list_len, "list truncated");
                        verified += 1;
                    }
                    assert!(thread.verify(), "mutator heap corrupted");
                    verified
                })
                .expect("mutator spawn")
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .unwrap_or_else(|e| panic!("Mutator panicked: {:?}", e))
        })
        .collect()
}
