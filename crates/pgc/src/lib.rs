//! # PGC - Page-Based Allocator with Background Mark-and-Sweep Collection
//!
//! PGC is the memory substrate of a managed-language runtime: every mutator
//! thread allocates from its own chain of pages, and a background collector
//! periodically marks everything reachable from each thread's root table
//! and releases whole pages that hold nothing reachable.
//!
//! ## Overview
//!
//! - **Per-Thread Pages**: Allocation is thread-local; no cross-thread contention outside collection
//! - **Inline Records**: Every object is preceded by a two-word header; records tile their page exactly
//! - **In-Place Free List**: Free records are split, reused as-is or merged with free neighbours on demand
//! - **Explicit Roots**: Each thread owns a fixed-capacity root table; scopes reserve and release frames of it
//! - **Two-Colour Epochs**: Collection flips a colour instead of clearing mark bits
//! - **Parallel Cycles**: One worker per thread marks, then one per thread sweeps
//!
//! ## Quick Start
//!
//! ```rust
//! use pgc::{GcConfig, Runtime, Type};
//!
//! // next pointer + payload word
//! static NODE: Type = Type::new("Node", 2, 1);
//!
//! fn main() -> Result<(), pgc::GcError> {
//!     let runtime = Runtime::new(GcConfig::default())?;
//!     let thread = runtime.main_thread()?;
//!
//!     {
//!         let scope = thread.scope(1)?;
//!         let head = scope.alloc(&NODE, 0)?;
//!         let tail = thread.alloc(&NODE)?;
//!         thread.write_ref(head, 0, Some(tail))?;
//!         thread.write_word(tail, 1, 42)?;
//!
//!         // both survive: head is rooted, tail is reachable from head
//!         runtime.collect()?;
//!         assert_eq!(thread.read_word(tail, 1)?, 42);
//!     }
//!
//!     runtime.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Mutator Threads                       │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐         │
//! │  │ Allocator  │   │ Allocator  │   │ Allocator  │         │
//! │  │ pages      │   │ pages      │   │ pages      │         │
//! │  │ root table │   │ root table │   │ root table │         │
//! │  └─────┬──────┘   └─────┬──────┘   └─────┬──────┘         │
//! │        └── Mutex ───────┴──── Mutex ─────┘                │
//! └────────────────────────────┼─────────────────────────────┘
//!                              │
//! ┌────────────────────────────┼─────────────────────────────┐
//! │                  pgc-collector                            │
//! │   lock all heaps → flip epoch → mark ∥ → sweep ∥ → unlock │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Object References
//!
//! ```text
//! ObjectRef (64 bits, never zero):
//! ┌──────────────────────┬──────────────────────────────────┐
//! │  page slot (24 bits) │  data word offset (40 bits)      │
//! └──────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Root slots and pointer fields store references as raw words; `0` is null.
//!
//! ## Thread Safety
//!
//! - `Runtime` is `Send + Sync` and cheap to clone
//! - Each `ThreadHandle` locks only its own heap, once per call
//! - A collection cycle holds every heap lock; mutators calling in during a
//!   cycle wait for it to end
//! - References are only valid on the thread whose heap allocated them
//!
//! ## Modules
//!
//! - [`allocator`]: Per-thread allocator, root table and root scopes
//! - [`config`]: Configuration parameters and validation
//! - [`error`]: Error types for all PGC operations
//! - [`gc`]: Epoch, collection cycle and background task
//! - [`heap`]: Pages, page chains and heap dumps
//! - [`logging`]: Structured GC events
//! - [`marker`]: Reachability staining
//! - [`object`]: Type descriptors, references and record headers
//! - [`runtime`]: Runtime context and thread registry
//! - [`stats`]: Collector statistics
//! - [`sweep`]: Page reclamation
//!
//! ## Limitations
//!
//! - **Page Granularity**: An unreachable record lives until nothing on its page is reachable
//! - **No Cross-Thread References**: A reference only resolves in the heap that allocated it
//! - **64-bit Only**: References need 64-bit words

#[cfg(not(target_pointer_width = "64"))]
compile_error!("pgc requires a 64-bit target");

// Core GC modules
pub mod config;
pub mod error;
pub mod gc;

// Memory management subsystems
pub mod allocator;
pub mod heap;
pub mod object;

// GC algorithm components
pub mod marker;
pub mod sweep;

// Runtime and monitoring
pub mod logging;
pub mod runtime;
pub mod stats;

// Re-export main types for convenience
pub use allocator::{Allocator, RootScope};
pub use config::GcConfig;
pub use error::{GcError, Result};
pub use gc::{CycleReport, GcState};
pub use heap::{HeapDump, HeapSummary};
pub use logging::{GcEvent, GcLogger, GcLoggerConfig, LogLevel};
pub use object::{Colour, ObjectRef, Type};
pub use runtime::{Runtime, ThreadHandle};
pub use stats::StatsSnapshot;

/// PGC version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a runtime from `GcConfig::from_env`
///
/// # Examples
///
/// ```rust
/// let runtime = pgc::init()?;
/// let thread = runtime.main_thread()?;
/// assert!(thread.verify());
/// runtime.shutdown();
/// # Ok::<(), pgc::GcError>(())
/// ```
pub fn init() -> Result<Runtime> {
    Runtime::new(GcConfig::from_env())
}

/// Create a runtime with a custom configuration
pub fn init_with_config(config: GcConfig) -> Result<Runtime> {
    Runtime::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_default() {
        let runtime = init_with_config(GcConfig::default()).unwrap();
        runtime.shutdown();
    }

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
