//! Error Module - PGC Error Types
//!
//! Defines all error types used in PGC.
//!
//! # Error Categories
//!
//! ## Memory Errors
//! - `OutOfMemory` - backing page could not be obtained
//! - `RootTableFull` - no root slot left for a new reference
//!
//! ## Reference Errors
//! - `InvalidReference` - reference does not name a record of this heap
//! - `FieldOutOfBounds` - payload index beyond the record's capacity
//! - `SlotOutOfRange` - scope slot beyond the reserved frame
//!
//! ## Lifecycle Errors
//! - `Configuration` - invalid configuration
//! - `ThreadSpawn` - collector or worker thread could not be started
//! - `ShutDown` - runtime already shut down
//! - `HandleTaken` - main thread handle requested twice
//! - `Internal` - invariant violation

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for all PGC operations
///
/// # Examples
///
/// ```rust
/// use pgc::GcError;
///
/// fn handle_error(err: GcError) {
///     match err {
///         GcError::OutOfMemory { requested_words } => {
///             eprintln!("OOM: requested {} words", requested_words);
///         }
///         other => eprintln!("Other error: {}", other),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum GcError {
    /// Out of memory - a fresh page could not be created
    ///
    /// **When returned:** The system allocator refused the backing buffer of a
    /// new page, or the request is larger than the largest addressable page.
    ///
    /// **Recovery strategy:** None inside the allocator. There is no
    /// synchronous collection fallback, callers should treat this as fatal.
    #[error("Out of memory: could not create a page for {requested_words} words")]
    OutOfMemory { requested_words: usize },

    /// Root table full
    ///
    /// **When returned:** A scope or an unscoped allocation needs more root
    /// slots than the table has left.
    ///
    /// **Recovery strategy:** Release scopes, or raise `root_table_capacity`.
    #[error("Root table full: {requested} slots requested, capacity {capacity}")]
    RootTableFull { capacity: usize, requested: usize },

    /// Scope slot out of range
    ///
    /// **When returned:** `RootScope::alloc`/`set`/`get` with a slot index at
    /// or beyond the number of slots the scope reserved.
    #[error("Scope slot {slot} out of range for a frame of {len} slots")]
    SlotOutOfRange { slot: usize, len: usize },

    /// Invalid reference
    ///
    /// **When returned:** The reference names a vacant page slot, lies outside
    /// its page, does not start a record, or names a free record where a live
    /// one is required.
    #[error("Invalid reference: {raw:#x}")]
    InvalidReference { raw: usize },

    /// Field index out of bounds
    ///
    /// **When returned:** Payload word index >= the record's usable words.
    #[error("Field index {index} out of bounds for {len} usable words")]
    FieldOutOfBounds { index: usize, len: usize },

    /// Configuration error
    ///
    /// **When returned:** `GcConfig::validate` rejected the configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Thread spawn failure
    ///
    /// **When returned:** The OS refused to start the collector thread or a
    /// mark/sweep worker.
    ///
    /// **Recovery strategy:** The cycle is abandoned; the next cycle retries.
    #[error("Thread spawn failed: {0}")]
    ThreadSpawn(String),

    /// Runtime already shut down
    #[error("Runtime has been shut down")]
    ShutDown,

    /// The main thread handle was already handed out
    ///
    /// **When returned:** A second call to `Runtime::main_thread`.
    #[error("Main thread handle already taken")]
    HandleTaken,

    /// Internal error - indicates a bug in PGC
    ///
    /// **When returned:** Invariant violation, e.g. a freshly created page
    /// could not hold the request it was sized for, or a worker panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GcError {
    /// Check if this error leaves the runtime unable to continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, GcError::OutOfMemory { .. } | GcError::Internal(_))
    }
}

impl From<ConfigError> for GcError {
    fn from(err: ConfigError) -> Self {
        GcError::Configuration(err.to_string())
    }
}

/// Result type alias for PGC operations
pub type Result<T> = std::result::Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(GcError::OutOfMemory { requested_words: 8 }.is_fatal());
        assert!(GcError::Internal("x".into()).is_fatal());
        assert!(!GcError::ShutDown.is_fatal());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: GcError = ConfigError::InvalidPageSize("too small".into()).into();
        assert!(matches!(err, GcError::Configuration(_)));
        assert!(err.to_string().contains("too small"));
    }
}
