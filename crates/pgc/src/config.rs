//! Configuration Module - Allocator and Collector Tuning
//!
//! Manages all configuration parameters for PGC.
//! Page size trades fragmentation against how often new pages are created;
//! the collection interval trades pause frequency against heap growth.

use crate::logging::GcLoggerConfig;
use crate::object::{HEADER_WORDS, MAX_PAGE_WORDS};
use std::time::Duration;

/// Default standard page size in words (10MB on 64-bit targets)
pub const DEFAULT_PAGE_SIZE_WORDS: usize = 1_280_000;

/// Default number of root slots per thread
pub const DEFAULT_ROOT_TABLE_CAPACITY: usize = 4096;

/// Default pause between background collection cycles
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_millis(100);

/// Smallest accepted standard page
pub const MIN_PAGE_SIZE_WORDS: usize = 4 * HEADER_WORDS;

/// Main configuration for the page allocator and collector
///
/// # Examples
///
/// ```rust
/// use pgc::GcConfig;
/// use std::time::Duration;
///
/// let config = GcConfig {
///     page_size_words: 64 * 1024,
///     collection_interval: Duration::from_millis(20),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Usable words of a standard heap page
    ///
    /// Requests that need more than this (header included) get their own
    /// single-purpose page sized exactly to the request.
    ///
    /// Default: 1,280,000 words
    pub page_size_words: usize,

    /// Number of root slots in each thread's root table
    ///
    /// Default: 4096
    pub root_table_capacity: usize,

    /// Pause between background collection cycles
    ///
    /// Default: 100ms
    pub collection_interval: Duration,

    /// Run collection cycles on a background thread
    ///
    /// When false, cycles only run through `Runtime::collect`.
    ///
    /// Default: true
    pub background_collection: bool,

    /// Initial capacity of the per-thread mark stack
    ///
    /// The stack grows as needed; this only avoids early reallocation.
    ///
    /// Default: 256
    pub mark_stack_capacity: usize,

    /// Log every collection cycle through the `log` facade at info level
    ///
    /// Default: false
    pub verbose: bool,

    /// Structured event logger settings
    pub logger: GcLoggerConfig,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            page_size_words: DEFAULT_PAGE_SIZE_WORDS,
            root_table_capacity: DEFAULT_ROOT_TABLE_CAPACITY,
            collection_interval: DEFAULT_COLLECTION_INTERVAL,
            background_collection: true,
            mark_stack_capacity: 256,
            verbose: false,
            logger: GcLoggerConfig::default(),
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pgc::GcConfig;
    ///
    /// let config = GcConfig {
    ///     root_table_capacity: 0,
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size_words < MIN_PAGE_SIZE_WORDS {
            return Err(ConfigError::InvalidPageSize(format!(
                "page_size_words must be at least {}",
                MIN_PAGE_SIZE_WORDS
            )));
        }

        if self.page_size_words > MAX_PAGE_WORDS {
            return Err(ConfigError::InvalidPageSize(format!(
                "page_size_words must not exceed {}",
                MAX_PAGE_WORDS
            )));
        }

        if self.root_table_capacity == 0 {
            return Err(ConfigError::InvalidRootTable(
                "root_table_capacity must be > 0".to_string(),
            ));
        }

        if self.background_collection && self.collection_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "collection_interval must be > 0 when background collection is enabled"
                    .to_string(),
            ));
        }

        if self.mark_stack_capacity == 0 {
            return Err(ConfigError::InvalidMarkStack(
                "mark_stack_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - PGC_PAGE_WORDS
    /// - PGC_ROOT_SLOTS
    /// - PGC_INTERVAL_MS
    /// - PGC_BACKGROUND
    /// - PGC_VERBOSE
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (the environment in `from_env`)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(words) = lookup("PGC_PAGE_WORDS").and_then(|v| v.parse::<usize>().ok()) {
            self.page_size_words = words;
        }

        if let Some(slots) = lookup("PGC_ROOT_SLOTS").and_then(|v| v.parse::<usize>().ok()) {
            self.root_table_capacity = slots;
        }

        if let Some(ms) = lookup("PGC_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.collection_interval = Duration::from_millis(ms);
        }

        if let Some(val) = lookup("PGC_BACKGROUND") {
            self.background_collection = parse_flag(&val);
        }

        if let Some(val) = lookup("PGC_VERBOSE") {
            self.verbose = parse_flag(&val);
        }

        self
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid page size: {0}")]
    InvalidPageSize(String),

    #[error("Invalid root table: {0}")]
    InvalidRootTable(String),

    #[error("Invalid collection interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid mark stack: {0}")]
    InvalidMarkStack(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = GcConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.background_collection);
        assert_eq!(config.page_size_words, 1_280_000);
        assert_eq!(config.collection_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_page_size() {
        let config = GcConfig {
            page_size_words: HEADER_WORDS,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_only_matters_in_background() {
        let config = GcConfig {
            collection_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GcConfig {
            collection_interval: Duration::ZERO,
            background_collection: false,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PGC_PAGE_WORDS", "4096"),
            ("PGC_ROOT_SLOTS", "not-a-number"),
            ("PGC_INTERVAL_MS", "5"),
            ("PGC_BACKGROUND", "false"),
            ("PGC_VERBOSE", "TRUE"),
        ]
        .into_iter()
        .collect();

        let config = GcConfig::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.page_size_words, 4096);
        assert_eq!(config.root_table_capacity, DEFAULT_ROOT_TABLE_CAPACITY);
        assert_eq!(config.collection_interval, Duration::from_millis(5));
        assert!(!config.background_collection);
        assert!(config.verbose);
    }
}
