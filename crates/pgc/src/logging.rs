//! GC Logging and Tracing
//!
//! Structured events for collection cycles and heap growth, useful for:
//! - Performance analysis
//! - Debugging
//! - Production monitoring
//!
//! Plain diagnostic lines go through the `log` facade. `GcLogger` keeps a
//! bounded buffer of typed `GcEvent`s and can echo them to the console or a
//! file, human-readable or as JSON lines.
//!
//! Log Levels:
//! - ERROR: allocation failures
//! - INFO: GC cycles, heap summaries
//! - DEBUG: phases
//! - TRACE: page creation and release

use crate::object::Colour;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Log level for GC operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// GC event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GcEvent {
    /// GC cycle started, heaps locked and epoch flipped
    CycleStart {
        cycle: u64,
        epoch: Colour,
        threads: usize,
    },

    /// GC phase completed on every thread
    PhaseEnd {
        cycle: u64,
        phase: String,
        duration_ms: f64,
    },

    /// GC cycle completed
    CycleEnd {
        cycle: u64,
        duration_ms: f64,
        marked: usize,
        pages_freed: usize,
        words_freed: usize,
    },

    /// A page was appended to a thread's chain
    PageCreated {
        thread: usize,
        slot: usize,
        words: usize,
        single_purpose: bool,
    },

    /// Sweep released a page
    PageFreed {
        thread: usize,
        slot: usize,
        words: usize,
    },

    /// A request could not be satisfied
    AllocationFailure {
        thread: usize,
        requested_words: usize,
        reason: String,
    },

    /// Heap statistics of one thread
    HeapSummary {
        thread: usize,
        pages: usize,
        live_allocations: usize,
        used_words: usize,
        total_words: usize,
    },
}

impl GcEvent {
    /// Level the event is logged at
    pub fn level(&self) -> LogLevel {
        match self {
            GcEvent::AllocationFailure { .. } => LogLevel::Error,
            GcEvent::CycleStart { .. } | GcEvent::CycleEnd { .. } | GcEvent::HeapSummary { .. } => {
                LogLevel::Info
            },
            GcEvent::PhaseEnd { .. } => LogLevel::Debug,
            GcEvent::PageCreated { .. } | GcEvent::PageFreed { .. } => LogLevel::Trace,
        }
    }
}

/// GC Logger configuration
#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Append output to this file
    pub file: Option<String>,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,

    /// Events kept in memory; the oldest are dropped beyond this
    pub buffer_capacity: usize,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            file: None,
            json: false,
            timestamps: true,
            buffer_capacity: 1024,
        }
    }
}

/// GC Logger - centralized logging for GC operations
pub struct GcLogger {
    config: GcLoggerConfig,
    events: Mutex<VecDeque<(DateTime<Local>, GcEvent)>>,
    enabled: AtomicBool,
}

impl GcLogger {
    /// Create new GC logger
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &GcLoggerConfig {
        &self.config
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log a GC event
    pub fn log(&self, event: GcEvent) {
        if !self.is_enabled() || event.level() > self.config.level {
            return;
        }

        let timestamp = Local::now();

        if self.config.console || self.config.file.is_some() {
            let line = self.format_line(&timestamp, &event);
            if self.config.console {
                match event.level() {
                    LogLevel::Error => eprintln!("{}", line),
                    _ => println!("{}", line),
                }
            }
            if let Some(ref path) = self.config.file {
                self.append_to_file(path, &line);
            }
        }

        let mut events = self.events.lock();
        if self.config.buffer_capacity == 0 {
            return;
        }
        while events.len() >= self.config.buffer_capacity {
            events.pop_front();
        }
        events.push_back((timestamp, event));
    }

    /// Render one output line
    pub fn format_line(&self, timestamp: &DateTime<Local>, event: &GcEvent) -> String {
        let body = if self.config.json {
            Self::format_json(event)
        } else {
            Self::format_human(event)
        };

        if self.config.timestamps {
            format!("[{}] {}", timestamp.format("%Y-%m-%d %H:%M:%S%.3f"), body)
        } else {
            body
        }
    }

    fn append_to_file(&self, path: &str, line: &str) {
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = written {
            log::warn!("GC log file {} not writable: {}", path, e);
        }
    }

    /// Human-readable form
    fn format_human(event: &GcEvent) -> String {
        match event {
            GcEvent::CycleStart {
                cycle,
                epoch,
                threads,
            } => format!(
                "[GC] Cycle {} started (epoch {:?}, {} thread(s))",
                cycle, epoch, threads
            ),
            GcEvent::PhaseEnd {
                cycle,
                phase,
                duration_ms,
            } => format!(
                "[GC] Cycle {}: {} phase completed ({:.2}ms)",
                cycle, phase, duration_ms
            ),
            GcEvent::CycleEnd {
                cycle,
                duration_ms,
                marked,
                pages_freed,
                words_freed,
            } => format!(
                "[GC] Cycle {} completed ({:.2}ms, marked {}, freed {} page(s) / {} words)",
                cycle, duration_ms, marked, pages_freed, words_freed
            ),
            GcEvent::PageCreated {
                thread,
                slot,
                words,
                single_purpose,
            } => format!(
                "[GC] Thread {}: page {} created ({} words{})",
                thread,
                slot,
                words,
                if *single_purpose {
                    ", single-purpose"
                } else {
                    ""
                }
            ),
            GcEvent::PageFreed {
                thread,
                slot,
                words,
            } => format!("[GC] Thread {}: page {} freed ({} words)", thread, slot, words),
            GcEvent::AllocationFailure {
                thread,
                requested_words,
                reason,
            } => format!(
                "[GC] Thread {}: allocation of {} words failed: {}",
                thread, requested_words, reason
            ),
            GcEvent::HeapSummary {
                thread,
                pages,
                live_allocations,
                used_words,
                total_words,
            } => format!(
                "[GC] Thread {}: {} page(s), {} live allocation(s), {}/{} words used",
                thread, pages, live_allocations, used_words, total_words
            ),
        }
    }

    /// JSON form, one object per line
    fn format_json(event: &GcEvent) -> String {
        serde_json::to_string(event).unwrap_or_else(|e| {
            serde_json::json!({ "type": "format_error", "error": e.to_string() }).to_string()
        })
    }

    /// Get all buffered events, oldest first
    pub fn get_events(&self) -> Vec<(DateTime<Local>, GcEvent)> {
        self.events.lock().iter().cloned().collect()
    }

    /// Buffered events that match `predicate`
    pub fn events_matching<F>(&self, predicate: F) -> Vec<GcEvent>
    where
        F: Fn(&GcEvent) -> bool,
    {
        self.events
            .lock()
            .iter()
            .map(|(_, event)| event)
            .filter(|event| predicate(event))
            .cloned()
            .collect()
    }

    /// Clear all events
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(GcLoggerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle_start(cycle: u64) -> GcEvent {
        GcEvent::CycleStart {
            cycle,
            epoch: Colour::Blue,
            threads: 1,
        }
    }

    #[test]
    fn test_logger_creation() {
        let logger = GcLogger::default();
        assert!(logger.is_enabled());
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_event_logging() {
        let logger = GcLogger::default();
        logger.log(cycle_start(1));
        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_level_filters_trace_events() {
        let logger = GcLogger::default();
        logger.log(GcEvent::PageFreed {
            thread: 0,
            slot: 3,
            words: 64,
        });
        assert_eq!(logger.event_count(), 0);

        let verbose = GcLogger::new(GcLoggerConfig {
            level: LogLevel::Trace,
            ..Default::default()
        });
        verbose.log(GcEvent::PageFreed {
            thread: 0,
            slot: 3,
            words: 64,
        });
        assert_eq!(verbose.event_count(), 1);
    }

    #[test]
    fn test_disabled_logger_drops_events() {
        let logger = GcLogger::default();
        logger.disable();
        logger.log(cycle_start(1));
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_buffer_drops_oldest() {
        let logger = GcLogger::new(GcLoggerConfig {
            buffer_capacity: 2,
            ..Default::default()
        });
        for cycle in 1..=3 {
            logger.log(cycle_start(cycle));
        }

        let events = logger.events_matching(|_| true);
        assert_eq!(events, vec![cycle_start(2), cycle_start(3)]);
    }

    #[test]
    fn test_json_line_is_tagged() {
        let logger = GcLogger::new(GcLoggerConfig {
            json: true,
            timestamps: false,
            ..Default::default()
        });
        let line = logger.format_line(&Local::now(), &cycle_start(7));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "cycle_start");
        assert_eq!(value["cycle"], 7);
        assert_eq!(value["epoch"], "Blue");
    }

    #[test]
    fn test_human_line() {
        let logger = GcLogger::new(GcLoggerConfig {
            timestamps: false,
            ..Default::default()
        });
        let line = logger.format_line(&Local::now(), &cycle_start(2));
        assert_eq!(line, "[GC] Cycle 2 started (epoch Blue, 1 thread(s))");
    }
}
