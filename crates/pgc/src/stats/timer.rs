//! GC Timer - Timing Utilities
//!
//! Wall-clock timing of cycles and phases.

use std::time::{Duration, Instant};

/// GcTimer - timer for measuring GC operations
#[derive(Debug, Clone, Copy)]
pub struct GcTimer {
    start: Instant,
}

impl GcTimer {
    /// Start a timer now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time, restarting the timer
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now - self.start;
        self.start = now;
        lap
    }
}

impl Default for GcTimer {
    fn default() -> Self {
        Self::new()
    }
}
