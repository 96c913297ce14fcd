//! Wall-clock timing for benchmarks and per-dispatch records.

use std::time::{Duration, Instant};

/// Simple wall-clock timer for benchmarking.
pub struct BenchTimer {
    start: Instant,
}

impl BenchTimer {
    /// Start the timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed time in milliseconds.
    pub fn stop(&self) -> f64 {
        let elapsed = self.start.elapsed();
        elapsed.as_secs_f64() * 1000.0
    }
}

/// One executed command, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTiming {
    /// Kernel name, or `"fill"` for a buffer fill.
    pub label: &'static str,
    /// Work-groups launched; zero for fills.
    pub groups: usize,
    pub group_size: u32,
    pub elapsed: Duration,
}

impl DispatchTiming {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
