//! Lightweight performance timing utilities.
//!
//! Measures where a run spends its wall-clock time (hydraulic solves versus
//! thermal substeps). Enabled via the `HN_TIMING` environment variable or
//! programmatically.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable performance timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("HN_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    start: Instant,
    enabled: bool,
}

impl Timer {
    /// Create and start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        if self.enabled {
            Some(self.start.elapsed().as_secs_f64())
        } else {
            None
        }
    }

    /// Stop the timer and add the elapsed time to an accumulator.
    pub fn stop_into(self, acc: &AccumulatingTimer) {
        if let Some(elapsed) = self.stop() {
            acc.record(elapsed);
        }
    }
}

/// Accumulating timer for tracking total time across multiple calls.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Get number of calls.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Kernel phase timers.
pub mod kernel_timing {
    use super::AccumulatingTimer;

    /// Time spent in one direction's hydraulic solve (including re-solves after flips).
    pub static HYDRAULIC_SOLVES: AccumulatingTimer = AccumulatingTimer::new();
    /// Time spent in one thermal substep (forerun + return propagation).
    pub static THERMAL_SUBSTEPS: AccumulatingTimer = AccumulatingTimer::new();

    pub fn reset_all() {
        HYDRAULIC_SOLVES.reset();
        THERMAL_SUBSTEPS.reset();
    }

    /// Human-readable breakdown, one line per phase; empty when timing is disabled.
    pub fn summary() -> Vec<String> {
        if !super::is_enabled() {
            return Vec::new();
        }
        [
            ("hydraulic solves", &HYDRAULIC_SOLVES),
            ("thermal substeps", &THERMAL_SUBSTEPS),
        ]
        .into_iter()
        .filter(|(_, t)| t.count() > 0)
        .map(|(label, t)| {
            format!(
                "{label}: {} calls, {:.3}s total, {:.4}ms avg",
                t.count(),
                t.total_seconds(),
                t.average_seconds() * 1000.0
            )
        })
        .collect()
    }
}
