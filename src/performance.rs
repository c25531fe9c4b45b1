//! Per-message latency accounting.
//!
//! Two monotonic spans are recorded for every processed message:
//!
//! - **processing**: message available → estimate assembled
//! - **total**: before the receive wait → estimate assembled
//!
//! Only processing latency feeds the running mean/min/max. Statistics are
//! never reset while the process lives.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Latencies of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub processing: Duration,
    pub total: Duration,
}

impl LatencySample {
    /// Build a sample from the three instants of a read/process cycle.
    pub fn from_instants(wait_started: Instant, received: Instant, finished: Instant) -> Self {
        Self {
            processing: finished.saturating_duration_since(received),
            total: finished.saturating_duration_since(wait_started),
        }
    }

    pub fn processing_ms(&self) -> f64 {
        self.processing.as_secs_f64() * 1_000.0
    }

    pub fn total_ms(&self) -> f64 {
        self.total.as_secs_f64() * 1_000.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub count: u64,
    pub mean_ms: f64,
    /// 0.0 until the first sample
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_total_ms: f64,
}

#[derive(Debug, Default)]
pub struct PerformanceTracker {
    stats: PerformanceStats,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the running statistics.
    pub fn record(&mut self, sample: LatencySample) -> PerformanceStats {
        let ms = sample.processing_ms();
        let s = &mut self.stats;

        s.count += 1;
        // Incremental mean: m_n = m_{n-1} + (x - m_{n-1}) / n
        s.mean_ms += (ms - s.mean_ms) / s.count as f64;
        if s.count == 1 {
            s.min_ms = ms;
            s.max_ms = ms;
        } else {
            s.min_ms = s.min_ms.min(ms);
            s.max_ms = s.max_ms.max(ms);
        }
        s.last_total_ms = sample.total_ms();
        *s
    }

    pub fn stats(&self) -> PerformanceStats {
        self.stats
    }

    pub fn count(&self) -> u64 {
        self.stats.count
    }

    /// True right after every `every_n`-th recorded sample.
    pub fn summary_due(&self, every_n: u64) -> bool {
        every_n > 0 && self.stats.count > 0 && self.stats.count % every_n == 0
    }
}
