//! Serving metrics: query latency, query/reload counters.

use std::collections::VecDeque;
use std::time::Duration;

/// Latency samples kept for percentile estimates.
const LATENCY_WINDOW: usize = 10_000;

/// Collects runtime metrics for the retrieval server.
#[derive(Debug)]
pub struct MetricsCollector {
    query_latencies_us: VecDeque<f64>,
    total_queries: u64,
    failed_queries: u64,
    total_reloads: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            query_latencies_us: VecDeque::new(),
            total_queries: 0,
            failed_queries: 0,
            total_reloads: 0,
        }
    }

    /// Record a successful query with its duration.
    pub fn record_query(&mut self, duration: Duration) {
        self.total_queries += 1;
        if self.query_latencies_us.len() == LATENCY_WINDOW {
            self.query_latencies_us.pop_front();
        }
        self.query_latencies_us.push_back(duration.as_micros() as f64);
    }

    /// Record a rejected or failed query.
    pub fn record_failure(&mut self) {
        self.failed_queries += 1;
    }

    /// Record a successful index reload.
    pub fn record_reload(&mut self) {
        self.total_reloads += 1;
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    pub fn failed_queries(&self) -> u64 {
        self.failed_queries
    }

    pub fn total_reloads(&self) -> u64 {
        self.total_reloads
    }

    /// Average query latency in microseconds over the sample window.
    pub fn avg_query_latency_us(&self) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.query_latencies_us.iter().sum();
        sum / self.query_latencies_us.len() as f64
    }

    /// Get a percentile of query latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = self.query_latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
