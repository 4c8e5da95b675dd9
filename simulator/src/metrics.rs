//! Simulation metrics.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use borderless_common::OperationKind;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Total operations attempted.
    pub total_operations: u64,
    /// Operations that committed (including idempotent replays).
    pub committed: BTreeMap<String, u64>,
    /// Rejected operations by error code.
    pub rejected: BTreeMap<&'static str, u64>,
    /// Latency samples (µs).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            committed: BTreeMap::new(),
            rejected: BTreeMap::new(),
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed operation.
    pub fn record_success(&mut self, kind: OperationKind, latency: Duration) {
        self.total_operations += 1;
        *self.committed.entry(kind.to_string()).or_default() += 1;
        self.sample(latency);
    }

    /// Record a rejected operation.
    pub fn record_failure(&mut self, code: &'static str, latency: Duration) {
        self.total_operations += 1;
        *self.rejected.entry(code).or_default() += 1;
        self.sample(latency);
    }

    fn sample(&mut self, latency: Duration) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency.as_micros() as u64);
    }

    pub fn successful_operations(&self) -> u64 {
        self.committed.values().sum()
    }

    pub fn failed_operations(&self) -> u64 {
        self.rejected.values().sum()
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.successful_operations() as f64 / self.total_operations as f64
    }

    /// Get throughput (operations per second).
    pub fn throughput(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }

        self.total_operations as f64 / secs
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_success(OperationKind::Deposit, Duration::from_micros(100));
        metrics.record_success(OperationKind::Transfer, Duration::from_micros(200));
        metrics.record_success(OperationKind::Transfer, Duration::from_micros(150));
        metrics.record_failure("INSUFFICIENT_FUNDS", Duration::from_micros(150));

        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.successful_operations(), 3);
        assert_eq!(metrics.failed_operations(), 1);
        assert_eq!(metrics.committed["transfer"], 2);
        assert_eq!(metrics.average_latency_us(), 150);
        assert_eq!(metrics.p99_latency_us(), 200);
        assert_eq!(metrics.success_rate(), 0.75);
    }
}
