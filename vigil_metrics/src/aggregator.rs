use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Ring buffer of the most recent latency observations for one operation.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends one observation, evicting the oldest when full.
    pub fn push(&mut self, latency_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn percentiles(&self) -> LatencyPercentiles {
        MetricsAggregator::percentiles(self.samples.iter().copied())
    }
}

pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Nearest-rank p50/p95/p99 over an arbitrary sample set.
    pub fn percentiles(samples: impl IntoIterator<Item = f64>) -> LatencyPercentiles {
        let mut sorted: Vec<f64> = samples.into_iter().collect();
        if sorted.is_empty() {
            return LatencyPercentiles::default();
        }

        // Stable: equal values keep insertion order.
        sorted.sort_by(|a, b| a.total_cmp(b));

        LatencyPercentiles {
            p50: Self::percentile(&sorted, 50.0),
            p95: Self::percentile(&sorted, 95.0),
            p99: Self::percentile(&sorted, 99.0),
        }
    }

    pub fn percentile(sorted: &[f64], percentile: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let rank = (percentile * sorted.len() as f64 / 100.0).ceil() as usize;
        let index = rank.saturating_sub(1).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn rate(part: u64, whole: u64) -> f64 {
        if whole == 0 {
            return 0.0;
        }
        part as f64 / whole as f64
    }
}
