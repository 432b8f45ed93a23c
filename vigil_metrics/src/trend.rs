use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub metric: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub samples: usize,
    pub values: Vec<f64>,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub first_half_avg: f64,
    pub second_half_avg: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub period_hours: u64,
    pub data_points: usize,
    pub trends: BTreeMap<String, MetricTrend>,
}

impl TrendReport {
    pub fn has_data(&self) -> bool {
        self.data_points > 0
    }
}

/// Bounded per-metric history of dashboard readings.
#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    history: HashMap<String, VecDeque<TrendPoint>>,
    max_points: usize,
    epsilon: f64,
    min_samples: usize,
}

impl TrendAnalyzer {
    pub fn new(max_points: usize, epsilon: f64, min_samples: usize) -> Self {
        Self {
            history: HashMap::new(),
            max_points: max_points.max(1),
            epsilon,
            min_samples: min_samples.max(2),
        }
    }

    pub fn record(&mut self, metric: &str, timestamp: DateTime<Utc>, value: f64) {
        let points = self.history.entry(metric.to_string()).or_default();
        if points.len() == self.max_points {
            points.pop_front();
        }
        points.push_back(TrendPoint {
            metric: metric.to_string(),
            timestamp,
            value,
        });
    }

    pub fn record_all<'a>(
        &mut self,
        timestamp: DateTime<Utc>,
        values: impl IntoIterator<Item = (&'a str, f64)>,
    ) {
        for (metric, value) in values {
            self.record(metric, timestamp, value);
        }
    }

    pub fn points(&self, metric: &str) -> Vec<TrendPoint> {
        self.history
            .get(metric)
            .map(|points| points.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn metric_count(&self) -> usize {
        self.history.len()
    }

    pub fn trend(&self, hours: u64, now: DateTime<Utc>) -> TrendReport {
        let hours_i64 = i64::try_from(hours).unwrap_or(i64::MAX);
        let window = Duration::try_hours(hours_i64).unwrap_or(Duration::MAX);
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut trends = BTreeMap::new();
        let mut data_points = 0;

        for (metric, points) in &self.history {
            let values: Vec<f64> = points
                .iter()
                .filter(|point| point.timestamp > cutoff && point.timestamp <= now)
                .map(|point| point.value)
                .collect();
            if values.is_empty() {
                continue;
            }
            data_points = data_points.max(values.len());
            trends.insert(metric.clone(), self.analyze(values));
        }

        TrendReport {
            period_hours: hours,
            data_points,
            trends,
        }
    }

    fn analyze(&self, values: Vec<f64>) -> MetricTrend {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = mean(&values);

        let (first, second) = values.split_at(values.len() / 2);
        let first_half_avg = mean(first);
        let second_half_avg = mean(second);

        let trend = if values.len() < self.min_samples {
            TrendDirection::Unknown
        } else {
            self.classify(&values, first_half_avg, second_half_avg)
        };

        MetricTrend {
            samples: values.len(),
            min,
            max,
            avg,
            first_half_avg,
            second_half_avg,
            trend,
            values,
        }
    }

    fn classify(&self, values: &[f64], first_half_avg: f64, second_half_avg: f64) -> TrendDirection {
        // A strictly monotonic run is directional however small its steps.
        if values.windows(2).all(|pair| pair[1] > pair[0]) {
            return TrendDirection::Increasing;
        }
        if values.windows(2).all(|pair| pair[1] < pair[0]) {
            return TrendDirection::Decreasing;
        }

        let delta = second_half_avg - first_half_avg;
        let change = if first_half_avg == 0.0 {
            if delta == 0.0 {
                0.0
            } else {
                delta.signum() * f64::INFINITY
            }
        } else {
            delta / first_half_avg.abs()
        };

        if change > self.epsilon {
            TrendDirection::Increasing
        } else if change < -self.epsilon {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(100, 0.05, 2)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
