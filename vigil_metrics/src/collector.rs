use crate::aggregator::{MetricsAggregator, SampleWindow};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use vigil_config::CollectorConfig;
use vigil_core::{DynCostModel, ResourceSampler, TokenPricing};

/// Aggregate for one operation. Latencies are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub latency_p50: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_samples: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    pub total_steps: u64,
    pub successful_steps: u64,
    pub failed_steps: u64,
    pub tool_calls: u64,
    pub tool_successes: u64,
    pub tool_success_rate: f64,
    pub error_rate: f64,
}

impl OperationMetrics {
    /// Looks up a field by its metric key.
    pub fn metric(&self, key: &str) -> Option<f64> {
        let value = match key {
            "latency_p50" => self.latency_p50,
            "latency_p95" => self.latency_p95,
            "latency_p99" => self.latency_p99,
            "latency_samples" => self.latency_samples as f64,
            "input_tokens" => self.input_tokens as f64,
            "output_tokens" => self.output_tokens as f64,
            "total_tokens" => self.total_tokens as f64,
            "estimated_cost_usd" => self.estimated_cost_usd,
            "total_steps" => self.total_steps as f64,
            "successful_steps" => self.successful_steps as f64,
            "failed_steps" => self.failed_steps as f64,
            "tool_calls" => self.tool_calls as f64,
            "tool_successes" => self.tool_successes as f64,
            "tool_success_rate" => self.tool_success_rate,
            "error_rate" => self.error_rate,
            _ => return None,
        };
        Some(value)
    }

    fn refresh_rates(&mut self) {
        self.tool_success_rate = MetricsAggregator::rate(self.tool_successes, self.tool_calls);
        self.error_rate = MetricsAggregator::rate(self.failed_steps, self.total_steps);
    }

    fn absorb(&mut self, other: &OperationMetrics) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.estimated_cost_usd += other.estimated_cost_usd;
        self.total_steps += other.total_steps;
        self.successful_steps += other.successful_steps;
        self.failed_steps += other.failed_steps;
        self.tool_calls += other.tool_calls;
        self.tool_successes += other.tool_successes;
    }
}

/// Rollup across every operation plus process gauges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    #[serde(flatten)]
    pub totals: OperationMetrics,
    pub operation_count: usize,
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

impl GlobalMetrics {
    pub const TRACKED_METRICS: [&'static str; 18] = [
        "latency_p50",
        "latency_p95",
        "latency_p99",
        "latency_samples",
        "input_tokens",
        "output_tokens",
        "total_tokens",
        "estimated_cost_usd",
        "total_steps",
        "successful_steps",
        "failed_steps",
        "tool_calls",
        "tool_successes",
        "tool_success_rate",
        "error_rate",
        "operation_count",
        "memory_mb",
        "cpu_percent",
    ];

    pub fn metric(&self, key: &str) -> Option<f64> {
        match key {
            "operation_count" => Some(self.operation_count as f64),
            "memory_mb" => Some(self.memory_mb),
            "cpu_percent" => Some(self.cpu_percent),
            other => self.totals.metric(other),
        }
    }

    pub fn metric_values(&self) -> Vec<(&'static str, f64)> {
        Self::TRACKED_METRICS
            .iter()
            .filter_map(|key| self.metric(key).map(|value| (*key, value)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub generated_at: DateTime<Utc>,
    pub global: GlobalMetrics,
    pub operations: BTreeMap<String, OperationMetrics>,
}

impl MetricsSummary {
    pub fn empty() -> Self {
        Self {
            generated_at: Utc::now(),
            global: GlobalMetrics::default(),
            operations: BTreeMap::new(),
        }
    }

    /// Unknown operations read as a zero-valued aggregate.
    pub fn operation(&self, operation: &str) -> OperationMetrics {
        self.operations.get(operation).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub operation: String,
    pub metrics: OperationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryView {
    Operation(OperationSummary),
    All(MetricsSummary),
}

struct OperationState {
    window: SampleWindow,
    metrics: OperationMetrics,
}

impl OperationState {
    fn new(window_size: usize) -> Self {
        Self {
            window: SampleWindow::new(window_size),
            metrics: OperationMetrics::default(),
        }
    }

    fn push_latency(&mut self, latency_ms: f64) {
        self.window.push(clamp_latency(latency_ms));
        let p = self.window.percentiles();
        self.metrics.latency_p50 = p.p50;
        self.metrics.latency_p95 = p.p95;
        self.metrics.latency_p99 = p.p99;
        self.metrics.latency_samples = self.window.len();
    }

    fn add_tokens(&mut self, input: u64, output: u64, cost_model: &DynCostModel) {
        self.metrics.input_tokens = self.metrics.input_tokens.saturating_add(input);
        self.metrics.output_tokens = self.metrics.output_tokens.saturating_add(output);
        self.metrics.total_tokens = self
            .metrics
            .input_tokens
            .saturating_add(self.metrics.output_tokens);
        self.metrics.estimated_cost_usd += cost_model.estimate(input, output);
    }

    fn add_step(&mut self, success: bool, tool_call: bool) {
        self.metrics.total_steps += 1;
        if success {
            self.metrics.successful_steps += 1;
        } else {
            self.metrics.failed_steps += 1;
        }
        if tool_call {
            self.metrics.tool_calls += 1;
            if success {
                self.metrics.tool_successes += 1;
            }
        }
        self.metrics.refresh_rates();
    }
}

/// Concurrency-safe aggregator of per-operation samples.
///
/// Each operation has its own lock, so writers on different operations never
/// contend beyond the brief registry lookup. All updates for one operation,
/// including the percentile recomputation, happen inside that operation's
/// critical section.
pub struct MetricsCollector {
    operations: RwLock<HashMap<String, Arc<Mutex<OperationState>>>>,
    window_size: usize,
    cost_model: DynCostModel,
    resources: Mutex<ResourceSampler>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_cost_model(
            CollectorConfig::default().sample_window,
            Arc::new(TokenPricing::default()),
        )
    }

    pub fn with_cost_model(window_size: usize, cost_model: DynCostModel) -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            window_size: window_size.max(1),
            cost_model,
            resources: Mutex::new(ResourceSampler::default()),
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::with_cost_model(config.sample_window, Arc::new(config.pricing))
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    fn state(&self, operation: &str) -> Arc<Mutex<OperationState>> {
        if let Some(state) = self.operations.read().get(operation) {
            return state.clone();
        }

        self.operations
            .write()
            .entry(operation.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(OperationState::new(self.window_size))))
            .clone()
    }

    pub fn record_latency(&self, operation: &str, latency_ms: f64) {
        self.state(operation).lock().push_latency(latency_ms);
    }

    pub fn record_tokens(&self, operation: &str, input_tokens: i64, output_tokens: i64) {
        let (input, output) = (clamp_tokens(input_tokens), clamp_tokens(output_tokens));
        self.state(operation)
            .lock()
            .add_tokens(input, output, &self.cost_model);
    }

    pub fn record_step(&self, operation: &str, success: bool, tool_call: bool) {
        self.state(operation).lock().add_step(success, tool_call);
    }

    /// Applies everything a finished span observed under one lock acquisition.
    pub(crate) fn commit(
        &self,
        operation: &str,
        latency_ms: f64,
        tokens: Option<(i64, i64)>,
        success: bool,
        tool_call: bool,
    ) {
        let state = self.state(operation);
        let mut state = state.lock();
        state.push_latency(latency_ms);
        if let Some((input, output)) = tokens {
            state.add_tokens(clamp_tokens(input), clamp_tokens(output), &self.cost_model);
        }
        state.add_step(success, tool_call);
    }

    /// One operation's aggregate, or zeros when it was never recorded.
    pub fn operation_metrics(&self, operation: &str) -> OperationMetrics {
        let state = self.operations.read().get(operation).cloned();
        state
            .map(|state| state.lock().metrics.clone())
            .unwrap_or_default()
    }

    pub fn get_summary(&self, operation: Option<&str>) -> SummaryView {
        match operation {
            Some(operation) => SummaryView::Operation(OperationSummary {
                operation: operation.to_string(),
                metrics: self.operation_metrics(operation),
            }),
            None => SummaryView::All(self.summary()),
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let states: Vec<(String, Arc<Mutex<OperationState>>)> = self
            .operations
            .read()
            .iter()
            .map(|(name, state)| (name.clone(), state.clone()))
            .collect();

        let mut operations = BTreeMap::new();
        let mut all_samples = Vec::new();
        let mut totals = OperationMetrics::default();

        for (name, state) in states {
            let state = state.lock();
            all_samples.extend(state.window.iter().copied());
            totals.absorb(&state.metrics);
            operations.insert(name, state.metrics.clone());
        }

        let p = MetricsAggregator::percentiles(all_samples.iter().copied());
        totals.latency_p50 = p.p50;
        totals.latency_p95 = p.p95;
        totals.latency_p99 = p.p99;
        totals.latency_samples = all_samples.len();
        totals.refresh_rates();

        let usage = self.resources.lock().sample();

        MetricsSummary {
            generated_at: Utc::now(),
            global: GlobalMetrics {
                totals,
                operation_count: operations.len(),
                memory_mb: usage.memory_mb,
                cpu_percent: usage.cpu_percent,
            },
            operations,
        }
    }

    pub fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.operations.write().clear();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_latency(latency_ms: f64) -> f64 {
    if latency_ms.is_finite() && latency_ms > 0.0 {
        latency_ms
    } else {
        0.0
    }
}

fn clamp_tokens(tokens: i64) -> u64 {
    tokens.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_record_latency() {
        let collector = MetricsCollector::new();
        for i in 0..20 {
            collector.record_latency("test_op", i as f64);
        }

        let metrics = collector.operation_metrics("test_op");
        assert_eq!(metrics.latency_samples, 20);
        assert!(metrics.latency_p50 > 0.0);
        assert!(metrics.latency_p50 <= metrics.latency_p95);
        assert!(metrics.latency_p95 <= metrics.latency_p99);
    }

    #[test]
    fn test_negative_inputs_are_clamped() {
        let collector = MetricsCollector::new();
        collector.record_latency("op", -25.0);
        collector.record_latency("op", f64::NAN);
        collector.record_tokens("op", -10, 5);

        let metrics = collector.operation_metrics("op");
        assert_eq!(metrics.latency_p99, 0.0);
        assert_eq!(metrics.input_tokens, 0);
        assert_eq!(metrics.output_tokens, 5);
        assert_eq!(metrics.total_tokens, 5);
    }

    #[test]
    fn test_token_totals_saturate() {
        let collector = MetricsCollector::new();
        for _ in 0..3 {
            collector.record_tokens("huge", i64::MAX, i64::MAX);
        }
        collector.record_tokens("other", i64::MAX, 0);

        let metrics = collector.operation_metrics("huge");
        assert_eq!(metrics.input_tokens, u64::MAX);
        assert_eq!(metrics.total_tokens, u64::MAX);

        let summary = collector.summary();
        assert_eq!(summary.global.totals.input_tokens, u64::MAX);
        assert_eq!(summary.global.totals.total_tokens, u64::MAX);
    }

    #[test]
    fn test_record_tokens() {
        let collector = MetricsCollector::new();
        collector.record_tokens("test_op", 100, 50);

        let metrics = collector.operation_metrics("test_op");
        assert_eq!(metrics.input_tokens, 100);
        assert_eq!(metrics.output_tokens, 50);
        assert_eq!(metrics.total_tokens, 150);
        assert!(metrics.estimated_cost_usd > 0.0);
    }

    #[test]
    fn test_cost_model_is_pluggable() {
        let collector =
            MetricsCollector::with_cost_model(10, Arc::new(|input: u64, output: u64| {
                input as f64 * 0.01 + output as f64 * 0.1
            }));
        collector.record_tokens("llm", 100, 10);
        collector.record_tokens("llm", 100, 10);

        assert!((collector.operation_metrics("llm").estimated_cost_usd - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_step() {
        let collector = MetricsCollector::new();
        collector.record_step("test_op", true, true);
        collector.record_step("test_op", false, false);

        let metrics = collector.operation_metrics("test_op");
        assert_eq!(metrics.total_steps, 2);
        assert_eq!(metrics.successful_steps, 1);
        assert_eq!(metrics.failed_steps, 1);
        assert_eq!(metrics.tool_calls, 1);
        assert_eq!(metrics.tool_success_rate, 1.0);
        assert_eq!(metrics.error_rate, 0.5);
    }

    #[test]
    fn test_tool_success_rate_without_tool_calls() {
        let collector = MetricsCollector::new();
        collector.record_step("op", true, false);

        assert_eq!(collector.operation_metrics("op").tool_success_rate, 0.0);
    }

    #[test]
    fn test_unknown_operation_is_zero() {
        let collector = MetricsCollector::new();

        assert_eq!(collector.operation_metrics("missing"), OperationMetrics::default());
        assert!(collector.operations().is_empty());
        match collector.get_summary(Some("missing")) {
            SummaryView::Operation(summary) => {
                assert_eq!(summary.operation, "missing");
                assert_eq!(summary.metrics.total_steps, 0);
            }
            SummaryView::All(_) => panic!("expected operation summary"),
        }
    }

    #[test]
    fn test_global_rollup() {
        let collector = MetricsCollector::new();
        collector.record_latency("a", 100.0);
        collector.record_latency("b", 300.0);
        collector.record_step("a", true, true);
        collector.record_step("b", false, true);
        collector.record_tokens("a", 10, 20);
        collector.record_tokens("b", 30, 40);

        let summary = collector.summary();
        let global = &summary.global;
        assert_eq!(global.operation_count, 2);
        assert_eq!(global.totals.total_steps, 2);
        assert_eq!(global.totals.total_tokens, 100);
        assert_eq!(global.totals.latency_samples, 2);
        assert_eq!(global.totals.latency_p99, 300.0);
        assert_eq!(global.totals.tool_success_rate, 0.5);
        assert_eq!(global.metric("operation_count"), Some(2.0));
        assert_eq!(global.metric("unknown_metric"), None);
        assert_eq!(
            global.totals.successful_steps + global.totals.failed_steps,
            global.totals.total_steps
        );
    }

    #[test]
    fn test_concurrent_writers() {
        let collector = Arc::new(MetricsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let collector = collector.clone();
                thread::spawn(move || {
                    let op = if t % 2 == 0 { "even" } else { "odd" };
                    for i in 0..250 {
                        collector.record_latency(op, i as f64);
                        collector.record_step(op, i % 10 != 0, false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = collector.summary();
        assert_eq!(summary.operation("even").total_steps, 1000);
        assert_eq!(summary.operation("odd").total_steps, 1000);
        assert_eq!(summary.operation("odd").failed_steps, 100);
        assert_eq!(summary.global.totals.total_steps, 2000);
    }

    #[test]
    fn test_clear() {
        let collector = MetricsCollector::new();
        collector.record_step("op", true, false);
        collector.clear();

        assert!(collector.operations().is_empty());
        assert_eq!(collector.summary().global.totals.total_steps, 0);
    }
}
