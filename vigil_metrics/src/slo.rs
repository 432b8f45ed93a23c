use crate::collector::MetricsSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use vigil_core::{Severity, SloDefinition, SloOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The metric was read and failed the comparison.
    Breach,
    /// The metric key did not resolve against the snapshot.
    MissingMetric,
    /// The operator is outside the supported set.
    InvalidOperator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloViolation {
    pub slo_name: String,
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub current_value: Option<f64>,
    pub threshold: f64,
    pub operator: String,
    pub severity: Severity,
    pub description: String,
    pub kind: ViolationKind,
    pub timestamp: DateTime<Utc>,
}

impl SloViolation {
    pub fn message(&self) -> String {
        match self.kind {
            ViolationKind::Breach => format!(
                "SLO '{}' violated: {} (current {} {} {})",
                self.slo_name,
                self.description,
                self.current_value.unwrap_or_default(),
                self.operator,
                self.threshold
            ),
            ViolationKind::MissingMetric => format!(
                "SLO '{}' cannot be evaluated: metric '{}' not found",
                self.slo_name, self.metric
            ),
            ViolationKind::InvalidOperator => format!(
                "SLO '{}' has unrecognized operator '{}'",
                self.slo_name, self.operator
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SloEvaluation {
    pub evaluated: usize,
    pub met: usize,
    pub violations: Vec<SloViolation>,
}

impl SloEvaluation {
    /// Percentage of evaluated SLOs currently met; 100 when none are registered.
    pub fn health_score(&self) -> f64 {
        if self.evaluated == 0 {
            return 100.0;
        }
        self.met as f64 / self.evaluated as f64 * 100.0
    }
}

/// Registry of SLO definitions keyed by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SloEngine {
    slos: Vec<SloDefinition>,
}

impl SloEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        for slo in default_slos() {
            engine.add_slo(slo);
        }
        engine
    }

    /// Registers `slo`, replacing any definition with the same name.
    pub fn add_slo(&mut self, slo: SloDefinition) {
        match self.slos.iter_mut().find(|existing| existing.name == slo.name) {
            Some(existing) => *existing = slo,
            None => self.slos.push(slo),
        }
    }

    pub fn remove_slo(&mut self, name: &str) -> Option<SloDefinition> {
        let index = self.slos.iter().position(|slo| slo.name == name)?;
        Some(self.slos.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&SloDefinition> {
        self.slos.iter().find(|slo| slo.name == name)
    }

    pub fn slos(&self) -> &[SloDefinition] {
        &self.slos
    }

    pub fn len(&self) -> usize {
        self.slos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slos.is_empty()
    }

    /// Resolves the SLO's metric key against `summary`.
    pub fn resolve(slo: &SloDefinition, summary: &MetricsSummary) -> Option<f64> {
        match &slo.operation {
            Some(operation) => summary.operation(operation).metric(&slo.metric),
            None => summary.global.metric(&slo.metric),
        }
    }

    pub fn evaluate(&self, summary: &MetricsSummary, now: DateTime<Utc>) -> SloEvaluation {
        let mut violations = Vec::new();
        let mut met = 0;

        for slo in &self.slos {
            let value = Self::resolve(slo, summary);
            let kind = match value.map(|v| slo.evaluate(v)) {
                Some(SloOutcome::Met) => {
                    met += 1;
                    continue;
                }
                Some(SloOutcome::Violated) => ViolationKind::Breach,
                Some(SloOutcome::Misconfigured) => ViolationKind::InvalidOperator,
                None => ViolationKind::MissingMetric,
            };

            if kind != ViolationKind::Breach {
                warn!(slo = %slo.name, metric = %slo.metric, kind = ?kind, "SLO is misconfigured");
            }

            violations.push(SloViolation {
                slo_name: slo.name.clone(),
                metric: slo.metric.clone(),
                operation: slo.operation.clone(),
                current_value: value,
                threshold: slo.threshold,
                operator: slo.operator.to_string(),
                severity: slo.severity,
                description: slo.description.clone(),
                kind,
                timestamp: now,
            });
        }

        SloEvaluation {
            evaluated: self.slos.len(),
            met,
            violations,
        }
    }
}

pub fn default_slos() -> Vec<SloDefinition> {
    vec![
        SloDefinition::new(
            "latency_p95_under_5s",
            "latency_p95",
            5000.0,
            "<=",
            Severity::Warning,
            "P95 latency must stay under 5 seconds",
        ),
        SloDefinition::new(
            "success_rate_above_95",
            "tool_success_rate",
            0.95,
            ">=",
            Severity::Error,
            "Tool success rate must stay above 95%",
        ),
        SloDefinition::new(
            "error_rate_below_5",
            "error_rate",
            0.05,
            "<=",
            Severity::Warning,
            "Error rate must stay below 5%",
        ),
        SloDefinition::new(
            "tokens_under_1000",
            "total_tokens",
            1000.0,
            "<=",
            Severity::Info,
            "Token usage must stay under 1000 per episode",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MetricsCollector;

    fn summary_with_latency(latency_ms: f64) -> MetricsSummary {
        let collector = MetricsCollector::new();
        collector.record_latency("op", latency_ms);
        collector.record_step("op", true, true);
        collector.summary()
    }

    #[test]
    fn test_add_slo_replaces_by_name() {
        let mut engine = SloEngine::with_defaults();
        let initial = engine.len();

        engine.add_slo(SloDefinition::new("custom", "error_rate", 0.1, "<=", Severity::Info, ""));
        assert_eq!(engine.len(), initial + 1);

        engine.add_slo(SloDefinition::new("custom", "error_rate", 0.2, "<=", Severity::Critical, ""));
        assert_eq!(engine.len(), initial + 1);
        assert_eq!(engine.get("custom").unwrap().threshold, 0.2);
        assert_eq!(engine.get("custom").unwrap().severity, Severity::Critical);
    }

    #[test]
    fn test_breach_detected() {
        let mut engine = SloEngine::new();
        engine.add_slo(SloDefinition::new("p95", "latency_p95", 500.0, "<=", Severity::Error, "fast"));

        let evaluation = engine.evaluate(&summary_with_latency(950.0), Utc::now());
        assert_eq!(evaluation.violations.len(), 1);
        let violation = &evaluation.violations[0];
        assert_eq!(violation.kind, ViolationKind::Breach);
        assert_eq!(violation.current_value, Some(950.0));
        assert_eq!(violation.severity, Severity::Error);
        assert_eq!(evaluation.health_score(), 0.0);

        let evaluation = engine.evaluate(&summary_with_latency(400.0), Utc::now());
        assert!(evaluation.violations.is_empty());
        assert_eq!(evaluation.health_score(), 100.0);
    }

    #[test]
    fn test_missing_metric_is_a_violation() {
        let mut engine = SloEngine::new();
        engine.add_slo(SloDefinition::new("ghost", "queue_depth", 10.0, "<=", Severity::Warning, ""));

        let evaluation = engine.evaluate(&summary_with_latency(10.0), Utc::now());
        assert_eq!(evaluation.violations[0].kind, ViolationKind::MissingMetric);
        assert_eq!(evaluation.violations[0].current_value, None);
        assert!(evaluation.violations[0].message().contains("not found"));
    }

    #[test]
    fn test_invalid_operator_is_distinguishable() {
        let mut engine = SloEngine::new();
        engine.add_slo(SloDefinition::new("odd", "latency_p95", 10.0, "~=", Severity::Warning, ""));

        let evaluation = engine.evaluate(&summary_with_latency(10.0), Utc::now());
        assert_eq!(evaluation.violations[0].kind, ViolationKind::InvalidOperator);
        assert_eq!(evaluation.violations[0].operator, "~=");
    }

    #[test]
    fn test_operation_scoped_slo() {
        let collector = MetricsCollector::new();
        collector.record_latency("fast", 10.0);
        collector.record_latency("slow", 2000.0);
        let summary = collector.summary();

        let mut engine = SloEngine::new();
        engine.add_slo(
            SloDefinition::new("fast_p99", "latency_p99", 100.0, "<=", Severity::Warning, "")
                .for_operation("fast"),
        );
        engine.add_slo(
            SloDefinition::new("slow_p99", "latency_p99", 100.0, "<=", Severity::Warning, "")
                .for_operation("slow"),
        );

        let evaluation = engine.evaluate(&summary, Utc::now());
        assert_eq!(evaluation.met, 1);
        assert_eq!(evaluation.violations[0].slo_name, "slow_p99");
        assert_eq!(evaluation.violations[0].operation.as_deref(), Some("slow"));
    }

    #[test]
    fn test_default_slos_on_breaching_metrics() {
        let collector = MetricsCollector::new();
        collector.record_latency("op", 6000.0);
        collector.record_tokens("op", 1000, 500);
        for i in 0..10 {
            collector.record_step("op", i > 1, true);
        }

        let evaluation = SloEngine::with_defaults().evaluate(&collector.summary(), Utc::now());
        assert_eq!(evaluation.violations.len(), 4);
    }
}
