use crate::collector::GlobalMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latency percentiles in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceKpis {
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityKpis {
    /// Tool-call success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Failed steps over total steps in `[0, 1]`.
    pub error_rate: f64,
    pub total_steps: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyKpis {
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    pub tool_calls: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthKpis {
    /// Alerts not yet resolved.
    pub active_alerts: usize,
    /// Alerts still `OPEN`.
    pub unacknowledged_alerts: usize,
    pub slo_violations: usize,
    /// Share of SLOs met at the last update, 0-100.
    pub health_score: f64,
    pub last_update: DateTime<Utc>,
}

/// Read-only KPI rollup produced by each dashboard update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub performance: PerformanceKpis,
    pub reliability: ReliabilityKpis,
    pub efficiency: EfficiencyKpis,
    pub health: HealthKpis,
}

impl KpiSnapshot {
    pub fn from_metrics(global: &GlobalMetrics, health: HealthKpis) -> Self {
        let totals = &global.totals;
        Self {
            performance: PerformanceKpis {
                latency_p50_ms: totals.latency_p50,
                latency_p95_ms: totals.latency_p95,
                latency_p99_ms: totals.latency_p99,
            },
            reliability: ReliabilityKpis {
                success_rate: totals.tool_success_rate,
                error_rate: totals.error_rate,
                total_steps: totals.total_steps,
            },
            efficiency: EfficiencyKpis {
                total_tokens: totals.total_tokens,
                estimated_cost_usd: totals.estimated_cost_usd,
                tool_calls: totals.tool_calls,
            },
            health,
        }
    }

    /// Snapshot used before the first evaluation.
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self::from_metrics(
            &GlobalMetrics::default(),
            HealthKpis {
                active_alerts: 0,
                unacknowledged_alerts: 0,
                slo_violations: 0,
                health_score: 100.0,
                last_update: at,
            },
        )
    }
}
