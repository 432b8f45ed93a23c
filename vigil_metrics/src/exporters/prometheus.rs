use crate::exporters::MetricsExport;
use ::prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use vigil_core::{Result, VigilError};

const OPERATION_LABEL: &str = "operation";

/// Renders the exposition text format with one series per operation.
///
/// Counters carry running totals; gauges carry instantaneous readings.
pub struct PrometheusExporter;

impl PrometheusExporter {
    pub fn format(metrics: &MetricsExport) -> Result<String> {
        let registry = Registry::new();

        let steps = counter(&registry, "vigil_steps_total", "Total number of steps executed")?;
        let failed = counter(&registry, "vigil_steps_failed_total", "Total number of failed steps")?;
        let tool_calls = counter(&registry, "vigil_tool_calls_total", "Total number of tool calls")?;
        let input_tokens = counter(&registry, "vigil_input_tokens_total", "Total input tokens consumed")?;
        let output_tokens = counter(&registry, "vigil_output_tokens_total", "Total output tokens produced")?;

        let p50 = gauge(&registry, "vigil_latency_p50_ms", "50th percentile latency in milliseconds")?;
        let p95 = gauge(&registry, "vigil_latency_p95_ms", "95th percentile latency in milliseconds")?;
        let p99 = gauge(&registry, "vigil_latency_p99_ms", "99th percentile latency in milliseconds")?;
        let cost = gauge(&registry, "vigil_estimated_cost_usd", "Estimated cost in USD")?;
        let error_rate = gauge(&registry, "vigil_error_rate", "Failed steps over total steps")?;
        let tool_success = gauge(&registry, "vigil_tool_success_rate", "Successful tool calls over tool calls")?;

        for (operation, op) in &metrics.operations {
            let labels = [operation.as_str()];
            steps.with_label_values(&labels).inc_by(op.total_steps);
            failed.with_label_values(&labels).inc_by(op.failed_steps);
            tool_calls.with_label_values(&labels).inc_by(op.tool_calls);
            input_tokens.with_label_values(&labels).inc_by(op.input_tokens);
            output_tokens.with_label_values(&labels).inc_by(op.output_tokens);

            p50.with_label_values(&labels).set(op.latency_p50);
            p95.with_label_values(&labels).set(op.latency_p95);
            p99.with_label_values(&labels).set(op.latency_p99);
            cost.with_label_values(&labels).set(op.estimated_cost_usd);
            error_rate.with_label_values(&labels).set(op.error_rate);
            tool_success.with_label_values(&labels).set(op.tool_success_rate);
        }

        let health = &metrics.kpis.health;
        single_gauge(&registry, "vigil_active_alerts", "Alerts not yet resolved", health.active_alerts as f64)?;
        single_gauge(&registry, "vigil_slo_violations", "SLOs violated at the last update", health.slo_violations as f64)?;
        single_gauge(&registry, "vigil_health_score", "Share of SLOs met at the last update", health.health_score)?;

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export_error)?;
        String::from_utf8(buffer).map_err(|e| VigilError::ExportFailed(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), &[OPERATION_LABEL]).map_err(export_error)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(export_error)?;
    Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), &[OPERATION_LABEL]).map_err(export_error)?;
    registry.register(Box::new(gauge.clone())).map_err(export_error)?;
    Ok(gauge)
}

fn single_gauge(registry: &Registry, name: &str, help: &str, value: f64) -> Result<()> {
    let gauge = Gauge::new(name, help).map_err(export_error)?;
    gauge.set(value);
    registry.register(Box::new(gauge)).map_err(export_error)?;
    Ok(())
}

fn export_error(e: prometheus::Error) -> VigilError {
    VigilError::ExportFailed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MetricsCollector;
    use crate::kpi::{HealthKpis, KpiSnapshot};
    use chrono::Utc;

    fn export() -> MetricsExport {
        let collector = MetricsCollector::new();
        collector.record_latency("planner", 120.0);
        collector.record_step("planner", true, false);
        collector.record_step("planner", false, false);
        collector.record_tokens("planner", 40, 10);
        let summary = collector.summary();

        MetricsExport {
            generated_at: summary.generated_at,
            kpis: KpiSnapshot::from_metrics(
                &summary.global,
                HealthKpis {
                    active_alerts: 1,
                    unacknowledged_alerts: 1,
                    slo_violations: 1,
                    health_score: 75.0,
                    last_update: Utc::now(),
                },
            ),
            global: summary.global,
            operations: summary.operations,
            active_violations: Vec::new(),
        }
    }

    #[test]
    fn test_exposition_format() {
        let text = PrometheusExporter::format(&export()).unwrap();

        assert!(text.contains("# HELP vigil_steps_total Total number of steps executed"));
        assert!(text.contains("# TYPE vigil_steps_total counter"));
        assert!(text.contains("vigil_steps_total{operation=\"planner\"} 2"));
        assert!(text.contains("vigil_steps_failed_total{operation=\"planner\"} 1"));
        assert!(text.contains("# TYPE vigil_latency_p95_ms gauge"));
        assert!(text.contains("vigil_latency_p95_ms{operation=\"planner\"} 120"));
        assert!(text.contains("vigil_health_score 75"));
    }
}
