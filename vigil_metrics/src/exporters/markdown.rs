use crate::exporters::MetricsExport;
use std::fmt::Write;
use std::path::Path;
use vigil_core::Result;

pub struct MarkdownExporter;

impl MarkdownExporter {
    pub async fn export(metrics: &MetricsExport, path: impl AsRef<Path>) -> Result<()> {
        let markdown = Self::format(metrics);
        tokio::fs::write(path, markdown).await?;
        Ok(())
    }

    pub fn format(metrics: &MetricsExport) -> String {
        let kpis = &metrics.kpis;
        let mut report = format!(
            r#"# Agent Observability Report

Generated at {}

## Performance

| Percentile | Latency |
|------------|---------|
| P50 | {:.2} ms |
| P95 | {:.2} ms |
| P99 | {:.2} ms |

## Reliability

| Metric | Value |
|--------|-------|
| Total Steps | {} |
| Tool Success Rate | {:.2}% |
| Error Rate | {:.2}% |

## Efficiency

| Metric | Value |
|--------|-------|
| Total Tokens | {} |
| Estimated Cost | ${:.4} |
| Tool Calls | {} |

## Health

| Metric | Value |
|--------|-------|
| Health Score | {:.1} |
| Active Alerts | {} |
| Unacknowledged Alerts | {} |
| SLO Violations | {} |
"#,
            metrics.generated_at.to_rfc3339(),
            kpis.performance.latency_p50_ms,
            kpis.performance.latency_p95_ms,
            kpis.performance.latency_p99_ms,
            kpis.reliability.total_steps,
            kpis.reliability.success_rate * 100.0,
            kpis.reliability.error_rate * 100.0,
            kpis.efficiency.total_tokens,
            kpis.efficiency.estimated_cost_usd,
            kpis.efficiency.tool_calls,
            kpis.health.health_score,
            kpis.health.active_alerts,
            kpis.health.unacknowledged_alerts,
            kpis.health.slo_violations,
        );

        if !metrics.operations.is_empty() {
            report.push_str(
                "\n## Operations\n\n\
                 | Operation | Steps | Failed | P50 (ms) | P95 (ms) | P99 (ms) | Tokens | Cost (USD) |\n\
                 |-----------|-------|--------|----------|----------|----------|--------|------------|\n",
            );
            for (name, op) in &metrics.operations {
                let _ = writeln!(
                    report,
                    "| {} | {} | {} | {:.2} | {:.2} | {:.2} | {} | {:.4} |",
                    name,
                    op.total_steps,
                    op.failed_steps,
                    op.latency_p50,
                    op.latency_p95,
                    op.latency_p99,
                    op.total_tokens,
                    op.estimated_cost_usd,
                );
            }
        }

        report.push_str("\n## SLO Violations\n\n");
        if metrics.active_violations.is_empty() {
            report.push_str("All SLOs are met.\n");
        } else {
            for violation in &metrics.active_violations {
                let _ = writeln!(report, "- **{}** {}", violation.severity, violation.message());
            }
        }

        report
    }
}
