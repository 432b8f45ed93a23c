use crate::ui;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use vigil_metrics::exporters::{ExportFormat, JsonExporter, MetricsExport};

#[derive(Tabled)]
struct KpiRow {
    #[tabled(rename = "KPI")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Steps")]
    steps: u64,
    #[tabled(rename = "Error rate")]
    error_rate: String,
    #[tabled(rename = "P50 (ms)")]
    p50: String,
    #[tabled(rename = "P95 (ms)")]
    p95: String,
    #[tabled(rename = "P99 (ms)")]
    p99: String,
    #[tabled(rename = "Tokens")]
    tokens: u64,
    #[tabled(rename = "Cost (USD)")]
    cost: String,
}

pub async fn execute(metrics_file: PathBuf, format: String, output: Option<PathBuf>) -> Result<()> {
    let contents = tokio::fs::read_to_string(&metrics_file).await?;
    let export = JsonExporter::parse(&contents)?;

    if format == "cli" {
        println!("{}", "=== Metrics Report ===".bold().cyan());
        println!("Metrics file: {}", metrics_file.display());
        print_cli_report(&export);
        return Ok(());
    }

    let format: ExportFormat = format.parse()?;
    let rendered = export.render(format)?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, rendered).await?;
            ui::print_success(&format!("Report written to {}", path.display()));
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

fn print_cli_report(export: &MetricsExport) {
    let kpis = &export.kpis;
    ui::print_header(&format!("Snapshot {}", export.generated_at.to_rfc3339()));

    let rows = vec![
        KpiRow { name: "Latency P50", value: format!("{:.2} ms", kpis.performance.latency_p50_ms) },
        KpiRow { name: "Latency P95", value: format!("{:.2} ms", kpis.performance.latency_p95_ms) },
        KpiRow { name: "Latency P99", value: format!("{:.2} ms", kpis.performance.latency_p99_ms) },
        KpiRow { name: "Total steps", value: kpis.reliability.total_steps.to_string() },
        KpiRow { name: "Tool success rate", value: format!("{:.2}%", kpis.reliability.success_rate * 100.0) },
        KpiRow { name: "Error rate", value: format!("{:.2}%", kpis.reliability.error_rate * 100.0) },
        KpiRow { name: "Total tokens", value: kpis.efficiency.total_tokens.to_string() },
        KpiRow { name: "Estimated cost", value: format!("${:.4}", kpis.efficiency.estimated_cost_usd) },
        KpiRow { name: "Health score", value: format!("{:.1}", kpis.health.health_score) },
        KpiRow { name: "Active alerts", value: kpis.health.active_alerts.to_string() },
    ];
    println!("{}", Table::new(rows));

    if !export.operations.is_empty() {
        ui::print_header("Operations");
        let rows = export.operations.iter().map(|(name, op)| OperationRow {
            operation: name.clone(),
            steps: op.total_steps,
            error_rate: format!("{:.2}%", op.error_rate * 100.0),
            p50: format!("{:.2}", op.latency_p50),
            p95: format!("{:.2}", op.latency_p95),
            p99: format!("{:.2}", op.latency_p99),
            tokens: op.total_tokens,
            cost: format!("{:.4}", op.estimated_cost_usd),
        });
        println!("{}", Table::new(rows));
    }

    ui::print_header("SLO Violations");
    if export.active_violations.is_empty() {
        ui::print_success("All SLOs are met");
    }
    for violation in &export.active_violations {
        ui::print_error(&format!("[{}] {}", violation.severity, violation.message()));
    }
}
