use crate::commands::load_config;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use vigil_core::SloDefinition;
use vigil_metrics::MetricsDashboard;

#[derive(Tabled)]
struct SloRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Objective")]
    objective: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&SloDefinition> for SloRow {
    fn from(slo: &SloDefinition) -> Self {
        Self {
            name: slo.name.clone(),
            objective: format!("{} {} {}", slo.metric, slo.operator, slo.threshold),
            severity: slo.severity.to_string(),
            scope: slo.operation.clone().unwrap_or_else(|| "global".to_string()),
            description: slo.description.clone(),
        }
    }
}

pub async fn execute(config: Option<PathBuf>) -> Result<()> {
    println!("{}", "=== Registered SLOs ===".bold().cyan());

    let config = load_config(config.as_deref()).await?;
    let dashboard = MetricsDashboard::from_config(&config);
    let slos = dashboard.slos().await;

    println!("\nTotal SLOs: {}\n", slos.len());
    if slos.is_empty() {
        ui::print_warning("No SLOs registered");
        return Ok(());
    }

    let unrecognized: Vec<&SloDefinition> = slos
        .iter()
        .filter(|slo| !slo.operator.is_recognized())
        .collect();

    println!("{}", Table::new(slos.iter().map(SloRow::from)));

    for slo in unrecognized {
        ui::print_warning(&format!(
            "SLO '{}' uses unrecognized operator '{}' and will always be reported as violated",
            slo.name, slo.operator
        ));
    }

    Ok(())
}
