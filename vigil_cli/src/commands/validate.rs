use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use vigil_config::parse_config_from_file;

pub async fn execute(config_file: PathBuf) -> Result<()> {
    println!("{}", "=== Validating Config ===".bold().cyan());
    println!("File: {}", config_file.display());

    match parse_config_from_file(&config_file).await {
        Ok(config) => {
            println!("\n{}", "✓ Config is valid!".green().bold());
            println!("\nCollector:");
            println!("  Sample window: {}", config.collector.sample_window);
            println!(
                "  Pricing: ${} / 1k input, ${} / 1k output",
                config.collector.pricing.input_per_1k_usd, config.collector.pricing.output_per_1k_usd
            );

            let dashboard = &config.dashboard;
            println!("\nDashboard:");
            println!("  Built-in SLOs: {}", if dashboard.default_slos { "enabled" } else { "disabled" });
            println!("  Trend points: {} (epsilon {})", dashboard.max_trend_points, dashboard.trend_epsilon);
            println!("  Alert history: {}", dashboard.max_alert_history);
            println!(
                "  Evaluation interval: {}",
                humantime::format_duration(dashboard.evaluation_interval)
            );
            println!("  Query timeout: {}", humantime::format_duration(dashboard.query_timeout));

            if config.slos.is_empty() && !dashboard.default_slos {
                println!("\n{}", "⚠ Warning: no SLOs will be registered".yellow());
            }

            for (i, slo) in config.slos.iter().enumerate() {
                println!("\n  SLO {}: {}", i + 1, slo.name);
                println!("    {} {} {}", slo.metric, slo.operator, slo.threshold);
                println!("    Severity: {}", slo.severity);
                if let Some(operation) = &slo.operation {
                    println!("    Operation: {}", operation);
                }
            }

            Ok(())
        }
        Err(e) => {
            println!("\n{}", "✗ Config is invalid!".red().bold());
            println!("\nError: {:#}", e);
            Err(e)
        }
    }
}
