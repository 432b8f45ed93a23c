use crate::commands::load_config;
use crate::ui;
use anyhow::{Context, Result};
use colored::Colorize;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vigil_core::TraceContext;
use vigil_metrics::exporters::{JsonExporter, MarkdownExporter, PrometheusExporter};
use vigil_metrics::{MetricsCollector, MetricsDashboard, Monitor, MonitorRequest, SloViolation};

pub struct SimulateOptions {
    pub config: Option<PathBuf>,
    pub episodes: usize,
    pub failure_rate: f64,
    pub seed: Option<u64>,
    pub time_scale: f64,
    pub evaluate_every: Option<Duration>,
    pub output_json: Option<PathBuf>,
    pub output_prometheus: Option<PathBuf>,
    pub output_markdown: Option<PathBuf>,
}

/// One stage of a simulated agent episode.
struct Stage {
    operation: &'static str,
    /// Median duration in milliseconds.
    median_ms: f64,
    /// Token usage range, `(0, 0)` for stages that do not call a model.
    tokens: (i64, i64),
}

const STAGES: [Stage; 5] = [
    Stage { operation: "planner", median_ms: 40.0, tokens: (20, 60) },
    Stage { operation: "reasoner", median_ms: 60.0, tokens: (30, 90) },
    Stage { operation: "tool_selector", median_ms: 10.0, tokens: (0, 0) },
    Stage { operation: "critic", median_ms: 25.0, tokens: (10, 30) },
    Stage { operation: "finalizer", median_ms: 15.0, tokens: (10, 40) },
];

const TOOL_EXECUTOR: &str = "tool_executor";
const TOOL_MEDIAN_MS: f64 = 80.0;

/// Pre-drawn outcome of one tool call.
struct ToolCall {
    delay: Duration,
    fails: bool,
}

pub async fn execute(options: SimulateOptions) -> Result<()> {
    if !(0.0..=1.0).contains(&options.failure_rate) {
        anyhow::bail!("--failure-rate must be between 0 and 1");
    }
    if !options.time_scale.is_finite() || options.time_scale < 0.0 {
        anyhow::bail!("--time-scale must be a non-negative number");
    }

    println!("{}", "=== Vigil Simulation ===".bold().cyan());
    let config = load_config(options.config.as_deref()).await?;
    let dashboard = Arc::new(MetricsDashboard::from_config(&config));
    let collector = dashboard.collector().clone();

    let seed = options.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    println!("  Episodes: {}", options.episodes);
    println!("  Failure rate: {:.1}%", options.failure_rate * 100.0);
    println!("  Seed: {} (reproducible)", seed);
    println!("  SLOs: {}", dashboard.slos().await.len());
    info!(seed, episodes = options.episodes, "Starting simulation");

    let cancel = CancellationToken::new();
    let evaluator = options
        .evaluate_every
        .map(|interval| dashboard.spawn_evaluator(interval, cancel.clone()));

    let pb = ProgressBar::new(options.episodes as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} episodes ({msg})")?
            .progress_chars("=>-"),
    );

    for episode in 0..options.episodes {
        let context = TraceContext::new()
            .with_session(format!("sim-{}", seed))
            .with_request(format!("episode-{}", episode + 1));
        run_episode(&collector, &context, &mut rng, &options).await?;

        let update = dashboard.update().await;
        for violation in &update.new_violations {
            pb.suspend(|| report_violation(violation));
        }
        pb.set_message(format!("health {:.0}", update.kpis.health.health_score));
        pb.inc(1);
    }
    pb.finish_and_clear();

    cancel.cancel();
    if let Some(evaluator) = evaluator {
        evaluator.await.context("periodic evaluator panicked")?;
    }
    let last = dashboard.shutdown().await;
    ui::print_success(&format!(
        "Completed {} episodes ({} steps)",
        options.episodes, last.kpis.reliability.total_steps
    ));

    let monitor = Monitor::new(dashboard.clone());
    for action in ["kpis", "alerts", "trends"] {
        let response = monitor.handle(&MonitorRequest::new(action).hours(1)).await;
        match (response.ok, response.error) {
            (true, _) => {
                let title = response.content["summary"].as_str().unwrap_or(action).to_string();
                ui::print_header(&title);
                let mut content = response.content;
                if let Some(map) = content.as_object_mut() {
                    map.remove("summary");
                }
                ui::print_value(&content, 1);
            }
            (false, error) => ui::print_error(&error.unwrap_or_default()),
        }
    }

    let export = dashboard.export().await;
    if let Some(path) = options.output_json {
        JsonExporter::export(&export, &path).await?;
        ui::print_info(&format!("JSON export written to {}", path.display()));
    }
    if let Some(path) = options.output_prometheus {
        let text = PrometheusExporter::format(&export)?;
        tokio::fs::write(&path, text).await?;
        ui::print_info(&format!("Prometheus metrics written to {}", path.display()));
    }
    if let Some(path) = options.output_markdown {
        MarkdownExporter::export(&export, &path).await?;
        ui::print_info(&format!("Markdown report written to {}", path.display()));
    }

    Ok(())
}

async fn run_episode(
    collector: &Arc<MetricsCollector>,
    context: &TraceContext,
    rng: &mut StdRng,
    options: &SimulateOptions,
) -> Result<()> {
    for stage in &STAGES {
        let mut span = collector.child_span(context, stage.operation);
        pause(draw_duration(rng, stage.median_ms, options.time_scale)?).await;
        if stage.tokens != (0, 0) {
            let input = rng.gen_range(stage.tokens.0..=stage.tokens.1);
            let output = rng.gen_range(stage.tokens.0..=stage.tokens.1) / 2;
            span.record_tokens(input, output);
        }
        drop(span);

        if stage.operation == "tool_selector" {
            let calls = (0..rng.gen_range(1..=3))
                .map(|_| -> Result<ToolCall> {
                    Ok(ToolCall {
                        delay: draw_duration(rng, TOOL_MEDIAN_MS, options.time_scale)?,
                        fails: rng.gen_bool(options.failure_rate),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            run_tools(collector, context, calls).await;
        }
    }
    Ok(())
}

/// Executes the drawn tool calls concurrently, each under its own span.
async fn run_tools(collector: &Arc<MetricsCollector>, context: &TraceContext, calls: Vec<ToolCall>) {
    let tasks = calls.into_iter().enumerate().map(|(i, call)| {
        let mut span = collector.child_span(context, TOOL_EXECUTOR);
        span.mark_tool_call();
        async move {
            pause(call.delay).await;
            let result = if call.fails {
                Err(format!("tool call {} failed", i + 1))
            } else {
                Ok(())
            };
            span.finish(result)
        }
    });
    join_all(tasks).await;
}

fn draw_duration(rng: &mut StdRng, median_ms: f64, time_scale: f64) -> Result<Duration> {
    let distribution = LogNormal::new(median_ms.ln(), 0.5)?;
    let ms: f64 = distribution.sample(rng) * time_scale;
    Ok(Duration::try_from_secs_f64(ms / 1000.0)?)
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

fn report_violation(violation: &SloViolation) {
    ui::print_warning(&format!("[{}] {}", violation.severity, violation.message()));
}
