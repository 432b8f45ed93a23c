mod commands;
mod ui;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Metrics, tracing and SLO alerting for agent workloads", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run simulated agent episodes under instrumentation
    Simulate {
        /// Config file (YAML, TOML, or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of episodes to run
        #[arg(short, long, default_value_t = 10)]
        episodes: usize,

        /// Probability that a tool call fails
        #[arg(long, default_value_t = 0.05)]
        failure_rate: f64,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Multiplier applied to simulated step durations (0 disables sleeping)
        #[arg(long, default_value_t = 1.0)]
        time_scale: f64,

        /// Also evaluate SLOs in the background at this interval (e.g. "250ms")
        #[arg(long, value_parser = humantime::parse_duration)]
        evaluate_every: Option<Duration>,

        /// Write the JSON export to this file
        #[arg(short, long)]
        output_json: Option<PathBuf>,

        /// Write the Prometheus exposition text to this file
        #[arg(long)]
        output_prometheus: Option<PathBuf>,

        /// Write a Markdown report to this file
        #[arg(short = 'm', long)]
        output_markdown: Option<PathBuf>,
    },

    /// Validate a config file
    Validate {
        /// Path to config file
        config_file: PathBuf,
    },

    /// List the SLOs a config registers
    Slos {
        /// Config file; built-in SLOs only when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Render a report from a JSON export
    Report {
        /// Path to a JSON export written by `simulate`
        metrics_file: PathBuf,

        /// Output format (cli, json, prometheus, markdown)
        #[arg(short, long, default_value = "cli")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match cli.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Commands::Simulate {
            config,
            episodes,
            failure_rate,
            seed,
            time_scale,
            evaluate_every,
            output_json,
            output_prometheus,
            output_markdown,
        } => {
            commands::simulate::execute(commands::simulate::SimulateOptions {
                config,
                episodes,
                failure_rate,
                seed,
                time_scale,
                evaluate_every,
                output_json,
                output_prometheus,
                output_markdown,
            })
            .await?;
        }

        Commands::Validate { config_file } => {
            commands::validate::execute(config_file).await?;
        }

        Commands::Slos { config } => {
            commands::slos::execute(config).await?;
        }

        Commands::Report {
            metrics_file,
            format,
            output,
        } => {
            commands::report::execute(metrics_file, format, output).await?;
        }
    }

    Ok(())
}
