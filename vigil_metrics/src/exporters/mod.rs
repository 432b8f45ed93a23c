pub mod json;
pub mod markdown;
pub mod prometheus;

pub use json::JsonExporter;
pub use markdown::MarkdownExporter;
pub use self::prometheus::PrometheusExporter;

use crate::collector::{GlobalMetrics, OperationMetrics};
use crate::kpi::KpiSnapshot;
use crate::slo::SloViolation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use vigil_core::{Result, VigilError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Prometheus,
    Markdown,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Prometheus => "prometheus",
            ExportFormat::Markdown => "markdown",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "prometheus" | "text" => Ok(ExportFormat::Prometheus),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            _ => Err(VigilError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Everything an export renders, taken from one dashboard update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsExport {
    pub generated_at: DateTime<Utc>,
    pub kpis: KpiSnapshot,
    pub global: GlobalMetrics,
    pub operations: BTreeMap<String, OperationMetrics>,
    #[serde(default)]
    pub active_violations: Vec<SloViolation>,
}

impl MetricsExport {
    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => JsonExporter::to_string(self),
            ExportFormat::Prometheus => PrometheusExporter::format(self),
            ExportFormat::Markdown => Ok(MarkdownExporter::format(self)),
        }
    }
}
