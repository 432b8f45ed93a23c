//! Read-only query surface over a [`MetricsDashboard`].
//!
//! Every request resolves to a [`MonitorResponse`]; failures of any kind
//! (unknown action, bad format, malformed JSON, timeout) land in its `error`
//! field instead of propagating to the caller.

use crate::alerts::Alert;
use crate::collector::SummaryView;
use crate::dashboard::{AlertsView, DashboardView, MetricsDashboard};
use crate::kpi::KpiSnapshot;
use crate::trend::TrendReport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_core::{Result, VigilError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    Kpis,
    Metrics,
    Dashboard,
    Alerts,
    Trends,
}

impl MonitorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorAction::Kpis => "kpis",
            MonitorAction::Metrics => "metrics",
            MonitorAction::Dashboard => "dashboard",
            MonitorAction::Alerts => "alerts",
            MonitorAction::Trends => "trends",
        }
    }
}

impl fmt::Display for MonitorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorAction {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kpis" => Ok(MonitorAction::Kpis),
            "metrics" => Ok(MonitorAction::Metrics),
            "dashboard" => Ok(MonitorAction::Dashboard),
            "alerts" => Ok(MonitorAction::Alerts),
            "trends" => Ok(MonitorAction::Trends),
            _ => Err(VigilError::UnknownAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRequest {
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default = "default_hours")]
    pub hours: u64,
    #[serde(default = "default_format")]
    pub format: String,
}

impl MonitorRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn hours(mut self, hours: u64) -> Self {
        self.hours = hours;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }
}

impl Default for MonitorRequest {
    fn default() -> Self {
        Self {
            action: default_action(),
            operation: None,
            hours: default_hours(),
            format: default_format(),
        }
    }
}

fn default_action() -> String {
    "kpis".to_string()
}

fn default_hours() -> u64 {
    24
}

fn default_format() -> String {
    "summary".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorResponse {
    pub ok: bool,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MonitorResponse {
    fn success(content: Value) -> Self {
        Self {
            ok: true,
            content,
            error: None,
        }
    }

    fn failure(error: &VigilError) -> Self {
        Self {
            ok: false,
            content: Value::Null,
            error: Some(error.to_string()),
        }
    }
}

enum OutputFormat {
    Json,
    Summary,
    Export(&'static str),
}

impl FromStr for OutputFormat {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "summary" => Ok(OutputFormat::Summary),
            "prometheus" | "text" => Ok(OutputFormat::Export("prometheus")),
            "markdown" | "md" => Ok(OutputFormat::Export("markdown")),
            _ => Err(VigilError::UnsupportedFormat(s.to_string())),
        }
    }
}

pub struct Monitor {
    dashboard: Arc<MetricsDashboard>,
    timeout: Duration,
}

impl Monitor {
    pub fn new(dashboard: Arc<MetricsDashboard>) -> Self {
        let timeout = dashboard.config().query_timeout;
        Self { dashboard, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn handle(&self, request: &MonitorRequest) -> MonitorResponse {
        debug!(action = %request.action, format = %request.format, "Monitor query");

        match tokio::time::timeout(self.timeout, self.dispatch(request)).await {
            Ok(Ok(content)) => MonitorResponse::success(content),
            Ok(Err(e)) => {
                warn!(action = %request.action, error = %e, "Monitor query failed");
                MonitorResponse::failure(&e)
            }
            Err(_) => {
                let e = VigilError::Timeout(self.timeout);
                warn!(action = %request.action, error = %e, "Monitor query failed");
                MonitorResponse::failure(&e)
            }
        }
    }

    /// Decodes a raw JSON request and answers it.
    pub async fn handle_json(&self, raw: &str) -> MonitorResponse {
        match serde_json::from_str::<MonitorRequest>(raw) {
            Ok(request) => self.handle(&request).await,
            Err(e) => MonitorResponse::failure(&VigilError::from(e)),
        }
    }

    async fn dispatch(&self, request: &MonitorRequest) -> Result<Value> {
        let action: MonitorAction = request.action.parse()?;
        let format: OutputFormat = request.format.parse()?;

        if let OutputFormat::Export(export) = format {
            return Ok(Value::String(self.dashboard.export_metrics(export).await?));
        }
        let summary = matches!(format, OutputFormat::Summary);

        let content = match action {
            MonitorAction::Kpis => {
                let kpis = self.dashboard.get_kpis().await;
                if summary {
                    kpis_summary(&kpis)
                } else {
                    serde_json::to_value(kpis)?
                }
            }
            MonitorAction::Metrics => {
                let view = self
                    .dashboard
                    .collector()
                    .get_summary(request.operation.as_deref());
                if summary {
                    metrics_summary(&view)
                } else {
                    serde_json::to_value(view)?
                }
            }
            MonitorAction::Dashboard => {
                let view = self.dashboard.view().await;
                if summary {
                    dashboard_summary(&view)
                } else {
                    serde_json::to_value(&*view)?
                }
            }
            MonitorAction::Alerts => {
                let alerts = self.dashboard.alerts().await;
                if summary {
                    alerts_summary(&alerts)
                } else {
                    serde_json::to_value(alerts)?
                }
            }
            MonitorAction::Trends => {
                let report = self.dashboard.get_metrics_trend(request.hours).await;
                if summary {
                    trends_summary(&report)
                } else {
                    serde_json::to_value(report)?
                }
            }
        };

        Ok(content)
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn usd(cost: f64) -> String {
    format!("${:.4}", cost)
}

fn kpis_summary(kpis: &KpiSnapshot) -> Value {
    json!({
        "summary": "System KPIs",
        "performance": {
            "latency_p50": format!("{:.1}ms", kpis.performance.latency_p50_ms),
            "latency_p95": format!("{:.1}ms", kpis.performance.latency_p95_ms),
            "latency_p99": format!("{:.1}ms", kpis.performance.latency_p99_ms),
        },
        "reliability": {
            "success_rate": percent(kpis.reliability.success_rate),
            "error_rate": percent(kpis.reliability.error_rate),
            "total_steps": kpis.reliability.total_steps,
        },
        "efficiency": {
            "total_tokens": kpis.efficiency.total_tokens,
            "estimated_cost": usd(kpis.efficiency.estimated_cost_usd),
            "tool_calls": kpis.efficiency.tool_calls,
        },
        "health": {
            "health_score": format!("{:.1}", kpis.health.health_score),
            "active_alerts": kpis.health.active_alerts,
            "slo_violations": kpis.health.slo_violations,
            "last_update": kpis.health.last_update.to_rfc3339(),
        },
    })
}

fn metrics_summary(view: &SummaryView) -> Value {
    match view {
        SummaryView::All(summary) => {
            let totals = &summary.global.totals;
            json!({
                "summary": "Global Metrics",
                "steps": totals.total_steps,
                "tokens": totals.total_tokens,
                "cost": usd(totals.estimated_cost_usd),
                "success_rate": percent(totals.tool_success_rate),
                "operations": summary.operations.len(),
            })
        }
        SummaryView::Operation(op) => json!({
            "summary": "Operation Metrics",
            "operation": op.operation,
            "steps": op.metrics.total_steps,
            "tokens": op.metrics.total_tokens,
            "cost": usd(op.metrics.estimated_cost_usd),
        }),
    }
}

fn dashboard_summary(view: &DashboardView) -> Value {
    json!({
        "summary": "Dashboard Status",
        "last_update": view.status.last_update.map(|at| at.to_rfc3339()),
        "total_slos": view.status.total_slos,
        "active_alerts": view.status.active_alerts,
        "violations": view.status.total_violations,
        "operations": view.summary.operations.len(),
    })
}

fn alert_line(alert: &Alert) -> Value {
    json!({
        "id": alert.id,
        "severity": alert.severity,
        "state": alert.state,
        "message": alert.message,
        "last_seen": alert.last_seen.to_rfc3339(),
    })
}

fn alerts_summary(alerts: &AlertsView) -> Value {
    json!({
        "summary": "Alert Status",
        "active_alerts": alerts.active_alerts,
        "total_alerts": alerts.total_alerts,
        "latest_alerts": alerts.alerts.iter().take(5).map(alert_line).collect::<Vec<_>>(),
    })
}

fn trends_summary(report: &TrendReport) -> Value {
    if !report.has_data() {
        return json!({
            "summary": "Trends",
            "message": "Not enough data for the requested period",
        });
    }

    let mut trends = Map::new();
    for (metric, trend) in &report.trends {
        trends.insert(
            metric.clone(),
            json!({
                "trend": trend.trend,
                "min": trend.min,
                "max": trend.max,
                "avg": format!("{:.2}", trend.avg),
            }),
        );
    }

    json!({
        "summary": "Trend Analysis",
        "period_hours": report.period_hours,
        "data_points": report.data_points,
        "metrics_analyzed": report.trends.len(),
        "trends": trends,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MetricsCollector;
    use vigil_core::Severity;

    async fn monitor() -> Monitor {
        let dashboard = Arc::new(MetricsDashboard::new(Arc::new(MetricsCollector::new())));
        dashboard
            .register_slo("p95_fast", "latency_p95", 500.0, "<=", Severity::Error, "p95 under 500ms")
            .await;
        let collector = dashboard.collector();
        collector.record_latency("planner", 950.0);
        collector.record_step("planner", true, true);
        collector.record_tokens("planner", 200, 100);
        dashboard.update().await;
        Monitor::new(dashboard)
    }

    #[tokio::test]
    async fn test_kpis_summary() {
        let monitor = monitor().await;
        let response = monitor.handle(&MonitorRequest::new("kpis")).await;

        assert!(response.ok);
        assert_eq!(response.content["summary"], "System KPIs");
        assert_eq!(response.content["performance"]["latency_p95"], "950.0ms");
        assert_eq!(response.content["reliability"]["success_rate"], "100.0%");
        assert_eq!(response.content["efficiency"]["total_tokens"], 300);
    }

    #[tokio::test]
    async fn test_kpis_json_matches_dashboard() {
        let monitor = monitor().await;
        let response = monitor
            .handle(&MonitorRequest::new("kpis").format("json"))
            .await;

        let kpis: KpiSnapshot = serde_json::from_value(response.content).unwrap();
        assert_eq!(kpis, monitor.dashboard.get_kpis().await);
    }

    #[tokio::test]
    async fn test_operation_metrics() {
        let monitor = monitor().await;
        let response = monitor
            .handle(&MonitorRequest::new("metrics").operation("planner").format("json"))
            .await;
        assert!(response.ok);
        assert_eq!(response.content["operation"], "planner");
        assert_eq!(response.content["metrics"]["total_steps"], 1);

        let response = monitor
            .handle(&MonitorRequest::new("metrics").operation("unknown"))
            .await;
        assert!(response.ok);
        assert_eq!(response.content["steps"], 0);
    }

    #[tokio::test]
    async fn test_alerts_and_dashboard() {
        let monitor = monitor().await;

        let response = monitor.handle(&MonitorRequest::new("alerts")).await;
        assert!(response.ok);
        assert!(response.content["active_alerts"].as_u64().unwrap() >= 1);
        assert_eq!(response.content["latest_alerts"][0]["state"], "OPEN");

        let response = monitor.handle(&MonitorRequest::new("dashboard")).await;
        assert!(response.ok);
        assert_eq!(response.content["operations"], 1);
    }

    #[tokio::test]
    async fn test_trends() {
        let monitor = monitor().await;
        let response = monitor.handle(&MonitorRequest::new("trends").hours(1)).await;

        assert!(response.ok);
        assert_eq!(response.content["period_hours"], 1);
        assert_eq!(response.content["trends"]["total_steps"]["trend"], "unknown");
    }

    #[tokio::test]
    async fn test_trends_without_data() {
        let dashboard = Arc::new(MetricsDashboard::new(Arc::new(MetricsCollector::new())));
        let response = Monitor::new(dashboard)
            .handle(&MonitorRequest::new("trends"))
            .await;

        assert!(response.ok);
        assert_eq!(
            response.content["message"],
            "Not enough data for the requested period"
        );
    }

    #[tokio::test]
    async fn test_export_formats() {
        let monitor = monitor().await;
        let response = monitor
            .handle(&MonitorRequest::new("kpis").format("prometheus"))
            .await;

        assert!(response.ok);
        let text = response.content.as_str().unwrap();
        assert!(text.contains("vigil_latency_p95_ms{operation=\"planner\"} 950"));
    }

    #[tokio::test]
    async fn test_failures_become_error_responses() {
        let monitor = monitor().await;

        let response = monitor.handle(&MonitorRequest::new("restart")).await;
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("Unknown monitor action: restart"));

        let response = monitor
            .handle(&MonitorRequest::new("kpis").format("xml"))
            .await;
        assert!(!response.ok);
        assert!(response.error.unwrap().contains("xml"));

        let response = monitor.handle_json("{not json").await;
        assert!(!response.ok);
        assert!(response.error.unwrap().starts_with("Serialization error"));
    }

    #[tokio::test]
    async fn test_handle_json_defaults() {
        let monitor = monitor().await;
        let response = monitor.handle_json("{}").await;

        assert!(response.ok);
        assert_eq!(response.content["summary"], "System KPIs");

        let serialized = serde_json::to_value(&response).unwrap();
        assert!(serialized.get("error").is_none());
    }
}
