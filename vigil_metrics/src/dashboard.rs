use crate::alerts::{AckOutcome, Alert, AlertManager};
use crate::collector::{MetricsCollector, MetricsSummary};
use crate::exporters::{ExportFormat, MetricsExport};
use crate::kpi::{HealthKpis, KpiSnapshot};
use crate::slo::{SloEngine, SloViolation};
use crate::trend::{TrendAnalyzer, TrendReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vigil_config::{DashboardConfig, VigilConfig};
use vigil_core::{Result, Severity, SloDefinition, SloOperator};

const RECENT_ALERTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStatus {
    pub last_update: Option<DateTime<Utc>>,
    pub total_slos: usize,
    pub active_alerts: usize,
    pub total_violations: usize,
}

/// Result of one [`MetricsDashboard::update`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardUpdate {
    pub status: DashboardStatus,
    pub kpis: KpiSnapshot,
    pub summary: MetricsSummary,
    /// Violations that opened a fresh alert during this update.
    pub new_violations: Vec<SloViolation>,
    /// Every SLO breaching at this update.
    pub active_violations: Vec<SloViolation>,
}

/// Last published dashboard state, served to readers without re-evaluating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub status: DashboardStatus,
    pub kpis: KpiSnapshot,
    pub summary: MetricsSummary,
    pub active_violations: Vec<SloViolation>,
    pub recent_alerts: Vec<Alert>,
    pub alerts: AlertsView,
    #[serde(skip)]
    alert_log: Vec<Alert>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertsView {
    pub active_alerts: usize,
    pub total_alerts: usize,
    /// Most recent active alerts, newest first.
    pub alerts: Vec<Alert>,
}

struct EvaluationState {
    engine: SloEngine,
    alerts: AlertManager,
}

/// Evaluates SLOs against collector snapshots and owns alerts and trends.
///
/// Updates are serialized by a single gate so two evaluators can never race
/// to open duplicate alerts. Readers only touch the last published view,
/// which every alert state change republishes.
pub struct MetricsDashboard {
    collector: Arc<MetricsCollector>,
    config: DashboardConfig,
    state: Mutex<EvaluationState>,
    trends: RwLock<TrendAnalyzer>,
    published: RwLock<Arc<DashboardView>>,
}

impl MetricsDashboard {
    /// Dashboard with default settings and the built-in SLOs.
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self::with_config(collector, DashboardConfig::default())
    }

    pub fn with_config(collector: Arc<MetricsCollector>, config: DashboardConfig) -> Self {
        let engine = if config.default_slos {
            SloEngine::with_defaults()
        } else {
            SloEngine::new()
        };
        Self::with_engine(collector, config, engine)
    }

    fn with_engine(
        collector: Arc<MetricsCollector>,
        config: DashboardConfig,
        engine: SloEngine,
    ) -> Self {
        let trends = TrendAnalyzer::new(
            config.max_trend_points,
            config.trend_epsilon,
            config.min_trend_samples,
        );
        let view = initial_view(engine.len());

        Self {
            collector,
            state: Mutex::new(EvaluationState {
                engine,
                alerts: AlertManager::new(config.max_alert_history),
            }),
            trends: RwLock::new(trends),
            published: RwLock::new(Arc::new(view)),
            config,
        }
    }

    /// Builds the collector and dashboard described by `config`.
    ///
    /// Configured SLOs are registered after the built-in ones, so a
    /// configured SLO with a built-in name replaces it.
    pub fn from_config(config: &VigilConfig) -> Self {
        let collector = Arc::new(MetricsCollector::from_config(&config.collector));
        let mut engine = if config.dashboard.default_slos {
            SloEngine::with_defaults()
        } else {
            SloEngine::new()
        };
        for slo in &config.slos {
            engine.add_slo(slo.clone());
        }
        Self::with_engine(collector, config.dashboard.clone(), engine)
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Registers an SLO; an existing SLO with the same name is replaced.
    pub async fn add_slo(&self, slo: SloDefinition) {
        debug!(slo = %slo.name, metric = %slo.metric, "Registering SLO");
        self.state.lock().await.engine.add_slo(slo);
    }

    pub async fn register_slo(
        &self,
        name: &str,
        metric: &str,
        threshold: f64,
        operator: &str,
        severity: Severity,
        description: &str,
    ) {
        self.add_slo(SloDefinition::new(
            name,
            metric,
            threshold,
            SloOperator::parse(operator),
            severity,
            description,
        ))
        .await;
    }

    /// Unregisters an SLO and resolves its active alert.
    pub async fn remove_slo(&self, name: &str) -> Option<SloDefinition> {
        let mut state = self.state.lock().await;
        let removed = state.engine.remove_slo(name)?;
        let resolved = state.alerts.resolve_for(name, Utc::now());
        debug!(slo = name, resolved = ?resolved, "SLO removed");

        let mut published = self.published.write().await;
        let mut view = (**published).clone();
        view.status.total_slos = state.engine.len();
        publish_alerts(&mut view, &state.alerts);
        *published = Arc::new(view);

        Some(removed)
    }

    pub async fn slos(&self) -> Vec<SloDefinition> {
        self.state.lock().await.engine.slos().to_vec()
    }

    /// Snapshots the collector, evaluates every SLO, reconciles alerts,
    /// appends trend points and publishes a fresh KPI snapshot.
    pub async fn update(&self) -> DashboardUpdate {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let summary = self.collector.summary();
        let now = summary.generated_at;
        let evaluation = state.engine.evaluate(&summary, now);
        let report = state.alerts.reconcile(
            &evaluation.violations,
            state.engine.slos().iter().map(|slo| slo.name.as_str()),
            now,
        );

        let new_violations: Vec<SloViolation> = evaluation
            .violations
            .iter()
            .filter(|violation| {
                state
                    .alerts
                    .active_for(&violation.slo_name)
                    .is_some_and(|alert| report.opened.contains(&alert.id))
            })
            .cloned()
            .collect();

        self.trends
            .write()
            .await
            .record_all(now, summary.global.metric_values());

        let kpis = KpiSnapshot::from_metrics(
            &summary.global,
            HealthKpis {
                active_alerts: state.alerts.active_count(),
                unacknowledged_alerts: state.alerts.unacknowledged_count(),
                slo_violations: evaluation.violations.len(),
                health_score: evaluation.health_score(),
                last_update: now,
            },
        );
        let status = DashboardStatus {
            last_update: Some(now),
            total_slos: state.engine.len(),
            active_alerts: state.alerts.active_count(),
            total_violations: evaluation.violations.len(),
        };

        debug!(
            evaluated = evaluation.evaluated,
            violations = evaluation.violations.len(),
            opened = report.opened.len(),
            resolved = report.resolved.len(),
            health_score = evaluation.health_score(),
            "Dashboard updated"
        );

        let mut view = DashboardView {
            status: status.clone(),
            kpis,
            summary: summary.clone(),
            active_violations: evaluation.violations.clone(),
            recent_alerts: Vec::new(),
            alerts: AlertsView::default(),
            alert_log: Vec::new(),
        };
        publish_alerts(&mut view, &state.alerts);
        *self.published.write().await = Arc::new(view);

        DashboardUpdate {
            status,
            kpis,
            summary,
            new_violations,
            active_violations: evaluation.violations,
        }
    }

    /// Latest published view. Never triggers an evaluation.
    pub async fn view(&self) -> Arc<DashboardView> {
        self.published.read().await.clone()
    }

    pub async fn get_kpis(&self) -> KpiSnapshot {
        self.published.read().await.kpis
    }

    pub async fn export(&self) -> MetricsExport {
        let view = self.view().await;
        MetricsExport {
            generated_at: view.summary.generated_at,
            kpis: view.kpis,
            global: view.summary.global.clone(),
            operations: view.summary.operations.clone(),
            active_violations: view.active_violations.clone(),
        }
    }

    /// Renders the latest snapshot as `json`, `prometheus` or `markdown`.
    pub async fn export_metrics(&self, format: &str) -> Result<String> {
        let format: ExportFormat = format.parse()?;
        self.export().await.render(format)
    }

    pub async fn get_metrics_trend(&self, hours: u64) -> TrendReport {
        self.trends.read().await.trend(hours, Utc::now())
    }

    /// Acknowledges an open alert and republishes the health counters.
    pub async fn acknowledge_alert(&self, alert_id: &str) -> AckOutcome {
        let mut state = self.state.lock().await;
        let outcome = state.alerts.acknowledge(alert_id, Utc::now());
        if outcome != AckOutcome::Acknowledged {
            debug!(alert_id, outcome = ?outcome, "Acknowledge had no effect");
            return outcome;
        }

        let mut published = self.published.write().await;
        let mut view = (**published).clone();
        publish_alerts(&mut view, &state.alerts);
        *published = Arc::new(view);

        outcome
    }

    /// Active alert count, total retained alerts and the ten newest active alerts.
    pub async fn alerts(&self) -> AlertsView {
        self.published.read().await.alerts.clone()
    }

    pub async fn get_alert(&self, alert_id: &str) -> Option<Alert> {
        self.published
            .read()
            .await
            .alert_log
            .iter()
            .find(|alert| alert.id == alert_id)
            .cloned()
    }

    /// Runs [`update`](Self::update) every `interval` until `cancel` fires.
    pub fn spawn_evaluator(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let dashboard = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval = ?interval, "Periodic SLO evaluation started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        dashboard.update().await;
                    }
                }
            }
            info!("Periodic SLO evaluation stopped");
        })
    }

    /// Flushes pending samples through a final evaluation.
    pub async fn shutdown(&self) -> DashboardUpdate {
        let update = self.update().await;
        info!(
            total_steps = update.kpis.reliability.total_steps,
            active_alerts = update.kpis.health.active_alerts,
            health_score = update.kpis.health.health_score,
            "Dashboard shut down"
        );
        update
    }
}

fn initial_view(total_slos: usize) -> DashboardView {
    let summary = MetricsSummary::empty();
    DashboardView {
        status: DashboardStatus {
            last_update: None,
            total_slos,
            active_alerts: 0,
            total_violations: 0,
        },
        kpis: KpiSnapshot::empty(summary.generated_at),
        summary,
        active_violations: Vec::new(),
        recent_alerts: Vec::new(),
        alerts: AlertsView::default(),
        alert_log: Vec::new(),
    }
}

/// Copies the alert state readers see into `view`.
fn publish_alerts(view: &mut DashboardView, alerts: &AlertManager) {
    let all = alerts.alerts();
    let mut active: Vec<Alert> = alerts.active_alerts().cloned().collect();
    active.reverse();
    active.truncate(RECENT_ALERTS);

    view.alerts = AlertsView {
        active_alerts: alerts.active_count(),
        total_alerts: all.len(),
        alerts: active,
    };
    view.recent_alerts = all[all.len().saturating_sub(RECENT_ALERTS)..].to_vec();
    view.alert_log = all.to_vec();
    view.kpis.health.active_alerts = alerts.active_count();
    view.kpis.health.unacknowledged_alerts = alerts.unacknowledged_count();
    view.status.active_alerts = alerts.active_count();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertState;
    use crate::exporters::JsonExporter;
    use crate::monitor::{Monitor, MonitorRequest};
    use vigil_core::VigilError;

    fn dashboard() -> MetricsDashboard {
        let config = DashboardConfig {
            default_slos: false,
            ..DashboardConfig::default()
        };
        MetricsDashboard::with_config(Arc::new(MetricsCollector::new()), config)
    }

    #[tokio::test]
    async fn test_alert_lifecycle() {
        let dashboard = dashboard();
        dashboard
            .register_slo("p95_fast", "latency_p95", 500.0, "<=", Severity::Error, "p95 under 500ms")
            .await;

        dashboard.collector().record_latency("planner", 950.0);
        let update = dashboard.update().await;
        assert_eq!(update.new_violations.len(), 1);

        let alerts = dashboard.alerts().await;
        assert_eq!(alerts.active_alerts, 1);
        let alert = &alerts.alerts[0];
        assert_eq!(alert.state, AlertState::Open);
        assert_eq!(alert.severity, Severity::Error);

        assert_eq!(dashboard.acknowledge_alert(&alert.id).await, AckOutcome::Acknowledged);
        assert_eq!(dashboard.get_kpis().await.health.unacknowledged_alerts, 0);
        assert_eq!(
            dashboard.get_alert(&alert.id).await.unwrap().state,
            AlertState::Acknowledged
        );

        dashboard.collector().clear();
        dashboard.collector().record_latency("planner", 400.0);
        let update = dashboard.update().await;
        assert!(update.active_violations.is_empty());
        assert_eq!(
            dashboard.get_alert(&alert.id).await.unwrap().state,
            AlertState::Resolved
        );
        assert_eq!(dashboard.alerts().await.active_alerts, 0);
    }

    #[tokio::test]
    async fn test_repeated_update_is_idempotent() {
        let dashboard = dashboard();
        dashboard
            .register_slo("p95_fast", "latency_p95", 500.0, "<=", Severity::Warning, "")
            .await;
        dashboard.collector().record_latency("planner", 950.0);

        let first = dashboard.update().await;
        let before = dashboard.alerts().await;
        let second = dashboard.update().await;
        let after = dashboard.alerts().await;

        assert_eq!(first.new_violations.len(), 1);
        assert!(second.new_violations.is_empty());
        assert_eq!(second.active_violations.len(), 1);
        assert_eq!(after.total_alerts, 1);
        assert_eq!(before.alerts[0].id, after.alerts[0].id);
        assert_eq!(before.alerts[0].state, after.alerts[0].state);
        assert_eq!(after.alerts[0].occurrences, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_open_one_alert() {
        let dashboard = Arc::new(dashboard());
        dashboard
            .register_slo("p95_fast", "latency_p95", 500.0, "<=", Severity::Error, "")
            .await;
        dashboard.collector().record_latency("planner", 950.0);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let dashboard = Arc::clone(&dashboard);
                tokio::spawn(async move { dashboard.update().await })
            })
            .collect();

        let mut reported_new = 0;
        for handle in handles {
            if !handle.await.unwrap().new_violations.is_empty() {
                reported_new += 1;
            }
        }

        assert_eq!(reported_new, 1);
        let alerts = dashboard.alerts().await;
        assert_eq!(alerts.total_alerts, 1);
        assert_eq!(alerts.active_alerts, 1);
        assert_eq!(alerts.alerts[0].occurrences, 16);
    }

    #[tokio::test]
    async fn test_alert_queries_do_not_wait_for_update() {
        let dashboard = Arc::new(dashboard());
        dashboard
            .register_slo("p95_fast", "latency_p95", 500.0, "<=", Severity::Error, "")
            .await;
        dashboard.collector().record_latency("planner", 950.0);
        dashboard.update().await;

        let _gate = dashboard.state.lock().await;
        let monitor = Monitor::new(Arc::clone(&dashboard)).with_timeout(Duration::from_millis(100));
        for action in ["kpis", "alerts", "dashboard"] {
            let response = monitor.handle(&MonitorRequest::new(action)).await;
            assert!(response.ok, "{} failed: {:?}", action, response.error);
        }

        assert_eq!(dashboard.alerts().await.active_alerts, 1);
        assert!(dashboard.get_alert("p95_fast-1").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_slo_resolves_its_alert() {
        let dashboard = dashboard();
        dashboard
            .register_slo("p95_fast", "latency_p95", 500.0, "<=", Severity::Error, "")
            .await;
        dashboard.collector().record_latency("planner", 950.0);
        dashboard.update().await;
        assert_eq!(dashboard.alerts().await.active_alerts, 1);

        assert!(dashboard.remove_slo("p95_fast").await.is_some());
        assert_eq!(dashboard.alerts().await.active_alerts, 0);
        assert_eq!(dashboard.view().await.status.total_slos, 0);

        dashboard.collector().clear();
        for _ in 0..3 {
            dashboard.update().await;
        }

        assert_eq!(dashboard.alerts().await.active_alerts, 0);
        assert_eq!(dashboard.get_kpis().await.health.active_alerts, 0);
        assert_eq!(
            dashboard.get_alert("p95_fast-1").await.unwrap().state,
            AlertState::Resolved
        );
        assert!(dashboard.remove_slo("p95_fast").await.is_none());
    }

    #[tokio::test]
    async fn test_acknowledge_unknown_alert() {
        let dashboard = dashboard();
        dashboard
            .register_slo("p95_fast", "latency_p95", 500.0, "<=", Severity::Warning, "")
            .await;
        dashboard.collector().record_latency("planner", 950.0);
        dashboard.update().await;

        let before = dashboard.alerts().await;
        let outcome = dashboard.acknowledge_alert("nonexistent").await;
        let after = dashboard.alerts().await;

        assert_eq!(outcome, AckOutcome::NotFound);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_add_slo_replaces_by_name() {
        let dashboard = MetricsDashboard::new(Arc::new(MetricsCollector::new()));
        let builtin = dashboard.slos().await.len();

        dashboard
            .register_slo("error_rate_below_5", "error_rate", 0.5, "<=", Severity::Critical, "")
            .await;

        let slos = dashboard.slos().await;
        assert_eq!(slos.len(), builtin);
        let replaced = slos.iter().find(|slo| slo.name == "error_rate_below_5").unwrap();
        assert_eq!(replaced.threshold, 0.5);
    }

    #[tokio::test]
    async fn test_json_export_round_trips_kpis() {
        let dashboard = MetricsDashboard::new(Arc::new(MetricsCollector::new()));
        let collector = dashboard.collector().clone();
        for i in 0..10 {
            collector.record_latency("tool_executor", 100.0 + i as f64 * 13.7);
            collector.record_step("tool_executor", i % 4 != 0, true);
            collector.record_tokens("tool_executor", 123, 45);
        }
        dashboard.update().await;

        let json = dashboard.export_metrics("json").await.unwrap();
        let parsed = JsonExporter::parse(&json).unwrap();

        assert_eq!(parsed.kpis, dashboard.get_kpis().await);
        assert_eq!(parsed.operations.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_export_format() {
        let dashboard = dashboard();
        dashboard.update().await;

        match dashboard.export_metrics("xml").await {
            Err(VigilError::UnsupportedFormat(format)) => assert_eq!(format, "xml"),
            other => panic!("expected unsupported format, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_queries_do_not_evaluate() {
        let dashboard = dashboard();
        dashboard.collector().record_step("critic", true, false);

        let kpis = dashboard.get_kpis().await;
        assert_eq!(kpis.reliability.total_steps, 0);
        assert!(dashboard.view().await.status.last_update.is_none());

        dashboard.update().await;
        assert_eq!(dashboard.get_kpis().await.reliability.total_steps, 1);
    }

    #[tokio::test]
    async fn test_trends_follow_updates() {
        let dashboard = dashboard();
        for latency in [100.0, 200.0, 300.0] {
            dashboard.collector().record_latency("reasoner", latency);
            dashboard.collector().record_step("reasoner", true, false);
            dashboard.update().await;
        }

        let report = dashboard.get_metrics_trend(24).await;
        assert_eq!(report.data_points, 3);
        assert_eq!(
            report.trends["total_steps"].trend,
            crate::trend::TrendDirection::Increasing
        );
        assert_eq!(report.trends["operation_count"].trend, crate::trend::TrendDirection::Stable);
    }

    #[tokio::test]
    async fn test_from_config_registers_configured_slos() {
        let config = VigilConfig {
            slos: vec![SloDefinition::new(
                "tokens_under_1000",
                "total_tokens",
                50.0,
                "<=",
                Severity::Warning,
                "tight token budget",
            )],
            ..VigilConfig::default()
        };
        let dashboard = MetricsDashboard::from_config(&config);
        dashboard.collector().record_tokens("planner", 60, 0);

        let update = dashboard.update().await;
        assert_eq!(update.status.total_slos, 4);
        assert!(update
            .active_violations
            .iter()
            .any(|v| v.slo_name == "tokens_under_1000"));
    }

    #[tokio::test]
    async fn test_evaluator_stops_on_cancel() {
        let dashboard = Arc::new(dashboard());
        let cancel = CancellationToken::new();
        let handle = dashboard.spawn_evaluator(Duration::from_millis(10), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(dashboard.view().await.status.last_update.is_some());
    }

    #[tokio::test]
    async fn test_shutdown_flushes() {
        let dashboard = dashboard();
        dashboard.collector().record_step("finalizer", true, false);

        let update = dashboard.shutdown().await;
        assert_eq!(update.kpis.reliability.total_steps, 1);
        assert_eq!(dashboard.get_kpis().await.reliability.total_steps, 1);
    }
}
