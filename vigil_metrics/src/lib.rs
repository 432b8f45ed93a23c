pub mod aggregator;
pub mod alerts;
pub mod collector;
pub mod dashboard;
pub mod exporters;
pub mod kpi;
pub mod monitor;
pub mod slo;
pub mod span;
pub mod trend;

pub use aggregator::{LatencyPercentiles, MetricsAggregator, SampleWindow};
pub use alerts::{AckOutcome, Alert, AlertManager, AlertState};
pub use collector::{GlobalMetrics, MetricsCollector, MetricsSummary, OperationMetrics, SummaryView};
pub use dashboard::{AlertsView, DashboardStatus, DashboardUpdate, DashboardView, MetricsDashboard};
pub use exporters::{ExportFormat, MetricsExport};
pub use kpi::KpiSnapshot;
pub use monitor::{Monitor, MonitorAction, MonitorRequest, MonitorResponse};
pub use slo::{SloEngine, SloEvaluation, SloViolation, ViolationKind};
pub use span::Span;
pub use trend::{TrendAnalyzer, TrendDirection, TrendReport};
