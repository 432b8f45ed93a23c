use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use vigil_core::{SloDefinition, TokenPricing};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub slos: Vec<SloDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Latency samples retained per operation.
    #[serde(default = "default_sample_window")]
    pub sample_window: usize,
    #[serde(default)]
    pub pricing: TokenPricing,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sample_window: default_sample_window(),
            pricing: TokenPricing::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub default_slos: bool,
    #[serde(default = "default_max_trend_points")]
    pub max_trend_points: usize,
    #[serde(default = "default_trend_epsilon")]
    pub trend_epsilon: f64,
    #[serde(default = "default_min_trend_samples")]
    pub min_trend_samples: usize,
    #[serde(default = "default_max_alert_history")]
    pub max_alert_history: usize,
    #[serde(with = "humantime_serde", default = "default_evaluation_interval")]
    pub evaluation_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_query_timeout")]
    pub query_timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_slos: true,
            max_trend_points: default_max_trend_points(),
            trend_epsilon: default_trend_epsilon(),
            min_trend_samples: default_min_trend_samples(),
            max_alert_history: default_max_alert_history(),
            evaluation_interval: default_evaluation_interval(),
            query_timeout: default_query_timeout(),
        }
    }
}

fn default_sample_window() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_max_trend_points() -> usize {
    100
}

fn default_trend_epsilon() -> f64 {
    0.05
}

fn default_min_trend_samples() -> usize {
    2
}

fn default_max_alert_history() -> usize {
    100
}

fn default_evaluation_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_query_timeout() -> Duration {
    Duration::from_secs(5)
}

impl VigilConfig {
    pub fn builder() -> VigilConfigBuilder {
        VigilConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.collector.sample_window == 0 {
            return Err("collector.sample_window must be > 0".to_string());
        }

        let pricing = &self.collector.pricing;
        for (field, price) in [
            ("input_per_1k_usd", pricing.input_per_1k_usd),
            ("output_per_1k_usd", pricing.output_per_1k_usd),
        ] {
            if !price.is_finite() || price < 0.0 {
                return Err(format!("collector.pricing.{} must be >= 0", field));
            }
        }

        let dashboard = &self.dashboard;
        if !dashboard.trend_epsilon.is_finite() || dashboard.trend_epsilon < 0.0 {
            return Err("dashboard.trend_epsilon must be a non-negative number".to_string());
        }
        if dashboard.min_trend_samples < 2 {
            return Err("dashboard.min_trend_samples must be >= 2".to_string());
        }
        if dashboard.max_trend_points == 0 {
            return Err("dashboard.max_trend_points must be > 0".to_string());
        }
        if dashboard.evaluation_interval.is_zero() {
            return Err("dashboard.evaluation_interval must be > 0".to_string());
        }

        let mut seen = HashSet::new();
        for (i, slo) in self.slos.iter().enumerate() {
            if slo.name.is_empty() {
                return Err(format!("SLO {} name cannot be empty", i));
            }
            if !seen.insert(slo.name.as_str()) {
                return Err(format!("SLO '{}' is defined more than once", slo.name));
            }
            if slo.metric.is_empty() {
                return Err(format!("SLO '{}' must name a metric", slo.name));
            }
            if !slo.threshold.is_finite() {
                return Err(format!("SLO '{}' threshold must be finite", slo.name));
            }
            if !slo.operator.is_recognized() {
                return Err(format!(
                    "SLO '{}' uses unrecognized operator '{}' (expected >=, <=, == or !=)",
                    slo.name, slo.operator
                ));
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct VigilConfigBuilder {
    collector: CollectorConfig,
    dashboard: DashboardConfig,
    slos: Vec<SloDefinition>,
}

impl VigilConfigBuilder {
    pub fn sample_window(mut self, sample_window: usize) -> Self {
        self.collector.sample_window = sample_window;
        self
    }

    pub fn pricing(mut self, pricing: TokenPricing) -> Self {
        self.collector.pricing = pricing;
        self
    }

    pub fn default_slos(mut self, enabled: bool) -> Self {
        self.dashboard.default_slos = enabled;
        self
    }

    pub fn max_trend_points(mut self, points: usize) -> Self {
        self.dashboard.max_trend_points = points;
        self
    }

    pub fn trend_epsilon(mut self, epsilon: f64) -> Self {
        self.dashboard.trend_epsilon = epsilon;
        self
    }

    pub fn min_trend_samples(mut self, samples: usize) -> Self {
        self.dashboard.min_trend_samples = samples;
        self
    }

    pub fn max_alert_history(mut self, alerts: usize) -> Self {
        self.dashboard.max_alert_history = alerts;
        self
    }

    pub fn evaluation_interval(mut self, interval: Duration) -> Self {
        self.dashboard.evaluation_interval = interval;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.dashboard.query_timeout = timeout;
        self
    }

    pub fn add_slo(mut self, slo: SloDefinition) -> Self {
        self.slos.push(slo);
        self
    }

    pub fn build(self) -> VigilConfig {
        VigilConfig {
            collector: self.collector,
            dashboard: self.dashboard,
            slos: self.slos,
        }
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
