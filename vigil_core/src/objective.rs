use crate::error::VigilError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(VigilError::InvalidConfig(format!(
                "Unknown severity '{}'",
                other
            ))),
        }
    }
}

/// Comparison applied between a metric value and an SLO threshold.
///
/// Parsing never fails: text outside the known operator set is kept as
/// `Unrecognized` so the objective can still be registered and then fails
/// closed when evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum SloOperator {
    #[default]
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NotEqual,
    Unrecognized(String),
}

impl SloOperator {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            ">=" | "≥" | "ge" | "gte" => SloOperator::GreaterOrEqual,
            "<=" | "≤" | "le" | "lte" => SloOperator::LessOrEqual,
            "==" | "=" | "eq" => SloOperator::Equal,
            "!=" | "≠" | "ne" => SloOperator::NotEqual,
            other => SloOperator::Unrecognized(other.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            SloOperator::GreaterOrEqual => ">=",
            SloOperator::LessOrEqual => "<=",
            SloOperator::Equal => "==",
            SloOperator::NotEqual => "!=",
            SloOperator::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, SloOperator::Unrecognized(_))
    }
}

impl fmt::Display for SloOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl From<&str> for SloOperator {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for SloOperator {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<SloOperator> for String {
    fn from(op: SloOperator) -> Self {
        op.symbol().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SloOutcome {
    Met,
    Violated,
    /// The operator could not be applied; counts as a violation.
    Misconfigured,
}

impl SloOutcome {
    pub fn is_met(&self) -> bool {
        matches!(self, SloOutcome::Met)
    }
}

/// A named objective over one metric key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloDefinition {
    pub name: String,
    pub metric: String,
    pub threshold: f64,
    #[serde(default)]
    pub operator: SloOperator,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    /// Restricts the metric lookup to one operation instead of the global rollup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl SloDefinition {
    pub fn new(
        name: impl Into<String>,
        metric: impl Into<String>,
        threshold: f64,
        operator: impl Into<SloOperator>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            threshold,
            operator: operator.into(),
            severity,
            description: description.into(),
            operation: None,
        }
    }

    pub fn for_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn evaluate(&self, value: f64) -> SloOutcome {
        let met = match &self.operator {
            SloOperator::GreaterOrEqual => value >= self.threshold,
            SloOperator::LessOrEqual => value <= self.threshold,
            SloOperator::Equal => value == self.threshold,
            SloOperator::NotEqual => value != self.threshold,
            SloOperator::Unrecognized(_) => return SloOutcome::Misconfigured,
        };

        if met {
            SloOutcome::Met
        } else {
            SloOutcome::Violated
        }
    }
}
