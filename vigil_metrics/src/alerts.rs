use crate::slo::SloViolation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use vigil_core::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    Open,
    Acknowledged,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub slo_name: String,
    pub state: AlertState,
    pub severity: Severity,
    pub message: String,
    pub details: SloViolation,
    pub occurrences: u64,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.state != AlertState::Resolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOutcome {
    Acknowledged,
    AlreadyAcknowledged,
    AlreadyResolved,
    NotFound,
}

impl AckOutcome {
    pub fn is_found(&self) -> bool {
        !matches!(self, AckOutcome::NotFound)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Ids of alerts opened by this reconciliation.
    pub opened: Vec<String>,
    pub resolved: Vec<String>,
    pub ongoing: usize,
}

/// Alert lifecycle per SLO: at most one non-resolved alert per SLO name.
///
/// `OPEN -> ACKNOWLEDGED -> RESOLVED`, with `OPEN -> RESOLVED` when the
/// violation clears first. A resolved alert is never reopened; a recurring
/// violation gets a new alert whose id carries the next generation number.
#[derive(Debug, Clone)]
pub struct AlertManager {
    alerts: Vec<Alert>,
    active: HashMap<String, usize>,
    generations: HashMap<String, u64>,
    max_resolved: usize,
}

impl AlertManager {
    pub fn new(max_resolved: usize) -> Self {
        Self {
            alerts: Vec::new(),
            active: HashMap::new(),
            generations: HashMap::new(),
            max_resolved,
        }
    }

    /// Brings alert state in line with the violations of one evaluation.
    ///
    /// `evaluated` names every SLO that was checked; active alerts for those
    /// SLOs without a violation are resolved. Alerts for SLOs that were not
    /// evaluated are left untouched.
    pub fn reconcile<'a>(
        &mut self,
        violations: &[SloViolation],
        evaluated: impl IntoIterator<Item = &'a str>,
        now: DateTime<Utc>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let violated: HashSet<&str> = violations.iter().map(|v| v.slo_name.as_str()).collect();

        for violation in violations {
            match self.active.get(&violation.slo_name) {
                Some(&index) => {
                    let alert = &mut self.alerts[index];
                    // Severity and details stay as they were when the alert opened.
                    alert.last_seen = now;
                    alert.occurrences = alert.occurrences.saturating_add(1);
                    report.ongoing += 1;
                }
                None => {
                    let id = self.next_id(&violation.slo_name);
                    warn!(
                        alert_id = %id,
                        severity = %violation.severity,
                        "{}",
                        violation.message()
                    );
                    self.alerts.push(Alert {
                        id: id.clone(),
                        slo_name: violation.slo_name.clone(),
                        state: AlertState::Open,
                        severity: violation.severity,
                        message: violation.message(),
                        details: violation.clone(),
                        occurrences: 1,
                        created_at: now,
                        last_seen: now,
                        acknowledged_at: None,
                        resolved_at: None,
                    });
                    self.active
                        .insert(violation.slo_name.clone(), self.alerts.len() - 1);
                    report.opened.push(id);
                }
            }
        }

        for slo_name in evaluated {
            if violated.contains(slo_name) {
                continue;
            }
            if let Some(id) = self.resolve(slo_name, now) {
                report.resolved.push(id);
            }
        }

        self.prune();
        report
    }

    /// Resolves the active alert of an SLO that is no longer evaluated.
    pub fn resolve_for(&mut self, slo_name: &str, now: DateTime<Utc>) -> Option<String> {
        let id = self.resolve(slo_name, now);
        self.prune();
        id
    }

    fn resolve(&mut self, slo_name: &str, now: DateTime<Utc>) -> Option<String> {
        let index = self.active.remove(slo_name)?;
        let alert = &mut self.alerts[index];
        alert.state = AlertState::Resolved;
        alert.resolved_at = Some(now);
        info!(alert_id = %alert.id, slo = %alert.slo_name, "Alert resolved");
        Some(alert.id.clone())
    }

    pub fn acknowledge(&mut self, alert_id: &str, now: DateTime<Utc>) -> AckOutcome {
        let Some(alert) = self.alerts.iter_mut().find(|alert| alert.id == alert_id) else {
            return AckOutcome::NotFound;
        };

        match alert.state {
            AlertState::Open => {
                alert.state = AlertState::Acknowledged;
                alert.acknowledged_at = Some(now);
                info!(alert_id = %alert.id, "Alert acknowledged");
                AckOutcome::Acknowledged
            }
            AlertState::Acknowledged => AckOutcome::AlreadyAcknowledged,
            AlertState::Resolved => AckOutcome::AlreadyResolved,
        }
    }

    pub fn get(&self, alert_id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|alert| alert.id == alert_id)
    }

    pub fn active_for(&self, slo_name: &str) -> Option<&Alert> {
        self.active.get(slo_name).map(|&index| &self.alerts[index])
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn active_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|alert| alert.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn unacknowledged_count(&self) -> usize {
        self.alerts
            .iter()
            .filter(|alert| alert.state == AlertState::Open)
            .count()
    }

    fn next_id(&mut self, slo_name: &str) -> String {
        let generation = self.generations.entry(slo_name.to_string()).or_insert(0);
        *generation += 1;
        format!("{}-{}", slo_name, generation)
    }

    /// Drops the oldest resolved alerts beyond the retention limit.
    fn prune(&mut self) {
        let resolved = self.alerts.len() - self.active.len();
        if resolved <= self.max_resolved {
            return;
        }

        let mut excess = resolved - self.max_resolved;
        self.alerts.retain(|alert| {
            if excess > 0 && alert.state == AlertState::Resolved {
                excess -= 1;
                false
            } else {
                true
            }
        });

        self.active = self
            .alerts
            .iter()
            .enumerate()
            .filter(|(_, alert)| alert.is_active())
            .map(|(index, alert)| (alert.slo_name.clone(), index))
            .collect();
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(100)
    }
}
