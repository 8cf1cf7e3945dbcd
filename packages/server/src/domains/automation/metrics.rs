//! In-process metrics and threshold alerting.
//!
//! Ring buffers retain 24 hours of samples; everything is process-local.
//! The store is passive - middleware, engines, and the cycler push samples,
//! `system_health` folds them into a status plus any threshold alerts.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

const RETENTION_HOURS: i64 = 24;

/// Configurable alert thresholds
#[derive(Debug, Clone)]
pub struct MetricsThresholds {
    /// p95 response time over 60m (warning)
    pub p95_response_ms: f64,
    /// Error rate over a 10m window (critical)
    pub error_rate: f64,
    /// Automation success rate over 60m (warning when below)
    pub automation_success_rate: f64,
    /// Average cycle duration over 60m (warning)
    pub avg_cycle_ms: f64,
}

impl Default for MetricsThresholds {
    fn default() -> Self {
        Self {
            p95_response_ms: 2000.0,
            error_rate: 0.05,
            automation_success_rate: 0.90,
            avg_cycle_ms: 60_000.0,
        }
    }
}

#[derive(Debug, Clone)]
struct ResponseSample {
    at: DateTime<Utc>,
    endpoint: String,
    duration_ms: f64,
    is_error: bool,
}

#[derive(Debug, Clone, Copy)]
struct OutcomeSample {
    at: DateTime<Utc>,
    success: bool,
}

#[derive(Debug, Clone, Copy)]
struct CycleSample {
    at: DateTime<Utc>,
    duration_ms: f64,
}

#[derive(Default)]
struct Buffers {
    responses: VecDeque<ResponseSample>,
    automation: VecDeque<OutcomeSample>,
    outbound: VecDeque<(DateTime<Utc>, &'static str, bool)>,
    cycles: VecDeque<CycleSample>,
}

/// Alert severity for threshold breaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

/// Overall health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthMetrics {
    pub p95_response_ms: Option<f64>,
    pub error_rate_10m: Option<f64>,
    pub automation_success_rate_60m: Option<f64>,
    pub avg_cycle_ms_60m: Option<f64>,
    pub request_count_60m: usize,
    pub outbound_failures_60m: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub metrics: HealthMetrics,
    pub alerts: Vec<Alert>,
}

pub struct MetricsStore {
    buffers: Mutex<Buffers>,
    thresholds: MetricsThresholds,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(MetricsThresholds::default())
    }
}

impl MetricsStore {
    pub fn new(thresholds: MetricsThresholds) -> Self {
        Self {
            buffers: Mutex::new(Buffers::default()),
            thresholds,
        }
    }

    pub fn record_response(&self, endpoint: &str, duration_ms: f64, is_error: bool) {
        self.record_response_at(Utc::now(), endpoint, duration_ms, is_error);
    }

    pub fn record_response_at(
        &self,
        at: DateTime<Utc>,
        endpoint: &str,
        duration_ms: f64,
        is_error: bool,
    ) {
        let mut buffers = self.buffers.lock();
        buffers.responses.push_back(ResponseSample {
            at,
            endpoint: endpoint.to_string(),
            duration_ms,
            is_error,
        });
        prune(&mut buffers, at);
    }

    pub fn record_automation_outcome(&self, success: bool) {
        self.record_automation_outcome_at(Utc::now(), success);
    }

    pub fn record_automation_outcome_at(&self, at: DateTime<Utc>, success: bool) {
        let mut buffers = self.buffers.lock();
        buffers.automation.push_back(OutcomeSample { at, success });
        prune(&mut buffers, at);
    }

    /// Outcome of an email/calendar/risk/LLM call
    pub fn record_outbound_outcome(&self, service: &'static str, success: bool) {
        let mut buffers = self.buffers.lock();
        let now = Utc::now();
        buffers.outbound.push_back((now, service, success));
        prune(&mut buffers, now);
    }

    pub fn record_cycle_duration(&self, duration_ms: f64) {
        self.record_cycle_duration_at(Utc::now(), duration_ms);
    }

    pub fn record_cycle_duration_at(&self, at: DateTime<Utc>, duration_ms: f64) {
        let mut buffers = self.buffers.lock();
        buffers.cycles.push_back(CycleSample { at, duration_ms });
        prune(&mut buffers, at);
    }

    pub fn system_health(&self) -> SystemHealth {
        self.system_health_at(Utc::now())
    }

    pub fn system_health_at(&self, now: DateTime<Utc>) -> SystemHealth {
        let buffers = self.buffers.lock();
        let hour_ago = now - Duration::hours(1);

        let mut recent_durations: Vec<f64> = buffers
            .responses
            .iter()
            .filter(|s| s.at >= hour_ago)
            .map(|s| s.duration_ms)
            .collect();
        recent_durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let request_count = recent_durations.len();
        let p95 = percentile(&recent_durations, 0.95);

        let error_rate = worst_error_rate_10m(&buffers.responses, now);

        let automation: Vec<&OutcomeSample> = buffers
            .automation
            .iter()
            .filter(|s| s.at >= hour_ago)
            .collect();
        let automation_success = if automation.is_empty() {
            None
        } else {
            let ok = automation.iter().filter(|s| s.success).count();
            Some(ok as f64 / automation.len() as f64)
        };

        let outbound_failures = buffers
            .outbound
            .iter()
            .filter(|(at, _, success)| *at >= hour_ago && !success)
            .count();

        let cycles: Vec<&CycleSample> = buffers
            .cycles
            .iter()
            .filter(|s| s.at >= hour_ago)
            .collect();
        let avg_cycle = if cycles.is_empty() {
            None
        } else {
            Some(cycles.iter().map(|s| s.duration_ms).sum::<f64>() / cycles.len() as f64)
        };

        let mut alerts = Vec::new();
        if let Some(p95) = p95 {
            if p95 > self.thresholds.p95_response_ms {
                alerts.push(Alert {
                    severity: Severity::Warning,
                    message: format!(
                        "p95 response time {:.0}ms exceeds {:.0}ms",
                        p95, self.thresholds.p95_response_ms
                    ),
                });
            }
        }
        if let Some(rate) = error_rate {
            if rate > self.thresholds.error_rate {
                alerts.push(Alert {
                    severity: Severity::Critical,
                    message: format!(
                        "error rate {:.1}% exceeds {:.1}%",
                        rate * 100.0,
                        self.thresholds.error_rate * 100.0
                    ),
                });
            }
        }
        if let Some(rate) = automation_success {
            if rate < self.thresholds.automation_success_rate {
                alerts.push(Alert {
                    severity: Severity::Warning,
                    message: format!(
                        "automation success rate {:.1}% below {:.1}%",
                        rate * 100.0,
                        self.thresholds.automation_success_rate * 100.0
                    ),
                });
            }
        }
        if let Some(avg) = avg_cycle {
            if avg > self.thresholds.avg_cycle_ms {
                alerts.push(Alert {
                    severity: Severity::Warning,
                    message: format!(
                        "average cycle duration {:.0}ms exceeds {:.0}ms",
                        avg, self.thresholds.avg_cycle_ms
                    ),
                });
            }
        }

        let status = if alerts.iter().any(|a| a.severity == Severity::Critical) {
            HealthStatus::Critical
        } else if !alerts.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        SystemHealth {
            status,
            metrics: HealthMetrics {
                p95_response_ms: p95,
                error_rate_10m: error_rate,
                automation_success_rate_60m: automation_success,
                avg_cycle_ms_60m: avg_cycle,
                request_count_60m: request_count,
                outbound_failures_60m: outbound_failures,
            },
            alerts,
        }
    }
}

fn prune(buffers: &mut Buffers, now: DateTime<Utc>) {
    let cutoff = now - Duration::hours(RETENTION_HOURS);
    while buffers.responses.front().map_or(false, |s| s.at < cutoff) {
        buffers.responses.pop_front();
    }
    while buffers.automation.front().map_or(false, |s| s.at < cutoff) {
        buffers.automation.pop_front();
    }
    while buffers.outbound.front().map_or(false, |(at, _, _)| *at < cutoff) {
        buffers.outbound.pop_front();
    }
    while buffers.cycles.front().map_or(false, |s| s.at < cutoff) {
        buffers.cycles.pop_front();
    }
}

fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 - 1.0) * q).round() as usize;
    sorted.get(idx).copied()
}

/// Worst error rate across sliding 10-minute windows of the retained samples,
/// stepped by minute. Windows with fewer than 5 requests are skipped so a
/// single failed request in a quiet minute does not trip the critical alert.
fn worst_error_rate_10m(responses: &VecDeque<ResponseSample>, now: DateTime<Utc>) -> Option<f64> {
    if responses.is_empty() {
        return None;
    }
    let oldest = responses.front().map(|s| s.at)?;
    let mut worst: Option<f64> = None;
    let mut window_start = oldest;
    while window_start <= now {
        let window_end = window_start + Duration::minutes(10);
        let mut total = 0usize;
        let mut errors = 0usize;
        for sample in responses.iter() {
            if sample.at >= window_start && sample.at < window_end {
                total += 1;
                if sample.is_error {
                    errors += 1;
                }
            }
        }
        if total >= 5 {
            let rate = errors as f64 / total as f64;
            worst = Some(worst.map_or(rate, |w: f64| w.max(rate)));
        }
        window_start = window_start + Duration::minutes(1);
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        "2026-08-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn healthy_with_no_samples() {
        let store = MetricsStore::default();
        let health = store.system_health_at(t0());
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.alerts.is_empty());
    }

    #[test]
    fn slow_p95_raises_warning() {
        let store = MetricsStore::default();
        for _ in 0..100 {
            store.record_response_at(t0(), "/api/v1/job", 3000.0, false);
        }
        let health = store.system_health_at(t0() + Duration::minutes(1));
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.alerts.len(), 1);
        assert_eq!(health.alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn error_burst_raises_critical() {
        let store = MetricsStore::default();
        for i in 0..20 {
            store.record_response_at(t0(), "/api/v1/job", 50.0, i % 5 == 0);
        }
        let health = store.system_health_at(t0() + Duration::minutes(1));
        assert_eq!(health.status, HealthStatus::Critical);
    }

    #[test]
    fn automation_failures_raise_warning() {
        let store = MetricsStore::default();
        for i in 0..10 {
            store.record_automation_outcome_at(t0(), i < 5);
        }
        let health = store.system_health_at(t0() + Duration::minutes(1));
        assert!(health
            .alerts
            .iter()
            .any(|a| a.message.contains("automation success rate")));
    }

    #[test]
    fn slow_cycles_raise_warning() {
        let store = MetricsStore::default();
        store.record_cycle_duration_at(t0(), 90_000.0);
        let health = store.system_health_at(t0() + Duration::minutes(1));
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[test]
    fn samples_age_out_after_retention() {
        let store = MetricsStore::default();
        store.record_response_at(t0(), "/api/v1/job", 5000.0, true);
        // A new sample a day later prunes the old one
        let later = t0() + Duration::hours(25);
        store.record_response_at(later, "/api/v1/job", 10.0, false);
        let health = store.system_health_at(later);
        assert_eq!(health.metrics.request_count_60m, 1);
        assert_eq!(health.status, HealthStatus::Healthy);
    }
}
