//! Background cycle: the five-minute heartbeat of the pipeline.
//!
//! Each cycle runs five tasks in order - deadline sweeps, buffer health,
//! reminders, risk refresh - every task under its own fault boundary, and
//! inside the sweeps every interview under its own inner boundary. One bad
//! row never stops the rest of the cycle.
//!
//! ```text
//! Scheduler (every cycle_period)
//!     │ in-flight guard: overlapping tick is skipped and logged
//!     └─► run_cycle(now)
//!             ├─ 1. confirmation-deadline sweep  (expire → reject → promote)
//!             ├─ 2. slot-selection-deadline sweep (same recovery)
//!             ├─ 3. buffer-health sweep           (backfill under target)
//!             ├─ 4. reminder sweep                (23h-25h ahead, at most once)
//!             └─ 5. risk refresh                  (all upcoming confirmed)
//! ```
//!
//! `run_cycle` takes `now` explicitly and is driven directly by the tests;
//! the scheduler wrapper only supplies the clock and the overlap guard.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::common::Outcome;
use crate::domains::automation::models::flag_names;
use crate::domains::automation::ActionType;
use crate::domains::interviews::models::InterviewStatus;
use crate::domains::interviews::scheduler::InterviewScheduler;
use crate::domains::shortlisting::ShortlistingEngine;
use crate::kernel::{EmailMessage, EmailTemplate, ServerDeps};
use crate::storage::{Storage, StorageError};

/// Per-request ceiling for the risk service inside a sweep
const RISK_REFRESH_TIMEOUT_SECS: u64 = 5;

/// Log a risk change only when it moved by more than this
const RISK_DELTA_THRESHOLD: f64 = 0.1;

/// Cycle error count that triggers an admin alert
const ADMIN_ALERT_ERROR_THRESHOLD: usize = 3;

/// What one cycle accomplished
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub expired_confirmations: usize,
    pub expired_slot_selections: usize,
    pub buffers_refilled: usize,
    pub reminders_sent: usize,
    pub risks_refreshed: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Execute one full cycle at `now`. Never returns an error: every failure is
/// collected into the report instead.
pub async fn run_cycle(deps: &Arc<ServerDeps>, now: DateTime<Utc>) -> CycleReport {
    let started = std::time::Instant::now();
    let mut report = CycleReport::default();

    // 1. Confirmation-deadline sweep
    let (count, mut errors) = sweep_deadlines(deps, now, DeadlineKind::Confirmation).await;
    report.expired_confirmations = count;
    report.errors.append(&mut errors);

    // 2. Slot-selection-deadline sweep
    let (count, mut errors) = sweep_deadlines(deps, now, DeadlineKind::SlotSelection).await;
    report.expired_slot_selections = count;
    report.errors.append(&mut errors);

    // 3. Buffer-health sweep
    let (count, mut errors) = sweep_buffer_health(deps).await;
    report.buffers_refilled = count;
    report.errors.append(&mut errors);

    // 4. Reminder sweep
    let (count, mut errors) = sweep_reminders(deps, now).await;
    report.reminders_sent = count;
    report.errors.append(&mut errors);

    // 5. Risk refresh
    let (count, mut errors) = sweep_risk_refresh(deps, now).await;
    report.risks_refreshed = count;
    report.errors.append(&mut errors);

    report.duration_ms = started.elapsed().as_millis() as u64;
    deps.metrics.record_cycle_duration(report.duration_ms as f64);

    if report.errors.len() > ADMIN_ALERT_ERROR_THRESHOLD {
        tracing::error!(
            error_count = report.errors.len(),
            "background cycle exceeded error threshold"
        );
        deps.log
            .record_scheduled(
                ActionType::AdminAlert,
                None,
                json!({
                    "error_count": report.errors.len(),
                    "errors": report.errors,
                }),
            )
            .await;
    }

    deps.log
        .record_scheduled(
            ActionType::BackgroundCycle,
            None,
            json!({
                "expired_confirmations": report.expired_confirmations,
                "expired_slot_selections": report.expired_slot_selections,
                "buffers_refilled": report.buffers_refilled,
                "reminders_sent": report.reminders_sent,
                "risks_refreshed": report.risks_refreshed,
                "errors": report.errors,
                "duration_ms": report.duration_ms,
            }),
        )
        .await;

    tracing::info!(
        duration_ms = report.duration_ms,
        expired = report.expired_confirmations + report.expired_slot_selections,
        reminders = report.reminders_sent,
        errors = report.errors.len(),
        "background cycle complete"
    );
    report
}

#[derive(Clone, Copy, PartialEq)]
enum DeadlineKind {
    Confirmation,
    SlotSelection,
}

/// Expire interviews past a deadline, reject their applications, and promote
/// replacements. Each interview runs under its own fault boundary.
async fn sweep_deadlines(
    deps: &Arc<ServerDeps>,
    now: DateTime<Utc>,
    kind: DeadlineKind,
) -> (usize, Vec<String>) {
    let mut errors = Vec::new();

    let due = match kind {
        DeadlineKind::Confirmation => deps.storage.find_past_confirmation_deadline(now).await,
        DeadlineKind::SlotSelection => deps.storage.find_past_slot_deadline(now).await,
    };
    let due = match due {
        Ok(due) => due,
        Err(err) => {
            errors.push(format!("deadline query failed: {}", err));
            return (0, errors);
        }
    };

    let (expected_status, action) = match kind {
        DeadlineKind::Confirmation => (
            InterviewStatus::InvitationSent,
            ActionType::InvitationExpired,
        ),
        DeadlineKind::SlotSelection => (
            InterviewStatus::SlotPending,
            ActionType::SlotSelectionExpired,
        ),
    };

    let scheduler = InterviewScheduler::new(deps.clone());
    let shortlisting = ShortlistingEngine::new(deps.clone());
    let mut expired = 0usize;

    for interview in due {
        let job = match deps.storage.get_job(interview.job_id).await {
            Ok(job) => job,
            Err(err) => {
                errors.push(format!("interview {}: job lookup: {}", interview.id, err));
                continue;
            }
        };

        // Jobs with automation off keep their deadlines frozen
        if !deps
            .flags
            .is_enabled(flag_names::GLOBAL_AUTOMATION, Some(&job))
            .await
        {
            continue;
        }

        match deps
            .storage
            .close_interview_rejecting_application(
                interview.id,
                expected_status,
                InterviewStatus::Expired,
            )
            .await
        {
            Ok(_) => {}
            // Lost to a concurrent transition (e.g. a late accept): not ours
            Err(StorageError::Conflict(_)) => continue,
            Err(err) => {
                errors.push(format!("interview {}: expire: {}", interview.id, err));
                deps.metrics.record_automation_outcome(false);
                continue;
            }
        }
        expired += 1;
        deps.metrics.record_automation_outcome(true);

        deps.log
            .record_scheduled(
                action,
                Some(interview.job_id),
                json!({
                    "interview_id": interview.id.to_string(),
                    "candidate_id": interview.candidate_id.to_string(),
                    "rank": interview.rank_at_time,
                }),
            )
            .await;

        if interview.rank_at_time >= 1 {
            if let Err(err) = shortlisting
                .promote_from_buffer(&job, interview.rank_at_time, &scheduler)
                .await
            {
                errors.push(format!("interview {}: promote: {}", interview.id, err));
            }
        }
    }

    (expired, errors)
}

/// Refill buffers sitting under target for all active jobs
async fn sweep_buffer_health(deps: &Arc<ServerDeps>) -> (usize, Vec<String>) {
    let mut errors = Vec::new();
    let jobs = match deps.storage.list_active_jobs().await {
        Ok(jobs) => jobs,
        Err(err) => {
            errors.push(format!("active job query failed: {}", err));
            return (0, errors);
        }
    };

    let shortlisting = ShortlistingEngine::new(deps.clone());
    let mut refilled = 0usize;
    for job in jobs {
        match shortlisting.backfill_buffer(&job).await {
            Ok(Outcome::Done(added)) => refilled += added,
            Ok(Outcome::Skipped(_)) => {}
            Err(err) => errors.push(format!("job {}: backfill: {}", job.id, err)),
        }
    }
    (refilled, errors)
}

/// Remind both parties of interviews roughly a day out, at most once each
async fn sweep_reminders(deps: &Arc<ServerDeps>, now: DateTime<Utc>) -> (usize, Vec<String>) {
    let mut errors = Vec::new();
    let upcoming = match deps
        .storage
        .find_confirmed_between(now + Duration::hours(23), now + Duration::hours(25))
        .await
    {
        Ok(upcoming) => upcoming,
        Err(err) => {
            errors.push(format!("reminder query failed: {}", err));
            return (0, errors);
        }
    };

    let mut sent = 0usize;
    for interview in upcoming {
        let already_sent = match deps
            .log
            .has_interview_event(interview.id, ActionType::InterviewReminderSent)
            .await
        {
            Ok(already_sent) => already_sent,
            Err(err) => {
                errors.push(format!("interview {}: reminder dedupe: {}", interview.id, err));
                continue;
            }
        };
        if already_sent {
            continue;
        }

        let data = json!({
            "interview_id": interview.id.to_string(),
            "start": interview.scheduled_time,
        });
        if let Err(err) = deps
            .email
            .queue(EmailMessage {
                to: interview.candidate_email.clone(),
                template: EmailTemplate::Reminder,
                data: data.clone(),
            })
            .await
        {
            // Without the log entry the next cycle retries this reminder
            errors.push(format!("interview {}: reminder email: {}", interview.id, err));
            deps.metrics.record_outbound_outcome("email", false);
            continue;
        }
        deps.metrics.record_outbound_outcome("email", true);

        if let Err(err) = deps
            .email
            .queue(EmailMessage {
                to: format!("user:{}", interview.recruiter_id),
                template: EmailTemplate::Reminder,
                data,
            })
            .await
        {
            errors.push(format!(
                "interview {}: recruiter reminder email: {}",
                interview.id, err
            ));
            deps.metrics.record_outbound_outcome("email", false);
        }

        deps.log
            .record_scheduled(
                ActionType::InterviewReminderSent,
                Some(interview.job_id),
                json!({
                    "interview_id": interview.id.to_string(),
                    "scheduled_time": interview.scheduled_time,
                }),
            )
            .await;
        sent += 1;
    }
    (sent, errors)
}

/// Refresh no-show risk for every upcoming confirmed interview
async fn sweep_risk_refresh(deps: &Arc<ServerDeps>, now: DateTime<Utc>) -> (usize, Vec<String>) {
    let mut errors = Vec::new();

    if !deps
        .flags
        .is_enabled(flag_names::NO_SHOW_PREDICTION, None)
        .await
    {
        return (0, errors);
    }

    let upcoming = match deps.storage.find_confirmed_after(now).await {
        Ok(upcoming) => upcoming,
        Err(err) => {
            errors.push(format!("risk query failed: {}", err));
            return (0, errors);
        }
    };

    let mut refreshed = 0usize;
    for interview in upcoming {
        let analysis = tokio::time::timeout(
            std::time::Duration::from_secs(RISK_REFRESH_TIMEOUT_SECS),
            deps.risk.analyze(interview.id, interview.candidate_id),
        )
        .await;

        let assessment = match analysis {
            Ok(Ok(assessment)) => assessment,
            Ok(Err(err)) => {
                errors.push(format!("interview {}: risk: {}", interview.id, err));
                deps.metrics.record_outbound_outcome("risk", false);
                continue;
            }
            Err(_) => {
                errors.push(format!("interview {}: risk: timeout", interview.id));
                deps.metrics.record_outbound_outcome("risk", false);
                continue;
            }
        };
        deps.metrics.record_outbound_outcome("risk", true);

        if (assessment.no_show_risk - interview.no_show_risk).abs() > RISK_DELTA_THRESHOLD {
            deps.log
                .record_scheduled(
                    ActionType::RiskScoreUpdated,
                    Some(interview.job_id),
                    json!({
                        "interview_id": interview.id.to_string(),
                        "old": interview.no_show_risk,
                        "new": assessment.no_show_risk,
                        "risk_level": assessment.risk_level,
                    }),
                )
                .await;
        }

        if let Err(err) = deps
            .storage
            .update_no_show_risk(interview.id, assessment.no_show_risk)
            .await
        {
            errors.push(format!("interview {}: risk write: {}", interview.id, err));
            continue;
        }
        refreshed += 1;
    }
    (refreshed, errors)
}

/// Owns the periodic schedule and the in-flight guard around `run_cycle`.
pub struct BackgroundCycler {
    deps: Arc<ServerDeps>,
    period: std::time::Duration,
    in_flight: Arc<AtomicBool>,
}

impl BackgroundCycler {
    pub fn new(deps: Arc<ServerDeps>, period: std::time::Duration) -> Self {
        Self {
            deps,
            period,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the repeating schedule. Returns the scheduler handle for
    /// shutdown.
    pub async fn start(&self) -> anyhow::Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;

        let deps = self.deps.clone();
        let in_flight = self.in_flight.clone();
        let job = Job::new_repeated_async(self.period, move |_uuid, _lock| {
            let deps = deps.clone();
            let in_flight = in_flight.clone();
            Box::pin(async move {
                // One cycle at a time; a tick landing mid-cycle is dropped
                if in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    tracing::warn!("previous cycle still running, skipping tick");
                    deps.log
                        .record_scheduled(
                            ActionType::BackgroundCycle,
                            None,
                            json!({ "skipped": true, "reason": "cycle_in_flight" }),
                        )
                        .await;
                    return;
                }
                run_cycle(&deps, Utc::now()).await;
                in_flight.store(false, Ordering::SeqCst);
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;
        tracing::info!(
            period_secs = self.period.as_secs(),
            "background cycler started"
        );
        Ok(scheduler)
    }

    /// Stop the schedule, letting any in-flight cycle finish first.
    pub async fn shutdown(&self, mut scheduler: JobScheduler) {
        if let Err(err) = scheduler.shutdown().await {
            tracing::warn!(error = %err, "scheduler shutdown reported an error");
        }
        while self.in_flight.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        tracing::info!("background cycler stopped");
    }
}
