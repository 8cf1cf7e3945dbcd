//! In-memory storage gateway for tests.
//!
//! A single async mutex guards all state, so every operation - including the
//! multi-row ones - is serializable by construction. Orderings mirror the
//! Postgres implementation exactly; the engine test suites depend on that.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};
use crate::domains::applications::{Application, NewApplication, PartitionCounts, ShortlistStatus};
use crate::domains::automation::{ActionType, AutomationLog, FeatureFlag, LogFilter, NewLogEntry};
use crate::domains::interviews::{Interview, InterviewStatus, InterviewUpdate, NewInterview};
use crate::domains::jobs::{Job, JobUpdate, NewJob};
use crate::domains::negotiation::NegotiationSession;

#[derive(Default)]
struct MemState {
    jobs: HashMap<Uuid, Job>,
    applications: HashMap<Uuid, Application>,
    interviews: HashMap<Uuid, Interview>,
    /// Keyed by interview id (one session per interview)
    negotiations: HashMap<Uuid, NegotiationSession>,
    flags: HashMap<String, FeatureFlag>,
    logs: Vec<AutomationLog>,
}

/// Test double for the storage gateway.
#[derive(Default)]
pub struct InMemoryStorage {
    state: Mutex<MemState>,
    /// When set, `append_log` fails with `Transient` - exercises the log
    /// sink's best-effort fallback.
    fail_log_appends: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_log_appends(&self, fail: bool) {
        self.fail_log_appends.store(fail, AtomicOrdering::SeqCst);
    }

    /// Snapshot of all log entries, oldest first. Test helper.
    pub async fn all_logs(&self) -> Vec<AutomationLog> {
        self.state.lock().await.logs.clone()
    }

    /// Direct interview overwrite for test fixtures (deadlines in the past etc.)
    pub async fn put_interview(&self, interview: Interview) {
        self.state
            .lock()
            .await
            .interviews
            .insert(interview.id, interview);
    }

    /// Direct application overwrite for test fixtures
    pub async fn put_application(&self, application: Application) {
        self.state
            .lock()
            .await
            .applications
            .insert(application.id, application);
    }
}

fn by_rank_then_id(a: &Application, b: &Application) -> Ordering {
    let ra = a.rank.unwrap_or(i32::MAX);
    let rb = b.rank.unwrap_or(i32::MAX);
    ra.cmp(&rb).then(a.id.cmp(&b.id))
}

fn by_fit_desc_then_id(a: &Application, b: &Application) -> Ordering {
    let fa = a.fit_score.unwrap_or(0.0);
    let fb = b.fit_score.unwrap_or(0.0);
    fb.partial_cmp(&fa)
        .unwrap_or(Ordering::Equal)
        .then(a.id.cmp(&b.id))
}

#[async_trait]
impl Storage for InMemoryStorage {
    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    async fn insert_job(&self, new: NewJob) -> StorageResult<Job> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            posted_by: new.posted_by,
            openings: new.openings,
            buffer_target: new.buffer_target,
            applications_closed: false,
            expired: false,
            automation_enabled: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> StorageResult<Job> {
        self.state
            .lock()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("job {}", id)))
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> StorageResult<Job> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(format!("job {}", id)))?;
        if let Some(title) = update.title {
            job.title = title;
        }
        if let Some(description) = update.description {
            job.description = description;
        }
        if let Some(openings) = update.openings {
            job.openings = openings;
        }
        if let Some(buffer_target) = update.buffer_target {
            job.buffer_target = buffer_target;
        }
        if let Some(closed) = update.applications_closed {
            job.applications_closed = closed;
        }
        if let Some(expired) = update.expired {
            job.expired = expired;
        }
        if let Some(enabled) = update.automation_enabled {
            job.automation_enabled = enabled;
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn delete_job(&self, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        state
            .jobs
            .remove(&id)
            .ok_or_else(|| StorageError::not_found(format!("job {}", id)))?;
        state.applications.retain(|_, a| a.job_id != id);
        state.interviews.retain(|_, i| i.job_id != id);
        Ok(())
    }

    async fn list_open_jobs(&self) -> StorageResult<Vec<Job>> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state.jobs.values().filter(|j| !j.expired).cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }

    async fn list_active_jobs(&self) -> StorageResult<Vec<Job>> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.applications_closed && !j.expired)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    // ------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------

    async fn insert_application(&self, new: NewApplication) -> StorageResult<Application> {
        let now = Utc::now();
        let app = Application {
            id: Uuid::new_v4(),
            job_id: new.job_id,
            candidate_id: new.candidate_id,
            candidate_name: new.candidate_name,
            candidate_email: new.candidate_email,
            resume_url: new.resume_url,
            fit_score: None,
            fit_summary: None,
            rank: None,
            shortlist_status: ShortlistStatus::Pending,
            ai_processed: false,
            manual_override: false,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .applications
            .insert(app.id, app.clone());
        Ok(app)
    }

    async fn get_application(&self, id: Uuid) -> StorageResult<Application> {
        self.state
            .lock()
            .await
            .applications
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("application {}", id)))
    }

    async fn record_fit_score(
        &self,
        id: Uuid,
        fit_score: f64,
        summary: Option<String>,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let app = state
            .applications
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(format!("application {}", id)))?;
        app.fit_score = Some(fit_score);
        app.fit_summary = summary;
        app.ai_processed = true;
        app.updated_at = Utc::now();
        Ok(())
    }

    async fn list_applications(
        &self,
        job_id: Uuid,
        status: Option<ShortlistStatus>,
    ) -> StorageResult<Vec<Application>> {
        let state = self.state.lock().await;
        let mut apps: Vec<Application> = state
            .applications
            .values()
            .filter(|a| a.job_id == job_id && status.map_or(true, |s| a.shortlist_status == s))
            .cloned()
            .collect();
        apps.sort_by(by_rank_then_id);
        Ok(apps)
    }

    async fn list_scored_pending(&self, job_id: Uuid) -> StorageResult<Vec<Application>> {
        let state = self.state.lock().await;
        let mut apps: Vec<Application> = state
            .applications
            .values()
            .filter(|a| {
                a.job_id == job_id
                    && a.shortlist_status == ShortlistStatus::Pending
                    && a.ai_processed
                    && !a.manual_override
            })
            .cloned()
            .collect();
        apps.sort_by(by_fit_desc_then_id);
        Ok(apps)
    }

    async fn partition_counts(&self, job_id: Uuid) -> StorageResult<PartitionCounts> {
        let state = self.state.lock().await;
        let mut counts = PartitionCounts::default();
        for app in state.applications.values().filter(|a| a.job_id == job_id) {
            match app.shortlist_status {
                ShortlistStatus::Pending => counts.pending += 1,
                ShortlistStatus::Shortlisted => counts.shortlisted += 1,
                ShortlistStatus::Buffer => counts.buffer += 1,
                ShortlistStatus::Rejected => counts.rejected += 1,
            }
        }
        Ok(counts)
    }

    async fn max_rank(&self, job_id: Uuid) -> StorageResult<i32> {
        let state = self.state.lock().await;
        Ok(state
            .applications
            .values()
            .filter(|a| a.job_id == job_id)
            .filter_map(|a| a.rank)
            .max()
            .unwrap_or(0))
    }

    async fn assign_partitions(
        &self,
        job_id: Uuid,
        shortlisted: &[(Uuid, i32)],
        buffer: &[(Uuid, i32)],
    ) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        for (status, pairs) in [
            (ShortlistStatus::Shortlisted, shortlisted),
            (ShortlistStatus::Buffer, buffer),
        ] {
            for (app_id, rank) in pairs {
                let app = state.applications.get_mut(app_id).ok_or_else(|| {
                    StorageError::not_found(format!("application {}", app_id))
                })?;
                if app.job_id != job_id {
                    return Err(StorageError::conflict(format!(
                        "application {} does not belong to job {}",
                        app_id, job_id
                    )));
                }
                app.shortlist_status = status;
                app.rank = Some(*rank);
                app.updated_at = now;
            }
        }
        Ok(())
    }

    async fn promote_from_buffer(
        &self,
        job_id: Uuid,
        vacated_rank: i32,
    ) -> StorageResult<Option<Application>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let chosen = state
            .applications
            .values()
            .filter(|a| {
                a.job_id == job_id
                    && a.shortlist_status == ShortlistStatus::Buffer
                    && !a.manual_override
            })
            .min_by(|a, b| by_rank_then_id(a, b))
            .map(|a| (a.id, a.rank.unwrap_or(i32::MAX)));

        let (chosen_id, old_rank) = match chosen {
            Some(found) => found,
            None => return Ok(None),
        };

        for app in state.applications.values_mut() {
            if app.job_id == job_id
                && app.shortlist_status == ShortlistStatus::Buffer
                && app.rank.map_or(false, |r| r > old_rank)
            {
                app.rank = app.rank.map(|r| r - 1);
                app.updated_at = now;
            }
        }

        let promoted = state
            .applications
            .get_mut(&chosen_id)
            .ok_or_else(|| StorageError::not_found(format!("application {}", chosen_id)))?;
        promoted.shortlist_status = ShortlistStatus::Shortlisted;
        promoted.rank = Some(vacated_rank);
        promoted.updated_at = now;
        Ok(Some(promoted.clone()))
    }

    // ------------------------------------------------------------------
    // Interviews
    // ------------------------------------------------------------------

    async fn insert_interview(&self, new: NewInterview) -> StorageResult<Interview> {
        let mut state = self.state.lock().await;
        if state
            .interviews
            .values()
            .any(|i| i.application_id == new.application_id)
        {
            return Err(StorageError::conflict(format!(
                "application {} already has an interview",
                new.application_id
            )));
        }
        let now = Utc::now();
        let interview = Interview {
            id: Uuid::new_v4(),
            application_id: new.application_id,
            job_id: new.job_id,
            recruiter_id: new.recruiter_id,
            candidate_id: new.candidate_id,
            candidate_email: new.candidate_email,
            rank_at_time: new.rank_at_time,
            status: InterviewStatus::InvitationSent,
            confirmation_deadline: Some(new.confirmation_deadline),
            slot_selection_deadline: None,
            scheduled_time: None,
            scheduled_end: None,
            no_show_risk: new.no_show_risk,
            calendar_event_ref: None,
            created_at: now,
            updated_at: now,
        };
        state.interviews.insert(interview.id, interview.clone());
        Ok(interview)
    }

    async fn get_interview(&self, id: Uuid) -> StorageResult<Interview> {
        self.state
            .lock()
            .await
            .interviews
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("interview {}", id)))
    }

    async fn get_interview_by_application(
        &self,
        application_id: Uuid,
    ) -> StorageResult<Option<Interview>> {
        Ok(self
            .state
            .lock()
            .await
            .interviews
            .values()
            .find(|i| i.application_id == application_id)
            .cloned())
    }

    async fn list_interviews_by_job(&self, job_id: Uuid) -> StorageResult<Vec<Interview>> {
        let state = self.state.lock().await;
        let mut interviews: Vec<Interview> = state
            .interviews
            .values()
            .filter(|i| i.job_id == job_id)
            .cloned()
            .collect();
        interviews.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(interviews)
    }

    async fn transition_interview(
        &self,
        id: Uuid,
        expected: InterviewStatus,
        update: InterviewUpdate,
    ) -> StorageResult<Interview> {
        let mut state = self.state.lock().await;
        let interview = state
            .interviews
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(format!("interview {}", id)))?;
        if interview.status != expected {
            return Err(StorageError::conflict(format!(
                "interview {} is {}, expected {}",
                id, interview.status, expected
            )));
        }
        apply_update(interview, update);
        Ok(interview.clone())
    }

    async fn close_interview_rejecting_application(
        &self,
        id: Uuid,
        expected: InterviewStatus,
        terminal: InterviewStatus,
    ) -> StorageResult<Interview> {
        let mut state = self.state.lock().await;
        let interview = state
            .interviews
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(format!("interview {}", id)))?;
        if interview.status != expected {
            return Err(StorageError::conflict(format!(
                "interview {} is {}, expected {}",
                id, interview.status, expected
            )));
        }
        apply_update(interview, InterviewUpdate::to_status(terminal));
        let interview = interview.clone();

        let application_id = interview.application_id;
        if let Some(app) = state.applications.get_mut(&application_id) {
            app.shortlist_status = ShortlistStatus::Rejected;
            app.rank = None;
            app.updated_at = Utc::now();
        }
        Ok(interview)
    }

    async fn update_no_show_risk(&self, id: Uuid, risk: f64) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let interview = state
            .interviews
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(format!("interview {}", id)))?;
        interview.no_show_risk = risk;
        interview.updated_at = Utc::now();
        Ok(())
    }

    async fn record_calendar_event(&self, id: Uuid, event_ref: &str) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let interview = state
            .interviews
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(format!("interview {}", id)))?;
        interview.calendar_event_ref = Some(event_ref.to_string());
        interview.updated_at = Utc::now();
        Ok(())
    }

    async fn find_past_confirmation_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Interview>> {
        let state = self.state.lock().await;
        let mut found: Vec<Interview> = state
            .interviews
            .values()
            .filter(|i| {
                i.status == InterviewStatus::InvitationSent
                    && i.confirmation_deadline.map_or(false, |d| d <= now)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn find_past_slot_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Interview>> {
        let state = self.state.lock().await;
        let mut found: Vec<Interview> = state
            .interviews
            .values()
            .filter(|i| {
                i.status == InterviewStatus::SlotPending
                    && i.slot_selection_deadline.map_or(false, |d| d <= now)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn find_confirmed_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Interview>> {
        let state = self.state.lock().await;
        let mut found: Vec<Interview> = state
            .interviews
            .values()
            .filter(|i| {
                i.status == InterviewStatus::Confirmed
                    && i.scheduled_time.map_or(false, |t| t >= from && t <= to)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn find_confirmed_after(&self, now: DateTime<Utc>) -> StorageResult<Vec<Interview>> {
        let state = self.state.lock().await;
        let mut found: Vec<Interview> = state
            .interviews
            .values()
            .filter(|i| {
                i.status == InterviewStatus::Confirmed
                    && i.scheduled_time.map_or(false, |t| t > now)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn job_has_confirmed_between(
        &self,
        job_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let state = self.state.lock().await;
        Ok(state.interviews.values().any(|i| {
            i.job_id == job_id
                && i.status == InterviewStatus::Confirmed
                && i.scheduled_time.map_or(false, |t| t >= from && t <= to)
        }))
    }

    // ------------------------------------------------------------------
    // Negotiation sessions
    // ------------------------------------------------------------------

    async fn get_negotiation_by_interview(
        &self,
        interview_id: Uuid,
    ) -> StorageResult<Option<NegotiationSession>> {
        Ok(self
            .state
            .lock()
            .await
            .negotiations
            .get(&interview_id)
            .cloned())
    }

    async fn upsert_negotiation(&self, session: &NegotiationSession) -> StorageResult<()> {
        self.state
            .lock()
            .await
            .negotiations
            .insert(session.interview_id, session.clone());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Feature flags
    // ------------------------------------------------------------------

    async fn get_flag(&self, name: &str) -> StorageResult<Option<FeatureFlag>> {
        Ok(self.state.lock().await.flags.get(name).cloned())
    }

    async fn upsert_flag(&self, flag: &FeatureFlag) -> StorageResult<()> {
        self.state
            .lock()
            .await
            .flags
            .insert(flag.name.clone(), flag.clone());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Automation log
    // ------------------------------------------------------------------

    async fn append_log(&self, entry: NewLogEntry) -> StorageResult<AutomationLog> {
        if self.fail_log_appends.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::Transient(anyhow::anyhow!(
                "log appends disabled by test"
            )));
        }
        let log = AutomationLog {
            id: Uuid::new_v4(),
            job_id: entry.job_id,
            action_type: entry.action_type,
            trigger_source: entry.trigger_source,
            actor: entry.actor,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.state.lock().await.logs.push(log.clone());
        Ok(log)
    }

    async fn query_logs(&self, filter: &LogFilter) -> StorageResult<Vec<AutomationLog>> {
        let state = self.state.lock().await;
        let mut logs: Vec<AutomationLog> = state
            .logs
            .iter()
            .filter(|l| log_matches(l, filter))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let offset = filter.offset.max(0) as usize;
        let limit = if filter.limit > 0 {
            filter.limit as usize
        } else {
            usize::MAX
        };
        Ok(logs.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_logs_by_action(
        &self,
        job_id: Option<Uuid>,
    ) -> StorageResult<Vec<(String, i64)>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for log in state
            .logs
            .iter()
            .filter(|l| job_id.map_or(true, |j| l.job_id == Some(j)))
        {
            *counts.entry(log.action_type.to_string()).or_insert(0) += 1;
        }
        let mut out: Vec<(String, i64)> = counts.into_iter().collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    async fn count_logs_by_trigger(
        &self,
        job_id: Option<Uuid>,
    ) -> StorageResult<Vec<(String, i64)>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for log in state
            .logs
            .iter()
            .filter(|l| job_id.map_or(true, |j| l.job_id == Some(j)))
        {
            *counts.entry(log.trigger_source.to_string()).or_insert(0) += 1;
        }
        let mut out: Vec<(String, i64)> = counts.into_iter().collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    async fn has_interview_log(
        &self,
        interview_id: Uuid,
        action: ActionType,
    ) -> StorageResult<bool> {
        let state = self.state.lock().await;
        Ok(state.logs.iter().any(|l| {
            l.action_type == action
                && l.details.get("interview_id").and_then(|v| v.as_str())
                    == Some(interview_id.to_string().as_str())
        }))
    }
}

fn apply_update(interview: &mut Interview, update: InterviewUpdate) {
    if let Some(status) = update.status {
        interview.status = status;
    }
    if let Some(deadline) = update.slot_selection_deadline {
        interview.slot_selection_deadline = Some(deadline);
    }
    if let Some(time) = update.scheduled_time {
        interview.scheduled_time = Some(time);
    }
    if let Some(end) = update.scheduled_end {
        interview.scheduled_end = Some(end);
    }
    if let Some(risk) = update.no_show_risk {
        interview.no_show_risk = risk;
    }
    if let Some(event_ref) = update.calendar_event_ref {
        interview.calendar_event_ref = Some(event_ref);
    }
    interview.updated_at = Utc::now();
}

fn log_matches(log: &AutomationLog, filter: &LogFilter) -> bool {
    if let Some(job_id) = filter.job_id {
        if log.job_id != Some(job_id) {
            return false;
        }
    }
    if let Some(action) = filter.action_type {
        if log.action_type != action {
            return false;
        }
    }
    if let Some(interview_id) = filter.interview_id {
        if log.details.get("interview_id").and_then(|v| v.as_str())
            != Some(interview_id.to_string().as_str())
        {
            return false;
        }
    }
    if let Some(candidate_id) = filter.candidate_id {
        if log.details.get("candidate_id").and_then(|v| v.as_str())
            != Some(candidate_id.to_string().as_str())
        {
            return false;
        }
    }
    if let Some(from) = filter.from {
        if log.created_at < from {
            return false;
        }
    }
    if let Some(to) = filter.to {
        if log.created_at > to {
            return false;
        }
    }
    true
}
