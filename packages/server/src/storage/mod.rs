//! Storage gateway: typed CRUD over the persistent entities.
//!
//! No business logic lives here, but the multi-row operations that uphold the
//! ranking invariants (partition assignment, buffer promotion) are expressed
//! as single atomic units so callers cannot observe a half-applied state.
//!
//! Two implementations:
//! - `PostgresStorage`: sqlx over Postgres, `FOR UPDATE` row locks and a
//!   deferred unique constraint on `(job_id, rank)`.
//! - `InMemoryStorage`: a single async mutex over plain maps; every
//!   operation is trivially serializable. Used by the test suites.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domains::applications::{Application, NewApplication, PartitionCounts, ShortlistStatus};
use crate::domains::automation::{
    ActionType, AutomationLog, FeatureFlag, LogFilter, NewLogEntry,
};
use crate::domains::interviews::{Interview, InterviewStatus, InterviewUpdate, NewInterview};
use crate::domains::jobs::{Job, JobUpdate, NewJob};
use crate::domains::negotiation::NegotiationSession;

pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;

/// Storage failure taxonomy. `Transient` is the only retryable kind.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Transient(#[source] anyhow::Error),
}

impl StorageError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Typed persistence operations for the hiring pipeline.
///
/// Single-entity reads are linearizable. Range queries use the fixed
/// orderings documented per method so sweeps and retries are reproducible.
#[async_trait]
pub trait Storage: Send + Sync {
    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    async fn insert_job(&self, new: NewJob) -> StorageResult<Job>;

    async fn get_job(&self, id: Uuid) -> StorageResult<Job>;

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> StorageResult<Job>;

    async fn delete_job(&self, id: Uuid) -> StorageResult<()>;

    /// Jobs not yet expired, newest first
    async fn list_open_jobs(&self) -> StorageResult<Vec<Job>>;

    /// Jobs with applications closed and not expired (the cycler's working set)
    async fn list_active_jobs(&self) -> StorageResult<Vec<Job>>;

    // ------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------

    async fn insert_application(&self, new: NewApplication) -> StorageResult<Application>;

    async fn get_application(&self, id: Uuid) -> StorageResult<Application>;

    /// Write the scoring service outcome and mark the application processed
    async fn record_fit_score(
        &self,
        id: Uuid,
        fit_score: f64,
        summary: Option<String>,
    ) -> StorageResult<()>;

    /// Applications for a job, ordered `(rank asc nulls last, id asc)`
    async fn list_applications(
        &self,
        job_id: Uuid,
        status: Option<ShortlistStatus>,
    ) -> StorageResult<Vec<Application>>;

    /// Scored, still-pending, non-overridden applications ordered
    /// `(fit_score desc, id asc)`, the shortlisting candidate pool
    async fn list_scored_pending(&self, job_id: Uuid) -> StorageResult<Vec<Application>>;

    async fn partition_counts(&self, job_id: Uuid) -> StorageResult<PartitionCounts>;

    /// Highest rank currently held among shortlisted + buffer (0 when none)
    async fn max_rank(&self, job_id: Uuid) -> StorageResult<i32>;

    /// Atomically apply a partition assignment: each `(application, rank)`
    /// pair becomes shortlisted resp. buffer. One transaction.
    async fn assign_partitions(
        &self,
        job_id: Uuid,
        shortlisted: &[(Uuid, i32)],
        buffer: &[(Uuid, i32)],
    ) -> StorageResult<()>;

    /// Atomically promote the lowest-ranked buffer application into
    /// `vacated_rank` and compact the remaining buffer ranks. Applications
    /// with `manual_override` are never chosen. Returns `None` (and mutates
    /// nothing) when the buffer is empty.
    async fn promote_from_buffer(
        &self,
        job_id: Uuid,
        vacated_rank: i32,
    ) -> StorageResult<Option<Application>>;

    // ------------------------------------------------------------------
    // Interviews
    // ------------------------------------------------------------------

    /// Creates the interview in `invitation_sent`. Conflict when the
    /// application already has one.
    async fn insert_interview(&self, new: NewInterview) -> StorageResult<Interview>;

    async fn get_interview(&self, id: Uuid) -> StorageResult<Interview>;

    async fn get_interview_by_application(
        &self,
        application_id: Uuid,
    ) -> StorageResult<Option<Interview>>;

    /// Interviews for a job, ordered `(id asc)`
    async fn list_interviews_by_job(&self, job_id: Uuid) -> StorageResult<Vec<Interview>>;

    /// Optimistic-CAS transition: applies `update` only while the interview
    /// still has `expected` status, otherwise `Conflict`. Concurrent
    /// attempts lose; the winner's write is the only one applied.
    async fn transition_interview(
        &self,
        id: Uuid,
        expected: InterviewStatus,
        update: InterviewUpdate,
    ) -> StorageResult<Interview>;

    /// CAS transition to a terminal status plus rejection of the owning
    /// application (status `rejected`, rank cleared) in one transaction.
    async fn close_interview_rejecting_application(
        &self,
        id: Uuid,
        expected: InterviewStatus,
        terminal: InterviewStatus,
    ) -> StorageResult<Interview>;

    async fn update_no_show_risk(&self, id: Uuid, risk: f64) -> StorageResult<()>;

    async fn record_calendar_event(&self, id: Uuid, event_ref: &str) -> StorageResult<()>;

    /// `invitation_sent` interviews whose confirmation deadline has passed,
    /// ordered `(id asc)`
    async fn find_past_confirmation_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Interview>>;

    /// `slot_pending` interviews whose slot-selection deadline has passed,
    /// ordered `(id asc)`
    async fn find_past_slot_deadline(&self, now: DateTime<Utc>)
        -> StorageResult<Vec<Interview>>;

    /// Confirmed interviews scheduled inside `[from, to]`, ordered `(id asc)`
    async fn find_confirmed_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Interview>>;

    /// Confirmed interviews scheduled after `now`, ordered `(id asc)`
    async fn find_confirmed_after(&self, now: DateTime<Utc>) -> StorageResult<Vec<Interview>>;

    /// Whether the job has any confirmed interview scheduled in `[from, to]`
    async fn job_has_confirmed_between(
        &self,
        job_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<bool>;

    // ------------------------------------------------------------------
    // Negotiation sessions
    // ------------------------------------------------------------------

    async fn get_negotiation_by_interview(
        &self,
        interview_id: Uuid,
    ) -> StorageResult<Option<NegotiationSession>>;

    async fn upsert_negotiation(&self, session: &NegotiationSession) -> StorageResult<()>;

    // ------------------------------------------------------------------
    // Feature flags
    // ------------------------------------------------------------------

    async fn get_flag(&self, name: &str) -> StorageResult<Option<FeatureFlag>>;

    async fn upsert_flag(&self, flag: &FeatureFlag) -> StorageResult<()>;

    // ------------------------------------------------------------------
    // Automation log
    // ------------------------------------------------------------------

    async fn append_log(&self, entry: NewLogEntry) -> StorageResult<AutomationLog>;

    /// Filtered log page, ordered `(created_at desc, id desc)`
    async fn query_logs(&self, filter: &LogFilter) -> StorageResult<Vec<AutomationLog>>;

    /// `(action_type, count)` aggregates, optionally scoped to a job
    async fn count_logs_by_action(&self, job_id: Option<Uuid>)
        -> StorageResult<Vec<(String, i64)>>;

    /// `(trigger_source, count)` aggregates, optionally scoped to a job
    async fn count_logs_by_trigger(
        &self,
        job_id: Option<Uuid>,
    ) -> StorageResult<Vec<(String, i64)>>;

    /// Whether an entry with `details.interview_id == interview_id` and the
    /// given action type exists (reminder dedupe)
    async fn has_interview_log(
        &self,
        interview_id: Uuid,
        action: ActionType,
    ) -> StorageResult<bool>;
}
