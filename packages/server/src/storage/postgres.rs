use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};
use crate::domains::applications::{Application, NewApplication, PartitionCounts, ShortlistStatus};
use crate::domains::automation::{ActionType, AutomationLog, FeatureFlag, LogFilter, NewLogEntry};
use crate::domains::interviews::{Interview, InterviewStatus, InterviewUpdate, NewInterview};
use crate::domains::jobs::{Job, JobUpdate, NewJob};
use crate::domains::negotiation::{HistoryEntry, NegotiationSession, NegotiationState};

/// Postgres-backed storage gateway.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::RowNotFound => StorageError::not_found("row"),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StorageError::conflict(db.message().to_string())
        }
        _ => StorageError::Transient(err.into()),
    }
}

fn decode_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::Transient(anyhow::anyhow!("row decode failed: {}", err))
}

fn row_to_job(row: &PgRow) -> StorageResult<Job> {
    Ok(Job {
        id: row.try_get("id").map_err(decode_err)?,
        title: row.try_get("title").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        posted_by: row.try_get("posted_by").map_err(decode_err)?,
        openings: row.try_get("openings").map_err(decode_err)?,
        buffer_target: row.try_get("buffer_target").map_err(decode_err)?,
        applications_closed: row.try_get("applications_closed").map_err(decode_err)?,
        expired: row.try_get("expired").map_err(decode_err)?,
        automation_enabled: row.try_get("automation_enabled").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
        updated_at: row.try_get("updated_at").map_err(decode_err)?,
    })
}

fn row_to_application(row: &PgRow) -> StorageResult<Application> {
    let status: String = row.try_get("shortlist_status").map_err(decode_err)?;
    Ok(Application {
        id: row.try_get("id").map_err(decode_err)?,
        job_id: row.try_get("job_id").map_err(decode_err)?,
        candidate_id: row.try_get("candidate_id").map_err(decode_err)?,
        candidate_name: row.try_get("candidate_name").map_err(decode_err)?,
        candidate_email: row.try_get("candidate_email").map_err(decode_err)?,
        resume_url: row.try_get("resume_url").map_err(decode_err)?,
        fit_score: row.try_get("fit_score").map_err(decode_err)?,
        fit_summary: row.try_get("fit_summary").map_err(decode_err)?,
        rank: row.try_get("rank").map_err(decode_err)?,
        shortlist_status: ShortlistStatus::from_str(&status).map_err(decode_err)?,
        ai_processed: row.try_get("ai_processed").map_err(decode_err)?,
        manual_override: row.try_get("manual_override").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
        updated_at: row.try_get("updated_at").map_err(decode_err)?,
    })
}

fn row_to_interview(row: &PgRow) -> StorageResult<Interview> {
    let status: String = row.try_get("status").map_err(decode_err)?;
    Ok(Interview {
        id: row.try_get("id").map_err(decode_err)?,
        application_id: row.try_get("application_id").map_err(decode_err)?,
        job_id: row.try_get("job_id").map_err(decode_err)?,
        recruiter_id: row.try_get("recruiter_id").map_err(decode_err)?,
        candidate_id: row.try_get("candidate_id").map_err(decode_err)?,
        candidate_email: row.try_get("candidate_email").map_err(decode_err)?,
        rank_at_time: row.try_get("rank_at_time").map_err(decode_err)?,
        status: InterviewStatus::from_str(&status).map_err(decode_err)?,
        confirmation_deadline: row.try_get("confirmation_deadline").map_err(decode_err)?,
        slot_selection_deadline: row
            .try_get("slot_selection_deadline")
            .map_err(decode_err)?,
        scheduled_time: row.try_get("scheduled_time").map_err(decode_err)?,
        scheduled_end: row.try_get("scheduled_end").map_err(decode_err)?,
        no_show_risk: row.try_get("no_show_risk").map_err(decode_err)?,
        calendar_event_ref: row.try_get("calendar_event_ref").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
        updated_at: row.try_get("updated_at").map_err(decode_err)?,
    })
}

fn row_to_negotiation(row: &PgRow) -> StorageResult<NegotiationSession> {
    let state: String = row.try_get("state").map_err(decode_err)?;
    let history: serde_json::Value = row.try_get("history").map_err(decode_err)?;
    let history: Vec<HistoryEntry> = serde_json::from_value(history).map_err(decode_err)?;
    Ok(NegotiationSession {
        id: row.try_get("id").map_err(decode_err)?,
        interview_id: row.try_get("interview_id").map_err(decode_err)?,
        round: row.try_get("round").map_err(decode_err)?,
        max_rounds: row.try_get("max_rounds").map_err(decode_err)?,
        state: NegotiationState::from_str(&state).map_err(decode_err)?,
        history,
        created_at: row.try_get("created_at").map_err(decode_err)?,
        updated_at: row.try_get("updated_at").map_err(decode_err)?,
    })
}

fn row_to_log(row: &PgRow) -> StorageResult<AutomationLog> {
    let action: String = row.try_get("action_type").map_err(decode_err)?;
    let trigger: String = row.try_get("trigger_source").map_err(decode_err)?;
    Ok(AutomationLog {
        id: row.try_get("id").map_err(decode_err)?,
        job_id: row.try_get("job_id").map_err(decode_err)?,
        action_type: ActionType::from_str(&action).map_err(decode_err)?,
        trigger_source: trigger.parse().map_err(decode_err)?,
        actor: row.try_get("actor").map_err(decode_err)?,
        details: row.try_get("details").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

#[async_trait]
impl Storage for PostgresStorage {
    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    async fn insert_job(&self, new: NewJob) -> StorageResult<Job> {
        let row = sqlx::query(
            "INSERT INTO jobs (id, title, description, posted_by, openings, buffer_target)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.posted_by)
        .bind(new.openings)
        .bind(new.buffer_target)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row_to_job(&row)
    }

    async fn get_job(&self, id: Uuid) -> StorageResult<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found(format!("job {}", id)))?;
        row_to_job(&row)
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> StorageResult<Job> {
        let row = sqlx::query(
            "UPDATE jobs SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                openings = COALESCE($4, openings),
                buffer_target = COALESCE($5, buffer_target),
                applications_closed = COALESCE($6, applications_closed),
                expired = COALESCE($7, expired),
                automation_enabled = COALESCE($8, automation_enabled),
                updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(update.title)
        .bind(update.description)
        .bind(update.openings)
        .bind(update.buffer_target)
        .bind(update.applications_closed)
        .bind(update.expired)
        .bind(update.automation_enabled)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StorageError::not_found(format!("job {}", id)))?;
        row_to_job(&row)
    }

    async fn delete_job(&self, id: Uuid) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("job {}", id)));
        }
        Ok(())
    }

    async fn list_open_jobs(&self) -> StorageResult<Vec<Job>> {
        let rows = sqlx::query(
            "SELECT * FROM jobs WHERE expired = false ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_job).collect()
    }

    async fn list_active_jobs(&self) -> StorageResult<Vec<Job>> {
        let rows = sqlx::query(
            "SELECT * FROM jobs
             WHERE applications_closed = true AND expired = false
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_job).collect()
    }

    // ------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------

    async fn insert_application(&self, new: NewApplication) -> StorageResult<Application> {
        let row = sqlx::query(
            "INSERT INTO applications (
                id, job_id, candidate_id, candidate_name, candidate_email, resume_url
             )
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.job_id)
        .bind(new.candidate_id)
        .bind(&new.candidate_name)
        .bind(&new.candidate_email)
        .bind(&new.resume_url)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row_to_application(&row)
    }

    async fn get_application(&self, id: Uuid) -> StorageResult<Application> {
        let row = sqlx::query("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found(format!("application {}", id)))?;
        row_to_application(&row)
    }

    async fn record_fit_score(
        &self,
        id: Uuid,
        fit_score: f64,
        summary: Option<String>,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE applications
             SET fit_score = $2, fit_summary = $3, ai_processed = true, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(fit_score)
        .bind(summary)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("application {}", id)));
        }
        Ok(())
    }

    async fn list_applications(
        &self,
        job_id: Uuid,
        status: Option<ShortlistStatus>,
    ) -> StorageResult<Vec<Application>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM applications
                     WHERE job_id = $1 AND shortlist_status = $2
                     ORDER BY rank ASC NULLS LAST, id ASC",
                )
                .bind(job_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT * FROM applications
                     WHERE job_id = $1
                     ORDER BY rank ASC NULLS LAST, id ASC",
                )
                .bind(job_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;
        rows.iter().map(row_to_application).collect()
    }

    async fn list_scored_pending(&self, job_id: Uuid) -> StorageResult<Vec<Application>> {
        let rows = sqlx::query(
            "SELECT * FROM applications
             WHERE job_id = $1
               AND shortlist_status = 'pending'
               AND ai_processed = true
               AND manual_override = false
             ORDER BY fit_score DESC, id ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_application).collect()
    }

    async fn partition_counts(&self, job_id: Uuid) -> StorageResult<PartitionCounts> {
        let rows = sqlx::query(
            "SELECT shortlist_status, COUNT(*) AS n
             FROM applications
             WHERE job_id = $1
             GROUP BY shortlist_status",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut counts = PartitionCounts::default();
        for row in &rows {
            let status: String = row.try_get("shortlist_status").map_err(decode_err)?;
            let n: i64 = row.try_get("n").map_err(decode_err)?;
            match ShortlistStatus::from_str(&status).map_err(decode_err)? {
                ShortlistStatus::Pending => counts.pending = n,
                ShortlistStatus::Shortlisted => counts.shortlisted = n,
                ShortlistStatus::Buffer => counts.buffer = n,
                ShortlistStatus::Rejected => counts.rejected = n,
            }
        }
        Ok(counts)
    }

    async fn max_rank(&self, job_id: Uuid) -> StorageResult<i32> {
        let rank: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(rank) FROM applications WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rank.unwrap_or(0))
    }

    async fn assign_partitions(
        &self,
        job_id: Uuid,
        shortlisted: &[(Uuid, i32)],
        buffer: &[(Uuid, i32)],
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for (status, pairs) in [("shortlisted", shortlisted), ("buffer", buffer)] {
            for (app_id, rank) in pairs {
                let result = sqlx::query(
                    "UPDATE applications
                     SET shortlist_status = $3, rank = $4, updated_at = now()
                     WHERE id = $1 AND job_id = $2",
                )
                .bind(app_id)
                .bind(job_id)
                .bind(status)
                .bind(rank)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
                if result.rows_affected() == 0 {
                    tx.rollback().await.map_err(db_err)?;
                    return Err(StorageError::not_found(format!("application {}", app_id)));
                }
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn promote_from_buffer(
        &self,
        job_id: Uuid,
        vacated_rank: i32,
    ) -> StorageResult<Option<Application>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Per-job critical section: two simultaneous vacancies must not both
        // claim the same buffer candidate.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let chosen = sqlx::query(
            "SELECT * FROM applications
             WHERE job_id = $1 AND shortlist_status = 'buffer' AND manual_override = false
             ORDER BY rank ASC, id ASC
             LIMIT 1
             FOR UPDATE",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let chosen = match chosen {
            Some(row) => row_to_application(&row)?,
            None => {
                tx.rollback().await.map_err(db_err)?;
                return Ok(None);
            }
        };
        let old_rank = chosen.rank.unwrap_or(0);

        // Compact the remaining buffer so the combined ranks stay contiguous
        sqlx::query(
            "UPDATE applications
             SET rank = rank - 1, updated_at = now()
             WHERE job_id = $1 AND shortlist_status = 'buffer' AND rank > $2",
        )
        .bind(job_id)
        .bind(old_rank)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let row = sqlx::query(
            "UPDATE applications
             SET shortlist_status = 'shortlisted', rank = $2, updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(chosen.id)
        .bind(vacated_rank)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let promoted = row_to_application(&row)?;

        tx.commit().await.map_err(db_err)?;
        Ok(Some(promoted))
    }

    // ------------------------------------------------------------------
    // Interviews
    // ------------------------------------------------------------------

    async fn insert_interview(&self, new: NewInterview) -> StorageResult<Interview> {
        let row = sqlx::query(
            "INSERT INTO interviews (
                id, application_id, job_id, recruiter_id, candidate_id, candidate_email,
                rank_at_time, status, confirmation_deadline, no_show_risk
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'invitation_sent', $8, $9)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.application_id)
        .bind(new.job_id)
        .bind(new.recruiter_id)
        .bind(new.candidate_id)
        .bind(&new.candidate_email)
        .bind(new.rank_at_time)
        .bind(new.confirmation_deadline)
        .bind(new.no_show_risk)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row_to_interview(&row)
    }

    async fn get_interview(&self, id: Uuid) -> StorageResult<Interview> {
        let row = sqlx::query("SELECT * FROM interviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StorageError::not_found(format!("interview {}", id)))?;
        row_to_interview(&row)
    }

    async fn get_interview_by_application(
        &self,
        application_id: Uuid,
    ) -> StorageResult<Option<Interview>> {
        let row = sqlx::query("SELECT * FROM interviews WHERE application_id = $1")
            .bind(application_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_interview).transpose()
    }

    async fn list_interviews_by_job(&self, job_id: Uuid) -> StorageResult<Vec<Interview>> {
        let rows = sqlx::query("SELECT * FROM interviews WHERE job_id = $1 ORDER BY id ASC")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_interview).collect()
    }

    async fn transition_interview(
        &self,
        id: Uuid,
        expected: InterviewStatus,
        update: InterviewUpdate,
    ) -> StorageResult<Interview> {
        let row = sqlx::query(
            "UPDATE interviews SET
                status = COALESCE($3, status),
                slot_selection_deadline = COALESCE($4, slot_selection_deadline),
                scheduled_time = COALESCE($5, scheduled_time),
                scheduled_end = COALESCE($6, scheduled_end),
                no_show_risk = COALESCE($7, no_show_risk),
                calendar_event_ref = COALESCE($8, calendar_event_ref),
                updated_at = now()
             WHERE id = $1 AND status = $2
             RETURNING *",
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.slot_selection_deadline)
        .bind(update.scheduled_time)
        .bind(update.scheduled_end)
        .bind(update.no_show_risk)
        .bind(update.calendar_event_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => row_to_interview(&row),
            // Zero rows: either the interview is gone or the precondition
            // lost a race. Re-read to tell the two apart.
            None => {
                let current = self.get_interview(id).await?;
                Err(StorageError::conflict(format!(
                    "interview {} is {}, expected {}",
                    id, current.status, expected
                )))
            }
        }
    }

    async fn close_interview_rejecting_application(
        &self,
        id: Uuid,
        expected: InterviewStatus,
        terminal: InterviewStatus,
    ) -> StorageResult<Interview> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query(
            "UPDATE interviews SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
             RETURNING *",
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(terminal.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let interview = match row {
            Some(row) => row_to_interview(&row)?,
            None => {
                tx.rollback().await.map_err(db_err)?;
                let current = self.get_interview(id).await?;
                return Err(StorageError::conflict(format!(
                    "interview {} is {}, expected {}",
                    id, current.status, expected
                )));
            }
        };

        sqlx::query(
            "UPDATE applications
             SET shortlist_status = 'rejected', rank = NULL, updated_at = now()
             WHERE id = $1",
        )
        .bind(interview.application_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(interview)
    }

    async fn update_no_show_risk(&self, id: Uuid, risk: f64) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE interviews SET no_show_risk = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(risk)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("interview {}", id)));
        }
        Ok(())
    }

    async fn record_calendar_event(&self, id: Uuid, event_ref: &str) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE interviews SET calendar_event_ref = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(event_ref)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("interview {}", id)));
        }
        Ok(())
    }

    async fn find_past_confirmation_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Interview>> {
        let rows = sqlx::query(
            "SELECT * FROM interviews
             WHERE status = 'invitation_sent' AND confirmation_deadline <= $1
             ORDER BY id ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_interview).collect()
    }

    async fn find_past_slot_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Interview>> {
        let rows = sqlx::query(
            "SELECT * FROM interviews
             WHERE status = 'slot_pending' AND slot_selection_deadline <= $1
             ORDER BY id ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_interview).collect()
    }

    async fn find_confirmed_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Interview>> {
        let rows = sqlx::query(
            "SELECT * FROM interviews
             WHERE status = 'confirmed' AND scheduled_time >= $1 AND scheduled_time <= $2
             ORDER BY id ASC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_interview).collect()
    }

    async fn find_confirmed_after(&self, now: DateTime<Utc>) -> StorageResult<Vec<Interview>> {
        let rows = sqlx::query(
            "SELECT * FROM interviews
             WHERE status = 'confirmed' AND scheduled_time > $1
             ORDER BY id ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_interview).collect()
    }

    async fn job_has_confirmed_between(
        &self,
        job_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM interviews
                WHERE job_id = $1 AND status = 'confirmed'
                  AND scheduled_time >= $2 AND scheduled_time <= $3
             )",
        )
        .bind(job_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(exists)
    }

    // ------------------------------------------------------------------
    // Negotiation sessions
    // ------------------------------------------------------------------

    async fn get_negotiation_by_interview(
        &self,
        interview_id: Uuid,
    ) -> StorageResult<Option<NegotiationSession>> {
        let row = sqlx::query("SELECT * FROM negotiation_sessions WHERE interview_id = $1")
            .bind(interview_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_negotiation).transpose()
    }

    async fn upsert_negotiation(&self, session: &NegotiationSession) -> StorageResult<()> {
        let history = serde_json::to_value(&session.history).map_err(decode_err)?;
        sqlx::query(
            "INSERT INTO negotiation_sessions (
                id, interview_id, round, max_rounds, state, history, created_at, updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (interview_id) DO UPDATE SET
                round = EXCLUDED.round,
                max_rounds = EXCLUDED.max_rounds,
                state = EXCLUDED.state,
                history = EXCLUDED.history,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(session.id)
        .bind(session.interview_id)
        .bind(session.round)
        .bind(session.max_rounds)
        .bind(session.state.as_str())
        .bind(history)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Feature flags
    // ------------------------------------------------------------------

    async fn get_flag(&self, name: &str) -> StorageResult<Option<FeatureFlag>> {
        let row = sqlx::query(
            "SELECT name, enabled, description FROM feature_flags WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(|row| {
            Ok(FeatureFlag {
                name: row.try_get("name").map_err(decode_err)?,
                enabled: row.try_get("enabled").map_err(decode_err)?,
                description: row.try_get("description").map_err(decode_err)?,
            })
        })
        .transpose()
    }

    async fn upsert_flag(&self, flag: &FeatureFlag) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO feature_flags (name, enabled, description)
             VALUES ($1, $2, $3)
             ON CONFLICT (name) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                description = EXCLUDED.description",
        )
        .bind(&flag.name)
        .bind(flag.enabled)
        .bind(&flag.description)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Automation log
    // ------------------------------------------------------------------

    async fn append_log(&self, entry: NewLogEntry) -> StorageResult<AutomationLog> {
        let row = sqlx::query(
            "INSERT INTO automation_logs (id, job_id, action_type, trigger_source, actor, details)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(entry.job_id)
        .bind(entry.action_type.as_str())
        .bind(entry.trigger_source.as_str())
        .bind(entry.actor)
        .bind(&entry.details)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row_to_log(&row)
    }

    async fn query_logs(&self, filter: &LogFilter) -> StorageResult<Vec<AutomationLog>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM automation_logs WHERE 1=1");

        if let Some(job_id) = filter.job_id {
            builder.push(" AND job_id = ").push_bind(job_id);
        }
        if let Some(action) = filter.action_type {
            builder
                .push(" AND action_type = ")
                .push_bind(action.as_str());
        }
        if let Some(interview_id) = filter.interview_id {
            builder
                .push(" AND details->>'interview_id' = ")
                .push_bind(interview_id.to_string());
        }
        if let Some(candidate_id) = filter.candidate_id {
            builder
                .push(" AND details->>'candidate_id' = ")
                .push_bind(candidate_id.to_string());
        }
        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND created_at <= ").push_bind(to);
        }

        builder.push(" ORDER BY created_at DESC, id DESC");
        let limit = if filter.limit > 0 { filter.limit } else { 50 };
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(filter.offset.max(0));

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_log).collect()
    }

    async fn count_logs_by_action(
        &self,
        job_id: Option<Uuid>,
    ) -> StorageResult<Vec<(String, i64)>> {
        let rows = match job_id {
            Some(job_id) => {
                sqlx::query(
                    "SELECT action_type, COUNT(*) AS n FROM automation_logs
                     WHERE job_id = $1 GROUP BY action_type ORDER BY action_type",
                )
                .bind(job_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT action_type, COUNT(*) AS n FROM automation_logs
                     GROUP BY action_type ORDER BY action_type",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get::<String, _>("action_type").map_err(decode_err)?,
                    row.try_get::<i64, _>("n").map_err(decode_err)?,
                ))
            })
            .collect()
    }

    async fn count_logs_by_trigger(
        &self,
        job_id: Option<Uuid>,
    ) -> StorageResult<Vec<(String, i64)>> {
        let rows = match job_id {
            Some(job_id) => {
                sqlx::query(
                    "SELECT trigger_source, COUNT(*) AS n FROM automation_logs
                     WHERE job_id = $1 GROUP BY trigger_source ORDER BY trigger_source",
                )
                .bind(job_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT trigger_source, COUNT(*) AS n FROM automation_logs
                     GROUP BY trigger_source ORDER BY trigger_source",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get::<String, _>("trigger_source")
                        .map_err(decode_err)?,
                    row.try_get::<i64, _>("n").map_err(decode_err)?,
                ))
            })
            .collect()
    }

    async fn has_interview_log(
        &self,
        interview_id: Uuid,
        action: ActionType,
    ) -> StorageResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM automation_logs
                WHERE action_type = $1 AND details->>'interview_id' = $2
             )",
        )
        .bind(action.as_str())
        .bind(interview_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(exists)
    }
}
