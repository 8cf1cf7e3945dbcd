//! Shortlisting engine: partitions applications into shortlisted, buffer,
//! pending, and rejected, and keeps the first two partitions healthy as
//! candidates drop out.
//!
//! Rank discipline: shortlisted ranks live in `1..=openings`, buffer ranks in
//! `openings+1..=openings+buffer_target`, and the combined set stays a
//! contiguous prefix. Vacancies are filled by taking the smallest missing
//! rank, so a re-run never reshuffles candidates already placed.
//!
//! The engine never talks to the interview scheduler directly; invitations
//! for freshly shortlisted or promoted candidates go through the injected
//! `InviteSender`, which keeps the dependency between the two engines one-way.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::common::{EngineError, Outcome, SkipReason};
use crate::domains::applications::{Application, PartitionCounts, ShortlistStatus};
use crate::domains::automation::models::flag_names;
use crate::domains::automation::ActionType;
use crate::domains::interviews::Interview;
use crate::domains::jobs::Job;
use crate::kernel::{EmailMessage, EmailTemplate, ServerDeps};
use crate::storage::Storage;

/// Lookahead window for the `can_promote` advisory signal
const CAN_PROMOTE_LOOKAHEAD_HOURS: i64 = 24;

/// Narrow one-way interface for "invite this candidate", implemented by the
/// interview scheduler and injected wherever shortlisting needs to trigger an
/// invitation.
#[async_trait]
pub trait InviteSender: Send + Sync {
    async fn invite(&self, application: &Application)
        -> Result<Outcome<Interview>, EngineError>;
}

/// Counts produced by an auto-shortlist run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ShortlistSummary {
    pub shortlisted: usize,
    pub buffer: usize,
}

pub struct ShortlistingEngine {
    deps: Arc<ServerDeps>,
}

impl ShortlistingEngine {
    pub fn new(deps: Arc<ServerDeps>) -> Self {
        Self { deps }
    }

    /// Partition scored pending applications into shortlist and buffer.
    ///
    /// Only fills vacancies: applications already placed keep their status
    /// and rank, so calling this twice changes nothing the second time.
    /// Applications under `manual_override` are never touched.
    pub async fn auto_shortlist(
        &self,
        job: &Job,
    ) -> Result<Outcome<ShortlistSummary>, EngineError> {
        if !self
            .deps
            .flags
            .is_enabled(flag_names::AUTO_SHORTLISTING, Some(job))
            .await
        {
            return Ok(Outcome::Skipped(SkipReason::AutomationDisabled));
        }

        let counts = self.deps.storage.partition_counts(job.id).await?;
        let shortlist_need = (job.openings as i64 - counts.shortlisted).max(0) as usize;
        let buffer_need = (job.buffer_target as i64 - counts.buffer).max(0) as usize;
        if shortlist_need == 0 && buffer_need == 0 {
            return Ok(Outcome::Done(ShortlistSummary::default()));
        }

        let pool = self.deps.storage.list_scored_pending(job.id).await?;
        let used = self.used_ranks(job.id).await?;

        let shortlist_ranks = missing_ranks(&used, 1, job.openings, shortlist_need);
        let buffer_ranks = missing_ranks(
            &used,
            job.openings + 1,
            job.openings + job.buffer_target,
            buffer_need,
        );

        let mut pool = pool.into_iter();
        let shortlisted: Vec<(Uuid, i32)> = shortlist_ranks
            .into_iter()
            .filter_map(|rank| pool.next().map(|app| (app.id, rank)))
            .collect();
        let buffer: Vec<(Uuid, i32)> = buffer_ranks
            .into_iter()
            .filter_map(|rank| pool.next().map(|app| (app.id, rank)))
            .collect();

        if shortlisted.is_empty() && buffer.is_empty() {
            return Ok(Outcome::Done(ShortlistSummary::default()));
        }

        self.deps
            .storage
            .assign_partitions(job.id, &shortlisted, &buffer)
            .await?;

        let summary = ShortlistSummary {
            shortlisted: shortlisted.len(),
            buffer: buffer.len(),
        };
        self.deps
            .log
            .record_auto(
                ActionType::AutoShortlist,
                Some(job.id),
                json!({
                    "shortlisted": summary.shortlisted,
                    "buffer": summary.buffer,
                }),
            )
            .await;
        self.deps.metrics.record_automation_outcome(true);
        tracing::info!(
            job_id = %job.id,
            shortlisted = summary.shortlisted,
            buffer = summary.buffer,
            "auto-shortlist complete"
        );
        Ok(Outcome::Done(summary))
    }

    /// Auto-shortlist, then invite every shortlisted candidate that does not
    /// have an interview yet. Per-candidate failures are isolated.
    pub async fn shortlist_and_invite(
        &self,
        job: &Job,
        inviter: &dyn InviteSender,
    ) -> Result<Outcome<ShortlistSummary>, EngineError> {
        let summary = match self.auto_shortlist(job).await? {
            Outcome::Done(summary) => summary,
            skipped => return Ok(skipped),
        };

        let shortlisted = self
            .deps
            .storage
            .list_applications(job.id, Some(ShortlistStatus::Shortlisted))
            .await?;
        for application in &shortlisted {
            if let Err(err) = inviter.invite(application).await {
                tracing::warn!(
                    application_id = %application.id,
                    error = %err,
                    "invitation failed during shortlist, continuing with remaining candidates"
                );
                self.deps.metrics.record_automation_outcome(false);
            }
        }
        Ok(Outcome::Done(summary))
    }

    /// Promote the best buffer candidate into `vacated_rank`, refill the
    /// buffer behind it, and invite the promoted candidate.
    ///
    /// Unconditional apart from the buffer itself: a vacancy must not stay
    /// open, so this runs even while other interviews for the job are
    /// imminent (`can_promote` is advisory only). Returns
    /// `Skipped(EmptyBuffer)` without mutating anything when no buffer
    /// candidate exists.
    pub async fn promote_from_buffer(
        &self,
        job: &Job,
        vacated_rank: i32,
        inviter: &dyn InviteSender,
    ) -> Result<Outcome<Application>, EngineError> {
        let promoted = match self
            .deps
            .storage
            .promote_from_buffer(job.id, vacated_rank)
            .await?
        {
            Some(promoted) => promoted,
            None => {
                self.deps.metrics.record_automation_outcome(false);
                return Ok(Outcome::Skipped(SkipReason::EmptyBuffer));
            }
        };

        self.deps
            .log
            .record_auto(
                ActionType::BufferPromotion,
                Some(job.id),
                json!({
                    "application_id": promoted.id.to_string(),
                    "candidate_id": promoted.candidate_id.to_string(),
                    "vacated_rank": vacated_rank,
                }),
            )
            .await;
        self.deps.metrics.record_automation_outcome(true);

        // Let the candidate know they moved up; the interview invitation
        // with action links follows separately.
        let promotion_email = EmailMessage {
            to: promoted.candidate_email.clone(),
            template: EmailTemplate::Promotion,
            data: json!({
                "candidate_name": promoted.candidate_name,
                "job_title": job.title,
                "rank": vacated_rank,
            }),
        };
        if let Err(err) = self.deps.email.queue(promotion_email).await {
            tracing::warn!(error = %err, "promotion email failed");
            self.deps.metrics.record_outbound_outcome("email", false);
        } else {
            self.deps.metrics.record_outbound_outcome("email", true);
        }

        if let Err(err) = self.backfill_buffer(job).await {
            tracing::warn!(job_id = %job.id, error = %err, "buffer backfill after promotion failed");
        }

        if let Err(err) = inviter.invite(&promoted).await {
            tracing::warn!(
                application_id = %promoted.id,
                error = %err,
                "invitation for promoted candidate failed"
            );
        }

        Ok(Outcome::Done(promoted))
    }

    /// Top the buffer back up from the scored pending pool, best fit first.
    /// Idempotent: once the buffer is at target this is a no-op.
    pub async fn backfill_buffer(&self, job: &Job) -> Result<Outcome<usize>, EngineError> {
        if !self
            .deps
            .flags
            .is_enabled(flag_names::AUTO_PROMOTION, Some(job))
            .await
        {
            return Ok(Outcome::Skipped(SkipReason::AutomationDisabled));
        }

        let counts = self.deps.storage.partition_counts(job.id).await?;
        let need = (job.buffer_target as i64 - counts.buffer).max(0) as usize;
        if need == 0 {
            return Ok(Outcome::Done(0));
        }

        let pool = self.deps.storage.list_scored_pending(job.id).await?;
        let used = self.used_ranks(job.id).await?;
        let ranks = missing_ranks(
            &used,
            job.openings + 1,
            job.openings + job.buffer_target,
            need,
        );

        let mut pool = pool.into_iter();
        let buffer: Vec<(Uuid, i32)> = ranks
            .into_iter()
            .filter_map(|rank| pool.next().map(|app| (app.id, rank)))
            .collect();
        if buffer.is_empty() {
            return Ok(Outcome::Done(0));
        }

        self.deps
            .storage
            .assign_partitions(job.id, &[], &buffer)
            .await?;
        self.deps
            .log
            .record_auto(
                ActionType::BufferBackfill,
                Some(job.id),
                json!({ "added": buffer.len() }),
            )
            .await;
        Ok(Outcome::Done(buffer.len()))
    }

    /// Conservative advisory signal: false while a confirmed interview for
    /// the job is within the next 24 hours. Surfaced on the dashboard so
    /// recruiters know a fresh promotion would land mid-interview; it never
    /// blocks the recovery path itself.
    pub async fn can_promote(&self, job: &Job) -> Result<bool, EngineError> {
        let now = Utc::now();
        let imminent = self
            .deps
            .storage
            .job_has_confirmed_between(job.id, now, now + Duration::hours(CAN_PROMOTE_LOOKAHEAD_HOURS))
            .await?;
        Ok(!imminent)
    }

    pub async fn status(&self, job_id: Uuid) -> Result<PartitionCounts, EngineError> {
        Ok(self.deps.storage.partition_counts(job_id).await?)
    }

    async fn used_ranks(&self, job_id: Uuid) -> Result<BTreeSet<i32>, EngineError> {
        let applications = self.deps.storage.list_applications(job_id, None).await?;
        Ok(applications.iter().filter_map(|a| a.rank).collect())
    }
}

/// The first `take` ranks in `[lo, hi]` not present in `used`, ascending.
fn missing_ranks(used: &BTreeSet<i32>, lo: i32, hi: i32, take: usize) -> Vec<i32> {
    (lo..=hi)
        .filter(|rank| !used.contains(rank))
        .take(take)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ranks_fills_gaps_first() {
        let used: BTreeSet<i32> = [1, 3].into_iter().collect();
        assert_eq!(missing_ranks(&used, 1, 5, 2), vec![2, 4]);
    }

    #[test]
    fn missing_ranks_empty_range() {
        let used = BTreeSet::new();
        assert_eq!(missing_ranks(&used, 4, 3, 5), Vec::<i32>::new());
    }

    #[test]
    fn missing_ranks_respects_take() {
        let used = BTreeSet::new();
        assert_eq!(missing_ranks(&used, 1, 10, 3), vec![1, 2, 3]);
    }
}
