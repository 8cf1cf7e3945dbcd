//! Interview scheduler: drives the per-interview state machine from
//! invitation through confirmation and the terminal states.
//!
//! Every transition is an optimistic CAS on the stored status, so replayed
//! action links and racing requests lose cleanly with a conflict instead of
//! double-applying. Outbound side effects (email, calendar, risk) never gate
//! a transition: the state change commits, the failure is logged and picked
//! up by the next background cycle where that applies.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::common::{EngineError, Outcome, SkipReason};
use crate::domains::applications::{Application, ShortlistStatus};
use crate::domains::automation::models::flag_names;
use crate::domains::automation::ActionType;
use crate::domains::automation::TriggerSource;
use crate::domains::interviews::models::{Interview, InterviewStatus, InterviewUpdate, NewInterview};
use crate::domains::interviews::slots::{business_hours_only, within_business_hours, Slot};
use crate::domains::interviews::tokens::TokenAction;
use crate::domains::shortlisting::{InviteSender, ShortlistingEngine};
use crate::kernel::{
    retry_with_backoff, CalendarEventRequest, EmailMessage, EmailTemplate, ServerDeps,
};
use crate::storage::Storage;

/// Risk assigned to a fresh invitation before the model has seen it
const INITIAL_NO_SHOW_RISK: f64 = 0.5;

/// How far ahead the slot listing looks for recruiter free time
const SLOT_LOOKAHEAD_DAYS: i64 = 14;

/// Fallback interview length when a selected slot has no explicit end
const DEFAULT_SLOT_MINUTES: i64 = 60;

pub struct InterviewScheduler {
    deps: Arc<ServerDeps>,
}

impl InterviewScheduler {
    pub fn new(deps: Arc<ServerDeps>) -> Self {
        Self { deps }
    }

    /// Create an interview and send the invitation.
    ///
    /// Idempotent: an application that already has an interview gets the
    /// existing one back, nothing is re-sent. Gated on `global_automation`
    /// for the job.
    pub async fn send_invitation(
        &self,
        application_id: Uuid,
        trigger: TriggerSource,
        actor: Option<Uuid>,
    ) -> Result<Outcome<Interview>, EngineError> {
        let application = self.deps.storage.get_application(application_id).await?;
        let job = self.deps.storage.get_job(application.job_id).await?;

        if let Some(existing) = self
            .deps
            .storage
            .get_interview_by_application(application.id)
            .await?
        {
            return Ok(Outcome::Done(existing));
        }

        if !self
            .deps
            .flags
            .is_enabled(flag_names::GLOBAL_AUTOMATION, Some(&job))
            .await
        {
            return Ok(Outcome::Skipped(SkipReason::AutomationDisabled));
        }

        if application.shortlist_status == ShortlistStatus::Rejected {
            return Err(EngineError::conflict(
                "cannot invite a rejected application",
            ));
        }

        let now = Utc::now();
        let interview = match self
            .deps
            .storage
            .insert_interview(NewInterview {
                application_id: application.id,
                job_id: job.id,
                recruiter_id: job.posted_by,
                candidate_id: application.candidate_id,
                candidate_email: application.candidate_email.clone(),
                rank_at_time: application.rank.unwrap_or(0),
                confirmation_deadline: now + self.deps.settings.confirmation_deadline,
                no_show_risk: INITIAL_NO_SHOW_RISK,
            })
            .await
        {
            Ok(interview) => interview,
            // Lost a creation race: the other writer's interview is the one
            Err(crate::storage::StorageError::Conflict(_)) => {
                return match self
                    .deps
                    .storage
                    .get_interview_by_application(application.id)
                    .await?
                {
                    Some(existing) => Ok(Outcome::Done(existing)),
                    None => Err(EngineError::conflict("interview creation raced")),
                };
            }
            Err(err) => return Err(err.into()),
        };

        let accept_token = self
            .deps
            .tokens
            .generate(interview.id, TokenAction::Accept)
            .map_err(|e| EngineError::Transient(e))?;
        let reject_token = self
            .deps
            .tokens
            .generate(interview.id, TokenAction::Reject)
            .map_err(|e| EngineError::Transient(e))?;

        let invitation = EmailMessage {
            to: application.candidate_email.clone(),
            template: EmailTemplate::Invitation,
            data: json!({
                "candidate_name": application.candidate_name,
                "job_title": job.title,
                "accept_url": self.action_url(interview.id, TokenAction::Accept, &accept_token),
                "reject_url": self.action_url(interview.id, TokenAction::Reject, &reject_token),
                "respond_by": interview.confirmation_deadline,
            }),
        };
        self.queue_email(invitation, interview.id, Some(job.id)).await;

        self.deps
            .log
            .record(crate::domains::automation::NewLogEntry {
                job_id: Some(job.id),
                action_type: ActionType::InvitationSent,
                trigger_source: trigger,
                actor,
                details: json!({
                    "interview_id": interview.id.to_string(),
                    "application_id": application.id.to_string(),
                    "candidate_id": application.candidate_id.to_string(),
                    "rank": interview.rank_at_time,
                }),
            })
            .await;
        self.deps.metrics.record_automation_outcome(true);
        tracing::info!(
            interview_id = %interview.id,
            application_id = %application.id,
            "interview invitation sent"
        );
        Ok(Outcome::Done(interview))
    }

    /// Candidate accepts the invitation via their action link.
    pub async fn handle_accept(
        &self,
        interview_id: Uuid,
        token: &str,
    ) -> Result<Interview, EngineError> {
        self.deps
            .tokens
            .validate(interview_id, token, TokenAction::Accept)?;

        let interview = self.deps.storage.get_interview(interview_id).await?;
        if interview.status != InterviewStatus::InvitationSent {
            return Err(EngineError::conflict(format!(
                "interview is {}, invitation can no longer be accepted",
                interview.status
            )));
        }
        let now = Utc::now();
        if interview
            .confirmation_deadline
            .map_or(false, |deadline| now >= deadline)
        {
            return Err(EngineError::conflict("confirmation deadline has passed"));
        }

        let updated = self
            .deps
            .storage
            .transition_interview(
                interview_id,
                InterviewStatus::InvitationSent,
                InterviewUpdate {
                    status: Some(InterviewStatus::SlotPending),
                    slot_selection_deadline: Some(
                        now + self.deps.settings.slot_selection_deadline,
                    ),
                    ..Default::default()
                },
            )
            .await?;

        let email = EmailMessage {
            to: updated.candidate_email.clone(),
            template: EmailTemplate::SlotSelection,
            data: json!({
                "interview_id": updated.id.to_string(),
                "select_by": updated.slot_selection_deadline,
            }),
        };
        self.queue_email(email, updated.id, Some(updated.job_id)).await;

        self.deps
            .log
            .record_auto(
                ActionType::InvitationAccepted,
                Some(updated.job_id),
                json!({
                    "interview_id": updated.id.to_string(),
                    "candidate_id": updated.candidate_id.to_string(),
                }),
            )
            .await;
        Ok(updated)
    }

    /// Candidate declines; the vacancy is handed to the buffer.
    pub async fn handle_reject(
        &self,
        interview_id: Uuid,
        token: &str,
    ) -> Result<Interview, EngineError> {
        self.deps
            .tokens
            .validate(interview_id, token, TokenAction::Reject)?;

        let interview = self.deps.storage.get_interview(interview_id).await?;
        if interview.status != InterviewStatus::InvitationSent {
            return Err(EngineError::conflict(format!(
                "interview is {}, invitation can no longer be rejected",
                interview.status
            )));
        }

        let updated = self
            .deps
            .storage
            .close_interview_rejecting_application(
                interview_id,
                InterviewStatus::InvitationSent,
                InterviewStatus::Cancelled,
            )
            .await?;

        self.deps
            .log
            .record_auto(
                ActionType::InvitationRejected,
                Some(updated.job_id),
                json!({
                    "interview_id": updated.id.to_string(),
                    "candidate_id": updated.candidate_id.to_string(),
                    "vacated_rank": updated.rank_at_time,
                }),
            )
            .await;

        // Recovery is best-effort: a failed or empty promotion never fails
        // the rejection itself.
        self.promote_replacement(&updated).await;
        Ok(updated)
    }

    /// Recruiter free slots a candidate may choose from, business hours only.
    pub async fn available_slots(&self, interview_id: Uuid) -> Result<Vec<Slot>, EngineError> {
        let interview = self.deps.storage.get_interview(interview_id).await?;
        if interview.status != InterviewStatus::SlotPending {
            return Err(EngineError::conflict(format!(
                "interview is {}, slots are not open for selection",
                interview.status
            )));
        }

        let now = Utc::now();
        let free = self
            .deps
            .calendar
            .get_free_slots(
                interview.recruiter_id,
                now,
                now + Duration::days(SLOT_LOOKAHEAD_DAYS),
            )
            .await?;

        let mut slots = business_hours_only(free);
        slots.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
        slots.dedup();
        Ok(slots)
    }

    /// Candidate picks a slot. Stays in `slot_pending`; the explicit confirm
    /// step performs the calendar and email side effects.
    pub async fn select_slot(
        &self,
        interview_id: Uuid,
        slot: Slot,
    ) -> Result<Interview, EngineError> {
        let interview = self.deps.storage.get_interview(interview_id).await?;
        if interview.status != InterviewStatus::SlotPending {
            return Err(EngineError::conflict(format!(
                "interview is {}, a slot cannot be selected",
                interview.status
            )));
        }

        if !within_business_hours(&slot) {
            return Err(EngineError::validation(
                "slot must be on a weekday between 09:00 and 18:00",
            ));
        }

        // The chosen range must sit inside the recruiter's advertised free
        // time for that day.
        let day_start = slot
            .start
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| EngineError::validation("invalid slot start"))?
            .and_utc();
        let free = self
            .deps
            .calendar
            .get_free_slots(interview.recruiter_id, day_start, day_start + Duration::days(1))
            .await?;
        if !free.iter().any(|f| slot.within(f)) {
            return Err(EngineError::validation(
                "slot is not within the recruiter's free time",
            ));
        }

        let updated = self
            .deps
            .storage
            .transition_interview(
                interview_id,
                InterviewStatus::SlotPending,
                InterviewUpdate {
                    status: Some(InterviewStatus::SlotPending),
                    scheduled_time: Some(slot.start),
                    scheduled_end: Some(slot.end),
                    ..Default::default()
                },
            )
            .await?;

        self.deps
            .log
            .record_auto(
                ActionType::SlotSelected,
                Some(updated.job_id),
                json!({
                    "interview_id": updated.id.to_string(),
                    "start": slot.start,
                    "end": slot.end,
                }),
            )
            .await;

        // An open negotiation session is settled by the pick
        let negotiation = crate::domains::negotiation::NegotiationEngine::new(self.deps.clone());
        if let Err(err) = negotiation.resolve(updated.id).await {
            tracing::warn!(error = %err, "failed to resolve negotiation session");
        }
        Ok(updated)
    }

    /// Final confirmation: flips to `confirmed`, then runs the calendar,
    /// email, and risk side effects, each isolated and non-fatal.
    pub async fn confirm(&self, interview_id: Uuid) -> Result<Interview, EngineError> {
        let interview = self.deps.storage.get_interview(interview_id).await?;
        if interview.status != InterviewStatus::SlotPending {
            return Err(EngineError::conflict(format!(
                "interview is {}, it cannot be confirmed",
                interview.status
            )));
        }
        let scheduled_time = interview
            .scheduled_time
            .ok_or_else(|| EngineError::conflict("no slot selected yet"))?;
        let scheduled_end = interview
            .scheduled_end
            .unwrap_or(scheduled_time + Duration::minutes(DEFAULT_SLOT_MINUTES));

        let job = self.deps.storage.get_job(interview.job_id).await?;
        let updated = self
            .deps
            .storage
            .transition_interview(
                interview_id,
                InterviewStatus::SlotPending,
                InterviewUpdate::to_status(InterviewStatus::Confirmed),
            )
            .await?;

        // Calendar event
        if self
            .deps
            .flags
            .is_enabled(flag_names::CALENDAR_INTEGRATION, Some(&job))
            .await
        {
            let request = CalendarEventRequest {
                recruiter_id: updated.recruiter_id,
                candidate_id: updated.candidate_id,
                start: scheduled_time,
                end: scheduled_end,
                summary: format!("Interview: {}", job.title),
            };
            let calendar = self.deps.calendar.clone();
            let result = retry_with_backoff("calendar.create_event", || {
                let calendar = calendar.clone();
                let request = request.clone();
                async move { calendar.create_event(request).await }
            })
            .await;
            match result {
                Ok(event_ref) => {
                    self.deps.metrics.record_outbound_outcome("calendar", true);
                    if let Err(err) = self
                        .deps
                        .storage
                        .record_calendar_event(updated.id, &event_ref)
                        .await
                    {
                        tracing::warn!(error = %err, "failed to store calendar event ref");
                    }
                }
                Err(err) => {
                    self.deps.metrics.record_outbound_outcome("calendar", false);
                    self.deps
                        .log
                        .record_auto(
                            ActionType::CalendarFailed,
                            Some(updated.job_id),
                            json!({
                                "interview_id": updated.id.to_string(),
                                "error": err.to_string(),
                            }),
                        )
                        .await;
                }
            }
        }

        // Confirmation emails to both parties
        let data = json!({
            "interview_id": updated.id.to_string(),
            "job_title": job.title,
            "start": scheduled_time,
            "end": scheduled_end,
        });
        self.queue_email(
            EmailMessage {
                to: updated.candidate_email.clone(),
                template: EmailTemplate::Confirmation,
                data: data.clone(),
            },
            updated.id,
            Some(updated.job_id),
        )
        .await;
        self.queue_email(
            EmailMessage {
                to: format!("user:{}", updated.recruiter_id),
                template: EmailTemplate::Confirmation,
                data,
            },
            updated.id,
            Some(updated.job_id),
        )
        .await;

        // No-show risk
        if self
            .deps
            .flags
            .is_enabled(flag_names::NO_SHOW_PREDICTION, Some(&job))
            .await
        {
            match self
                .deps
                .risk
                .analyze(updated.id, updated.candidate_id)
                .await
            {
                Ok(assessment) => {
                    self.deps.metrics.record_outbound_outcome("risk", true);
                    if let Err(err) = self
                        .deps
                        .storage
                        .update_no_show_risk(updated.id, assessment.no_show_risk)
                        .await
                    {
                        tracing::warn!(error = %err, "failed to store no-show risk");
                    }
                }
                Err(err) => {
                    self.deps.metrics.record_outbound_outcome("risk", false);
                    tracing::warn!(
                        interview_id = %updated.id,
                        error = %err,
                        "risk refresh on confirm failed, next cycle will retry"
                    );
                }
            }
        }

        self.deps
            .log
            .record_auto(
                ActionType::SlotConfirmed,
                Some(updated.job_id),
                json!({
                    "interview_id": updated.id.to_string(),
                    "start": scheduled_time,
                }),
            )
            .await;

        // Re-read so the caller sees the event ref and refreshed risk
        Ok(self.deps.storage.get_interview(updated.id).await?)
    }

    /// Recruiter-initiated cancellation of any non-terminal interview.
    pub async fn cancel(
        &self,
        interview_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> Result<Interview, EngineError> {
        let interview = self.deps.storage.get_interview(interview_id).await?;
        if interview.status.is_terminal() {
            return Err(EngineError::conflict(format!(
                "interview is already {}",
                interview.status
            )));
        }

        let updated = self
            .deps
            .storage
            .close_interview_rejecting_application(
                interview_id,
                interview.status,
                InterviewStatus::Cancelled,
            )
            .await?;

        self.deps
            .log
            .record_manual(
                ActionType::InterviewCancelled,
                Some(updated.job_id),
                actor,
                json!({
                    "interview_id": updated.id.to_string(),
                    "reason": reason,
                    "previous_status": interview.status.as_str(),
                }),
            )
            .await;

        self.promote_replacement(&updated).await;
        Ok(updated)
    }

    /// Recruiter records the outcome of a confirmed interview after its
    /// scheduled time: attended or no-show.
    pub async fn mark_attendance(
        &self,
        interview_id: Uuid,
        attended: bool,
        actor: Uuid,
    ) -> Result<Interview, EngineError> {
        let interview = self.deps.storage.get_interview(interview_id).await?;
        if interview.status != InterviewStatus::Confirmed {
            return Err(EngineError::conflict(format!(
                "interview is {}, attendance cannot be recorded",
                interview.status
            )));
        }
        let scheduled_time = interview
            .scheduled_time
            .ok_or_else(|| EngineError::conflict("interview has no scheduled time"))?;
        if Utc::now() < scheduled_time {
            return Err(EngineError::validation(
                "interview has not taken place yet",
            ));
        }

        let terminal = if attended {
            InterviewStatus::Completed
        } else {
            InterviewStatus::NoShow
        };
        let updated = self
            .deps
            .storage
            .transition_interview(
                interview_id,
                InterviewStatus::Confirmed,
                InterviewUpdate::to_status(terminal),
            )
            .await?;

        self.deps
            .log
            .record_manual(
                ActionType::InterviewCompleted,
                Some(updated.job_id),
                actor,
                json!({
                    "interview_id": updated.id.to_string(),
                    "attended": attended,
                }),
            )
            .await;
        Ok(updated)
    }

    /// Shared recovery path: promote a buffer candidate into the vacated
    /// rank and invite them. All failures are swallowed after logging.
    async fn promote_replacement(&self, interview: &Interview) {
        if interview.rank_at_time < 1 {
            return;
        }
        let job = match self.deps.storage.get_job(interview.job_id).await {
            Ok(job) => job,
            Err(err) => {
                tracing::warn!(error = %err, "job lookup failed during promotion");
                return;
            }
        };
        let shortlisting = ShortlistingEngine::new(self.deps.clone());
        match shortlisting
            .promote_from_buffer(&job, interview.rank_at_time, self)
            .await
        {
            Ok(Outcome::Done(promoted)) => {
                tracing::info!(
                    job_id = %job.id,
                    promoted_application = %promoted.id,
                    rank = interview.rank_at_time,
                    "buffer candidate promoted into vacancy"
                );
            }
            Ok(Outcome::Skipped(reason)) => {
                tracing::info!(
                    job_id = %job.id,
                    reason = reason.as_str(),
                    "no buffer promotion performed"
                );
            }
            Err(err) => {
                tracing::warn!(job_id = %job.id, error = %err, "buffer promotion failed");
                self.deps.metrics.record_automation_outcome(false);
            }
        }
    }

    fn action_url(&self, interview_id: Uuid, action: TokenAction, token: &str) -> String {
        match &self.deps.settings.frontend_base_url {
            Some(base) => format!("{}/interview/{}/{}/{}", base, action, interview_id, token),
            None => format!("/api/v1/interview/{}/{}/{}", action, interview_id, token),
        }
    }

    /// Queue an email with retry; failures are logged (`email_failed`) and
    /// never propagate.
    async fn queue_email(&self, message: EmailMessage, interview_id: Uuid, job_id: Option<Uuid>) {
        let email = self.deps.email.clone();
        let result = retry_with_backoff("email.queue", || {
            let email = email.clone();
            let message = message.clone();
            async move { email.queue(message).await }
        })
        .await;
        match result {
            Ok(()) => self.deps.metrics.record_outbound_outcome("email", true),
            Err(err) => {
                self.deps.metrics.record_outbound_outcome("email", false);
                self.deps
                    .log
                    .record_auto(
                        ActionType::EmailFailed,
                        job_id,
                        json!({
                            "interview_id": interview_id.to_string(),
                            "template": message.template.as_str(),
                            "error": err.to_string(),
                        }),
                    )
                    .await;
            }
        }
    }
}

#[async_trait]
impl InviteSender for InterviewScheduler {
    async fn invite(
        &self,
        application: &Application,
    ) -> Result<Outcome<Interview>, EngineError> {
        self.send_invitation(application.id, TriggerSource::Auto, None)
            .await
    }
}
