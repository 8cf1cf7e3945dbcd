//! Bounded-round slot negotiation.
//!
//! A candidate whose availability does not line up with the offered slots
//! talks to the bot instead. Each round parses their constraints (LLM when
//! enabled, rule-based otherwise), intersects them with the recruiter's free
//! time, and either suggests up to three slots or asks for alternatives.
//! After `max_rounds` exchanges with no intersection the session escalates
//! to the recruiter.
//!
//! The matcher is pure and deterministic; the LLM only ever rephrases what
//! the engine already decided.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::common::{EngineError, Outcome, SkipReason};
use crate::domains::automation::models::flag_names;
use crate::domains::automation::ActionType;
use crate::domains::interviews::models::InterviewStatus;
use crate::domains::interviews::slots::{business_hours_only, Slot};
use crate::domains::negotiation::models::{
    Availability, HistoryActor, NegotiationSession, NegotiationState,
};
use crate::domains::negotiation::parser::parse_availability;
use crate::kernel::{EmailMessage, EmailTemplate, ResponseKind, ServerDeps};
use crate::storage::Storage;

const MAX_SUGGESTIONS: usize = 3;

/// Outcome of one negotiation exchange
#[derive(Debug, Clone)]
pub struct NegotiationReply {
    pub session: NegotiationSession,
    pub suggestions: Vec<Slot>,
    pub message: String,
    pub escalated: bool,
}

pub struct NegotiationEngine {
    deps: Arc<ServerDeps>,
}

impl NegotiationEngine {
    pub fn new(deps: Arc<ServerDeps>) -> Self {
        Self { deps }
    }

    /// Process one candidate message for the interview's negotiation session.
    pub async fn negotiate(
        &self,
        interview_id: Uuid,
        message: &str,
    ) -> Result<Outcome<NegotiationReply>, EngineError> {
        let interview = self.deps.storage.get_interview(interview_id).await?;
        if interview.status != InterviewStatus::SlotPending {
            return Err(EngineError::conflict(format!(
                "interview is {}, negotiation is closed",
                interview.status
            )));
        }
        let job = self.deps.storage.get_job(interview.job_id).await?;

        if !self
            .deps
            .flags
            .is_enabled(flag_names::NEGOTIATION_BOT, Some(&job))
            .await
        {
            return Ok(Outcome::Skipped(SkipReason::AutomationDisabled));
        }

        let now = Utc::now();
        let mut session = match self
            .deps
            .storage
            .get_negotiation_by_interview(interview_id)
            .await?
        {
            Some(session) => session,
            None => NegotiationSession::new(interview_id, now),
        };
        if session.state != NegotiationState::Active {
            return Err(EngineError::conflict(format!(
                "negotiation session is already {}",
                session.state
            )));
        }

        // A further candidate message is the next round; the count is capped
        // by max_rounds, never reset.
        let is_followup = session
            .history
            .iter()
            .any(|e| e.actor == HistoryActor::Candidate);
        if is_followup {
            session.round = (session.round + 1).min(session.max_rounds);
        }
        session.push_entry(HistoryActor::Candidate, message, now);

        let availability = self.extract_availability(&job, message, now).await;
        let free = self
            .deps
            .calendar
            .get_free_slots(
                interview.recruiter_id,
                availability.start_date.max(now),
                availability.end_date,
            )
            .await?;
        let matches = match_slots(&availability, &free);

        let reply = if !matches.is_empty() {
            let suggestions: Vec<Slot> =
                matches.into_iter().take(MAX_SUGGESTIONS).collect();
            let text = self
                .render_reply(
                    &job,
                    ResponseKind::SlotSuggestions,
                    json!({
                        "job_title": job.title,
                        "suggestions": suggestions,
                    }),
                    || suggestion_text(&suggestions),
                )
                .await;
            session.push_entry(HistoryActor::Bot, text.clone(), now);
            self.deps.storage.upsert_negotiation(&session).await?;
            self.deps
                .log
                .record_auto(
                    ActionType::NegotiationRound,
                    Some(job.id),
                    json!({
                        "interview_id": interview_id.to_string(),
                        "round": session.round,
                        "suggestions": suggestions.len(),
                    }),
                )
                .await;
            NegotiationReply {
                session,
                suggestions,
                message: text,
                escalated: false,
            }
        } else if session.round < session.max_rounds {
            let text = self
                .render_reply(
                    &job,
                    ResponseKind::AskAlternatives,
                    json!({
                        "job_title": job.title,
                        "round": session.round,
                    }),
                    || {
                        "None of the recruiter's open slots match those times. \
                         Could you share a few other days or times that work for you?"
                            .to_string()
                    },
                )
                .await;
            session.push_entry(HistoryActor::Bot, text.clone(), now);
            self.deps.storage.upsert_negotiation(&session).await?;
            self.deps
                .log
                .record_auto(
                    ActionType::NegotiationRound,
                    Some(job.id),
                    json!({
                        "interview_id": interview_id.to_string(),
                        "round": session.round,
                        "suggestions": 0,
                    }),
                )
                .await;
            NegotiationReply {
                session,
                suggestions: Vec::new(),
                message: text,
                escalated: false,
            }
        } else {
            session.state = NegotiationState::Escalated;
            let text = "We couldn't find a matching time. The recruiter has been \
                        notified and will reach out to schedule directly."
                .to_string();
            session.push_entry(HistoryActor::Bot, text.clone(), now);
            self.deps.storage.upsert_negotiation(&session).await?;

            let escalation = EmailMessage {
                to: format!("user:{}", interview.recruiter_id),
                template: EmailTemplate::Escalation,
                data: json!({
                    "interview_id": interview_id.to_string(),
                    "candidate_id": interview.candidate_id.to_string(),
                    "rounds": session.round,
                    "last_message": message,
                }),
            };
            if let Err(err) = self.deps.email.queue(escalation).await {
                tracing::warn!(error = %err, "escalation email failed");
                self.deps.metrics.record_outbound_outcome("email", false);
            } else {
                self.deps.metrics.record_outbound_outcome("email", true);
            }

            self.deps
                .log
                .record_auto(
                    ActionType::NegotiationEscalated,
                    Some(job.id),
                    json!({
                        "interview_id": interview_id.to_string(),
                        "rounds": session.round,
                    }),
                )
                .await;
            NegotiationReply {
                session,
                suggestions: Vec::new(),
                message: text,
                escalated: true,
            }
        };

        Ok(Outcome::Done(reply))
    }

    /// Close the session as resolved once a slot has been picked.
    pub async fn resolve(&self, interview_id: Uuid) -> Result<(), EngineError> {
        if let Some(mut session) = self
            .deps
            .storage
            .get_negotiation_by_interview(interview_id)
            .await?
        {
            if session.state == NegotiationState::Active {
                session.state = NegotiationState::Resolved;
                session.updated_at = Utc::now();
                self.deps.storage.upsert_negotiation(&session).await?;
            }
        }
        Ok(())
    }

    /// LLM extraction when enabled, rule-based parse otherwise or on any
    /// LLM failure.
    async fn extract_availability(
        &self,
        job: &crate::domains::jobs::Job,
        message: &str,
        now: DateTime<Utc>,
    ) -> Availability {
        let llm_enabled = self
            .deps
            .flags
            .is_enabled(flag_names::GEMINI_PARSING, Some(job))
            .await;
        if llm_enabled {
            if let Some(llm) = &self.deps.llm {
                match llm.extract_availability(message).await {
                    Ok(Some(availability)) => return availability,
                    Ok(None) => {
                        tracing::debug!("llm returned no availability, using rule-based parser");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "llm extraction failed, using rule-based parser");
                        self.deps.metrics.record_outbound_outcome("llm", false);
                    }
                }
            }
        }
        parse_availability(message, now)
    }

    /// LLM phrasing when enabled; the deterministic template otherwise.
    async fn render_reply<F>(
        &self,
        job: &crate::domains::jobs::Job,
        kind: ResponseKind,
        context: serde_json::Value,
        fallback: F,
    ) -> String
    where
        F: FnOnce() -> String,
    {
        let llm_enabled = self
            .deps
            .flags
            .is_enabled(flag_names::GEMINI_RESPONSES, Some(job))
            .await;
        if llm_enabled {
            if let Some(llm) = &self.deps.llm {
                match llm.generate_response(kind, context).await {
                    Ok(Some(text)) if !text.trim().is_empty() => return text,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "llm response generation failed, using template");
                        self.deps.metrics.record_outbound_outcome("llm", false);
                    }
                }
            }
        }
        fallback()
    }
}

/// Intersect candidate constraints with the recruiter's free slots.
///
/// Deterministic: output is business-hours slots that satisfy every given
/// constraint, deduplicated, ordered by start then end. Always a subset of
/// the input slots.
pub fn match_slots(availability: &Availability, free: &[Slot]) -> Vec<Slot> {
    let mut matches: Vec<Slot> = business_hours_only(free.to_vec())
        .into_iter()
        .filter(|slot| {
            slot.start >= availability.start_date
                && slot.start <= availability.end_date
                && availability.day_allowed(slot.start.weekday())
                && availability.hour_allowed(slot.start.hour())
        })
        .collect();
    matches.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    matches.dedup();
    matches
}

fn suggestion_text(suggestions: &[Slot]) -> String {
    let lines: Vec<String> = suggestions
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            format!(
                "  {}. {} - {}",
                i + 1,
                slot.start.format("%A %B %e, %H:%M"),
                slot.end.format("%H:%M")
            )
        })
        .collect();
    format!(
        "Here are the closest matching times:\n{}\nReply with a pick, or suggest other times.",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::negotiation::models::HourRange;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn slot(d: u32, hour: u32) -> Slot {
        Slot::new(
            Utc.with_ymd_and_hms(2026, 8, d, hour, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 8, d, hour + 1, 0, 0).unwrap(),
        )
    }

    fn availability(days: &[&str], hours: Option<(u32, u32)>) -> Availability {
        Availability {
            start_date: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2026, 8, 31, 0, 0, 0).unwrap(),
            preferred_days: if days.is_empty() {
                None
            } else {
                Some(days.iter().map(|d| d.to_string()).collect::<BTreeSet<_>>())
            },
            preferred_hours: hours.map(|(start_hour, end_hour)| HourRange {
                start_hour,
                end_hour,
            }),
        }
    }

    #[test]
    fn matching_honors_every_constraint() {
        // 2026-08-03 Monday, 08-04 Tuesday, 08-05 Wednesday
        let free = vec![
            slot(3, 10),
            slot(3, 14),
            slot(4, 15),
            slot(5, 14),
            slot(4, 9),
        ];
        let constraints = availability(&["monday", "tuesday"], Some((14, 17)));
        let matches = match_slots(&constraints, &free);
        assert_eq!(matches, vec![slot(3, 14), slot(4, 15)]);
    }

    #[test]
    fn matching_is_idempotent_and_a_subset() {
        let free = vec![slot(3, 10), slot(4, 11), slot(5, 12)];
        let constraints = availability(&[], None);
        let first = match_slots(&constraints, &free);
        let second = match_slots(&constraints, &free);
        assert_eq!(first, second);
        assert!(first.iter().all(|s| free.contains(s)));
    }

    #[test]
    fn matching_drops_weekends_and_duplicates() {
        // 2026-08-01 is a Saturday
        let free = vec![slot(1, 10), slot(3, 10), slot(3, 10)];
        let constraints = availability(&[], None);
        let matches = match_slots(&constraints, &free);
        assert_eq!(matches, vec![slot(3, 10)]);
    }

    #[test]
    fn no_matches_outside_window() {
        let free = vec![slot(3, 10)];
        let mut constraints = availability(&[], None);
        constraints.start_date = Utc.with_ymd_and_hms(2026, 8, 10, 0, 0, 0).unwrap();
        assert!(match_slots(&constraints, &free).is_empty());
    }
}
