//! Interview scheduler: invitation, token-gated actions, slots, terminal
//! states.

mod common;

use chrono::{Duration, Utc, Weekday};
use common::*;
use hireflow_core::common::{EngineError, SkipReason};
use hireflow_core::domains::applications::ShortlistStatus;
use hireflow_core::domains::automation::{ActionType, FeatureFlag, TriggerSource};
use hireflow_core::domains::interviews::{
    ActionTokenService, InterviewScheduler, InterviewStatus, TokenAction,
};
use hireflow_core::domains::shortlisting::ShortlistingEngine;
use hireflow_core::kernel::test_dependencies::TestDependencies;
use hireflow_core::kernel::EmailTemplate;
use hireflow_core::storage::Storage;

/// Job with a full shortlist+buffer and invitations sent to the shortlist
async fn shortlisted_job(
    h: &TestDependencies,
    openings: i32,
    buffer: i32,
    scores: &[f64],
) -> hireflow_core::domains::jobs::Job {
    let job = closed_job(h, openings, buffer).await;
    scored_applications(h, &job, scores).await;
    let engine = ShortlistingEngine::new(h.deps.clone());
    let scheduler = InterviewScheduler::new(h.deps.clone());
    engine
        .shortlist_and_invite(&job, &scheduler)
        .await
        .unwrap()
        .into_done();
    job
}

fn token_service() -> ActionTokenService {
    // Same secret the test harness hands to ServerDeps
    ActionTokenService::new("test_signing_secret")
}

#[tokio::test]
async fn invitation_creates_interview_email_and_log() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;

    let interviews = h.storage.list_interviews_by_job(job.id).await.unwrap();
    assert_eq!(interviews.len(), 1);
    let interview = &interviews[0];
    assert_eq!(interview.status, InterviewStatus::InvitationSent);
    assert_eq!(interview.rank_at_time, 1);
    assert_eq!(interview.no_show_risk, 0.5);

    // 48h confirmation deadline
    let deadline = interview.confirmation_deadline.unwrap();
    let expected = Utc::now() + Duration::hours(48);
    assert!((deadline - expected).num_seconds().abs() < 10);

    let sent = h.email.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, EmailTemplate::Invitation);
    assert!(sent[0].data["accept_url"].as_str().unwrap().contains("accept"));

    let logs = h.storage.all_logs().await;
    assert!(logs
        .iter()
        .any(|l| l.action_type == ActionType::InvitationSent));
}

#[tokio::test]
async fn invitation_is_idempotent() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;
    let interview = &h.storage.list_interviews_by_job(job.id).await.unwrap()[0];

    let scheduler = InterviewScheduler::new(h.deps.clone());
    let second = scheduler
        .send_invitation(interview.application_id, TriggerSource::Manual, None)
        .await
        .unwrap()
        .into_done();
    assert_eq!(second.id, interview.id);

    // Still exactly one interview, one invitation email
    assert_eq!(
        h.storage.list_interviews_by_job(job.id).await.unwrap().len(),
        1
    );
    assert_eq!(h.email.sent_count(), 1);
}

#[tokio::test]
async fn invitation_skipped_when_automation_disabled() {
    let h = harness();
    let job = closed_job(&h, 1, 0).await;
    let application = scored_application(&h, &job, 90.0).await;
    h.storage
        .upsert_flag(&FeatureFlag {
            name: "global_automation".to_string(),
            enabled: false,
            description: String::new(),
        })
        .await
        .unwrap();

    let scheduler = InterviewScheduler::new(h.deps.clone());
    let outcome = scheduler
        .send_invitation(application.id, TriggerSource::Auto, None)
        .await
        .unwrap();
    assert_eq!(outcome.skip_reason(), Some(SkipReason::AutomationDisabled));

    // No interview row, no email
    assert!(h.storage.list_interviews_by_job(job.id).await.unwrap().is_empty());
    assert_eq!(h.email.sent_count(), 0);
}

#[tokio::test]
async fn accept_moves_to_slot_pending_and_replay_conflicts() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;
    let interview = h.storage.list_interviews_by_job(job.id).await.unwrap()[0].clone();

    let token = token_service()
        .generate(interview.id, TokenAction::Accept)
        .unwrap();
    let scheduler = InterviewScheduler::new(h.deps.clone());
    let accepted = scheduler.handle_accept(interview.id, &token).await.unwrap();

    assert_eq!(accepted.status, InterviewStatus::SlotPending);
    let deadline = accepted.slot_selection_deadline.unwrap();
    let expected = Utc::now() + Duration::hours(24);
    assert!((deadline - expected).num_seconds().abs() < 10);

    let logs = h.storage.all_logs().await;
    assert!(logs
        .iter()
        .any(|l| l.action_type == ActionType::InvitationAccepted));

    // Replay of the same token: state precondition gone
    let replay = scheduler.handle_accept(interview.id, &token).await;
    assert!(matches!(replay, Err(EngineError::Conflict(_))));
}

#[tokio::test]
async fn accept_with_reject_token_is_invalid() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;
    let interview = h.storage.list_interviews_by_job(job.id).await.unwrap()[0].clone();

    let token = token_service()
        .generate(interview.id, TokenAction::Reject)
        .unwrap();
    let scheduler = InterviewScheduler::new(h.deps.clone());
    let result = scheduler.handle_accept(interview.id, &token).await;
    assert!(matches!(result, Err(EngineError::InvalidToken)));
}

#[tokio::test]
async fn accept_after_deadline_conflicts() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;
    let interview = h.storage.list_interviews_by_job(job.id).await.unwrap()[0].clone();
    patch_interview(&h, &interview, |i| {
        i.confirmation_deadline = Some(Utc::now() - Duration::hours(1));
    })
    .await;

    let token = token_service()
        .generate(interview.id, TokenAction::Accept)
        .unwrap();
    let scheduler = InterviewScheduler::new(h.deps.clone());
    let result = scheduler.handle_accept(interview.id, &token).await;
    assert!(matches!(result, Err(EngineError::Conflict(_))));
}

#[tokio::test]
async fn reject_cancels_and_promotes_buffer() {
    let h = harness();
    // openings=3 buffer=3 over ten applications, as in the shortlist scenario
    let job = shortlisted_job(
        &h,
        3,
        3,
        &[90.0, 85.0, 80.0, 75.0, 70.0, 65.0, 60.0, 55.0, 50.0, 45.0],
    )
    .await;

    // Rank-2 candidate (85.0) rejects
    let interviews = h.storage.list_interviews_by_job(job.id).await.unwrap();
    let rank2 = interviews.iter().find(|i| i.rank_at_time == 2).unwrap();
    let token = token_service()
        .generate(rank2.id, TokenAction::Reject)
        .unwrap();

    let scheduler = InterviewScheduler::new(h.deps.clone());
    let rejected = scheduler.handle_reject(rank2.id, &token).await.unwrap();
    assert_eq!(rejected.status, InterviewStatus::Cancelled);

    let application = h.storage.get_application(rank2.application_id).await.unwrap();
    assert_eq!(application.shortlist_status, ShortlistStatus::Rejected);

    // Buffer head (75.0, was rank 4) is shortlisted at rank 2
    let applications = h.storage.list_applications(job.id, None).await.unwrap();
    let promoted = applications
        .iter()
        .find(|a| a.fit_score == Some(75.0))
        .unwrap();
    assert_eq!(promoted.shortlist_status, ShortlistStatus::Shortlisted);
    assert_eq!(promoted.rank, Some(2));

    // Buffer refilled from pending: 60.0 joins the buffer
    let buffer = h
        .storage
        .list_applications(job.id, Some(ShortlistStatus::Buffer))
        .await
        .unwrap();
    assert_eq!(buffer.len(), 3);
    assert!(buffer.iter().any(|a| a.fit_score == Some(60.0)));
    assert_rank_contiguity(&h, &job).await;

    // Promoted candidate got an invitation
    let promoted_interview = h
        .storage
        .get_interview_by_application(promoted.id)
        .await
        .unwrap()
        .expect("promoted candidate must be invited");
    assert_eq!(promoted_interview.status, InterviewStatus::InvitationSent);

    let logs = h.storage.all_logs().await;
    assert!(logs
        .iter()
        .any(|l| l.action_type == ActionType::InvitationRejected));
    assert!(logs
        .iter()
        .any(|l| l.action_type == ActionType::BufferPromotion));
}

#[tokio::test]
async fn select_slot_requires_business_hours_and_free_time() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;
    let interview = h.storage.list_interviews_by_job(job.id).await.unwrap()[0].clone();

    let token = token_service()
        .generate(interview.id, TokenAction::Accept)
        .unwrap();
    let scheduler = InterviewScheduler::new(h.deps.clone());
    scheduler.handle_accept(interview.id, &token).await.unwrap();

    let monday = next_weekday(Weekday::Mon);
    h.calendar
        .set_free_slots(vec![hour_slot(monday, 10), hour_slot(monday, 14)]);

    // Outside the advertised free time
    let result = scheduler
        .select_slot(interview.id, hour_slot(monday, 12))
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));

    // Saturday is never selectable
    let saturday = next_weekday(Weekday::Sat);
    let result = scheduler
        .select_slot(interview.id, hour_slot(saturday, 10))
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));

    // A free, in-hours slot works and does not advance the status
    let selected = scheduler
        .select_slot(interview.id, hour_slot(monday, 10))
        .await
        .unwrap();
    assert_eq!(selected.status, InterviewStatus::SlotPending);
    assert_eq!(selected.scheduled_time, Some(monday + Duration::hours(10)));
}

#[tokio::test]
async fn confirm_runs_side_effects_and_survives_their_failure() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;
    let interview = h.storage.list_interviews_by_job(job.id).await.unwrap()[0].clone();

    let token = token_service()
        .generate(interview.id, TokenAction::Accept)
        .unwrap();
    let scheduler = InterviewScheduler::new(h.deps.clone());
    scheduler.handle_accept(interview.id, &token).await.unwrap();

    // Confirming before a slot is picked is a conflict
    let premature = scheduler.confirm(interview.id).await;
    assert!(matches!(premature, Err(EngineError::Conflict(_))));

    let monday = next_weekday(Weekday::Mon);
    h.calendar.set_free_slots(vec![hour_slot(monday, 10)]);
    scheduler
        .select_slot(interview.id, hour_slot(monday, 10))
        .await
        .unwrap();

    h.risk.set_risk(0.15);
    let confirmed = scheduler.confirm(interview.id).await.unwrap();
    assert_eq!(confirmed.status, InterviewStatus::Confirmed);
    assert!(confirmed.calendar_event_ref.is_some());
    assert!((confirmed.no_show_risk - 0.15).abs() < f64::EPSILON);
    assert_eq!(h.calendar.created_count(), 1);

    // Confirmation emails to both parties
    let confirmations: Vec<_> = h
        .email
        .sent
        .lock()
        .iter()
        .filter(|m| m.template == EmailTemplate::Confirmation)
        .cloned()
        .collect();
    assert_eq!(confirmations.len(), 2);

    let logs = h.storage.all_logs().await;
    assert!(logs
        .iter()
        .any(|l| l.action_type == ActionType::SlotConfirmed));
}

// Paused clock: the calendar retry backoff elapses instantly
#[tokio::test(start_paused = true)]
async fn confirm_commits_even_when_calendar_is_down() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;
    let interview = h.storage.list_interviews_by_job(job.id).await.unwrap()[0].clone();

    let token = token_service()
        .generate(interview.id, TokenAction::Accept)
        .unwrap();
    let scheduler = InterviewScheduler::new(h.deps.clone());
    scheduler.handle_accept(interview.id, &token).await.unwrap();

    let monday = next_weekday(Weekday::Mon);
    h.calendar.set_free_slots(vec![hour_slot(monday, 10)]);
    scheduler
        .select_slot(interview.id, hour_slot(monday, 10))
        .await
        .unwrap();

    h.calendar.set_fail(true);
    let confirmed = scheduler.confirm(interview.id).await.unwrap();
    assert_eq!(confirmed.status, InterviewStatus::Confirmed);
    assert!(confirmed.calendar_event_ref.is_none());

    let logs = h.storage.all_logs().await;
    assert!(logs
        .iter()
        .any(|l| l.action_type == ActionType::CalendarFailed));
}

#[tokio::test]
async fn confirm_skips_gated_side_effects_when_flags_disabled() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 0, &[90.0]).await;
    let interview = h.storage.list_interviews_by_job(job.id).await.unwrap()[0].clone();

    let token = token_service()
        .generate(interview.id, TokenAction::Accept)
        .unwrap();
    let scheduler = InterviewScheduler::new(h.deps.clone());
    scheduler.handle_accept(interview.id, &token).await.unwrap();

    let monday = next_weekday(Weekday::Mon);
    h.calendar.set_free_slots(vec![hour_slot(monday, 10)]);
    scheduler
        .select_slot(interview.id, hour_slot(monday, 10))
        .await
        .unwrap();

    for name in ["calendar_integration", "no_show_prediction"] {
        h.storage
            .upsert_flag(&FeatureFlag {
                name: name.to_string(),
                enabled: false,
                description: String::new(),
            })
            .await
            .unwrap();
    }
    h.risk.set_risk(0.05);

    // The transition commits; the gated side effects are skipped, not failed
    let confirmed = scheduler.confirm(interview.id).await.unwrap();
    assert_eq!(confirmed.status, InterviewStatus::Confirmed);
    assert!(confirmed.calendar_event_ref.is_none());
    assert_eq!(h.calendar.created_count(), 0);
    assert_eq!(confirmed.no_show_risk, 0.5, "initial risk untouched");

    let logs = h.storage.all_logs().await;
    assert!(!logs
        .iter()
        .any(|l| l.action_type == ActionType::CalendarFailed));

    // Confirmation emails are never flag-gated
    let confirmations = h
        .email
        .sent
        .lock()
        .iter()
        .filter(|m| m.template == EmailTemplate::Confirmation)
        .count();
    assert_eq!(confirmations, 2);
}

#[tokio::test]
async fn cancel_is_terminal_and_promotes() {
    let h = harness();
    let job = shortlisted_job(&h, 1, 1, &[90.0, 80.0]).await;
    let interview = h.storage.list_interviews_by_job(job.id).await.unwrap()[0].clone();

    let recruiter = job.posted_by;
    let scheduler = InterviewScheduler::new(h.deps.clone());
    let cancelled = scheduler
        .cancel(interview.id, "position re-scoped", recruiter)
        .await
        .unwrap();
    assert_eq!(cancelled.status, InterviewStatus::Cancelled);

    // Terminal states never transition again
    let again = scheduler.cancel(interview.id, "twice", recruiter).await;
    assert!(matches!(again, Err(EngineError::Conflict(_))));

    // Buffer candidate (80.0) took the vacated rank 1
    let applications = h.storage.list_applications(job.id, None).await.unwrap();
    let promoted = applications
        .iter()
        .find(|a| a.fit_score == Some(80.0))
        .unwrap();
    assert_eq!(promoted.shortlist_status, ShortlistStatus::Shortlisted);
    assert_eq!(promoted.rank, Some(1));
}

#[tokio::test]
async fn attendance_marks_completed_or_no_show() {
    let h = harness();
    let job = closed_job(&h, 1, 0).await;
    let past = Utc::now() - Duration::hours(2);
    let interview = confirmed_interview(&h, &job, past).await;

    let scheduler = InterviewScheduler::new(h.deps.clone());
    let done = scheduler
        .mark_attendance(interview.id, false, job.posted_by)
        .await
        .unwrap();
    assert_eq!(done.status, InterviewStatus::NoShow);

    // Already terminal
    let again = scheduler
        .mark_attendance(interview.id, true, job.posted_by)
        .await;
    assert!(matches!(again, Err(EngineError::Conflict(_))));
}

#[tokio::test]
async fn attendance_rejected_before_scheduled_time() {
    let h = harness();
    let job = closed_job(&h, 1, 0).await;
    let future = Utc::now() + Duration::hours(5);
    let interview = confirmed_interview(&h, &job, future).await;

    let scheduler = InterviewScheduler::new(h.deps.clone());
    let result = scheduler
        .mark_attendance(interview.id, true, job.posted_by)
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

// Paused clock: the email retry backoff elapses instantly
#[tokio::test(start_paused = true)]
async fn email_failure_does_not_block_invitation() {
    let h = harness();
    let job = closed_job(&h, 1, 0).await;
    let application = scored_application(&h, &job, 90.0).await;
    h.storage
        .assign_partitions(job.id, &[(application.id, 1)], &[])
        .await
        .unwrap();

    h.email.set_fail(true);
    let scheduler = InterviewScheduler::new(h.deps.clone());
    let outcome = scheduler
        .send_invitation(application.id, TriggerSource::Auto, None)
        .await
        .unwrap();
    let interview = outcome.into_done();
    assert_eq!(interview.status, InterviewStatus::InvitationSent);

    let logs = h.storage.all_logs().await;
    assert!(logs.iter().any(|l| l.action_type == ActionType::EmailFailed));
}
