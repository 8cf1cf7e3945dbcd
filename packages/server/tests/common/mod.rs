// Each suite pulls the subset of fixtures it needs
#![allow(dead_code)]

//! Shared fixtures for the engine test suites.
//!
//! Everything runs over `InMemoryStorage` and the kernel fakes; no network,
//! no database. Helpers build the common shapes: a closed job, a batch of
//! scored applications, an interview at a given lifecycle stage.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use uuid::Uuid;

use hireflow_core::domains::applications::{Application, NewApplication, ShortlistStatus};
use hireflow_core::domains::interviews::{Interview, InterviewStatus, Slot};
use hireflow_core::domains::jobs::{Job, JobUpdate, NewJob};
use hireflow_core::kernel::test_dependencies::TestDependencies;
use hireflow_core::storage::Storage;

pub fn harness() -> TestDependencies {
    TestDependencies::new()
}

/// A job with applications already closed (the state the engines act on)
pub async fn closed_job(h: &TestDependencies, openings: i32, buffer_target: i32) -> Job {
    let job = h
        .storage
        .insert_job(NewJob {
            title: "Backend Engineer".to_string(),
            description: "Rust, Postgres, async".to_string(),
            posted_by: Uuid::new_v4(),
            openings,
            buffer_target,
        })
        .await
        .unwrap();
    h.storage
        .update_job(
            job.id,
            JobUpdate {
                applications_closed: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

/// Insert an application and score it
pub async fn scored_application(h: &TestDependencies, job: &Job, fit_score: f64) -> Application {
    let application = h
        .storage
        .insert_application(NewApplication {
            job_id: job.id,
            candidate_id: Uuid::new_v4(),
            candidate_name: format!("Candidate {:.0}", fit_score),
            candidate_email: format!("candidate{:.0}@example.com", fit_score),
            resume_url: None,
        })
        .await
        .unwrap();
    h.storage
        .record_fit_score(application.id, fit_score, None)
        .await
        .unwrap();
    h.storage.get_application(application.id).await.unwrap()
}

/// Insert a batch of scored applications, one per score
pub async fn scored_applications(
    h: &TestDependencies,
    job: &Job,
    scores: &[f64],
) -> Vec<Application> {
    let mut applications = Vec::new();
    for score in scores {
        applications.push(scored_application(h, job, *score).await);
    }
    applications
}

/// Overwrite an interview fixture field-by-field
pub async fn patch_interview<F>(h: &TestDependencies, interview: &Interview, patch: F) -> Interview
where
    F: FnOnce(&mut Interview),
{
    let mut updated = interview.clone();
    patch(&mut updated);
    h.storage.put_interview(updated.clone()).await;
    updated
}

/// A confirmed interview crafted directly (for sweep tests), together with
/// its shortlisted application.
pub async fn confirmed_interview(
    h: &TestDependencies,
    job: &Job,
    scheduled_time: DateTime<Utc>,
) -> Interview {
    let application = scored_application(h, job, 80.0).await;
    h.storage
        .assign_partitions(job.id, &[(application.id, 1)], &[])
        .await
        .unwrap();
    let now = Utc::now();
    let interview = Interview {
        id: Uuid::new_v4(),
        application_id: application.id,
        job_id: job.id,
        recruiter_id: job.posted_by,
        candidate_id: application.candidate_id,
        candidate_email: application.candidate_email.clone(),
        rank_at_time: 1,
        status: InterviewStatus::Confirmed,
        confirmation_deadline: Some(now - Duration::hours(1)),
        slot_selection_deadline: Some(now - Duration::minutes(30)),
        scheduled_time: Some(scheduled_time),
        scheduled_end: Some(scheduled_time + Duration::hours(1)),
        no_show_risk: 0.5,
        calendar_event_ref: None,
        created_at: now,
        updated_at: now,
    };
    h.storage.put_interview(interview.clone()).await;
    interview
}

/// The next occurrence of `weekday` strictly after today (UTC)
pub fn next_weekday(weekday: Weekday) -> DateTime<Utc> {
    let today = Utc::now().date_naive();
    let mut days_ahead =
        (weekday.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
    if days_ahead == 0 {
        days_ahead = 7;
    }
    (today + Duration::days(days_ahead))
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// A one-hour slot on the given day at `hour`
pub fn hour_slot(day_start: DateTime<Utc>, hour: u32) -> Slot {
    Slot::new(
        day_start + Duration::hours(hour as i64),
        day_start + Duration::hours(hour as i64 + 1),
    )
}

/// Assert that shortlisted + buffer ranks form a contiguous 1..=n prefix
/// with no duplicates (the central ranking invariant).
pub async fn assert_rank_contiguity(h: &TestDependencies, job: &Job) {
    let applications = h.storage.list_applications(job.id, None).await.unwrap();
    let mut ranks: Vec<i32> = applications
        .iter()
        .filter(|a| {
            matches!(
                a.shortlist_status,
                ShortlistStatus::Shortlisted | ShortlistStatus::Buffer
            )
        })
        .map(|a| a.rank.expect("ranked partition member without rank"))
        .collect();
    ranks.sort_unstable();
    let expected: Vec<i32> = (1..=ranks.len() as i32).collect();
    assert_eq!(ranks, expected, "ranks must be a contiguous 1..n prefix");
}
