//! Shortlisting engine: partitioning, buffer maintenance, promotion.

mod common;

use chrono::{Duration, Utc};
use common::*;
use hireflow_core::common::SkipReason;
use hireflow_core::domains::applications::ShortlistStatus;
use hireflow_core::domains::automation::{ActionType, FeatureFlag};
use hireflow_core::domains::interviews::{Interview, InterviewScheduler, InterviewStatus};
use hireflow_core::domains::shortlisting::ShortlistingEngine;
use hireflow_core::storage::Storage;
use uuid::Uuid;

#[tokio::test]
async fn auto_shortlist_partitions_by_fit_score() {
    let h = harness();
    let job = closed_job(&h, 3, 3).await;
    let scores = [90.0, 85.0, 80.0, 75.0, 70.0, 65.0, 60.0, 55.0, 50.0, 45.0];
    scored_applications(&h, &job, &scores).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    let summary = engine.auto_shortlist(&job).await.unwrap().into_done();
    assert_eq!(summary.shortlisted, 3);
    assert_eq!(summary.buffer, 3);

    let applications = h.storage.list_applications(job.id, None).await.unwrap();
    let by_score = |score: f64| {
        applications
            .iter()
            .find(|a| a.fit_score == Some(score))
            .unwrap()
    };

    for (score, rank) in [(90.0, 1), (85.0, 2), (80.0, 3)] {
        let app = by_score(score);
        assert_eq!(app.shortlist_status, ShortlistStatus::Shortlisted);
        assert_eq!(app.rank, Some(rank));
    }
    for (score, rank) in [(75.0, 4), (70.0, 5), (65.0, 6)] {
        let app = by_score(score);
        assert_eq!(app.shortlist_status, ShortlistStatus::Buffer);
        assert_eq!(app.rank, Some(rank));
    }
    for score in [60.0, 55.0, 50.0, 45.0] {
        let app = by_score(score);
        assert_eq!(app.shortlist_status, ShortlistStatus::Pending);
        assert_eq!(app.rank, None);
    }
    assert_rank_contiguity(&h, &job).await;
}

#[tokio::test]
async fn auto_shortlist_is_idempotent() {
    let h = harness();
    let job = closed_job(&h, 2, 2).await;
    scored_applications(&h, &job, &[90.0, 80.0, 70.0, 60.0, 50.0]).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    engine.auto_shortlist(&job).await.unwrap().into_done();
    let before = h.storage.list_applications(job.id, None).await.unwrap();

    let second = engine.auto_shortlist(&job).await.unwrap().into_done();
    assert_eq!(second.shortlisted, 0);
    assert_eq!(second.buffer, 0);

    let after = h.storage.list_applications(job.id, None).await.unwrap();
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.rank, b.rank);
        assert_eq!(a.shortlist_status, b.shortlist_status);
    }
}

#[tokio::test]
async fn auto_shortlist_skips_manual_override() {
    let h = harness();
    let job = closed_job(&h, 2, 1).await;
    let applications = scored_applications(&h, &job, &[95.0, 90.0, 85.0]).await;

    // Pin the top scorer
    let mut pinned = applications[0].clone();
    pinned.manual_override = true;
    h.storage.put_application(pinned.clone()).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    engine.auto_shortlist(&job).await.unwrap().into_done();

    let pinned = h.storage.get_application(pinned.id).await.unwrap();
    assert_eq!(pinned.shortlist_status, ShortlistStatus::Pending);
    assert_eq!(pinned.rank, None);

    // The two unpinned candidates fill the shortlist instead
    let shortlisted = h
        .storage
        .list_applications(job.id, Some(ShortlistStatus::Shortlisted))
        .await
        .unwrap();
    assert_eq!(shortlisted.len(), 2);
    assert!(shortlisted.iter().all(|a| a.id != pinned.id));
}

#[tokio::test]
async fn auto_shortlist_respects_flag() {
    let h = harness();
    let job = closed_job(&h, 2, 2).await;
    scored_applications(&h, &job, &[90.0, 80.0]).await;
    h.storage
        .upsert_flag(&FeatureFlag {
            name: "auto_shortlisting".to_string(),
            enabled: false,
            description: String::new(),
        })
        .await
        .unwrap();

    let engine = ShortlistingEngine::new(h.deps.clone());
    let outcome = engine.auto_shortlist(&job).await.unwrap();
    assert_eq!(outcome.skip_reason(), Some(SkipReason::AutomationDisabled));

    let counts = h.storage.partition_counts(job.id).await.unwrap();
    assert_eq!(counts.shortlisted, 0);
    assert_eq!(counts.pending, 2);
}

#[tokio::test]
async fn promote_on_empty_buffer_mutates_nothing() {
    let h = harness();
    let job = closed_job(&h, 1, 0).await;
    scored_applications(&h, &job, &[90.0]).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    engine.auto_shortlist(&job).await.unwrap().into_done();
    let before = h.storage.list_applications(job.id, None).await.unwrap();

    let scheduler = InterviewScheduler::new(h.deps.clone());
    let outcome = engine
        .promote_from_buffer(&job, 1, &scheduler)
        .await
        .unwrap();
    assert_eq!(outcome.skip_reason(), Some(SkipReason::EmptyBuffer));

    let after = h.storage.list_applications(job.id, None).await.unwrap();
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.rank, b.rank);
        assert_eq!(a.shortlist_status, b.shortlist_status);
    }
}

#[tokio::test]
async fn promotion_compacts_buffer_ranks() {
    let h = harness();
    let job = closed_job(&h, 3, 3).await;
    scored_applications(&h, &job, &[90.0, 85.0, 80.0, 75.0, 70.0, 65.0]).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    engine.auto_shortlist(&job).await.unwrap().into_done();

    // Vacate rank 2 by hand, then promote into it
    let applications = h.storage.list_applications(job.id, None).await.unwrap();
    let mut vacated = applications
        .iter()
        .find(|a| a.rank == Some(2))
        .unwrap()
        .clone();
    vacated.shortlist_status = ShortlistStatus::Rejected;
    vacated.rank = None;
    h.storage.put_application(vacated).await;

    let scheduler = InterviewScheduler::new(h.deps.clone());
    let promoted = engine
        .promote_from_buffer(&job, 2, &scheduler)
        .await
        .unwrap()
        .into_done();

    // Best buffer candidate (75.0, previously rank 4) takes the vacancy
    assert_eq!(promoted.fit_score, Some(75.0));
    assert_eq!(promoted.rank, Some(2));
    assert_eq!(promoted.shortlist_status, ShortlistStatus::Shortlisted);
    assert_rank_contiguity(&h, &job).await;
}

#[tokio::test]
async fn backfill_is_idempotent_at_target() {
    let h = harness();
    let job = closed_job(&h, 1, 2).await;
    scored_applications(&h, &job, &[90.0, 80.0, 70.0, 60.0]).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    engine.auto_shortlist(&job).await.unwrap().into_done();

    let first = engine.backfill_buffer(&job).await.unwrap().into_done();
    assert_eq!(first, 0, "buffer already at target after shortlisting");

    let counts = h.storage.partition_counts(job.id).await.unwrap();
    assert_eq!(counts.buffer, 2);
}

#[tokio::test]
async fn backfill_tops_up_from_pending_by_score() {
    let h = harness();
    let job = closed_job(&h, 1, 2).await;
    scored_applications(&h, &job, &[90.0, 80.0]).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    engine.auto_shortlist(&job).await.unwrap().into_done();
    let counts = h.storage.partition_counts(job.id).await.unwrap();
    assert_eq!(counts.buffer, 1, "only one candidate left for the buffer");

    // A late, higher-scoring pending arrives; it joins the buffer only
    scored_application(&h, &job, 99.0).await;
    let added = engine.backfill_buffer(&job).await.unwrap().into_done();
    assert_eq!(added, 1);

    let late = h
        .storage
        .list_applications(job.id, Some(ShortlistStatus::Buffer))
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.fit_score == Some(99.0))
        .unwrap();
    assert_eq!(late.shortlist_status, ShortlistStatus::Buffer);

    // The existing shortlist is untouched
    let shortlisted = h
        .storage
        .list_applications(job.id, Some(ShortlistStatus::Shortlisted))
        .await
        .unwrap();
    assert_eq!(shortlisted[0].fit_score, Some(90.0));
    assert_rank_contiguity(&h, &job).await;

    let logs = h.storage.all_logs().await;
    assert!(logs
        .iter()
        .any(|l| l.action_type == ActionType::BufferBackfill));
}

#[tokio::test]
async fn promotion_proceeds_during_imminent_interview() {
    let h = harness();
    let job = closed_job(&h, 2, 1).await;
    scored_applications(&h, &job, &[90.0, 85.0, 80.0]).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    engine.auto_shortlist(&job).await.unwrap().into_done();

    // The rank-1 candidate already has a confirmed interview two hours out
    let applications = h.storage.list_applications(job.id, None).await.unwrap();
    let rank1 = applications
        .iter()
        .find(|a| a.rank == Some(1))
        .unwrap()
        .clone();
    let now = Utc::now();
    h.storage
        .put_interview(Interview {
            id: Uuid::new_v4(),
            application_id: rank1.id,
            job_id: job.id,
            recruiter_id: job.posted_by,
            candidate_id: rank1.candidate_id,
            candidate_email: rank1.candidate_email.clone(),
            rank_at_time: 1,
            status: InterviewStatus::Confirmed,
            confirmation_deadline: None,
            slot_selection_deadline: None,
            scheduled_time: Some(now + Duration::hours(2)),
            scheduled_end: Some(now + Duration::hours(3)),
            no_show_risk: 0.3,
            calendar_event_ref: None,
            created_at: now,
            updated_at: now,
        })
        .await;

    // The advisory flips, but a vacancy at rank 2 is still filled
    assert!(!engine.can_promote(&job).await.unwrap());

    let mut vacated = applications
        .iter()
        .find(|a| a.rank == Some(2))
        .unwrap()
        .clone();
    vacated.shortlist_status = ShortlistStatus::Rejected;
    vacated.rank = None;
    h.storage.put_application(vacated).await;

    let scheduler = InterviewScheduler::new(h.deps.clone());
    let promoted = engine
        .promote_from_buffer(&job, 2, &scheduler)
        .await
        .unwrap()
        .into_done();
    assert_eq!(promoted.fit_score, Some(80.0));
    assert_eq!(promoted.rank, Some(2));
    assert_rank_contiguity(&h, &job).await;
}

#[tokio::test]
async fn can_promote_tracks_the_24h_lookahead() {
    let h = harness();
    let job = closed_job(&h, 1, 0).await;
    let engine = ShortlistingEngine::new(h.deps.clone());

    assert!(engine.can_promote(&job).await.unwrap());

    // A confirmed interview beyond the lookahead leaves it true
    confirmed_interview(&h, &job, Utc::now() + Duration::hours(30)).await;
    assert!(engine.can_promote(&job).await.unwrap());

    // One inside the window flips it
    confirmed_interview(&h, &job, Utc::now() + Duration::hours(2)).await;
    assert!(!engine.can_promote(&job).await.unwrap());
}

#[tokio::test]
async fn shortlist_ties_break_by_application_id() {
    let h = harness();
    let job = closed_job(&h, 1, 0).await;
    let applications = scored_applications(&h, &job, &[88.0, 88.0, 88.0]).await;

    let engine = ShortlistingEngine::new(h.deps.clone());
    engine.auto_shortlist(&job).await.unwrap().into_done();

    let winner_id = applications.iter().map(|a| a.id).min().unwrap();
    let shortlisted = h
        .storage
        .list_applications(job.id, Some(ShortlistStatus::Shortlisted))
        .await
        .unwrap();
    assert_eq!(shortlisted.len(), 1);
    assert_eq!(shortlisted[0].id, winner_id);
}
