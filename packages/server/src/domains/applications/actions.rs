//! Application scoring flow.
//!
//! Submission inserts the row and hands off to the external scoring service
//! asynchronously. Whatever happens, the application ends up `ai_processed`
//! so shortlisting never waits on a wedged scorer: failures score as 0 and
//! leave a `scoring_failed` entry.

use serde_json::json;
use std::sync::Arc;

use crate::domains::applications::Application;
use crate::domains::automation::ActionType;
use crate::domains::jobs::Job;
use crate::kernel::{retry_with_backoff, ServerDeps};
use crate::storage::Storage;

/// Run the scoring service for a freshly submitted application and record
/// the outcome. Called from a spawned task; never returns an error.
pub async fn process_application_scoring(
    deps: Arc<ServerDeps>,
    application: Application,
    job: Job,
) {
    let scoring = deps.scoring.clone();
    let resume_url = application.resume_url.clone();
    let result = retry_with_backoff("scoring.process_resume", || {
        let scoring = scoring.clone();
        let resume_url = resume_url.clone();
        let description = job.description.clone();
        async move {
            scoring
                .process_resume(application.id, resume_url.as_deref(), &description)
                .await
        }
    })
    .await;

    match result {
        Ok(assessment) => {
            deps.metrics.record_outbound_outcome("scoring", true);
            if let Err(err) = deps
                .storage
                .record_fit_score(application.id, assessment.fit_score, assessment.summary)
                .await
            {
                tracing::error!(
                    application_id = %application.id,
                    error = %err,
                    "failed to persist fit score"
                );
            } else {
                tracing::info!(
                    application_id = %application.id,
                    fit_score = assessment.fit_score,
                    "application scored"
                );
            }
        }
        Err(err) => {
            deps.metrics.record_outbound_outcome("scoring", false);
            // Score as zero so the application is processed, not stuck
            if let Err(write_err) = deps
                .storage
                .record_fit_score(application.id, 0.0, None)
                .await
            {
                tracing::error!(
                    application_id = %application.id,
                    error = %write_err,
                    "failed to persist fallback fit score"
                );
            }
            deps.log
                .record_auto(
                    ActionType::ScoringFailed,
                    Some(job.id),
                    json!({
                        "application_id": application.id.to_string(),
                        "candidate_id": application.candidate_id.to_string(),
                        "error": err.to_string(),
                    }),
                )
                .await;
        }
    }
}
