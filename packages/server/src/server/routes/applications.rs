use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::{ok, ApiError, ApiResult};
use crate::domains::applications::{process_application_scoring, NewApplication};
use crate::server::app::AppState;
use crate::storage::Storage;

/// POST /api/v1/application
///
/// Accepts the submission, then scores it asynchronously; the response does
/// not wait for the scoring service.
pub async fn submit_application(
    State(state): State<AppState>,
    Json(new_application): Json<NewApplication>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    new_application
        .validate()
        .map_err(|msg| ApiError::new(StatusCode::BAD_REQUEST, msg))?;

    let job = state.deps.storage.get_job(new_application.job_id).await?;
    if job.applications_closed || job.expired {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "applications for this job are closed",
        ));
    }

    let application = state
        .deps
        .storage
        .insert_application(new_application)
        .await?;

    let deps = state.deps.clone();
    let spawned_application = application.clone();
    tokio::spawn(async move {
        process_application_scoring(deps, spawned_application, job).await;
    });

    Ok((StatusCode::CREATED, ok(application)))
}
