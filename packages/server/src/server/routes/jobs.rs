use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{ok, require_owner, require_user, ApiError, ApiResult};
use crate::common::Outcome;
use crate::domains::interviews::InterviewScheduler;
use crate::domains::jobs::{JobUpdate, NewJob};
use crate::domains::shortlisting::ShortlistingEngine;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::storage::Storage;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub openings: i32,
    pub buffer_target: Option<i32>,
}

/// GET /api/v1/job
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let jobs = state.deps.storage.list_open_jobs().await?;
    Ok(ok(jobs))
}

/// POST /api/v1/job
pub async fn create_job(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let new_job = NewJob {
        title: request.title,
        description: request.description,
        posted_by: user.user_id,
        openings: request.openings,
        buffer_target: request
            .buffer_target
            .unwrap_or(state.deps.settings.default_buffer_target),
    };
    new_job
        .validate()
        .map_err(|msg| ApiError::new(axum::http::StatusCode::BAD_REQUEST, msg))?;

    let job = state.deps.storage.insert_job(new_job).await?;
    Ok(ok(job))
}

/// GET /api/v1/job/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let job = state.deps.storage.get_job(id).await?;
    Ok(ok(job))
}

/// PUT /api/v1/job/:id
///
/// Closing applications is the shortlisting trigger: the moment
/// `applications_closed` flips to true, the job is auto-shortlisted and the
/// shortlisted candidates invited.
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: Option<Extension<AuthUser>>,
    Json(update): Json<JobUpdate>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let existing = state.deps.storage.get_job(id).await?;
    require_owner(&existing, &user)?;

    let newly_closed = update.applications_closed == Some(true) && !existing.applications_closed;
    let job = state.deps.storage.update_job(id, update).await?;

    if newly_closed {
        let shortlisting = ShortlistingEngine::new(state.deps.clone());
        let scheduler = InterviewScheduler::new(state.deps.clone());
        match shortlisting.shortlist_and_invite(&job, &scheduler).await? {
            Outcome::Done(summary) => {
                return Ok(ok(json!({ "job": job, "shortlist": summary })));
            }
            Outcome::Skipped(reason) => {
                return Ok(ok(json!({ "job": job, "shortlist_skipped": reason.as_str() })));
            }
        }
    }
    Ok(ok(job))
}

/// DELETE /api/v1/job/:id
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: Option<Extension<AuthUser>>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let job = state.deps.storage.get_job(id).await?;
    require_owner(&job, &user)?;

    state.deps.storage.delete_job(id).await?;
    Ok(ok(json!({ "deleted": id })))
}
