use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{ok, require_owner, require_user, skipped, ApiError, ApiResult};
use crate::common::Outcome;
use crate::domains::automation::TriggerSource;
use crate::domains::interviews::{InterviewScheduler, Slot};
use crate::domains::negotiation::NegotiationEngine;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::storage::Storage;

#[derive(Debug, Deserialize)]
pub struct SelectSlotRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NegotiateRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub attended: bool,
}

/// POST /api/v1/interview/invite/:applicationId
///
/// Manual invitation by the recruiter; the same path the engines use
/// internally when automation fires.
pub async fn invite(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    user: Option<Extension<AuthUser>>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let application = state.deps.storage.get_application(application_id).await?;
    let job = state.deps.storage.get_job(application.job_id).await?;
    require_owner(&job, &user)?;

    let scheduler = InterviewScheduler::new(state.deps.clone());
    match scheduler
        .send_invitation(application_id, TriggerSource::Manual, Some(user.user_id))
        .await?
    {
        Outcome::Done(interview) => Ok(ok(interview)),
        Outcome::Skipped(reason) => Ok(skipped(reason)),
    }
}

/// GET /api/v1/interview/accept/:interviewId/:token
///
/// Candidate landing link. Redirects to the frontend when one is configured.
pub async fn accept(
    State(state): State<AppState>,
    Path((interview_id, token)): Path<(Uuid, String)>,
) -> ApiResult<Response> {
    let scheduler = InterviewScheduler::new(state.deps.clone());
    let interview = scheduler.handle_accept(interview_id, &token).await?;

    Ok(match &state.deps.settings.frontend_base_url {
        Some(base) => {
            Redirect::to(&format!("{}/interview/accepted/{}", base, interview.id)).into_response()
        }
        None => ok(interview).into_response(),
    })
}

/// GET /api/v1/interview/reject/:interviewId/:token
pub async fn reject(
    State(state): State<AppState>,
    Path((interview_id, token)): Path<(Uuid, String)>,
) -> ApiResult<Response> {
    let scheduler = InterviewScheduler::new(state.deps.clone());
    let interview = scheduler.handle_reject(interview_id, &token).await?;

    Ok(match &state.deps.settings.frontend_base_url {
        Some(base) => {
            Redirect::to(&format!("{}/interview/rejected/{}", base, interview.id)).into_response()
        }
        None => ok(interview).into_response(),
    })
}

/// GET /api/v1/interview/available-slots/:interviewId
pub async fn available_slots(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let scheduler = InterviewScheduler::new(state.deps.clone());
    let slots = scheduler.available_slots(interview_id).await?;
    Ok(ok(slots))
}

/// POST /api/v1/interview/select-slot/:interviewId
pub async fn select_slot(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
    Json(request): Json<SelectSlotRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let scheduler = InterviewScheduler::new(state.deps.clone());
    let interview = scheduler
        .select_slot(interview_id, Slot::new(request.start, request.end))
        .await?;
    Ok(ok(interview))
}

/// POST /api/v1/interview/confirm/:interviewId
pub async fn confirm(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let scheduler = InterviewScheduler::new(state.deps.clone());
    let interview = scheduler.confirm(interview_id).await?;
    Ok(ok(interview))
}

/// POST /api/v1/interview/cancel/:interviewId
pub async fn cancel(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
    user: Option<Extension<AuthUser>>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let interview = state.deps.storage.get_interview(interview_id).await?;
    let job = state.deps.storage.get_job(interview.job_id).await?;
    require_owner(&job, &user)?;

    let reason = body
        .get("reason")
        .and_then(|r| r.as_str())
        .unwrap_or("recruiter cancelled");
    let scheduler = InterviewScheduler::new(state.deps.clone());
    let interview = scheduler.cancel(interview_id, reason, user.user_id).await?;
    Ok(ok(interview))
}

/// POST /api/v1/interview/negotiate/:interviewId
pub async fn negotiate(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
    Json(request): Json<NegotiateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if request.message.trim().is_empty() {
        return Err(ApiError::new(
            axum::http::StatusCode::BAD_REQUEST,
            "message must not be empty",
        ));
    }

    let engine = NegotiationEngine::new(state.deps.clone());
    match engine.negotiate(interview_id, &request.message).await? {
        Outcome::Done(reply) => Ok(ok(json!({
            "message": reply.message,
            "suggestions": reply.suggestions,
            "round": reply.session.round,
            "state": reply.session.state,
            "escalated": reply.escalated,
        }))),
        Outcome::Skipped(reason) => Ok(skipped(reason)),
    }
}

/// POST /api/v1/interview/attendance/:interviewId
///
/// Recruiter records attended / no-show after the scheduled time.
pub async fn attendance(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
    user: Option<Extension<AuthUser>>,
    Json(request): Json<AttendanceRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let interview = state.deps.storage.get_interview(interview_id).await?;
    let job = state.deps.storage.get_job(interview.job_id).await?;
    require_owner(&job, &user)?;

    let scheduler = InterviewScheduler::new(state.deps.clone());
    let interview = scheduler
        .mark_attendance(interview_id, request.attended, user.user_id)
        .await?;
    Ok(ok(interview))
}
