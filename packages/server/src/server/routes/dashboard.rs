use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use super::{ok, require_owner, require_user, ApiError, ApiResult};
use crate::common::PageArgs;
use crate::domains::applications::ShortlistStatus;
use crate::domains::automation::{ActionType, LogFilter};
use crate::domains::interviews::InterviewStatus;
use crate::domains::shortlisting::ShortlistingEngine;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::storage::Storage;

#[derive(Debug, Deserialize)]
pub struct CandidateFilters {
    pub status: Option<String>,
    pub min_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityLogQuery {
    pub action_type: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(rename = "endDate")]
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/v1/dashboard/candidates/:jobId
pub async fn candidates(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: Option<Extension<AuthUser>>,
    Query(filters): Query<CandidateFilters>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let job = state.deps.storage.get_job(job_id).await?;
    require_owner(&job, &user)?;

    let status = filters
        .status
        .as_deref()
        .map(ShortlistStatus::from_str)
        .transpose()
        .map_err(|msg| ApiError::new(axum::http::StatusCode::BAD_REQUEST, msg))?;

    let mut applications = state.deps.storage.list_applications(job_id, status).await?;
    if let Some(min_score) = filters.min_score {
        applications.retain(|a| a.fit_score.map_or(false, |score| score >= min_score));
    }

    Ok(ok(json!({
        "job_id": job_id,
        "candidates": applications,
    })))
}

/// GET /api/v1/dashboard/activity-log/:jobId
pub async fn activity_log(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: Option<Extension<AuthUser>>,
    Query(query): Query<ActivityLogQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let job = state.deps.storage.get_job(job_id).await?;
    require_owner(&job, &user)?;

    let action_type = query
        .action_type
        .as_deref()
        .map(ActionType::from_str)
        .transpose()
        .map_err(|msg| ApiError::new(axum::http::StatusCode::BAD_REQUEST, msg))?;
    let (limit, offset) = PageArgs {
        limit: query.limit,
        offset: query.offset,
    }
    .validated()?;

    let entries = state
        .deps
        .log
        .query(&LogFilter {
            job_id: Some(job_id),
            action_type,
            interview_id: None,
            candidate_id: None,
            from: query.start_date,
            to: query.end_date,
            limit,
            offset,
        })
        .await?;

    Ok(ok(json!({
        "job_id": job_id,
        "entries": entries,
        "limit": limit,
        "offset": offset,
    })))
}

/// GET /api/v1/dashboard/analytics/:jobId
pub async fn analytics(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: Option<Extension<AuthUser>>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = require_user(user)?;
    let job = state.deps.storage.get_job(job_id).await?;
    require_owner(&job, &user)?;

    let counts = state.deps.storage.partition_counts(job_id).await?;
    let applications = state.deps.storage.list_applications(job_id, None).await?;
    let interviews = state.deps.storage.list_interviews_by_job(job_id).await?;

    let scored: Vec<f64> = applications.iter().filter_map(|a| a.fit_score).collect();
    let average_fit_score = if scored.is_empty() {
        None
    } else {
        Some(scored.iter().sum::<f64>() / scored.len() as f64)
    };

    let mut interview_counts = serde_json::Map::new();
    for status in [
        InterviewStatus::InvitationSent,
        InterviewStatus::SlotPending,
        InterviewStatus::Confirmed,
        InterviewStatus::Completed,
        InterviewStatus::Cancelled,
        InterviewStatus::Expired,
        InterviewStatus::NoShow,
    ] {
        let count = interviews.iter().filter(|i| i.status == status).count();
        interview_counts.insert(status.as_str().to_string(), json!(count));
    }

    let average_no_show_risk = {
        let upcoming: Vec<f64> = interviews
            .iter()
            .filter(|i| i.status == InterviewStatus::Confirmed)
            .map(|i| i.no_show_risk)
            .collect();
        if upcoming.is_empty() {
            None
        } else {
            Some(upcoming.iter().sum::<f64>() / upcoming.len() as f64)
        }
    };

    let actions = state.deps.log.counts_by_action(Some(job_id)).await?;
    let triggers = state.deps.log.counts_by_trigger(Some(job_id)).await?;

    // Advisory: a promotion right now would land inside an imminent interview
    let can_promote = ShortlistingEngine::new(state.deps.clone())
        .can_promote(&job)
        .await?;

    Ok(ok(json!({
        "job_id": job_id,
        "partitions": counts,
        "total_applications": applications.len(),
        "average_fit_score": average_fit_score,
        "interviews": interview_counts,
        "average_no_show_risk": average_no_show_risk,
        "can_promote": can_promote,
        "actions": actions.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
        "triggers": triggers.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
    })))
}
