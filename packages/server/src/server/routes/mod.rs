//! HTTP route handlers.
//!
//! Handlers stay thin: authn comes from the middleware's `AuthUser`
//! extension, authz is a `posted_by` comparison, and everything else is a
//! single engine call whose outcome is mapped onto the wire format:
//! `{"success": true, "data": ...}` or `{"success": false, "message", "code"}`.

pub mod applications;
pub mod dashboard;
pub mod health;
pub mod interviews;
pub mod jobs;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::common::{EngineError, SkipReason};
use crate::domains::jobs::Job;
use crate::server::middleware::AuthUser;

/// Error as it leaves the API: `{success: false, message, code}`
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "not your job posting")
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::InvalidToken => StatusCode::UNAUTHORIZED,
            EngineError::Transient(_) | EngineError::External(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // Internal detail stays in the logs, not the response body
        let message = match &err {
            EngineError::Transient(inner) => {
                tracing::error!(error = %inner, "internal error surfaced to API");
                "internal error".to_string()
            }
            EngineError::External(inner) => {
                tracing::error!(error = %inner, "external collaborator error surfaced to API");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(err: crate::storage::StorageError) -> Self {
        ApiError::from(EngineError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
            "code": self.status.as_u16(),
        }));
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Standard success envelope
pub fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Success envelope for a skipped automation outcome
pub fn skipped(reason: SkipReason) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "data": { "ok": false, "reason": reason.as_str() },
    }))
}

/// 401 unless the middleware authenticated the caller
pub fn require_user(user: Option<Extension<AuthUser>>) -> ApiResult<AuthUser> {
    user.map(|Extension(user)| user)
        .ok_or_else(ApiError::unauthorized)
}

/// 403 unless the caller posted the job
pub fn require_owner(job: &Job, user: &AuthUser) -> ApiResult<()> {
    if job.posted_by == user.user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}
