use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A job posting owned by a recruiter.
///
/// `automation_enabled` is the job-level override consulted by the flag
/// resolver; `expired` is the terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub posted_by: Uuid,
    pub openings: i32,
    pub buffer_target: i32,
    pub applications_closed: bool,
    pub expired: bool,
    pub automation_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for job creation
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub posted_by: Uuid,
    pub openings: i32,
    pub buffer_target: i32,
}

impl NewJob {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.openings < 1 {
            return Err("openings must be at least 1".to_string());
        }
        if self.buffer_target < 0 {
            return Err("buffer_target must not be negative".to_string());
        }
        Ok(())
    }
}

/// Partial update applied by the job PUT endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub openings: Option<i32>,
    pub buffer_target: Option<i32>,
    pub applications_closed: Option<bool>,
    pub expired: Option<bool>,
    pub automation_enabled: Option<bool>,
}
