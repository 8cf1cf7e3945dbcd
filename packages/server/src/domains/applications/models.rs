use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Shortlisting partition of an application within its job.
///
/// Within a job, shortlisted and buffer applications each carry a unique rank
/// and the combined ranks form a contiguous prefix 1..n.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortlistStatus {
    Pending,
    Shortlisted,
    Buffer,
    Rejected,
}

impl ShortlistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shortlisted => "shortlisted",
            Self::Buffer => "buffer",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for ShortlistStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "shortlisted" => Ok(Self::Shortlisted),
            "buffer" => Ok(Self::Buffer),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown shortlist status: {}", other)),
        }
    }
}

impl fmt::Display for ShortlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate's application to a job.
///
/// `fit_score` stays unset until the scoring service has run; `rank` is set
/// only while the application sits in the shortlisted or buffer partition.
/// `manual_override` pins the application against any automated reclassification.
#[derive(Debug, Clone, Serialize)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub candidate_email: String,
    pub resume_url: Option<String>,
    pub fit_score: Option<f64>,
    pub fit_summary: Option<String>,
    pub rank: Option<i32>,
    pub shortlist_status: ShortlistStatus,
    pub ai_processed: bool,
    pub manual_override: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for application submission
#[derive(Debug, Clone, Deserialize)]
pub struct NewApplication {
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub candidate_email: String,
    pub resume_url: Option<String>,
}

impl NewApplication {
    pub fn validate(&self) -> Result<(), String> {
        if self.candidate_name.trim().is_empty() {
            return Err("candidate_name must not be empty".to_string());
        }
        if !self.candidate_email.contains('@') {
            return Err("candidate_email must be a valid address".to_string());
        }
        Ok(())
    }
}

/// Counts per shortlisting partition for a job
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PartitionCounts {
    pub pending: i64,
    pub shortlisted: i64,
    pub buffer: i64,
    pub rejected: i64,
}
