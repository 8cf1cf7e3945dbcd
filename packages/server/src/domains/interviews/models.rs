use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Interview lifecycle states.
///
/// ```text
/// (create) ──▶ invitation_sent ──accept──▶ slot_pending ──confirm──▶ confirmed
///                    │  │                      │                        │
///                 reject └─deadline─▶ expired ◀┘ deadline     cancel/attendance
///                    ▼                                                  ▼
///                cancelled                              completed | no_show | cancelled
/// ```
///
/// Terminal states are never left again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    InvitationSent,
    SlotPending,
    Confirmed,
    Completed,
    Cancelled,
    Expired,
    NoShow,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvitationSent => "invitation_sent",
            Self::SlotPending => "slot_pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::NoShow => "no_show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Expired | Self::NoShow
        )
    }
}

impl FromStr for InterviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invitation_sent" => Ok(Self::InvitationSent),
            "slot_pending" => Ok(Self::SlotPending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            "no_show" => Ok(Self::NoShow),
            other => Err(format!("unknown interview status: {}", other)),
        }
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An interview for one application. At most one exists per application.
#[derive(Debug, Clone, Serialize)]
pub struct Interview {
    pub id: Uuid,
    pub application_id: Uuid,
    pub job_id: Uuid,
    pub recruiter_id: Uuid,
    pub candidate_id: Uuid,
    pub candidate_email: String,
    /// Shortlist rank held when the invitation went out; a later vacancy at
    /// this rank is what buffer promotion fills.
    pub rank_at_time: i32,
    pub status: InterviewStatus,
    pub confirmation_deadline: Option<DateTime<Utc>>,
    pub slot_selection_deadline: Option<DateTime<Utc>>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub no_show_risk: f64,
    pub calendar_event_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for interview creation (status starts at `invitation_sent`)
#[derive(Debug, Clone)]
pub struct NewInterview {
    pub application_id: Uuid,
    pub job_id: Uuid,
    pub recruiter_id: Uuid,
    pub candidate_id: Uuid,
    pub candidate_email: String,
    pub rank_at_time: i32,
    pub confirmation_deadline: DateTime<Utc>,
    pub no_show_risk: f64,
}

/// Fields written by a status transition. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct InterviewUpdate {
    pub status: Option<InterviewStatus>,
    pub slot_selection_deadline: Option<DateTime<Utc>>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub no_show_risk: Option<f64>,
    pub calendar_event_ref: Option<String>,
}

impl InterviewUpdate {
    pub fn to_status(status: InterviewStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}
