use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Feature flag record. A missing record reads as enabled (fail-open).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub enabled: bool,
    pub description: String,
}

/// Flag names the resolver recognizes
pub mod flag_names {
    pub const GLOBAL_AUTOMATION: &str = "global_automation";
    pub const AUTO_SHORTLISTING: &str = "auto_shortlisting";
    pub const AUTO_PROMOTION: &str = "auto_promotion";
    pub const NEGOTIATION_BOT: &str = "negotiation_bot";
    pub const GEMINI_PARSING: &str = "gemini_parsing";
    pub const GEMINI_RESPONSES: &str = "gemini_responses";
    pub const CALENDAR_INTEGRATION: &str = "calendar_integration";
    pub const NO_SHOW_PREDICTION: &str = "no_show_prediction";

    /// Flags that additionally honor the job-level automation override
    pub const JOB_SCOPED: [&str; 3] = [AUTO_SHORTLISTING, AUTO_PROMOTION, GLOBAL_AUTOMATION];
}

/// What kind of state change an automation log entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    AutoShortlist,
    InvitationSent,
    InvitationAccepted,
    InvitationRejected,
    InvitationExpired,
    SlotSelected,
    SlotConfirmed,
    SlotSelectionExpired,
    InterviewCancelled,
    InterviewCompleted,
    BufferPromotion,
    BufferBackfill,
    InterviewReminderSent,
    RiskScoreUpdated,
    NegotiationRound,
    NegotiationEscalated,
    BackgroundCycle,
    AdminAlert,
    ScoringFailed,
    EmailFailed,
    CalendarFailed,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoShortlist => "auto_shortlist",
            Self::InvitationSent => "invitation_sent",
            Self::InvitationAccepted => "invitation_accepted",
            Self::InvitationRejected => "invitation_rejected",
            Self::InvitationExpired => "invitation_expired",
            Self::SlotSelected => "slot_selected",
            Self::SlotConfirmed => "slot_confirmed",
            Self::SlotSelectionExpired => "slot_selection_expired",
            Self::InterviewCancelled => "interview_cancelled",
            Self::InterviewCompleted => "interview_completed",
            Self::BufferPromotion => "buffer_promotion",
            Self::BufferBackfill => "buffer_backfill",
            Self::InterviewReminderSent => "interview_reminder_sent",
            Self::RiskScoreUpdated => "risk_score_updated",
            Self::NegotiationRound => "negotiation_round",
            Self::NegotiationEscalated => "negotiation_escalated",
            Self::BackgroundCycle => "background_cycle",
            Self::AdminAlert => "admin_alert",
            Self::ScoringFailed => "scoring_failed",
            Self::EmailFailed => "email_failed",
            Self::CalendarFailed => "calendar_failed",
        }
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "auto_shortlist" => Self::AutoShortlist,
            "invitation_sent" => Self::InvitationSent,
            "invitation_accepted" => Self::InvitationAccepted,
            "invitation_rejected" => Self::InvitationRejected,
            "invitation_expired" => Self::InvitationExpired,
            "slot_selected" => Self::SlotSelected,
            "slot_confirmed" => Self::SlotConfirmed,
            "slot_selection_expired" => Self::SlotSelectionExpired,
            "interview_cancelled" => Self::InterviewCancelled,
            "interview_completed" => Self::InterviewCompleted,
            "buffer_promotion" => Self::BufferPromotion,
            "buffer_backfill" => Self::BufferBackfill,
            "interview_reminder_sent" => Self::InterviewReminderSent,
            "risk_score_updated" => Self::RiskScoreUpdated,
            "negotiation_round" => Self::NegotiationRound,
            "negotiation_escalated" => Self::NegotiationEscalated,
            "background_cycle" => Self::BackgroundCycle,
            "admin_alert" => Self::AdminAlert,
            "scoring_failed" => Self::ScoringFailed,
            "email_failed" => Self::EmailFailed,
            "calendar_failed" => Self::CalendarFailed,
            other => return Err(format!("unknown action type: {}", other)),
        };
        Ok(action)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What initiated the logged action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Auto,
    Manual,
    Scheduled,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(format!("unknown trigger source: {}", other)),
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable automation event record
#[derive(Debug, Clone, Serialize)]
pub struct AutomationLog {
    pub id: Uuid,
    pub job_id: Option<Uuid>,
    pub action_type: ActionType,
    pub trigger_source: TriggerSource,
    pub actor: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending a log entry
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub job_id: Option<Uuid>,
    pub action_type: ActionType,
    pub trigger_source: TriggerSource,
    pub actor: Option<Uuid>,
    pub details: serde_json::Value,
}

/// Query filter for the activity log.
///
/// Results are always ordered `(created_at desc, id desc)`.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub job_id: Option<Uuid>,
    pub action_type: Option<ActionType>,
    pub interview_id: Option<Uuid>,
    pub candidate_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl LogFilter {
    pub fn for_job(job_id: Uuid) -> Self {
        Self {
            job_id: Some(job_id),
            limit: 50,
            ..Default::default()
        }
    }
}
