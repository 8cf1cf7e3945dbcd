// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. The engines hold
// them as trait objects so the test suites can drive the whole pipeline with
// fakes (see test_dependencies.rs).
//
// Naming convention: Base* for trait names (e.g., BaseEmailService)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::common::EngineError;
use crate::domains::interviews::Slot;
use crate::domains::negotiation::Availability;

// =============================================================================
// Email Service Trait
// =============================================================================

/// Template names recognized by the external email transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    Invitation,
    SlotSelection,
    Confirmation,
    Reminder,
    Promotion,
    Escalation,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::SlotSelection => "slot_selection",
            Self::Confirmation => "confirmation",
            Self::Reminder => "reminder",
            Self::Promotion => "promotion",
            Self::Escalation => "escalation",
        }
    }
}

impl fmt::Display for EmailTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound email handed to the transport's queue.
///
/// `to` is either a literal address or a `user:{uuid}` reference the
/// transport resolves against its own directory (recruiters are known to the
/// platform only by id).
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub template: EmailTemplate,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait BaseEmailService: Send + Sync {
    /// Queue a message with the external transport. Queueing is the
    /// transport's acknowledgement, not delivery.
    async fn queue(&self, message: EmailMessage) -> Result<(), EngineError>;
}

// =============================================================================
// Calendar Provider Trait
// =============================================================================

/// Request to create a calendar event for a confirmed interview
#[derive(Debug, Clone, Serialize)]
pub struct CalendarEventRequest {
    pub recruiter_id: Uuid,
    pub candidate_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: String,
}

#[async_trait]
pub trait BaseCalendarProvider: Send + Sync {
    /// The recruiter's free slots inside `[from, to]`, unfiltered (business
    /// hours are the caller's policy, not the provider's)
    async fn get_free_slots(
        &self,
        recruiter_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, EngineError>;

    /// Create an event; returns the provider's event reference
    async fn create_event(&self, request: CalendarEventRequest) -> Result<String, EngineError>;
}

// =============================================================================
// Risk Service Trait
// =============================================================================

/// No-show risk assessment from the external model service
#[derive(Debug, Clone, Deserialize)]
pub struct RiskAssessment {
    pub no_show_risk: f64,
    pub risk_level: String,
}

#[async_trait]
pub trait BaseRiskService: Send + Sync {
    async fn analyze(
        &self,
        interview_id: Uuid,
        candidate_id: Uuid,
    ) -> Result<RiskAssessment, EngineError>;
}

// =============================================================================
// Scoring Service Trait
// =============================================================================

/// Fit assessment produced by the external resume scorer
#[derive(Debug, Clone, Deserialize)]
pub struct FitAssessment {
    pub fit_score: f64,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub features: HashMap<String, serde_json::Value>,
}

#[async_trait]
pub trait BaseScoringService: Send + Sync {
    async fn process_resume(
        &self,
        application_id: Uuid,
        resume_url: Option<&str>,
        job_description: &str,
    ) -> Result<FitAssessment, EngineError>;
}

// =============================================================================
// LLM Trait (negotiation parsing and replies)
// =============================================================================

/// What kind of reply `generate_response` should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    SlotSuggestions,
    AskAlternatives,
}

/// Opportunistic LLM capabilities. Implementations return `Ok(None)` when the
/// model declines or produces unusable output; the engines always have a
/// deterministic fallback, so this trait is never on the correctness path.
#[async_trait]
pub trait BaseLlmService: Send + Sync {
    async fn extract_availability(&self, text: &str)
        -> Result<Option<Availability>, EngineError>;

    async fn generate_response(
        &self,
        kind: ResponseKind,
        context: serde_json::Value,
    ) -> Result<Option<String>, EngineError>;
}
