//! Fake collaborators for tests.
//!
//! Each fake records what it was asked to do and can be flipped into a
//! failing mode, so suites can drive the engines through both the happy path
//! and the degraded paths without any network or database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::common::EngineError;
use crate::domains::automation::MetricsStore;
use crate::domains::interviews::{ActionTokenService, Slot};
use crate::domains::negotiation::Availability;
use crate::kernel::{
    BaseCalendarProvider, BaseEmailService, BaseLlmService, BaseRiskService, BaseScoringService,
    CalendarEventRequest, EmailMessage, EngineSettings, FitAssessment, ResponseKind,
    RiskAssessment, ServerDeps,
};
use crate::storage::InMemoryStorage;

fn unavailable(service: &str) -> EngineError {
    EngineError::Transient(anyhow::anyhow!("{} unavailable (test)", service))
}

// =============================================================================
// Email
// =============================================================================

#[derive(Default)]
pub struct RecordingEmailService {
    pub sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl RecordingEmailService {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.to == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BaseEmailService for RecordingEmailService {
    async fn queue(&self, message: EmailMessage) -> Result<(), EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("email service"));
        }
        self.sent.lock().push(message);
        Ok(())
    }
}

// =============================================================================
// Calendar
// =============================================================================

#[derive(Default)]
pub struct FixedCalendarProvider {
    pub free_slots: Mutex<Vec<Slot>>,
    pub created_events: Mutex<Vec<CalendarEventRequest>>,
    fail: AtomicBool,
}

impl FixedCalendarProvider {
    pub fn set_free_slots(&self, slots: Vec<Slot>) {
        *self.free_slots.lock() = slots;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> usize {
        self.created_events.lock().len()
    }
}

#[async_trait]
impl BaseCalendarProvider for FixedCalendarProvider {
    async fn get_free_slots(
        &self,
        _recruiter_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("calendar provider"));
        }
        Ok(self
            .free_slots
            .lock()
            .iter()
            .filter(|s| s.start >= from && s.end <= to)
            .copied()
            .collect())
    }

    async fn create_event(&self, request: CalendarEventRequest) -> Result<String, EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("calendar provider"));
        }
        let event_ref = format!("evt-{}", self.created_events.lock().len() + 1);
        self.created_events.lock().push(request);
        Ok(event_ref)
    }
}

// =============================================================================
// Risk
// =============================================================================

pub struct StubRiskService {
    pub risk: Mutex<f64>,
    fail: AtomicBool,
}

impl Default for StubRiskService {
    fn default() -> Self {
        Self {
            risk: Mutex::new(0.2),
            fail: AtomicBool::new(false),
        }
    }
}

impl StubRiskService {
    pub fn set_risk(&self, risk: f64) {
        *self.risk.lock() = risk;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BaseRiskService for StubRiskService {
    async fn analyze(
        &self,
        _interview_id: Uuid,
        _candidate_id: Uuid,
    ) -> Result<RiskAssessment, EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("risk service"));
        }
        let risk = *self.risk.lock();
        let risk_level = if risk < 0.33 {
            "low"
        } else if risk < 0.66 {
            "medium"
        } else {
            "high"
        };
        Ok(RiskAssessment {
            no_show_risk: risk,
            risk_level: risk_level.to_string(),
        })
    }
}

// =============================================================================
// Scoring
// =============================================================================

pub struct StubScoringService {
    pub score: Mutex<f64>,
    fail: AtomicBool,
}

impl Default for StubScoringService {
    fn default() -> Self {
        Self {
            score: Mutex::new(75.0),
            fail: AtomicBool::new(false),
        }
    }
}

impl StubScoringService {
    pub fn set_score(&self, score: f64) {
        *self.score.lock() = score;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BaseScoringService for StubScoringService {
    async fn process_resume(
        &self,
        _application_id: Uuid,
        _resume_url: Option<&str>,
        _job_description: &str,
    ) -> Result<FitAssessment, EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("scoring service"));
        }
        Ok(FitAssessment {
            fit_score: *self.score.lock(),
            summary: Some("stub assessment".to_string()),
            features: Default::default(),
        })
    }
}

// =============================================================================
// LLM
// =============================================================================

#[derive(Default)]
pub struct StubLlmService {
    pub availability: Mutex<Option<Availability>>,
    pub response: Mutex<Option<String>>,
    fail: AtomicBool,
}

impl StubLlmService {
    pub fn set_availability(&self, availability: Option<Availability>) {
        *self.availability.lock() = availability;
    }

    pub fn set_response(&self, response: Option<String>) {
        *self.response.lock() = response;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BaseLlmService for StubLlmService {
    async fn extract_availability(
        &self,
        _text: &str,
    ) -> Result<Option<Availability>, EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("llm service"));
        }
        Ok(self.availability.lock().clone())
    }

    async fn generate_response(
        &self,
        _kind: ResponseKind,
        _context: serde_json::Value,
    ) -> Result<Option<String>, EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("llm service"));
        }
        Ok(self.response.lock().clone())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Fully-faked dependency set plus handles to each fake.
pub struct TestDependencies {
    pub deps: Arc<ServerDeps>,
    pub storage: Arc<InMemoryStorage>,
    pub email: Arc<RecordingEmailService>,
    pub calendar: Arc<FixedCalendarProvider>,
    pub risk: Arc<StubRiskService>,
    pub scoring: Arc<StubScoringService>,
    pub llm: Arc<StubLlmService>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let email = Arc::new(RecordingEmailService::default());
        let calendar = Arc::new(FixedCalendarProvider::default());
        let risk = Arc::new(StubRiskService::default());
        let scoring = Arc::new(StubScoringService::default());
        let llm = Arc::new(StubLlmService::default());

        let deps = Arc::new(ServerDeps::new(
            storage.clone(),
            email.clone(),
            calendar.clone(),
            risk.clone(),
            scoring.clone(),
            Some(llm.clone()),
            ActionTokenService::new("test_signing_secret"),
            Arc::new(MetricsStore::default()),
            settings,
        ));

        Self {
            deps,
            storage,
            email,
            calendar,
            risk,
            scoring,
            llm,
        }
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
