//! Server dependencies for the engines (traits for testability)
//!
//! Central dependency container handed to every engine and handler. All
//! external collaborators sit behind trait objects so the test suites can
//! swap in fakes wholesale.

use chrono::Duration;
use std::sync::Arc;

use crate::domains::automation::{AutomationLogSink, FlagResolver, MetricsStore};
use crate::domains::interviews::ActionTokenService;
use crate::kernel::{
    BaseCalendarProvider, BaseEmailService, BaseLlmService, BaseRiskService, BaseScoringService,
};
use crate::storage::Storage;

/// Tunables the engines read per operation
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Candidate must accept or reject within this window (default 48h)
    pub confirmation_deadline: Duration,
    /// After accepting, a slot must be picked within this window (default 24h)
    pub slot_selection_deadline: Duration,
    /// When set, action links in emails point at the frontend
    pub frontend_base_url: Option<String>,
    pub default_buffer_target: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            confirmation_deadline: Duration::hours(48),
            slot_selection_deadline: Duration::hours(24),
            frontend_base_url: None,
            default_buffer_target: 3,
        }
    }
}

/// Server dependencies accessible to engines and handlers
#[derive(Clone)]
pub struct ServerDeps {
    pub storage: Arc<dyn Storage>,
    pub email: Arc<dyn BaseEmailService>,
    pub calendar: Arc<dyn BaseCalendarProvider>,
    pub risk: Arc<dyn BaseRiskService>,
    pub scoring: Arc<dyn BaseScoringService>,
    /// Absent when no LLM endpoint is configured; flags cannot re-enable it
    pub llm: Option<Arc<dyn BaseLlmService>>,
    pub tokens: ActionTokenService,
    pub log: AutomationLogSink,
    pub flags: FlagResolver,
    pub metrics: Arc<MetricsStore>,
    pub settings: EngineSettings,
}

impl ServerDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn Storage>,
        email: Arc<dyn BaseEmailService>,
        calendar: Arc<dyn BaseCalendarProvider>,
        risk: Arc<dyn BaseRiskService>,
        scoring: Arc<dyn BaseScoringService>,
        llm: Option<Arc<dyn BaseLlmService>>,
        tokens: ActionTokenService,
        metrics: Arc<MetricsStore>,
        settings: EngineSettings,
    ) -> Self {
        let log = AutomationLogSink::new(storage.clone());
        let flags = FlagResolver::new(storage.clone());
        Self {
            storage,
            email,
            calendar,
            risk,
            scoring,
            llm,
            tokens,
            log,
            flags,
            metrics,
            settings,
        }
    }
}
