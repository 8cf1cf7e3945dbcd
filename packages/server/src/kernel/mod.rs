// Kernel: infrastructure traits, outbound clients, and the dependency
// container. No business logic lives here.

pub mod ai;
pub mod calendar;
pub mod deps;
pub mod email;
mod http;
pub mod retry;
pub mod risk;
pub mod scoring;
pub mod test_dependencies;
pub mod traits;

pub use ai::HttpLlmService;
pub use calendar::HttpCalendarProvider;
pub use deps::{EngineSettings, ServerDeps};
pub use email::HttpEmailService;
pub use retry::retry_with_backoff;
pub use risk::HttpRiskService;
pub use scoring::HttpScoringService;
pub use traits::{
    BaseCalendarProvider, BaseEmailService, BaseLlmService, BaseRiskService, BaseScoringService,
    CalendarEventRequest, EmailMessage, EmailTemplate, FitAssessment, ResponseKind,
    RiskAssessment,
};
