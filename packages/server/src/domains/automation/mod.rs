// Automation domain: feature flags, the event log, the background cycle,
// and in-process metrics.

pub mod cycler;
pub mod flags;
pub mod log;
pub mod metrics;
pub mod models;

pub use cycler::{run_cycle, BackgroundCycler, CycleReport};
pub use flags::FlagResolver;
pub use log::AutomationLogSink;
pub use metrics::{HealthStatus, MetricsStore, MetricsThresholds, SystemHealth};
pub use models::{ActionType, AutomationLog, FeatureFlag, LogFilter, NewLogEntry, TriggerSource};
