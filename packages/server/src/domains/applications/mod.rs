pub mod actions;
pub mod models;

pub use actions::process_application_scoring;
pub use models::{Application, NewApplication, PartitionCounts, ShortlistStatus};
