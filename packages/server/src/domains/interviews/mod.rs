pub mod models;
pub mod scheduler;
pub mod slots;
pub mod tokens;

pub use models::{Interview, InterviewStatus, InterviewUpdate, NewInterview};
pub use scheduler::InterviewScheduler;
pub use slots::Slot;
pub use tokens::{ActionTokenService, TokenAction};
