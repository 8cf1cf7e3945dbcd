pub mod engine;

pub use engine::{InviteSender, ShortlistSummary, ShortlistingEngine};
