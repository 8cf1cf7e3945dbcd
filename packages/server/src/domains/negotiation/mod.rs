pub mod engine;
pub mod models;
pub mod parser;

pub use engine::{NegotiationEngine, NegotiationReply};
pub use models::{Availability, HistoryActor, HistoryEntry, NegotiationSession, NegotiationState};
pub use parser::parse_availability;
