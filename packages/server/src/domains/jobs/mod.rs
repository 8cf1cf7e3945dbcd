pub mod models;

pub use models::{Job, JobUpdate, NewJob};
