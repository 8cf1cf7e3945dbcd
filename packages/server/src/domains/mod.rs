// Domain modules - one per bounded area of the hiring pipeline

pub mod applications;
pub mod automation;
pub mod interviews;
pub mod jobs;
pub mod negotiation;
pub mod shortlisting;
