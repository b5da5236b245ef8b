//! One run of the job: every unread notification, start to finish.

mod orchestrator;

pub use orchestrator::Orchestrator;
