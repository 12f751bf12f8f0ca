//! Scan execution: per-project single-flight tasks and the sessions that
//! batch their results.

mod orchestrator;
mod result;
mod sink;
mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::ScanOrchestrator;
pub use result::{ScanResult, SessionReport};
pub use sink::{ChannelSink, NotificationSink};
pub use task::{ScanFuture, ScanOutcome, ScanTask, TaskPhase};
