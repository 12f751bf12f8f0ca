pub mod analyzer;
pub mod commands;
pub mod config;
pub mod debounce;
pub mod discover;
pub mod display;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod progress;
pub mod resolver;
pub mod scan;
pub mod watch;

#[cfg(test)]
mod test_guards;

pub use analyzer::{Analyzer, AnalyzerFactory, NodeModulesAnalyzer, NodeModulesFactory, PackageNode};
pub use config::Config;
pub use debounce::Debouncer;
pub use discover::discover_projects;
pub use display::ConsoleSink;
pub use engine::Engine;
pub use error::{PkgiError, Result};
pub use fingerprint::FingerprintStore;
pub use progress::{ProgressBroadcaster, ProgressUpdate};
pub use resolver::{ProjectRoot, is_project_root_path};
pub use scan::{
    ChannelSink, NotificationSink, ScanFuture, ScanOrchestrator, ScanOutcome, ScanResult,
    ScanTask, SessionReport, TaskPhase,
};
pub use watch::{EventRouter, FsEvent, FsEventKind, PackageWatcher};
