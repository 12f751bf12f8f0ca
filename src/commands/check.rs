use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::display::ConsoleSink;
use crate::engine::Engine;
use crate::error::{PkgiError, Result};
use crate::scan::{ChannelSink, NotificationSink, SessionReport};

use super::resolve_dir;

/// Scan every project under `dir` once and print the report.
///
/// Returns whether any project has problems.
pub async fn cmd_check(dir: &Path, json: bool) -> Result<bool> {
    let dir = resolve_dir(dir)?;
    let config = Config::load(&dir)?;

    let (sink, mut reports) = ChannelSink::new();
    let engine = Engine::with_node_modules(config, Arc::new(sink));

    let report = match engine.force(&dir)? {
        0 => SessionReport {
            session: 0,
            projects_scanned: 0,
            results: Default::default(),
        },
        _ => reports
            .recv()
            .await
            .ok_or_else(|| PkgiError::Other("scan session ended without a report".to_string()))?,
    };

    let has_problems = !report.is_clean();
    ConsoleSink::new(&dir, json).notify(report);
    Ok(has_problems)
}
