use std::path::Path;
use std::sync::Arc;

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;
use crate::display::ConsoleSink;
use crate::engine::Engine;
use crate::error::Result;

use super::resolve_dir;

/// Check `dir`, then keep re-checking projects as their dependencies change
/// until interrupted.
pub async fn cmd_watch(dir: &Path) -> Result<()> {
    let dir = resolve_dir(dir)?;
    let config = Config::load(&dir)?;
    let engine = Engine::with_node_modules(config, Arc::new(ConsoleSink::new(&dir, false)));

    let mut progress = engine.orchestrator().subscribe_progress();
    let progress_task = tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(update) => tracing::debug!(
                    "scan progress {:.0}% ({}/{})",
                    update.percent,
                    update.current,
                    update.max
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("progress listener skipped {skipped} update(s)")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Watch first so changes made during the initial scan are not lost.
    let _watcher = engine.watch(&dir)?;
    let count = engine.force(&dir)?;
    eprintln!(
        "Watching {} under {} {}",
        if count == 1 {
            "1 project".to_string()
        } else {
            format!("{count} projects")
        },
        dir.display(),
        "(Ctrl-C to stop)".dimmed()
    );

    tokio::signal::ctrl_c().await?;
    progress_task.abort();
    Ok(())
}
