//! Filesystem watching.
//!
//! A recursive `notify` watch on the watched directory is bridged into a
//! bounded tokio channel and drained by a background loop that feeds the
//! [`EventRouter`]. When the bridge overflows, individual events are lost,
//! so the loop falls back to rediscovering and rescanning every project.

mod router;

pub use router::{EventRouter, FsEvent, FsEventKind};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{PkgiError, Result};

const CHANNEL_CAPACITY: usize = 1024;

/// Keeps the OS watch alive. Dropping it stops event delivery and the
/// background loop.
pub struct PackageWatcher {
    _watcher: notify::RecommendedWatcher,
    task: JoinHandle<()>,
}

impl PackageWatcher {
    pub fn start(dir: &Path, router: Arc<EventRouter>) -> Result<Self> {
        let (bridge_tx, bridge_rx) = mpsc::channel::<notify::Event>(CHANNEL_CAPACITY);
        let rescan_needed = Arc::new(AtomicBool::new(false));

        let mut watcher = {
            let rescan = Arc::clone(&rescan_needed);
            notify::RecommendedWatcher::new(
                move |res: std::result::Result<notify::Event, notify::Error>| match res {
                    Ok(event) => {
                        if bridge_tx.try_send(event).is_err() && !rescan.swap(true, Ordering::Relaxed)
                        {
                            tracing::warn!(
                                "watcher channel full (capacity {CHANNEL_CAPACITY}), \
                                 falling back to a full rescan"
                            );
                        }
                    }
                    Err(e) => tracing::warn!("filesystem watcher error: {e}"),
                },
                notify::Config::default(),
            )
            .map_err(|e| {
                PkgiError::WatcherError(format!("failed to create filesystem watcher: {e}"))
            })?
        };

        watcher
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|e| PkgiError::WatcherError(format!("failed to watch {}: {e}", dir.display())))?;
        tracing::info!("watching {}", dir.display());

        let dir = dir.to_path_buf();
        let task = tokio::spawn(run_event_loop(bridge_rx, dir, router, rescan_needed));

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for PackageWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_event_loop(
    mut bridge_rx: mpsc::Receiver<notify::Event>,
    dir: PathBuf,
    router: Arc<EventRouter>,
    rescan_needed: Arc<AtomicBool>,
) {
    while let Some(event) = bridge_rx.recv().await {
        if rescan_needed.swap(false, Ordering::Relaxed) {
            // Drop whatever is queued: the rescan supersedes it.
            while bridge_rx.try_recv().is_ok() {}
            router.cancel_pending();
            match router.rescan(&dir) {
                Ok(count) => tracing::info!("rescanned {count} project(s) after overflow"),
                Err(e) => tracing::warn!("rescan of {} failed: {e}", dir.display()),
            }
            continue;
        }

        for fs_event in translate(&event) {
            router.handle(fs_event);
        }
    }
}

/// Reduce a `notify` event to our three kinds.
///
/// A rename with both ends known is a delete of the old path followed by a
/// create of the new one. Access and other metadata-only events are dropped.
pub fn translate(event: &notify::Event) -> Vec<FsEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => FsEventKind::Created,
        EventKind::Remove(_) => FsEventKind::Deleted,
        EventKind::Modify(ModifyKind::Name(mode)) => {
            return translate_rename(mode, &event.paths);
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => FsEventKind::Changed,
        _ => return Vec::new(),
    };
    event
        .paths
        .iter()
        .map(|path| FsEvent::new(kind, path.clone()))
        .collect()
}

fn translate_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<FsEvent> {
    match (mode, paths) {
        (RenameMode::From, [from]) => vec![FsEvent::new(FsEventKind::Deleted, from.clone())],
        (RenameMode::To, [to]) => vec![FsEvent::new(FsEventKind::Created, to.clone())],
        (RenameMode::Both, [from, to]) => vec![
            FsEvent::new(FsEventKind::Deleted, from.clone()),
            FsEvent::new(FsEventKind::Created, to.clone()),
        ],
        // Backends that cannot tell the direction: ask the filesystem.
        (_, paths) => paths
            .iter()
            .map(|path| {
                let kind = if path.exists() {
                    FsEventKind::Created
                } else {
                    FsEventKind::Deleted
                };
                FsEvent::new(kind, path.clone())
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_translate_basic_kinds() {
        assert_eq!(
            translate(&event(EventKind::Create(CreateKind::File), &["/p/package.json"])),
            vec![FsEvent::new(FsEventKind::Created, "/p/package.json")]
        );
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/p/package.json"]
            )),
            vec![FsEvent::new(FsEventKind::Changed, "/p/package.json")]
        );
        assert_eq!(
            translate(&event(EventKind::Remove(RemoveKind::Folder), &["/p/node_modules"])),
            vec![FsEvent::new(FsEventKind::Deleted, "/p/node_modules")]
        );
    }

    #[test]
    fn test_translate_drops_noise() {
        assert!(translate(&event(EventKind::Access(AccessKind::Any), &["/p/a"])).is_empty());
        assert!(
            translate(&event(
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
                &["/p/a"]
            ))
            .is_empty()
        );
    }

    #[test]
    fn test_rename_becomes_delete_then_create() {
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/p/package.json.tmp", "/p/package.json"],
        );
        assert_eq!(
            translate(&renamed),
            vec![
                FsEvent::new(FsEventKind::Deleted, "/p/package.json.tmp"),
                FsEvent::new(FsEventKind::Created, "/p/package.json"),
            ]
        );
    }

    #[test]
    fn test_rename_halves() {
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/p/old"]
            )),
            vec![FsEvent::new(FsEventKind::Deleted, "/p/old")]
        );
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                &["/p/new"]
            )),
            vec![FsEvent::new(FsEventKind::Created, "/p/new")]
        );
    }
}
