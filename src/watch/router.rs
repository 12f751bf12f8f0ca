//! Turning filesystem events into scan requests.
//!
//! | file         | created                       | changed      | deleted        |
//! |--------------|-------------------------------|--------------|----------------|
//! | manifest     | new project: scan now         | gated scan   | delete project |
//! | lock file    | new project: scan now         | gated scan   | gated scan     |
//! | node_modules | ignored                       | ignored      | ungated scan   |
//!
//! Gated scans are debounced per project and only run when the project's
//! manifest or lock files changed fingerprint. Ungated scans are debounced
//! the same way but always run. A created file in a project that is already
//! known behaves like a change.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::discover::discover_projects;
use crate::error::Result;
use crate::fingerprint::FingerprintStore;
use crate::resolver::{ProjectRoot, is_project_root_path};
use crate::scan::ScanOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Changed,
    Deleted,
}

/// A filesystem change, already reduced to one path and one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchedFile {
    Manifest,
    LockFile,
    InstalledTree,
    Other,
}

pub struct EventRouter {
    config: Config,
    store: Arc<FingerprintStore>,
    orchestrator: ScanOrchestrator,
    gated: Debouncer<ProjectRoot>,
    ungated: Debouncer<ProjectRoot>,
}

impl EventRouter {
    pub fn new(
        config: Config,
        store: Arc<FingerprintStore>,
        orchestrator: ScanOrchestrator,
    ) -> Self {
        let gated = {
            let store = Arc::clone(&store);
            let orchestrator = orchestrator.clone();
            let manifest_file = config.manifest_file.clone();
            Debouncer::new(config.debounce(), move |root: ProjectRoot, ()| {
                if !has_manifest(&root, &manifest_file) {
                    return;
                }
                if store.project_changed(&root) {
                    let _ = orchestrator.notify_triggered(root);
                } else {
                    tracing::debug!("dependencies of {root} unchanged, scan skipped");
                }
            })
        };
        let ungated = {
            let orchestrator = orchestrator.clone();
            let manifest_file = config.manifest_file.clone();
            Debouncer::new(config.debounce(), move |root: ProjectRoot, ()| {
                if has_manifest(&root, &manifest_file) {
                    let _ = orchestrator.notify_triggered(root);
                }
            })
        };

        Self {
            config,
            store,
            orchestrator,
            gated,
            ungated,
        }
    }

    pub fn handle(&self, event: FsEvent) {
        let file = self.classify(&event.path);
        match (file, event.kind) {
            (WatchedFile::Other, _)
            | (WatchedFile::InstalledTree, FsEventKind::Created | FsEventKind::Changed) => {}

            (WatchedFile::InstalledTree, FsEventKind::Deleted) => {
                if let Some(root) = self.root_of_deleted(&event.path) {
                    tracing::debug!("installed package removed under {root}");
                    self.ungated.trigger(root, ());
                }
            }

            (WatchedFile::Manifest | WatchedFile::LockFile, FsEventKind::Created) => {
                let Some(root) = self.root_of(&event.path) else {
                    return;
                };
                if self.orchestrator.has_project(&root) {
                    self.gated.trigger(root, ());
                } else if has_manifest(&root, &self.config.manifest_file) {
                    tracing::debug!("new project at {root}");
                    self.store.project_changed(&root);
                    let _ = self.orchestrator.notify_triggered(root);
                }
            }

            (WatchedFile::Manifest | WatchedFile::LockFile, FsEventKind::Changed) => {
                if let Some(root) = self.root_of(&event.path) {
                    self.gated.trigger(root, ());
                }
            }

            (WatchedFile::Manifest, FsEventKind::Deleted) => {
                if let Some(root) = self.root_of_deleted(&event.path) {
                    self.orchestrator.delete_project(&root);
                }
            }

            (WatchedFile::LockFile, FsEventKind::Deleted) => {
                if let Some(root) = self.root_of_deleted(&event.path) {
                    self.gated.trigger(root, ());
                }
            }
        }
    }

    /// Discover every project under `dir`, seed its fingerprints and scan it
    /// immediately. Returns the number of projects triggered.
    pub fn rescan(&self, dir: &Path) -> Result<usize> {
        let roots = discover_projects(dir, &self.config)?;
        for root in &roots {
            self.store.project_changed(root);
            let _ = self.orchestrator.notify_triggered(root.clone());
        }
        Ok(roots.len())
    }

    /// Projects with a debounced scan waiting to fire.
    pub fn pending(&self) -> usize {
        self.gated.pending() + self.ungated.pending()
    }

    pub fn cancel_pending(&self) {
        self.gated.cancel_all();
        self.ungated.cancel_all();
    }

    fn classify(&self, path: &Path) -> WatchedFile {
        if !is_project_root_path(path) {
            return WatchedFile::InstalledTree;
        }
        let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
            return WatchedFile::Other;
        };
        if self.config.is_manifest(&name) {
            WatchedFile::Manifest
        } else if self.config.is_lock_file(&name) {
            WatchedFile::LockFile
        } else {
            WatchedFile::Other
        }
    }

    fn root_of(&self, path: &Path) -> Option<ProjectRoot> {
        match ProjectRoot::resolve(path) {
            Ok(root) => Some(root),
            Err(e) => {
                tracing::debug!("event dropped: {e}");
                None
            }
        }
    }

    fn root_of_deleted(&self, path: &Path) -> Option<ProjectRoot> {
        match ProjectRoot::containing(path) {
            Ok(root) => Some(root),
            Err(e) => {
                tracing::debug!("event dropped: {e}");
                None
            }
        }
    }
}

fn has_manifest(root: &ProjectRoot, manifest_file: &str) -> bool {
    root.join(manifest_file).is_file()
}
