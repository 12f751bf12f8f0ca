//! The coordinator a process builds once and passes around.

use std::path::Path;
use std::sync::Arc;

use crate::analyzer::{AnalyzerFactory, NodeModulesFactory};
use crate::config::Config;
use crate::error::Result;
use crate::fingerprint::FingerprintStore;
use crate::progress::ProgressBroadcaster;
use crate::scan::{NotificationSink, ScanOrchestrator};
use crate::watch::{EventRouter, FsEvent, PackageWatcher};

/// Owns the fingerprint store, the orchestrator and the event router.
pub struct Engine {
    config: Config,
    store: Arc<FingerprintStore>,
    orchestrator: ScanOrchestrator,
    router: Arc<EventRouter>,
}

impl Engine {
    pub fn new(
        config: Config,
        factory: Arc<dyn AnalyzerFactory>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let store = Arc::new(FingerprintStore::new(&config));
        let progress = ProgressBroadcaster::new(config.progress_capacity);
        let orchestrator = ScanOrchestrator::new(factory, sink, progress);
        let router = Arc::new(EventRouter::new(
            config.clone(),
            Arc::clone(&store),
            orchestrator.clone(),
        ));
        Self {
            config,
            store,
            orchestrator,
            router,
        }
    }

    /// Engine analyzing real `node_modules` trees.
    pub fn with_node_modules(config: Config, sink: Arc<dyn NotificationSink>) -> Self {
        let factory = Arc::new(NodeModulesFactory::new(config.manifest_file.clone()));
        Self::new(config, factory, sink)
    }

    /// Scan every project under `dir` now, bypassing debounce and
    /// fingerprint gates. Returns the number of projects triggered.
    pub fn force(&self, dir: &Path) -> Result<usize> {
        self.router.rescan(dir)
    }

    pub fn handle_event(&self, event: FsEvent) {
        self.router.handle(event);
    }

    /// Start watching `dir`. Events flow until the returned watcher drops.
    pub fn watch(&self, dir: &Path) -> Result<PackageWatcher> {
        PackageWatcher::start(dir, Arc::clone(&self.router))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }
}
