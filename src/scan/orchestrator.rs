//! Scan sessions across projects.
//!
//! A session opens when the first scan starts while nothing else runs and
//! closes when the last running scan settles. Results of every scan that
//! settled inside the session are delivered together, once, at close.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use crate::analyzer::AnalyzerFactory;
use crate::progress::{ProgressBroadcaster, ProgressUpdate};
use crate::resolver::ProjectRoot;
use crate::scan::{NotificationSink, ScanFuture, ScanOutcome, ScanResult, ScanTask, SessionReport};

struct OpenSession {
    id: u64,
    scanned: BTreeSet<ProjectRoot>,
    results: BTreeMap<ProjectRoot, Arc<ScanResult>>,
}

impl OpenSession {
    fn into_report(self) -> SessionReport {
        SessionReport {
            session: self.id,
            projects_scanned: self.scanned.len(),
            results: self
                .results
                .into_iter()
                .filter(|(_, result)| result.has_problems())
                .map(|(root, result)| (root, ScanResult::clone(&result)))
                .collect(),
        }
    }
}

#[derive(Default)]
struct OrchestratorState {
    tasks: HashMap<ProjectRoot, Arc<ScanTask>>,
    /// In-flight future per running project.
    running: HashMap<ProjectRoot, ScanFuture>,
    session: Option<OpenSession>,
    sessions: u64,
}

struct Inner {
    factory: Arc<dyn AnalyzerFactory>,
    sink: Arc<dyn NotificationSink>,
    progress: ProgressBroadcaster,
    state: Mutex<OrchestratorState>,
    running_tx: watch::Sender<usize>,
}

/// Owns every project's scan task and the session they report into.
/// Clones share state.
#[derive(Clone)]
pub struct ScanOrchestrator {
    inner: Arc<Inner>,
}

impl ScanOrchestrator {
    pub fn new(
        factory: Arc<dyn AnalyzerFactory>,
        sink: Arc<dyn NotificationSink>,
        progress: ProgressBroadcaster,
    ) -> Self {
        let (running_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                factory,
                sink,
                progress,
                state: Mutex::new(OrchestratorState::default()),
                running_tx,
            }),
        }
    }

    /// Request a scan of `root`, creating its task on first use.
    ///
    /// A project that is already running is asked again, which coalesces
    /// into its in-flight scan. Returns the future the request joined.
    pub fn notify_triggered(&self, root: ProjectRoot) -> ScanFuture {
        let mut state = self.inner.state.lock();
        let task = match state.tasks.get(&root) {
            Some(task) => Arc::clone(task),
            None => {
                let task = Arc::new(ScanTask::new(
                    root.clone(),
                    Arc::clone(&self.inner.factory),
                    self.inner.progress.clone(),
                ));
                state.tasks.insert(root.clone(), Arc::clone(&task));
                task
            }
        };

        // Nothing runs outside a session, so a request made here cannot
        // coalesce; open first so the progress reset precedes its steps.
        if state.session.is_none() {
            state.sessions += 1;
            let id = state.sessions;
            self.inner.progress.reset();
            state.session = Some(OpenSession {
                id,
                scanned: BTreeSet::new(),
                results: BTreeMap::new(),
            });
            tracing::info!("scan session {id} opened");
        }

        let future = task.request();
        if state
            .running
            .get(&root)
            .is_some_and(|tracked| tracked.ptr_eq(&future))
        {
            tracing::debug!("scan of {root} coalesced into running scan");
            return future;
        }

        if let Some(session) = state.session.as_mut() {
            session.scanned.insert(root.clone());
        }
        state.running.insert(root.clone(), future.clone());
        self.inner.running_tx.send_replace(state.running.len());
        drop(state);

        let orchestrator = self.clone();
        let tracked = future.clone();
        let waited = future.clone();
        tokio::spawn(async move {
            let outcome = waited.await;
            orchestrator.finish_scan(root, &tracked, outcome);
        });
        future
    }

    /// Forget a project. A running scan of it stops counting towards the
    /// session; its eventual outcome is discarded.
    pub fn delete_project(&self, root: &ProjectRoot) {
        let report = {
            let mut state = self.inner.state.lock();
            if state.tasks.remove(root).is_some() {
                tracing::debug!("project {root} removed");
            }
            if state.running.remove(root).is_none() {
                return;
            }
            self.inner.running_tx.send_replace(state.running.len());
            Self::close_if_idle(&mut state)
        };
        self.deliver(report);
    }

    fn finish_scan(&self, root: ProjectRoot, future: &ScanFuture, outcome: ScanOutcome) {
        let report = {
            let mut state = self.inner.state.lock();
            // Superseded by a newer scan, or the project was deleted.
            if !state
                .running
                .get(&root)
                .is_some_and(|tracked| tracked.ptr_eq(future))
            {
                return;
            }
            state.running.remove(&root);
            match outcome {
                Ok(result) => {
                    if let Some(session) = state.session.as_mut() {
                        session.results.insert(root, result);
                    }
                }
                Err(e) => tracing::warn!("scan of {root} failed: {e}"),
            }
            self.inner.running_tx.send_replace(state.running.len());
            Self::close_if_idle(&mut state)
        };
        self.deliver(report);
    }

    fn close_if_idle(state: &mut OrchestratorState) -> Option<SessionReport> {
        if !state.running.is_empty() {
            return None;
        }
        state.session.take().map(OpenSession::into_report)
    }

    fn deliver(&self, report: Option<SessionReport>) {
        if let Some(report) = report {
            tracing::info!(
                "scan session {} closed: {} project(s) scanned, {} with problems",
                report.session,
                report.projects_scanned,
                report.results.len()
            );
            self.inner.sink.notify(report);
        }
    }

    pub fn task(&self, root: &ProjectRoot) -> Option<Arc<ScanTask>> {
        self.inner.state.lock().tasks.get(root).cloned()
    }

    pub fn has_project(&self, root: &ProjectRoot) -> bool {
        self.inner.state.lock().tasks.contains_key(root)
    }

    pub fn is_running(&self, root: &ProjectRoot) -> bool {
        self.inner.state.lock().running.contains_key(root)
    }

    pub fn running_count(&self) -> usize {
        self.inner.state.lock().running.len()
    }

    pub fn project_count(&self) -> usize {
        self.inner.state.lock().tasks.len()
    }

    /// Id of the open session, if any.
    pub fn current_session(&self) -> Option<u64> {
        self.inner.state.lock().session.as_ref().map(|session| session.id)
    }

    pub fn progress(&self) -> &ProgressBroadcaster {
        &self.inner.progress
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.inner.progress.subscribe()
    }

    /// Resolve once no scan is running.
    pub async fn settled(&self) {
        let mut running = self.inner.running_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = running.wait_for(|count| *count == 0).await;
    }
}
