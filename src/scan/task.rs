//! Single-flight scan execution for one project.
//!
//! At most one analysis runs per project. Requests that arrive while it runs
//! get the same shared future and set a rerun flag; when the cycle ends with
//! the flag set, another cycle starts instead of resolving the future. Any
//! number of overlapping requests therefore costs exactly one extra cycle,
//! and nobody receives a result older than their request.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::analyzer::{Analyzer, AnalyzerFactory};
use crate::error::PkgiError;
use crate::progress::ProgressBroadcaster;
use crate::resolver::ProjectRoot;
use crate::scan::ScanResult;

/// Result of a scan as seen by every waiter.
pub type ScanOutcome = std::result::Result<Arc<ScanResult>, Arc<PkgiError>>;

/// Future shared by every request made while one scan is in flight.
pub type ScanFuture = Shared<BoxFuture<'static, ScanOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Idle,
    Running,
    RunningRerunPending,
}

struct TaskState {
    phase: TaskPhase,
    pending: Option<ScanFuture>,
    last_result: Option<Arc<ScanResult>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    cycles: u64,
}

pub struct ScanTask {
    root: ProjectRoot,
    factory: Arc<dyn AnalyzerFactory>,
    progress: ProgressBroadcaster,
    state: Mutex<TaskState>,
}

impl ScanTask {
    pub fn new(
        root: ProjectRoot,
        factory: Arc<dyn AnalyzerFactory>,
        progress: ProgressBroadcaster,
    ) -> Self {
        Self {
            root,
            factory,
            progress,
            state: Mutex::new(TaskState {
                phase: TaskPhase::Idle,
                pending: None,
                last_result: None,
                analyzer: None,
                cycles: 0,
            }),
        }
    }

    /// Ask for a fresh result.
    ///
    /// Starts a scan when idle. While a scan runs, returns the in-flight
    /// future and schedules one more cycle before it resolves.
    pub fn request(self: &Arc<Self>) -> ScanFuture {
        let mut state = self.state.lock();
        if state.phase != TaskPhase::Idle {
            if let Some(pending) = state.pending.clone() {
                state.phase = TaskPhase::RunningRerunPending;
                tracing::debug!("scan of {} already running, rerun scheduled", self.root);
                return pending;
            }
        }

        let (tx, rx) = oneshot::channel();
        let root = self.root.clone();
        let future = async move {
            rx.await
                .unwrap_or_else(|_| Err(Arc::new(PkgiError::ScanAbandoned(root.into_path_buf()))))
        }
        .boxed()
        .shared();

        state.phase = TaskPhase::Running;
        state.pending = Some(future.clone());
        drop(state);

        tracing::debug!("starting scan of {}", self.root);
        let task = Arc::clone(self);
        tokio::spawn(async move { task.drive(tx).await });
        future
    }

    async fn drive(self: Arc<Self>, tx: oneshot::Sender<ScanOutcome>) {
        loop {
            // A panicking analyzer fails the cycle like any other error.
            let outcome = AssertUnwindSafe(self.run_cycle())
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(Arc::new(PkgiError::Analyzer {
                        root: self.root.as_path().to_path_buf(),
                        message: format!("analyzer panicked: {}", panic_message(&*panic)),
                    }))
                });

            let finished = {
                let mut state = self.state.lock();
                if state.phase == TaskPhase::RunningRerunPending {
                    state.phase = TaskPhase::Running;
                    false
                } else {
                    if let Ok(result) = &outcome {
                        state.last_result = Some(Arc::clone(result));
                    }
                    state.phase = TaskPhase::Idle;
                    state.pending = None;
                    true
                }
            };

            if finished {
                if let Err(e) = &outcome {
                    tracing::debug!("scan of {} failed: {e}", self.root);
                }
                if tx.send(outcome).is_err() {
                    tracing::debug!("scan of {} settled with no waiters", self.root);
                }
                return;
            }
            tracing::debug!("rerunning scan of {}", self.root);
        }
    }

    /// One analysis: the three queries run concurrently, any failure fails
    /// the cycle.
    async fn run_cycle(&self) -> ScanOutcome {
        let lease = AnalyzerLease::acquire(self);
        let analyzer = lease.analyzer();

        let (missing, invalid, extraneous) = tokio::join!(
            self.progress.track(analyzer.missing()),
            self.progress.track(analyzer.invalid()),
            self.progress.track(analyzer.extraneous()),
        );

        Ok(Arc::new(ScanResult::new(
            missing.map_err(Arc::new)?,
            invalid.map_err(Arc::new)?,
            extraneous.map_err(Arc::new)?,
        )))
    }

    pub fn root(&self) -> &ProjectRoot {
        &self.root
    }

    pub fn phase(&self) -> TaskPhase {
        self.state.lock().phase
    }

    /// Result of the last successful scan.
    pub fn last_result(&self) -> Option<Arc<ScanResult>> {
        self.state.lock().last_result.clone()
    }

    /// Number of analysis cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.state.lock().cycles
    }

    /// Whether an analyzer is currently open for this project.
    pub fn has_analyzer(&self) -> bool {
        self.state.lock().analyzer.is_some()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Holds the task's analyzer for one cycle and releases it on drop, so a
/// rerun always opens a fresh one.
struct AnalyzerLease<'a> {
    task: &'a ScanTask,
    analyzer: Arc<dyn Analyzer>,
}

impl<'a> AnalyzerLease<'a> {
    fn acquire(task: &'a ScanTask) -> Self {
        let mut state = task.state.lock();
        state.cycles += 1;
        let analyzer = Arc::clone(
            state
                .analyzer
                .get_or_insert_with(|| task.factory.open(&task.root)),
        );
        Self { task, analyzer }
    }

    fn analyzer(&self) -> Arc<dyn Analyzer> {
        Arc::clone(&self.analyzer)
    }
}

impl Drop for AnalyzerLease<'_> {
    fn drop(&mut self) {
        self.task.state.lock().analyzer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::ScriptedFactory;

    fn task(factory: &Arc<ScriptedFactory>) -> Arc<ScanTask> {
        Arc::new(ScanTask::new(
            ProjectRoot::from_dir("/p"),
            factory.clone(),
            ProgressBroadcaster::new(64),
        ))
    }

    #[tokio::test]
    async fn test_overlapping_requests_cost_one_extra_cycle() {
        let factory = ScriptedFactory::clean();
        let task = task(&factory);

        let first = task.request();
        for _ in 0..4 {
            assert!(first.ptr_eq(&task.request()), "same in-flight future");
        }
        assert_eq!(task.phase(), TaskPhase::RunningRerunPending);

        let result = first.await.unwrap();
        assert!(!result.has_problems());
        assert_eq!(task.cycles(), 2);
        assert_eq!(factory.opens(), 2);
        assert_eq!(task.phase(), TaskPhase::Idle);
    }

    #[tokio::test]
    async fn test_all_waiters_see_the_same_result() {
        let factory = ScriptedFactory::with_invalid("a");
        let task = task(&factory);

        let waiters: Vec<_> = (0..3).map(|_| task.request()).collect();
        let results = futures::future::join_all(waiters).await;
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
        assert_eq!(task.last_result().as_ref(), Some(first));
    }

    #[tokio::test]
    async fn test_idle_request_starts_new_future() {
        let factory = ScriptedFactory::clean();
        let task = task(&factory);

        let first = task.request();
        first.clone().await.unwrap();
        let second = task.request();
        assert!(!first.ptr_eq(&second));
        second.await.unwrap();
        assert_eq!(task.cycles(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_result() {
        let factory = ScriptedFactory::with_invalid("a");
        let task = task(&factory);

        let good = task.request().await.unwrap();
        factory.fail_next(1);
        let err = task.request().await.unwrap_err();
        assert!(matches!(*err, PkgiError::Analyzer { .. }));

        let kept = task.last_result().unwrap();
        assert!(Arc::ptr_eq(&kept, &good));
        assert_eq!(task.phase(), TaskPhase::Idle);
    }

    #[tokio::test]
    async fn test_pending_rerun_replaces_failed_cycle() {
        let factory = ScriptedFactory::clean();
        factory.fail_next(1);
        let task = task(&factory);

        let first = task.request();
        let _ = task.request();
        assert!(first.await.is_ok(), "rerun result settles the future");
        assert_eq!(task.cycles(), 2);
    }

    #[tokio::test]
    async fn test_panicking_analyzer_fails_cycle_and_returns_to_idle() {
        let factory = ScriptedFactory::clean();
        factory.panic_next(1);
        let task = task(&factory);

        let err = task.request().await.unwrap_err();
        match &*err {
            PkgiError::Analyzer { message, .. } => {
                assert!(message.contains("scripted panic"), "got: {message}")
            }
            other => panic!("expected an analyzer error, got {other:?}"),
        }
        assert_eq!(task.phase(), TaskPhase::Idle);
        assert!(!task.has_analyzer());

        let retry = task.request().await.unwrap();
        assert!(!retry.has_problems());
        assert_eq!(factory.opens(), 2);
        assert_eq!(task.phase(), TaskPhase::Idle);
    }

    #[tokio::test]
    async fn test_analyzer_released_after_each_cycle() {
        let factory = ScriptedFactory::clean();
        let task = task(&factory);

        task.request().await.unwrap();
        assert!(!task.has_analyzer());
        task.request().await.unwrap();
        assert!(!task.has_analyzer());
        assert_eq!(factory.opens(), 2);
    }

    #[tokio::test]
    async fn test_each_query_is_a_progress_step() {
        let factory = ScriptedFactory::clean();
        let progress = ProgressBroadcaster::new(64);
        let task = Arc::new(ScanTask::new(
            ProjectRoot::from_dir("/p"),
            factory.clone(),
            progress.clone(),
        ));

        task.request().await.unwrap();
        let update = progress.snapshot();
        assert_eq!((update.current, update.max), (3, 3));
    }
}
