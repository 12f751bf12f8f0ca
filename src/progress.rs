//! Session-wide scan progress.
//!
//! Every sub-step of every scan in a session registers with one shared
//! counter and completes against it. Each mutation publishes the new
//! percentage on a broadcast channel; sending never blocks, and receivers
//! only see updates published after they subscribed.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

/// One published progress value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub current: u64,
    pub max: u64,
    pub percent: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counter {
    max: u64,
    current: u64,
    /// Bumped by every reset; steps registered before it no longer count.
    generation: u64,
}

impl Counter {
    fn percent(&self) -> f64 {
        if self.current == self.max {
            return 100.0;
        }
        self.current as f64 / self.max as f64 * 100.0
    }

    fn update(&self) -> ProgressUpdate {
        ProgressUpdate {
            current: self.current,
            max: self.max,
            percent: self.percent(),
        }
    }
}

/// Shared progress counter. Clones share the same counter and channel.
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    counter: Arc<Mutex<Counter>>,
    sender: broadcast::Sender<ProgressUpdate>,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            counter: Arc::new(Mutex::new(Counter::default())),
            sender,
        }
    }

    /// Receive every update published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Add one step to the expected total.
    pub fn register_step(&self) {
        self.begin_step();
    }

    /// Mark one registered step as done. Ignored once every step is done.
    pub fn complete_step(&self) {
        self.finish_step(None);
    }

    /// Zero the counter without publishing. Called when a session opens.
    ///
    /// Steps tracked before the reset are dropped when they settle.
    pub fn reset(&self) {
        let mut counter = self.counter.lock();
        *counter = Counter {
            generation: counter.generation + 1,
            ..Counter::default()
        };
    }

    /// Current value without publishing.
    pub fn snapshot(&self) -> ProgressUpdate {
        self.counter.lock().update()
    }

    /// Register a step now and complete it when `future` settles or is
    /// dropped, whatever its output.
    pub fn track<F>(&self, future: F) -> impl Future<Output = F::Output> + use<F>
    where
        F: Future,
    {
        let step = Step {
            progress: self.clone(),
            generation: self.begin_step(),
        };
        async move {
            let output = future.await;
            drop(step);
            output
        }
    }

    fn begin_step(&self) -> u64 {
        let (update, generation) = {
            let mut counter = self.counter.lock();
            counter.max += 1;
            (counter.update(), counter.generation)
        };
        self.publish(update);
        generation
    }

    fn finish_step(&self, generation: Option<u64>) {
        let update = {
            let mut counter = self.counter.lock();
            let stale = generation.is_some_and(|g| g != counter.generation);
            if stale || counter.current >= counter.max {
                return;
            }
            counter.current += 1;
            counter.update()
        };
        self.publish(update);
    }

    fn publish(&self, update: ProgressUpdate) {
        // No receivers is fine: progress is best-effort.
        let _ = self.sender.send(update);
    }
}

/// A registered step, completed on drop against the generation it was
/// registered in.
struct Step {
    progress: ProgressBroadcaster,
    generation: u64,
}

impl Drop for Step {
    fn drop(&mut self) {
        self.progress.finish_step(Some(self.generation));
    }
}
