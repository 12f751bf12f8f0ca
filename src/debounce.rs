//! Per-key trailing-edge debouncing.
//!
//! Each trigger for a key cancels that key's pending timer and arms a new
//! one, so only the last trigger in a burst runs, carrying the latest value.
//! Keys are independent: a burst for one project never swallows the trigger
//! for another. A debouncer used with a single key (e.g. `()`) behaves like a
//! classic global debounce.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

type Action<K, V> = Arc<dyn Fn(K, V) + Send + Sync>;

struct Timer {
    generation: u64,
    handle: AbortHandle,
}

struct Timers<K> {
    armed: HashMap<K, Timer>,
    generation: u64,
}

/// Delays an action per key until triggers for that key stop arriving.
///
/// Must be used from within a tokio runtime. Dropping the debouncer cancels
/// every pending timer.
pub struct Debouncer<K, V = ()> {
    delay: Duration,
    action: Action<K, V>,
    timers: Arc<Mutex<Timers<K>>>,
}

impl<K, V> Debouncer<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    pub fn new(delay: Duration, action: impl Fn(K, V) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            action: Arc::new(action),
            timers: Arc::new(Mutex::new(Timers {
                armed: HashMap::new(),
                generation: 0,
            })),
        }
    }

    /// Schedule the action for `key`, replacing any pending one.
    pub fn trigger(&self, key: K, value: V) {
        let mut timers = self.timers.lock();
        timers.generation += 1;
        let generation = timers.generation;

        if let Some(previous) = timers.armed.remove(&key) {
            previous.handle.abort();
        }

        let action = Arc::clone(&self.action);
        let shared = Arc::clone(&self.timers);
        let delay = self.delay;
        let fired_key = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // A newer trigger may have replaced this timer after the sleep
            // finished but before the abort landed.
            let current = {
                let mut timers = shared.lock();
                let is_current = timers
                    .armed
                    .get(&fired_key)
                    .is_some_and(|timer| timer.generation == generation);
                if is_current {
                    timers.armed.remove(&fired_key);
                }
                is_current
            };
            if current {
                action(fired_key, value);
            }
        });

        timers.armed.insert(
            key,
            Timer {
                generation,
                handle: task.abort_handle(),
            },
        );
    }

    /// Number of keys with an armed timer.
    pub fn pending(&self) -> usize {
        self.timers.lock().armed.len()
    }

    /// Whether `key` has an armed timer.
    pub fn is_pending(&self, key: &K) -> bool {
        self.timers.lock().armed.contains_key(key)
    }

    /// Cancel every pending timer without running the action.
    pub fn cancel_all(&self) {
        let mut timers = self.timers.lock();
        for (_, timer) in timers.armed.drain() {
            timer.handle.abort();
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<K, V> Drop for Debouncer<K, V> {
    fn drop(&mut self) {
        let mut timers = self.timers.lock();
        for (_, timer) in timers.armed.drain() {
            timer.handle.abort();
        }
    }
}
