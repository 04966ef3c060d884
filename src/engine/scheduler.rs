//! Single-threaded run queue for deferred and delayed engine work.
//!
//! Nothing here spawns threads: tasks are plain values ordered by due time
//! and drained by whoever drives the engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Identifies a scheduled task so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Tasks ordered by (due time, insertion order).
#[derive(Debug)]
pub struct Scheduler<T> {
    queue: BTreeMap<(u64, TaskId), T>,
    due: HashMap<TaskId, u64>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            due: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once `delay` has elapsed after `now`.
    pub fn schedule(&mut self, now: u64, delay: Duration, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let due = now.saturating_add(delay.as_millis() as u64);
        self.queue.insert((due, id), task);
        self.due.insert(id, due);
        id
    }

    /// Queue `task` behind everything already due at `now`.
    pub fn post(&mut self, now: u64, task: T) -> TaskId {
        self.schedule(now, Duration::ZERO, task)
    }

    /// Cancel a pending task. Returns `false` if it already ran or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.due.remove(&id) {
            Some(due) => self.queue.remove(&(due, id)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.due.contains_key(&id)
    }

    /// Due time of the earliest pending task.
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.keys().next().map(|&(due, _)| due)
    }

    /// Remove and return the earliest task if it is due at `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(TaskId, T)> {
        let &(due, id) = self.queue.keys().next()?;
        if due > now {
            return None;
        }
        self.due.remove(&id);
        self.queue.remove(&(due, id)).map(|task| (id, task))
    }

    /// Drop every pending task, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.due.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
