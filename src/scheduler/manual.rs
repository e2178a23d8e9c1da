//! Deterministic FIFO scheduler
//!
//! Deferred tasks are queued in the order they were deferred and only run when
//! the owner drives the queue. A turn runs every task that was queued before
//! the turn started; tasks deferred while a turn runs land on the next turn.

use super::{DeferHandle, DeferredTask, Scheduler};
use crate::config::SchedulerConfig;
use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::{trace, warn};

struct ManualSchedulerInner {
    /// Next handle id. Ids grow monotonically, so the queue is sorted by id.
    next_id: u64,
    /// FIFO queue of deferred tasks.
    queue: VecDeque<(DeferHandle, DeferredTask)>,
    /// Number of completed turns.
    turns: u64,
}

/// Caller-driven scheduler for tests and deterministic simulations
pub struct ManualScheduler {
    inner: RefCell<ManualSchedulerInner>,
    max_turns: usize,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    /// Create a scheduler with the default turn limit
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::default())
    }

    /// Create a scheduler honoring `config.max_turns` in [`run_until_idle`](Self::run_until_idle)
    pub fn with_config(config: &SchedulerConfig) -> Self {
        Self {
            inner: RefCell::new(ManualSchedulerInner {
                next_id: 0,
                queue: VecDeque::new(),
                turns: 0,
            }),
            max_turns: config.max_turns,
        }
    }

    /// Run one turn. Returns the number of tasks executed.
    pub fn run_turn(&self) -> usize {
        let boundary = self.inner.borrow().next_id;
        let mut executed = 0;

        loop {
            let task = {
                let mut inner = self.inner.borrow_mut();
                match inner.queue.front() {
                    Some((handle, _)) if handle.id() < boundary => inner.queue.pop_front(),
                    _ => None,
                }
            };

            // Borrow released: the task may defer or cancel re-entrantly
            let Some((handle, task)) = task else {
                break;
            };

            trace!(handle = %handle, "running deferred task");
            task();
            executed += 1;
        }

        self.inner.borrow_mut().turns += 1;
        executed
    }

    /// Run turns until the queue is empty or the turn limit is reached.
    /// Returns the total number of tasks executed.
    pub fn run_until_idle(&self) -> usize {
        let mut executed = 0;
        let mut turns = 0;

        while !self.is_idle() {
            if turns >= self.max_turns {
                warn!(
                    max_turns = self.max_turns,
                    queued = self.queued(),
                    "Deferred queue still busy after turn limit"
                );
                break;
            }
            executed += self.run_turn();
            turns += 1;
        }

        executed
    }

    /// Number of tasks waiting to run
    pub fn queued(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.borrow().queue.is_empty()
    }

    /// Number of turns run so far
    pub fn turns(&self) -> u64 {
        self.inner.borrow().turns
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: DeferredTask) -> DeferHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = DeferHandle::new(inner.next_id);
        inner.next_id += 1;
        inner.queue.push_back((handle, task));
        trace!(handle = %handle, queued = inner.queue.len(), "deferred task");
        handle
    }

    fn cancel(&self, handle: DeferHandle) {
        let mut inner = self.inner.borrow_mut();
        if let Ok(index) = inner.queue.binary_search_by_key(&handle, |(h, _)| *h) {
            inner.queue.remove(index);
            trace!(handle = %handle, "canceled deferred task");
        }
    }
}
