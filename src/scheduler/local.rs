//! Tokio-backed scheduler
//!
//! Deferred tasks become `spawn_local` tasks on the current
//! [`tokio::task::LocalSet`]. Cancellation aborts the spawned task, which is
//! enough to stop it because a deferred task never yields once started.

use super::{DeferHandle, DeferredTask, Scheduler};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Default)]
struct LocalSchedulerInner {
    next_id: u64,
    /// Spawned tasks that have not started yet.
    tasks: HashMap<DeferHandle, JoinHandle<()>>,
}

/// Scheduler for code running inside a tokio `LocalSet`
///
/// `defer` must be called from within `LocalSet::run_until` (or a task spawned
/// on a `LocalSet`); tokio panics otherwise.
#[derive(Clone, Default)]
pub struct LocalScheduler {
    inner: Rc<RefCell<LocalSchedulerInner>>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deferred tasks that have not started yet
    pub fn pending(&self) -> usize {
        self.inner.borrow().tasks.len()
    }
}

impl Scheduler for LocalScheduler {
    fn defer(&self, task: DeferredTask) -> DeferHandle {
        let handle = {
            let mut inner = self.inner.borrow_mut();
            let handle = DeferHandle::new(inner.next_id);
            inner.next_id += 1;
            handle
        };

        let inner = Rc::clone(&self.inner);
        let join_handle = tokio::task::spawn_local(async move {
            inner.borrow_mut().tasks.remove(&handle);
            trace!(handle = %handle, "running deferred task");
            task();
        });

        // The spawned task cannot start before this insert: nothing yields in between
        self.inner.borrow_mut().tasks.insert(handle, join_handle);
        trace!(handle = %handle, "deferred task");
        handle
    }

    fn cancel(&self, handle: DeferHandle) {
        let join_handle = self.inner.borrow_mut().tasks.remove(&handle);
        if let Some(join_handle) = join_handle {
            join_handle.abort();
            trace!(handle = %handle, "canceled deferred task");
        }
    }
}
