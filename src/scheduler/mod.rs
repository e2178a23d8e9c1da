//! # Deferred Execution
//!
//! The join coordinator never runs its completion handler synchronously. It
//! hands a task to a [`Scheduler`], which runs it on a later turn of a
//! single-threaded event loop, and cancels that task again when new work
//! arrives before it ran.
//!
//! ## Implementations
//!
//! - [`ManualScheduler`] - deterministic FIFO queue driven by the caller
//! - [`LocalScheduler`] - `tokio::task::spawn_local` on the current `LocalSet`

pub mod local;
pub mod manual;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use local::LocalScheduler;
pub use manual::ManualScheduler;

/// Task accepted by [`Scheduler::defer`]
pub type DeferredTask = Box<dyn FnOnce() + 'static>;

/// Identifies one deferred call for later cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeferHandle(u64);

impl DeferHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "defer-{}", self.0)
    }
}

/// Single-threaded deferred-execution capability
///
/// Contract:
/// - `defer` must never run `task` before it returns, and runs it at most once.
/// - `cancel` prevents a not-yet-run task from running. Canceling a task that
///   already ran, or an unknown handle, is a no-op.
pub trait Scheduler {
    fn defer(&self, task: DeferredTask) -> DeferHandle;

    fn cancel(&self, handle: DeferHandle);
}
