#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # CPS Join
//!
//! Callback barrier for continuation-passing-style operations.
//!
//! ## Overview
//!
//! A [`Join`] hands out continuations for a dynamically growing set of
//! operations, waits until all of them completed (or one failed), and then
//! runs a single completion handler exactly once with either the first error
//! or the results. Results are ordered by the structure in which operations
//! were registered, not by when they finished.
//!
//! ## Module Organization
//!
//! - [`join`] - Coordinator, continuations, result tree, async adapter
//! - [`scheduler`] - Deferred-execution capability and its implementations
//! - [`config`] - Configuration loading
//! - [`error`] - Contract violation errors
//! - [`logging`] - Structured logging setup
//!
//! ## Execution Model
//!
//! Everything runs on one thread. Continuations may be invoked synchronously
//! or on later turns; the completion handler always runs on a later turn of
//! the injected [`Scheduler`].
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod config;
pub mod error;
pub mod join;
pub mod logging;
pub mod scheduler;

pub use config::{JoinConfig, LoggingConfig, SchedulerConfig};
pub use error::{JoinError, Result};
pub use join::{
    Completion, CompletionError, Continuation, Join, JoinPhase, JoinStats, NodeId, Slot,
};
pub use scheduler::{DeferHandle, LocalScheduler, ManualScheduler, Scheduler};
