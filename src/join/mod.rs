//! # Join Coordination
//!
//! A callback barrier for continuation-passing-style code. Register any number
//! of operations (including from inside other operations' callbacks), then
//! receive either the first error or every result, ordered by registration
//! nesting rather than completion time.
//!
//! ## Example
//!
//! ```rust
//! use cps_join::join::Join;
//! use cps_join::scheduler::ManualScheduler;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let sched = Rc::new(ManualScheduler::new());
//! let received = Rc::new(RefCell::new(None));
//!
//! let r = received.clone();
//! let join: Join<i32, String> = Join::new(sched.clone(), move |outcome| {
//!     *r.borrow_mut() = Some(outcome);
//! });
//!
//! let parent = join
//!     .register(|scope: &Join<i32, String>, ()| {
//!         scope.register_value().unwrap().resolve(1).unwrap();
//!         scope.register_value().unwrap().resolve(2).unwrap();
//!         Some(3)
//!     })
//!     .unwrap();
//! parent.resolve(()).unwrap();
//!
//! sched.run_until_idle();
//! assert_eq!(*received.borrow(), Some(Ok(vec![1, 2, 3])));
//! ```

pub mod completion;
pub mod continuation;
pub mod coordinator;
pub mod phase;
pub mod tree;

pub use completion::{Completion, CompletionError};
pub use continuation::Continuation;
pub use coordinator::Join;
pub use phase::{JoinPhase, JoinStats};
pub use tree::{NodeId, ResultTree, Slot};
