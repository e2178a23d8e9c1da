//! Test harness for driving joins on a deterministic scheduler

use cps_join::{Continuation, Join, ManualScheduler};
use std::cell::RefCell;
use std::rc::Rc;

use super::strategies::TreeSpec;

pub type TestJoin = Join<i32, i32>;
pub type Outcomes = Rc<RefCell<Vec<Result<Vec<i32>, i32>>>>;

/// A join over `i32` results and `i32` errors that records every call of its
/// completion handler
pub struct JoinHarness {
    pub sched: Rc<ManualScheduler>,
    pub join: TestJoin,
    pub outcomes: Outcomes,
    /// Continuations registered through [`register_tree`](Self::register_tree)
    /// that were not completed yet
    pub pending: Rc<RefCell<Vec<Continuation<(), i32, i32>>>>,
}

impl JoinHarness {
    pub fn new() -> Self {
        let sched = Rc::new(ManualScheduler::new());
        let outcomes: Outcomes = Rc::new(RefCell::new(Vec::new()));

        let o = outcomes.clone();
        let join = Join::new(sched.clone(), move |outcome| o.borrow_mut().push(outcome));

        Self {
            sched,
            join,
            outcomes,
            pending: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register `spec` at the root. Its callback registers the children.
    pub fn register_tree(&self, spec: TreeSpec) {
        register_node(&self.join, spec, self.pending.clone());
    }

    /// Remove the `pick`-th (modulo length) pending continuation
    pub fn take_pending(&self, pick: usize) -> Option<Continuation<(), i32, i32>> {
        let mut pending = self.pending.borrow_mut();
        if pending.is_empty() {
            return None;
        }
        let index = pick % pending.len();
        Some(pending.remove(index))
    }

    pub fn outcomes(&self) -> Vec<Result<Vec<i32>, i32>> {
        self.outcomes.borrow().clone()
    }
}

fn register_node(
    scope: &TestJoin,
    spec: TreeSpec,
    pending: Rc<RefCell<Vec<Continuation<(), i32, i32>>>>,
) {
    let queue = pending.clone();
    let cont = scope
        .register(move |scope: &TestJoin, ()| {
            for child in spec.children {
                register_node(scope, child, queue.clone());
            }
            spec.value
        })
        .expect("join accepts registrations until it finalizes");
    pending.borrow_mut().push(cont);
}
