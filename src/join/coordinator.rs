//! # Join Coordinator
//!
//! Tracks outstanding continuations, records their results in a
//! [`ResultTree`], and asks the [`Scheduler`] to run the completion handler
//! exactly once: when every continuation settled, or as soon as one reports an
//! error.
//!
//! ## Scopes
//!
//! A [`Join`] handle is a cursor into the result tree. The handle returned by
//! [`Join::new`] registers at the root. A callback receives a handle positioned
//! at its own node, so everything it registers (immediately, or later from a
//! clone moved into an asynchronous follow-up) becomes its child and is
//! ordered before its own result.
//!
//! ## Finalization
//!
//! Finalization is always deferred through the scheduler, even when every
//! continuation ran synchronously. Registering new work while a finalization
//! is armed cancels it; it is armed again once the new work settles.

use super::continuation::{Callback, Continuation};
use super::phase::{JoinPhase, JoinStats};
use super::tree::{NodeId, ResultTree, Slot};
use crate::error::{JoinError, Result};
use crate::logging::{log_contract_violation, log_join_operation};
use crate::scheduler::{DeferHandle, Scheduler};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static JOIN_SEQ: AtomicU64 = AtomicU64::new(1);

type DoneHandler<T, E, C> = Box<dyn FnOnce(&C, std::result::Result<Vec<T>, E>)>;

struct JoinState<T, E, C> {
    name: String,
    /// Continuations handed out and not invoked yet.
    pending: usize,
    /// Set once, right before `on_done` runs.
    finalized: bool,
    /// First reported error. Taken when the join finalizes.
    first_error: Option<E>,
    tree: ResultTree<T>,
    /// Armed, not yet run, finalization.
    finalization: Option<DeferHandle>,
    on_done: Option<DoneHandler<T, E, C>>,
    stats: JoinStats,
}

impl<T, E, C> JoinState<T, E, C> {
    /// Results can no longer change the outcome
    fn short_circuited(&self) -> bool {
        self.finalized || self.first_error.is_some()
    }

    fn phase(&self) -> JoinPhase {
        if self.finalized {
            JoinPhase::Finalized
        } else if self.finalization.is_none() {
            JoinPhase::Open
        } else if self.first_error.is_some() {
            JoinPhase::Erroring
        } else {
            JoinPhase::Draining
        }
    }
}

/// Handle to a join, positioned at one node of its result tree
///
/// Cloning is cheap; clones share the same join and cursor.
pub struct Join<T, E, C = ()> {
    state: Rc<RefCell<JoinState<T, E, C>>>,
    scheduler: Rc<dyn Scheduler>,
    context: Rc<C>,
    cursor: NodeId,
}

impl<T, E, C> Clone for Join<T, E, C> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            scheduler: Rc::clone(&self.scheduler),
            context: Rc::clone(&self.context),
            cursor: self.cursor,
        }
    }
}

impl<T, E, C> fmt::Debug for Join<T, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Join")
            .field("name", &state.name)
            .field("cursor", &self.cursor)
            .field("phase", &state.phase())
            .field("pending", &state.pending)
            .finish()
    }
}

impl<T: 'static, E: 'static> Join<T, E> {
    /// Create a join whose handler receives the first error or every result
    pub fn new<F>(scheduler: Rc<dyn Scheduler>, on_done: F) -> Self
    where
        F: FnOnce(std::result::Result<Vec<T>, E>) + 'static,
    {
        Self::with_context(scheduler, (), move |_, outcome| on_done(outcome))
    }
}

impl<T: 'static, E: 'static, C: 'static> Join<T, E, C> {
    /// Create a join sharing `context` with every callback and with `on_done`
    pub fn with_context<F>(scheduler: Rc<dyn Scheduler>, context: C, on_done: F) -> Self
    where
        F: FnOnce(&C, std::result::Result<Vec<T>, E>) + 'static,
    {
        let name = format!("join-{}", JOIN_SEQ.fetch_add(1, Ordering::Relaxed));
        debug!(join = %name, "created join");

        Self {
            state: Rc::new(RefCell::new(JoinState {
                name,
                pending: 0,
                finalized: false,
                first_error: None,
                tree: ResultTree::new(),
                finalization: None,
                on_done: Some(Box::new(on_done)),
                stats: JoinStats::default(),
            })),
            scheduler,
            context: Rc::new(context),
            cursor: NodeId::ROOT,
        }
    }

    /// Rename the join in log events and errors
    pub fn named(self, name: impl Into<String>) -> Self {
        self.state.borrow_mut().name = name.into();
        self
    }

    /// Register an operation
    ///
    /// The returned continuation must be invoked once with the operation's
    /// outcome. On success `callback` runs with a handle positioned at the new
    /// node and the value; its return value is recorded as the node's result.
    /// After the first error an inert continuation is returned instead.
    pub fn register<A, F>(&self, callback: F) -> Result<Continuation<A, T, E, C>>
    where
        A: 'static,
        F: FnOnce(&Join<T, E, C>, A) -> Option<T> + 'static,
    {
        self.register_boxed(Box::new(callback))
    }

    /// Register an operation whose success value is itself the result
    pub fn register_value(&self) -> Result<Continuation<T, T, E, C>> {
        self.register_boxed(Box::new(|_, value| Some(value)))
    }

    fn register_boxed<A: 'static>(
        &self,
        callback: Callback<A, T, E, C>,
    ) -> Result<Continuation<A, T, E, C>> {
        let (node, canceled) = {
            let mut state = self.state.borrow_mut();

            if state.finalized {
                let err = JoinError::ReusedAfterCompletion {
                    join: state.name.clone(),
                };
                log_contract_violation(&state.name, "register", &err.to_string());
                return Err(err);
            }

            if state.first_error.is_some() {
                state.stats.inert_registrations += 1;
                debug!(join = %state.name, "join already failed; handing out inert continuation");
                return Ok(Continuation::inert());
            }

            let node = state.tree.add_child(self.cursor);
            state.pending += 1;
            state.stats.registered += 1;

            let canceled = state.finalization.take();
            if canceled.is_some() {
                state.stats.finalizations_canceled += 1;
            }

            debug!(
                join = %state.name,
                node = %node,
                parent = %self.cursor,
                pending = state.pending,
                "registered continuation"
            );
            (node, canceled)
        };

        if let Some(handle) = canceled {
            debug!(handle = %handle, "new work arrived; canceled armed finalization");
            self.scheduler.cancel(handle);
        }

        Ok(Continuation::bound(self.at(node), node, callback))
    }

    /// Settle `node` with the outcome of its continuation's first invocation
    pub(crate) fn settle<A>(
        &self,
        node: NodeId,
        outcome: std::result::Result<A, E>,
        callback: Option<Callback<A, T, E, C>>,
    ) {
        let value = {
            let mut state = self.state.borrow_mut();
            state.pending -= 1;
            state.stats.settled += 1;

            if state.short_circuited() {
                state.tree.settle(node, Slot::Vacant);
                state.stats.dropped_results += 1;
                warn!(
                    join = %state.name,
                    node = %node,
                    failed = outcome.is_err(),
                    "join already failed; dropping continuation outcome"
                );
                return;
            }

            match outcome {
                Ok(value) => Some(value),
                Err(error) => {
                    state.first_error = Some(error);
                    state.tree.settle(node, Slot::Vacant);
                    warn!(
                        join = %state.name,
                        node = %node,
                        pending = state.pending,
                        "🔴 operation failed; join short-circuits"
                    );
                    None
                }
            }
        };

        if let Some(value) = value {
            // No borrow held: the callback may register on `self`
            let result = callback.and_then(|callback| callback(self, value));

            let mut state = self.state.borrow_mut();
            let slot = if state.first_error.is_some() {
                Slot::Vacant
            } else {
                Slot::from(result)
            };
            debug!(
                join = %state.name,
                node = %node,
                has_result = slot.has_result(),
                pending = state.pending,
                "continuation settled"
            );
            state.tree.settle(node, slot);
        }

        self.arm_if_done();
    }

    /// Arm the deferred finalization once an error is recorded or nothing is pending
    fn arm_if_done(&self) {
        let previous = {
            let mut state = self.state.borrow_mut();
            if state.finalized || (state.first_error.is_none() && state.pending > 0) {
                return;
            }
            let previous = state.finalization.take();
            if previous.is_some() {
                state.stats.finalizations_canceled += 1;
            }
            previous
        };

        if let Some(handle) = previous {
            self.scheduler.cancel(handle);
        }

        let join = self.clone();
        let handle = self.scheduler.defer(Box::new(move || join.finalize()));

        let mut state = self.state.borrow_mut();
        state.finalization = Some(handle);
        state.stats.finalizations_armed += 1;
        debug!(
            join = %state.name,
            handle = %handle,
            phase = %state.phase(),
            "armed finalization"
        );
    }

    fn finalize(&self) {
        let (on_done, outcome, name) = {
            let mut state = self.state.borrow_mut();
            if state.finalized {
                return;
            }
            state.finalization = None;
            state.finalized = true;

            let outcome = match state.first_error.take() {
                Some(error) => Err(error),
                None => Ok(std::mem::take(&mut state.tree).flatten()),
            };
            (state.on_done.take(), outcome, state.name.clone())
        };

        let status = if outcome.is_ok() { "complete" } else { "error" };
        let details = match &outcome {
            Ok(results) => Some(format!("{} results", results.len())),
            Err(_) => None,
        };
        log_join_operation("finalize", &name, 0, status, details.as_deref());

        if let Some(on_done) = on_done {
            on_done(&self.context, outcome);
        }
    }

    fn at(&self, cursor: NodeId) -> Self {
        Self {
            cursor,
            ..self.clone()
        }
    }
}

impl<T, E, C> Join<T, E, C> {
    /// Handle to the same join positioned at the root
    pub fn root(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            scheduler: Rc::clone(&self.scheduler),
            context: Rc::clone(&self.context),
            cursor: NodeId::ROOT,
        }
    }

    /// Node new registrations attach under
    pub fn cursor(&self) -> NodeId {
        self.cursor
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn phase(&self) -> JoinPhase {
        self.state.borrow().phase()
    }

    /// Continuations handed out and not invoked yet
    pub fn pending(&self) -> usize {
        self.state.borrow().pending
    }

    pub fn is_finalized(&self) -> bool {
        self.state.borrow().finalized
    }

    pub fn stats(&self) -> JoinStats {
        self.state.borrow().stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::cell::Cell;

    type Outcome = Rc<RefCell<Vec<std::result::Result<Vec<i32>, i32>>>>;

    fn join_with_probe(sched: &Rc<ManualScheduler>) -> (Join<i32, i32>, Outcome) {
        let outcomes: Outcome = Rc::new(RefCell::new(Vec::new()));
        let o = outcomes.clone();
        let join = Join::new(sched.clone(), move |outcome| o.borrow_mut().push(outcome));
        (join, outcomes)
    }

    #[test]
    fn test_single_task_result() {
        let sched = Rc::new(ManualScheduler::new());
        let (join, outcomes) = join_with_probe(&sched);

        let cont = join.register(|_, ()| Some(42)).unwrap();
        cont.resolve(()).unwrap();

        // Never synchronous
        assert!(outcomes.borrow().is_empty());
        assert_eq!(join.phase(), JoinPhase::Draining);

        sched.run_until_idle();
        assert_eq!(*outcomes.borrow(), vec![Ok(vec![42])]);
        assert_eq!(join.phase(), JoinPhase::Finalized);
    }

    #[test]
    fn test_nested_results_precede_parent() {
        let sched = Rc::new(ManualScheduler::new());
        let (join, outcomes) = join_with_probe(&sched);
        let children = Rc::new(RefCell::new(Vec::new()));

        let kids = children.clone();
        let parent = join
            .register(move |scope: &Join<i32, i32>, ()| {
                kids.borrow_mut().push(scope.register(|_, ()| Some(1)).unwrap());
                kids.borrow_mut().push(scope.register(|_, ()| Some(2)).unwrap());
                Some(3)
            })
            .unwrap();

        parent.resolve(()).unwrap();
        assert_eq!(join.pending(), 2);

        // Complete the second child first
        let second = children.borrow()[1].clone();
        let first = children.borrow()[0].clone();
        second.resolve(()).unwrap();
        first.resolve(()).unwrap();

        sched.run_until_idle();
        assert_eq!(*outcomes.borrow(), vec![Ok(vec![1, 2, 3])]);
    }

    #[test]
    fn test_first_error_wins() {
        let sched = Rc::new(ManualScheduler::new());
        let (join, outcomes) = join_with_probe(&sched);
        let ran = Rc::new(Cell::new(false));

        let r = ran.clone();
        let first = join
            .register(move |_, ()| {
                r.set(true);
                Some(1)
            })
            .unwrap();
        let second = join.register_value().unwrap();

        second.reject(42).unwrap();
        assert_eq!(join.phase(), JoinPhase::Erroring);

        first.resolve(()).unwrap();
        assert!(!ran.get());

        sched.run_until_idle();
        assert_eq!(*outcomes.borrow(), vec![Err(42)]);

        let stats = join.stats();
        assert_eq!(stats.registered, 2);
        assert_eq!(stats.settled, 2);
        assert_eq!(stats.dropped_results, 1);
    }

    #[test]
    fn test_registration_after_error_is_inert() {
        let sched = Rc::new(ManualScheduler::new());
        let (join, outcomes) = join_with_probe(&sched);

        join.register_value().unwrap().reject(7).unwrap();

        let late = join.register(|_, ()| Some(1)).unwrap();
        assert!(late.is_inert());
        late.resolve(()).unwrap();
        late.reject(8).unwrap();
        assert_eq!(join.pending(), 0);
        assert_eq!(join.stats().inert_registrations, 1);

        sched.run_until_idle();
        assert_eq!(*outcomes.borrow(), vec![Err(7)]);
    }

    #[test]
    fn test_new_work_cancels_armed_finalization() {
        let sched = Rc::new(ManualScheduler::new());
        let (join, outcomes) = join_with_probe(&sched);

        join.register(|_, ()| Some(1)).unwrap().resolve(()).unwrap();
        assert_eq!(join.phase(), JoinPhase::Draining);

        let late = join.register(|_, ()| Some(2)).unwrap();
        assert_eq!(join.phase(), JoinPhase::Open);
        assert!(sched.is_idle());

        sched.run_until_idle();
        assert!(outcomes.borrow().is_empty());

        late.resolve(()).unwrap();
        sched.run_until_idle();
        assert_eq!(*outcomes.borrow(), vec![Ok(vec![1, 2])]);

        let stats = join.stats();
        assert_eq!(stats.finalizations_armed, 2);
        assert_eq!(stats.finalizations_canceled, 1);
    }

    #[test]
    fn test_double_invocation_is_rejected() {
        let sched = Rc::new(ManualScheduler::new());
        let (join, outcomes) = join_with_probe(&sched);

        let cont = join.register_value().unwrap();
        let copy = cont.clone();
        cont.resolve(42).unwrap();

        let err = copy.resolve(43).unwrap_err();
        assert!(matches!(err, JoinError::InvokedMoreThanOnce { .. }));
        assert!(cont.is_invoked());

        sched.run_until_idle();
        assert_eq!(*outcomes.borrow(), vec![Ok(vec![42])]);
    }

    #[test]
    fn test_reuse_after_completion_is_rejected() {
        let sched = Rc::new(ManualScheduler::new());
        let (join, _outcomes) = join_with_probe(&sched);

        join.register_value().unwrap().resolve(1).unwrap();
        sched.run_until_idle();

        let err = join.register_value().unwrap_err();
        assert!(matches!(err, JoinError::ReusedAfterCompletion { .. }));
    }

    #[test]
    fn test_vacuous_join_never_completes() {
        let sched = Rc::new(ManualScheduler::new());
        let (join, outcomes) = join_with_probe(&sched);

        sched.run_until_idle();
        assert!(outcomes.borrow().is_empty());
        assert_eq!(join.phase(), JoinPhase::Open);
    }

    #[test]
    fn test_context_is_shared() {
        let sched = Rc::new(ManualScheduler::new());
        let seen = Rc::new(Cell::new(0));

        let s = seen.clone();
        let join: Join<i32, (), i32> =
            Join::with_context(sched.clone(), 10, move |ctx: &i32, outcome| {
                let total: i32 = outcome.unwrap().iter().sum();
                s.set(total + *ctx);
            });

        join.register(|scope: &Join<i32, (), i32>, x: i32| Some(x * *scope.context()))
            .unwrap()
            .resolve(4)
            .unwrap();

        sched.run_until_idle();
        assert_eq!(seen.get(), 50);
    }

    #[test]
    fn test_named_join_appears_in_errors() {
        let sched = Rc::new(ManualScheduler::new());
        let join: Join<i32, i32> = Join::new(sched.clone(), |_| {}).named("fetch-users");
        assert_eq!(join.name(), "fetch-users");

        let cont = join.register_value().unwrap();
        cont.resolve(1).unwrap();
        let err = cont.resolve(2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "continuation #1 of join 'fetch-users' called more than once"
        );
    }
}
