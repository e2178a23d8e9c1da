use super::coordinator::Join;
use super::tree::NodeId;
use crate::error::{JoinError, Result};
use crate::logging::log_contract_violation;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub(crate) type Callback<A, T, E, C> = Box<dyn FnOnce(&Join<T, E, C>, A) -> Option<T>>;

struct Binding<A, T, E, C> {
    /// Handle positioned at `node`; handed to the callback as its scope.
    scope: Join<T, E, C>,
    node: NodeId,
    invoked: Cell<bool>,
    callback: RefCell<Option<Callback<A, T, E, C>>>,
}

/// Completion function for one registered operation
///
/// Pass it (or a clone) to whatever reports the operation's outcome and call
/// [`complete`](Self::complete) exactly once. Clones share the invoked flag,
/// so calling any two of them is a second invocation.
pub struct Continuation<A, T, E, C = ()> {
    /// `None` for continuations handed out after the join failed.
    binding: Option<Rc<Binding<A, T, E, C>>>,
}

impl<A, T, E, C> Clone for Continuation<A, T, E, C> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
        }
    }
}

impl<A, T, E, C> fmt::Debug for Continuation<A, T, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Some(binding) => f
                .debug_struct("Continuation")
                .field("node", &binding.node)
                .field("invoked", &binding.invoked.get())
                .finish(),
            None => f.write_str("Continuation(inert)"),
        }
    }
}

impl<A, T, E, C> Continuation<A, T, E, C> {
    pub(crate) fn inert() -> Self {
        Self { binding: None }
    }

    pub(crate) fn bound(scope: Join<T, E, C>, node: NodeId, callback: Callback<A, T, E, C>) -> Self {
        Self {
            binding: Some(Rc::new(Binding {
                scope,
                node,
                invoked: Cell::new(false),
                callback: RefCell::new(Some(callback)),
            })),
        }
    }

    /// Handed out after the join failed; every call is silently ignored
    pub fn is_inert(&self) -> bool {
        self.binding.is_none()
    }

    pub fn is_invoked(&self) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|binding| binding.invoked.get())
    }

    /// Tree node this continuation settles, if bound
    pub fn node(&self) -> Option<NodeId> {
        self.binding.as_ref().map(|binding| binding.node)
    }
}

impl<A: 'static, T: 'static, E: 'static, C: 'static> Continuation<A, T, E, C> {
    /// Report the operation's outcome
    ///
    /// Returns [`JoinError::InvokedMoreThanOnce`] when this continuation (or a
    /// clone of it) was already invoked; the outcome is discarded in that case.
    pub fn complete(&self, outcome: std::result::Result<A, E>) -> Result<()> {
        let Some(binding) = &self.binding else {
            return Ok(());
        };

        if binding.invoked.replace(true) {
            let join = binding.scope.name();
            let err = JoinError::InvokedMoreThanOnce {
                join: join.clone(),
                node: binding.node,
            };
            log_contract_violation(&join, "complete", &err.to_string());
            return Err(err);
        }

        let callback = binding.callback.borrow_mut().take();
        binding.scope.settle(binding.node, outcome, callback);
        Ok(())
    }

    pub fn resolve(&self, value: A) -> Result<()> {
        self.complete(Ok(value))
    }

    pub fn reject(&self, error: E) -> Result<()> {
        self.complete(Err(error))
    }
}
