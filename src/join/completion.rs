//! Awaitable join outcome
//!
//! Bridges the callback world to `async` code: the join's completion handler
//! feeds a oneshot channel and [`Completion`] resolves with what it received.

use super::coordinator::Join;
use crate::scheduler::Scheduler;
use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Errors produced by awaiting a [`Completion`]
#[derive(Debug, thiserror::Error)]
pub enum CompletionError<E> {
    /// The join finished with its first operation error
    #[error("join failed: {0}")]
    Failed(E),

    /// Every handle to the join was dropped before it finalized
    #[error("join abandoned before completion")]
    Abandoned,
}

/// Future resolving to the outcome of a join created by [`Join::completion`]
#[must_use = "futures do nothing unless polled"]
pub struct Completion<T, E> {
    receiver: oneshot::Receiver<Result<Vec<T>, E>>,
}

impl<T, E> Future for Completion<T, E> {
    type Output = Result<Vec<T>, CompletionError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(Ok(results))) => Poll::Ready(Ok(results)),
            Poll::Ready(Ok(Err(error))) => Poll::Ready(Err(CompletionError::Failed(error))),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(CompletionError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T: 'static, E: 'static> Join<T, E> {
    /// Create a join together with a future of its outcome
    pub fn completion(scheduler: Rc<dyn Scheduler>) -> (Self, Completion<T, E>) {
        let (sender, receiver) = oneshot::channel();
        let join = Join::new(scheduler, move |outcome| {
            // The receiver may be gone; nobody is waiting then
            let _ = sender.send(outcome);
        });
        (join, Completion { receiver })
    }
}
