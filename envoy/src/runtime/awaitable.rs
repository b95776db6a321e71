//! The awaitable protocol.
//!
//! [`IoAwaitable`] is the consumer-facing capability: anything that can be
//! waited on by a task. Its single entry point receives both the
//! continuation (the waker in the `Context`) and the environment of the
//! chain, which is how the environment flows down to leaf operations.
//!
//! [`IoRunnable`] is the producer-facing capability of a first-class unit of
//! work with its own frame, failure and result. Only tasks implement it;
//! timers, I/O completions and immediate values only need `IoAwaitable`.

use crate::error::{Error, Result};
use crate::runtime::env::Environment;
use crate::runtime::task::TaskHandle;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Something that can be waited on by a task.
pub trait IoAwaitable {
    /// The value produced on completion.
    type Output;

    /// Suspension entry point.
    ///
    /// Returns `Ready` if the operation is complete. Otherwise the
    /// implementation arranges for `cx.waker()` to be woken once progress
    /// is possible and returns `Pending`. `env` is the environment of the
    /// awaiting chain and must be forwarded to anything this awaitable
    /// waits on in turn.
    fn poll_io(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        env: &Arc<Environment>,
    ) -> Poll<Self::Output>;
}

impl<A> IoAwaitable for &mut A
where
    A: IoAwaitable + Unpin + ?Sized,
{
    type Output = A::Output;

    fn poll_io(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        env: &Arc<Environment>,
    ) -> Poll<Self::Output> {
        Pin::new(&mut **self).poll_io(cx, env)
    }
}

impl<A> IoAwaitable for Pin<Box<A>>
where
    A: IoAwaitable + ?Sized,
{
    type Output = A::Output;

    fn poll_io(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        env: &Arc<Environment>,
    ) -> Poll<Self::Output> {
        self.get_mut().as_mut().poll_io(cx, env)
    }
}

/// A first-class resumable unit: an awaitable that owns a frame holding its
/// failure and result.
pub trait IoRunnable: IoAwaitable {
    /// The value produced by the computation.
    type Value;

    /// Returns the computation handle, or `None` once released.
    fn handle(&self) -> Option<TaskHandle<Self::Value>>;

    /// Returns the captured failure, if the computation failed.
    fn failure(&self) -> Option<&Error>;

    /// Gives up ownership of the frame.
    ///
    /// The caller becomes responsible for destroying it through the
    /// returned handle.
    fn release(&mut self) -> Option<TaskHandle<Self::Value>>;

    /// Retrieves the outcome of a finished computation.
    ///
    /// The captured failure, if any, is handed out first; otherwise the
    /// stored value is moved out. A second call returns
    /// [`Error::ResultTaken`].
    fn take_result(&mut self) -> Result<Self::Value>;
}

/// Returns an awaitable that is immediately ready with `value`.
pub fn ready<T>(value: T) -> Ready<T> {
    Ready(Some(value))
}

/// Awaitable returned by [`ready`].
#[derive(Debug, Clone)]
pub struct Ready<T>(Option<T>);

impl<T> Unpin for Ready<T> {}

impl<T> IoAwaitable for Ready<T> {
    type Output = T;

    fn poll_io(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _env: &Arc<Environment>,
    ) -> Poll<T> {
        Poll::Ready(
            self.get_mut()
                .0
                .take()
                .expect("`Ready` polled after completion"),
        )
    }
}
