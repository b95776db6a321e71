use super::record::EnvSlot;
use crate::error::violation;
use crate::runtime::alloc::{FrameAllocatorRef, sync_frame_allocator};
use crate::runtime::awaitable::IoAwaitable;
use crate::runtime::env::Environment;
use crate::runtime::executor::ExecutorRef;
use crate::runtime::stop::StopToken;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// The explicit context of a running task.
///
/// Every task body receives its own `Io`. It gives access to the
/// environment the task was started under and turns awaitables into
/// futures that forward that environment.
///
/// The environment is installed when the task is first awaited or driven,
/// so the accessors panic if called from code that runs while the body is
/// being built.
#[derive(Clone)]
pub struct Io {
    env: EnvSlot,
}

impl Io {
    pub(crate) fn new(env: EnvSlot) -> Self {
        Self { env }
    }

    fn env(&self) -> &Arc<Environment> {
        match self.env.get() {
            Some(env) => env,
            None => violation("task environment accessed before the task was started"),
        }
    }

    /// Returns the environment of this task.
    pub fn environment(&self) -> Arc<Environment> {
        self.env().clone()
    }

    /// Returns the executor this task runs on.
    pub fn executor(&self) -> ExecutorRef {
        self.env().executor().clone()
    }

    /// Returns the stop token of this task.
    pub fn stop_token(&self) -> StopToken {
        self.env().stop_token().clone()
    }

    /// Returns the frame allocator of this task's chain, if any.
    pub fn allocator(&self) -> Option<FrameAllocatorRef> {
        self.env().allocator().cloned()
    }

    /// Waits on an awaitable under this task's environment.
    ///
    /// ```rust,ignore
    /// let child = Task::new(|_| async { Ok(71) });
    /// let value = io.wait(child).await?;
    /// ```
    pub fn wait<A: IoAwaitable>(&self, awaitable: A) -> Wait<'_, A> {
        Wait {
            io: self,
            awaitable,
        }
    }
}

impl fmt::Debug for Io {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Io")
            .field("environment", &self.env.get())
            .finish()
    }
}

/// Future returned by [`Io::wait`].
#[must_use = "futures do nothing unless awaited"]
pub struct Wait<'a, A> {
    io: &'a Io,
    awaitable: A,
}

impl<A: IoAwaitable> Future for Wait<'_, A> {
    type Output = A::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<A::Output> {
        // Safety: `awaitable` is never moved out of the pinned `Wait`.
        let this = unsafe { self.get_unchecked_mut() };
        let env = this.io.env();
        let awaitable = unsafe { Pin::new_unchecked(&mut this.awaitable) };

        // A child task may have switched the thread's allocator while it
        // ran; frames built after this point belong to our chain again.
        sync_frame_allocator(env.allocator());
        let poll = awaitable.poll_io(cx, env);
        sync_frame_allocator(env.allocator());

        poll
    }
}

impl<A> fmt::Debug for Wait<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait").finish_non_exhaustive()
    }
}
