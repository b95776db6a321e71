use super::alloc::{FrameAllocatorGuard, current_frame_allocator};
use super::awaitable::IoRunnable;
use super::env::Environment;
use super::executor::ExecutorRef;
use super::stop::StopToken;
use super::task::TaskHandle;
use super::task::waker::{Parker, parker_waker};
use crate::error::{Result, violation};

use std::sync::Arc;
use std::task::Context;

use tracing::debug;

/// Runs a root task to completion on the calling thread.
///
/// The task runs under a fresh environment made of `executor`, a token on
/// which no stop can be requested, and the ambient frame allocator.
///
/// Returns the task's value, or the failure captured from its body.
///
/// # Panics
///
/// Unwinds with a [`ProtocolViolation`](crate::ProtocolViolation) if `task`
/// is null, was released, or was already started.
///
/// # Examples
///
/// ```rust,ignore
/// let executor = ExecutorRef::new(InlineExecutor::new());
/// let value = run_sync(executor, Task::new(|_| async { Ok(42) }))?;
/// assert_eq!(value, 42);
/// ```
pub fn run_sync<R: IoRunnable>(executor: ExecutorRef, task: R) -> Result<R::Value> {
    run_sync_with(executor, StopToken::none(), task)
}

/// Same as [`run_sync`], with a stop token the task can observe.
pub fn run_sync_with<R: IoRunnable>(
    executor: ExecutorRef,
    stop_token: StopToken,
    task: R,
) -> Result<R::Value> {
    run_in(
        Environment::new(executor)
            .with_stop_token(stop_token)
            .shared(),
        task,
    )
}

/// Drives `task` under `env` until it reaches a terminal state.
///
/// The thread parks while the task is suspended; any wake of the root
/// continuation unparks it and the frame is resumed from this thread.
pub(crate) fn run_in<R: IoRunnable>(env: Arc<Environment>, mut task: R) -> Result<R::Value> {
    let Some(handle) = task.release() else {
        violation("driven a null or released task");
    };
    let frame = OwnedFrame(handle);
    drop(task);

    // Safety: the frame is alive until `frame` is dropped.
    unsafe { handle.set_environment(env.clone()) };

    let _work = WorkGuard::new(env.executor());
    let _allocator = FrameAllocatorGuard::new(current_frame_allocator());

    debug!(
        frame = ?handle.addr(),
        executor = ?env.executor(),
        stop_possible = env.stop_token().is_stop_possible(),
        "driver started"
    );

    let parker = Parker::current();
    let waker = parker_waker(parker.clone());
    let mut cx = Context::from_waker(&waker);

    while unsafe { handle.resume(&mut cx) }.is_pending() {
        parker.park();
    }

    let result = unsafe { handle.take_result() };
    debug!(frame = ?handle.addr(), ok = result.is_ok(), "driver finished");

    drop(frame);
    result
}

/// A released frame kept by the driver, destroyed on every exit path.
struct OwnedFrame<T>(TaskHandle<T>);

impl<T> Drop for OwnedFrame<T> {
    fn drop(&mut self) {
        // Safety: the driver took the frame out of its task and nobody
        // else destroys it.
        unsafe { self.0.destroy() };
    }
}

/// Keeps the executor's outstanding work count raised for a root run.
struct WorkGuard<'a>(&'a ExecutorRef);

impl<'a> WorkGuard<'a> {
    fn new(executor: &'a ExecutorRef) -> Self {
        executor.on_work_started();
        Self(executor)
    }
}

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        self.0.on_work_finished();
    }
}
