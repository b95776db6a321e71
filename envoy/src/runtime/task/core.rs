use super::handle::{FrameVTable, Header, TaskHandle};
use super::io::Io;
use super::record::Record;
use super::state::{COMPLETED, CREATED, FAILED, RUNNING, SUSPENDED};
use crate::error::{Error, ProtocolViolation, Result, violation};
use crate::runtime::alloc::frame::{allocate_frame, release_frame};
use crate::runtime::alloc::sync_frame_allocator;
use crate::runtime::awaitable::{IoAwaitable, IoRunnable};
use crate::runtime::env::Environment;

use std::alloc::{Layout, handle_alloc_error};
use std::cell::UnsafeCell;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::task::{Context, Poll};

use tracing::trace;

/// A task frame: the header every handle understands, followed by the body.
///
/// Frames are placed in memory obtained from the active frame allocator
/// and never move until they are destroyed.
#[repr(C)]
struct Frame<T, F> {
    header: Header<T>,

    /// The body future. `None` before construction finished and once the
    /// body reached a terminal state.
    body: UnsafeCell<Option<F>>,
}

/// Holder for the per-body vtable, so it can be promoted to `'static`.
struct FrameVTableFor<T, F>(PhantomData<(T, F)>);

impl<T, F> FrameVTableFor<T, F>
where
    F: Future<Output = Result<T>>,
{
    const VTABLE: FrameVTable = FrameVTable {
        resume: resume_raw::<T, F>,
        destroy: destroy_raw::<T, F>,
    };
}

/// Polls the body of the frame at `ptr` once.
///
/// # Safety
///
/// `ptr` must point to a live `Frame<T, F>` that nobody else is resuming.
unsafe fn resume_raw<T, F>(ptr: NonNull<()>, cx: &mut Context<'_>) -> Poll<()>
where
    F: Future<Output = Result<T>>,
{
    let frame = unsafe { ptr.cast::<Frame<T, F>>().as_ref() };
    let record = &frame.header.record;

    match record.state.get() {
        SUSPENDED => {}
        CREATED => violation("task resumed before an environment was installed"),
        RUNNING => violation("task resumed while already running"),
        COMPLETED | FAILED => violation("task resumed after it finished"),
        state => unreachable!("invalid task state {state}"),
    }

    record.state.set(RUNNING);

    // Frames created by the body come from the chain's allocator, even if
    // this resumption happens on a different thread than the last one.
    sync_frame_allocator(record.environment().and_then(|env| env.allocator()));

    // Safety: the RUNNING state gives this call exclusive access to the body.
    let body = unsafe { &mut *frame.body.get() };
    let future = body.as_mut().expect("task body missing while suspended");

    // Safety: the frame never moves, so neither does the body.
    let future = unsafe { Pin::new_unchecked(future) };

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| future.poll(cx))) {
        Ok(Poll::Pending) => {
            record.state.set(SUSPENDED);
            return Poll::Pending;
        }
        Ok(Poll::Ready(outcome)) => outcome,
        // Misuse is not a failure of this task: keep unwinding.
        Err(payload) if payload.is::<ProtocolViolation>() => panic::resume_unwind(payload),
        Err(payload) => Err(Error::from_panic(payload)),
    };

    // Locals of the body go away as soon as it finishes.
    *body = None;
    record.complete(outcome);

    Poll::Ready(())
}

/// Drops the frame at `ptr` and releases its memory.
///
/// # Safety
///
/// `ptr` must point to a live `Frame<T, F>` that is not used afterwards.
unsafe fn destroy_raw<T, F>(ptr: NonNull<()>)
where
    F: Future<Output = Result<T>>,
{
    let frame = ptr.cast::<Frame<T, F>>().as_ptr();

    unsafe {
        // The body goes first: it may still hold values borrowed from the
        // environment slot of the header.
        ptr::drop_in_place((*frame).body.get());
        ptr::drop_in_place(&raw mut (*frame).header);

        release_frame(ptr.cast(), Layout::new::<Frame<T, F>>());
    }

    trace!(frame = ?ptr, "task frame destroyed");
}

/// A lazy, single-owner asynchronous computation.
///
/// A `Task` owns exactly one frame. Building it allocates the frame from
/// the active frame allocator but runs nothing: the body starts when the
/// task is first awaited through [`Io::wait`] or driven by
/// [`run_sync`](crate::run_sync).
///
/// Tasks are not `Clone`. Moving one transfers ownership of the frame;
/// [`std::mem::take`] leaves a null task behind. Dropping a task that still
/// owns its frame destroys the frame, including a body that never ran.
///
/// A failure in the body (an `Err` or a panic) is captured and only
/// surfaces when the result is retrieved. A task that is dropped without
/// anyone looking at its result silently discards its failure.
///
/// # Examples
///
/// ```rust,ignore
/// fn compute(x: i32) -> Task<i32> {
///     Task::new(move |io| async move {
///         let v = io.wait(envoy::ready(x * 10)).await;
///         Ok(v + 1)
///     })
/// }
/// ```
#[must_use = "tasks do nothing unless awaited or driven"]
pub struct Task<T> {
    handle: Option<TaskHandle<T>>,
}

// Safety: frames are only built from `Send` bodies, and the task is the
// sole owner of its frame.
unsafe impl<T: Send> Send for Task<T> {}

impl<T> Unpin for Task<T> {}

impl<T: 'static> Task<T> {
    /// Builds a task from a body.
    ///
    /// `body` receives the [`Io`] handle of the new task and returns the
    /// future to run. It is called right away, but the returned future is
    /// not polled until the task is started.
    ///
    /// Aborts through [`handle_alloc_error`] if the frame cannot be
    /// allocated; see [`try_new`](Self::try_new) for a fallible version.
    pub fn new<B, F>(body: B) -> Self
    where
        B: FnOnce(Io) -> F,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        match Self::try_new(body) {
            Ok(task) => task,
            Err(_) => handle_alloc_error(Layout::new::<Frame<T, F>>()),
        }
    }

    /// Builds a task from a body, reporting allocation failure as
    /// [`Error::AllocFailed`].
    pub fn try_new<B, F>(body: B) -> Result<Self>
    where
        B: FnOnce(Io) -> F,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let frame = allocate_frame(Layout::new::<Frame<T, F>>())?.cast::<Frame<T, F>>();

        // Safety: the block is fresh and large enough for a `Frame<T, F>`.
        unsafe {
            frame.as_ptr().write(Frame {
                header: Header {
                    vtable: &FrameVTableFor::<T, F>::VTABLE,
                    record: Record::new(),
                },
                body: UnsafeCell::new(None),
            });
        }

        // From here on the task owns the frame, so a panicking body
        // constructor still releases it.
        let task = Self {
            handle: Some(TaskHandle::from_header(frame.cast())),
        };

        let frame = unsafe { frame.as_ref() };
        let io = Io::new(frame.header.record.env_slot());
        let future = body(io);

        // Safety: nobody can resume the task before `try_new` returns.
        unsafe { *frame.body.get() = Some(future) };

        trace!(frame = ?task.handle, "task created");

        Ok(task)
    }
}

impl<T> Task<T> {
    /// Returns the frame handle, or `None` for a null or released task.
    pub fn handle(&self) -> Option<TaskHandle<T>> {
        self.handle
    }

    /// Returns `true` if the task owns no frame.
    pub fn is_null(&self) -> bool {
        self.handle.is_none()
    }

    /// Returns `true` once the body reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.handle.is_some_and(|handle| unsafe { handle.is_done() })
    }

    /// Returns the captured failure, if the body failed.
    pub fn failure(&self) -> Option<&Error> {
        let handle = self.handle?;

        // Safety: the frame is owned by `self` and `take_result` needs
        // `&mut self`.
        unsafe { handle.failure() }
    }

    /// Gives up ownership of the frame.
    ///
    /// The task becomes null; the caller must destroy the frame through the
    /// returned handle.
    pub fn release(&mut self) -> Option<TaskHandle<T>> {
        self.handle.take()
    }

    /// Retrieves the outcome of a finished task.
    ///
    /// Returns the captured failure if there is one, otherwise moves the
    /// value out. Any later call returns [`Error::ResultTaken`].
    ///
    /// # Panics
    ///
    /// Unwinds with a [`ProtocolViolation`] if the task is null or has not
    /// finished.
    pub fn take_result(&mut self) -> Result<T> {
        let Some(handle) = self.handle else {
            violation("result requested from a null or released task");
        };

        // Safety: the frame is owned by `self`.
        unsafe { handle.take_result() }
    }
}

impl<T> Default for Task<T> {
    /// Returns a null task.
    fn default() -> Self {
        Self { handle: None }
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Safety: the task owned the frame and gives it up here.
            unsafe { handle.destroy() };
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("handle", &self.handle)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<T> IoAwaitable for Task<T> {
    type Output = Result<T>;

    /// Starts or continues the task under the awaiting party's environment.
    ///
    /// The first poll records the continuation and forwards `env` into the
    /// task before handing control to it.
    ///
    /// # Panics
    ///
    /// Unwinds with a [`ProtocolViolation`] if the task is null or was
    /// released. Enclosing tasks do not capture it.
    fn poll_io(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        env: &Arc<Environment>,
    ) -> Poll<Result<T>> {
        let this = self.get_mut();
        let Some(handle) = this.handle else {
            violation("awaited a null or released task");
        };

        // Safety: the frame is owned by `this`.
        let record = unsafe { handle.record() };

        match record.state.get() {
            CREATED => {
                record.set_continuation(cx.waker());
                record.install_environment(env.clone());
            }
            COMPLETED | FAILED => return Poll::Ready(this.take_result()),
            _ => record.set_continuation(cx.waker()),
        }

        match unsafe { handle.resume(cx) } {
            Poll::Pending => Poll::Pending,
            Poll::Ready(()) => Poll::Ready(this.take_result()),
        }
    }
}

impl<T> IoRunnable for Task<T> {
    type Value = T;

    fn handle(&self) -> Option<TaskHandle<T>> {
        Task::handle(self)
    }

    fn failure(&self) -> Option<&Error> {
        Task::failure(self)
    }

    fn release(&mut self) -> Option<TaskHandle<T>> {
        Task::release(self)
    }

    fn take_result(&mut self) -> Result<T> {
        Task::take_result(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::{ExecutorRef, InlineExecutor};

    use std::task::Waker;

    fn env() -> Arc<Environment> {
        Environment::new(ExecutorRef::new(InlineExecutor::new())).shared()
    }

    #[test]
    fn continuation_is_consumed_on_completion() {
        let mut task = Task::new(|_io| async { Ok(5) });
        let env = env();
        let mut cx = Context::from_waker(Waker::noop());

        let handle = task.handle().unwrap();
        let poll = Pin::new(&mut task).poll_io(&mut cx, &env);

        assert!(matches!(poll, Poll::Ready(Ok(5))));

        let record = unsafe { handle.record() };
        assert!(record.take_continuation().is_none());
        assert_eq!(record.state.get(), COMPLETED);
    }

    #[test]
    fn body_is_not_run_before_start() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let task = Task::new(move |_io| async move {
            flag.store(true, Ordering::Release);
            Ok(())
        });

        assert!(!task.is_finished());
        drop(task);
        assert!(!ran.load(Ordering::Acquire));
    }

    fn violation_of(f: impl FnOnce()) -> &'static str {
        let payload = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_err();
        payload.downcast_ref::<ProtocolViolation>().unwrap().message()
    }

    #[test]
    fn resuming_without_environment_is_a_violation() {
        let task = Task::new(|_io| async { Ok(()) });
        let mut cx = Context::from_waker(Waker::noop());

        let message = violation_of(|| {
            let _ = unsafe { task.handle().unwrap().resume(&mut cx) };
        });

        assert_eq!(message, "task resumed before an environment was installed");
    }

    #[test]
    fn awaiting_a_released_task_is_a_violation() {
        let mut task = Task::new(|_io| async { Ok(()) });
        let handle = task.release().unwrap();
        let env = env();
        let mut cx = Context::from_waker(Waker::noop());

        unsafe { handle.destroy() };

        let message = violation_of(|| {
            let _ = Pin::new(&mut task).poll_io(&mut cx, &env);
        });

        assert_eq!(message, "awaited a null or released task");
    }

    #[test]
    fn violation_in_a_child_is_not_captured_by_the_parent() {
        let mut parent = Task::new(|io| async move {
            let swallowed = io.wait(Task::<i32>::default()).await;
            Ok(swallowed.is_err())
        });
        let handle = parent.handle().unwrap();
        let env = env();
        let mut cx = Context::from_waker(Waker::noop());

        let message = violation_of(|| {
            let _ = Pin::new(&mut parent).poll_io(&mut cx, &env);
        });

        assert_eq!(message, "awaited a null or released task");

        let record = unsafe { handle.record() };
        assert_eq!(record.state.get(), RUNNING);
        assert!(unsafe { record.failure() }.is_none());
    }
}
