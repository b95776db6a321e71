use crate::runtime::context::ExecutionContext;

use std::task::Waker;

/// A scheduler that can run or queue suspended work on some
/// [`ExecutionContext`].
///
/// The continuation handed to [`dispatch`](Self::dispatch) and
/// [`post`](Self::post) is a [`Waker`]: waking it resumes the suspended
/// computation.
///
/// Implementations must be cheap to clone (a clone names the same
/// scheduler) and none of the methods may panic.
pub trait Executor: Clone + PartialEq + Send + Sync + 'static {
    /// Returns the context this executor runs work on.
    ///
    /// The reference is stable for the lifetime of the executor.
    fn context(&self) -> &ExecutionContext;

    /// Records that a unit of outstanding work has started.
    fn on_work_started(&self);

    /// Records that a unit of outstanding work has finished.
    fn on_work_finished(&self);

    /// Resumes `continuation` as soon as possible.
    ///
    /// If the caller is already running on this executor's context, the
    /// continuation is returned unchanged and the caller resumes it inline.
    /// Otherwise the executor arranges the resumption itself and returns
    /// `None`.
    fn dispatch(&self, continuation: Waker) -> Option<Waker>;

    /// Schedules `continuation` for later resumption, possibly on another
    /// thread. Never resumes inline from within this call unless the
    /// executor has no other way to run work.
    fn post(&self, continuation: Waker);
}
