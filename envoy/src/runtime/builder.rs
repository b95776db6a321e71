use super::alloc::FrameAllocatorRef;
use super::awaitable::IoRunnable;
use super::driver::run_in;
use super::env::Environment;
use super::executor::ExecutorRef;
use super::stop::StopToken;
use crate::error::Result;

use std::fmt;
use std::sync::Arc;

/// Builder for configuring and running a root task.
///
/// `Runner` gathers the parts of the environment a root task runs under:
/// the executor, the stop token and the frame allocator. Anything left
/// unset falls back to the same defaults as [`run_sync`](crate::run_sync).
///
/// # Examples
///
/// ```rust,ignore
/// let source = StopSource::new();
///
/// let value = Runner::new(ExecutorRef::new(InlineExecutor::new()))
///     .stop_token(source.token())
///     .allocator(Arc::new(GlobalFrameAllocator))
///     .run(Task::new(|_| async { Ok(7) }))?;
/// ```
pub struct Runner {
    executor: ExecutorRef,
    stop_token: StopToken,
    allocator: Option<FrameAllocatorRef>,
}

impl Runner {
    /// Creates a runner for `executor` with no stop source and the ambient
    /// frame allocator.
    pub fn new(executor: ExecutorRef) -> Self {
        Self {
            executor,
            stop_token: StopToken::none(),
            allocator: None,
        }
    }

    /// Sets the stop token the root task observes.
    pub fn stop_token(mut self, stop_token: StopToken) -> Self {
        self.stop_token = stop_token;
        self
    }

    /// Sets the allocator every frame of the chain is served from.
    ///
    /// The root frame already exists when the runner starts it, so it keeps
    /// the allocator it was built with.
    pub fn allocator(mut self, allocator: FrameAllocatorRef) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Builds the environment and drives `task` to completion on the
    /// calling thread.
    pub fn run<R: IoRunnable>(self, task: R) -> Result<R::Value> {
        let mut env = Environment::new(self.executor).with_stop_token(self.stop_token);

        if let Some(allocator) = self.allocator {
            env = env.with_allocator(allocator);
        }

        run_in(env.shared(), task)
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("executor", &self.executor)
            .field("stop_token", &self.stop_token)
            .field("allocator", &self.allocator.as_ref().map(Arc::as_ptr))
            .finish()
    }
}
