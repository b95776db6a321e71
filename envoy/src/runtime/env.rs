use crate::runtime::alloc::FrameAllocatorRef;
use crate::runtime::executor::ExecutorRef;
use crate::runtime::stop::StopToken;

use std::fmt;
use std::sync::Arc;

/// The execution environment of an await chain.
///
/// An `Environment` bundles the executor handle, the cancellation token and
/// the frame allocator that every suspension point of a chain can rely on.
/// The driver builds it once per root task; it is then shared, never
/// copied, with every task and awaitable below the root through
/// [`IoAwaitable::poll_io`](crate::IoAwaitable::poll_io).
///
/// The environment is immutable once built.
pub struct Environment {
    executor: ExecutorRef,
    stop_token: StopToken,
    allocator: Option<FrameAllocatorRef>,
}

impl Environment {
    /// Builds an environment with no cancellation and the ambient allocator.
    pub fn new(executor: ExecutorRef) -> Self {
        Self {
            executor,
            stop_token: StopToken::none(),
            allocator: None,
        }
    }

    /// Replaces the cancellation token.
    pub fn with_stop_token(mut self, stop_token: StopToken) -> Self {
        self.stop_token = stop_token;
        self
    }

    /// Names the allocator for frames created inside this chain.
    pub fn with_allocator(mut self, allocator: FrameAllocatorRef) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Freezes the environment for sharing.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The executor work in this chain runs on.
    pub fn executor(&self) -> &ExecutorRef {
        &self.executor
    }

    /// The cancellation token observed by this chain.
    pub fn stop_token(&self) -> &StopToken {
        &self.stop_token
    }

    /// The frame allocator for this chain, or `None` for the ambient default.
    pub fn allocator(&self) -> Option<&FrameAllocatorRef> {
        self.allocator.as_ref()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("executor", &self.executor)
            .field("stop_token", &self.stop_token)
            .field("allocator", &self.allocator.as_ref().map(Arc::as_ptr))
            .finish()
    }
}
