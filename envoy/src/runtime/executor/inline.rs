use super::core::Executor;
use crate::runtime::context::ExecutionContext;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::Waker;

/// Shared state behind every clone of an [`InlineExecutor`].
struct Shared {
    /// Context owned by this executor.
    context: ExecutionContext,

    /// Number of outstanding units of work.
    outstanding: AtomicUsize,
}

/// An executor that resumes everything on the calling thread.
///
/// [`dispatch`](Executor::dispatch) always hands the continuation back for
/// inline resumption and [`post`](Executor::post) wakes it immediately.
/// This is the executor used by the synchronous driver when no event loop
/// exists.
#[derive(Clone)]
pub struct InlineExecutor {
    shared: Arc<Shared>,
}

impl InlineExecutor {
    /// Creates an inline executor with its own execution context.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                context: ExecutionContext::new(),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the number of work units started but not yet finished.
    pub fn outstanding_work(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }
}

impl Default for InlineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for InlineExecutor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for InlineExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineExecutor")
            .field("context", &self.shared.context)
            .field("outstanding", &self.outstanding_work())
            .finish()
    }
}

impl Executor for InlineExecutor {
    fn context(&self) -> &ExecutionContext {
        &self.shared.context
    }

    fn on_work_started(&self) {
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    fn on_work_finished(&self) {
        self.shared.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    fn dispatch(&self, continuation: Waker) -> Option<Waker> {
        Some(continuation)
    }

    fn post(&self, continuation: Waker) {
        self.shared.context.enter(|| continuation.wake());
    }
}
