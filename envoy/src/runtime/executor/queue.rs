use super::core::Executor;
use crate::runtime::context::ExecutionContext;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Waker;

use tracing::trace;

/// Shared state behind every clone of a [`QueueExecutor`].
struct Shared {
    /// Context owned by this executor.
    context: ExecutionContext,

    /// Continuations waiting to be resumed, oldest first.
    queue: Mutex<VecDeque<Waker>>,

    /// Number of outstanding units of work.
    outstanding: AtomicUsize,
}

/// An executor that defers posted work to an explicit run loop.
///
/// Posted continuations are queued in FIFO order and only resumed when
/// someone calls [`run_pending`](Self::run_pending), possibly from another
/// thread. [`dispatch`](Executor::dispatch) resumes inline only when the
/// caller is already inside this executor's context.
#[derive(Clone)]
pub struct QueueExecutor {
    shared: Arc<Shared>,
}

impl QueueExecutor {
    /// Creates a queue executor with its own execution context.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                context: ExecutionContext::new(),
                queue: Mutex::new(VecDeque::new()),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Resumes every continuation queued so far, inside this executor's
    /// context.
    ///
    /// Continuations posted while draining are picked up in the same call.
    /// Returns the number of continuations resumed.
    pub fn run_pending(&self) -> usize {
        let mut resumed = 0;

        self.shared.context.enter(|| {
            loop {
                // The lock is released before waking so resumed work may post again.
                let next = self.shared.queue.lock().unwrap().pop_front();

                let Some(continuation) = next else {
                    break;
                };

                continuation.wake();
                resumed += 1;
            }
        });

        resumed
    }

    /// Returns the number of continuations waiting in the queue.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    /// Returns the number of work units started but not yet finished.
    pub fn outstanding_work(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }
}

impl Default for QueueExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for QueueExecutor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for QueueExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueExecutor")
            .field("context", &self.shared.context)
            .field("pending", &self.pending())
            .field("outstanding", &self.outstanding_work())
            .finish()
    }
}

impl Executor for QueueExecutor {
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
        if self.shared.context.running_in_this_thread() {
            return Some(continuation);
        }

        self.post(continuation);
        None
    }

    fn post(&self, continuation: Waker) {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(continuation);

        trace!(
            context = self.shared.context.id(),
            pending = queue.len(),
            "continuation posted"
        );
    }
}
