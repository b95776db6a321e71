use std::cell::Cell;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of process-unique context identifiers.
static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    /// Identifier of the execution context currently running on this thread.
    ///
    /// Set by [`ExecutionContext::enter`] and used by executors to decide
    /// whether a continuation may be resumed inline.
    static CURRENT_CONTEXT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// The place where work runs.
///
/// An `ExecutionContext` is an identity-only object: it carries no mutable
/// state and is compared by address. It is owned by the executor
/// implementation that created it and must outlive every task scheduled on
/// that executor.
///
/// The type is deliberately neither `Clone` nor `Copy`; executors hand out
/// references to the context they own.
pub struct ExecutionContext {
    /// Process-unique identifier, used for thread-local bookkeeping and logs.
    id: usize,
}

impl ExecutionContext {
    /// Creates a new, distinct execution context.
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Returns the process-unique identifier of this context.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns `true` if the calling thread is currently running work
    /// inside this context.
    pub fn running_in_this_thread(&self) -> bool {
        CURRENT_CONTEXT.with(|current| current.get() == Some(self.id))
    }

    /// Runs `f` with this context marked as the one running on the
    /// current thread.
    ///
    /// The previously installed context is restored once `f` returns,
    /// so calls may nest.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Restore(Option<usize>);

        impl Drop for Restore {
            fn drop(&mut self) {
                CURRENT_CONTEXT.with(|current| current.set(self.0));
            }
        }

        let _restore = Restore(CURRENT_CONTEXT.with(|current| current.replace(Some(self.id))));

        f()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for ExecutionContext {}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_are_distinct() {
        let a = ExecutionContext::new();
        let b = ExecutionContext::new();

        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn enter_nests_and_restores() {
        let outer = ExecutionContext::new();
        let inner = ExecutionContext::new();

        assert!(!outer.running_in_this_thread());

        outer.enter(|| {
            assert!(outer.running_in_this_thread());

            inner.enter(|| {
                assert!(inner.running_in_this_thread());
                assert!(!outer.running_in_this_thread());
            });

            assert!(outer.running_in_this_thread());
        });

        assert!(!outer.running_in_this_thread());
    }
}
