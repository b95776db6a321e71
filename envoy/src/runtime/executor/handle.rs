use super::core::Executor;
use crate::runtime::context::ExecutionContext;

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::Waker;

/// Function table describing how an [`ExecutorRef`] talks to the concrete
/// executor it wraps.
///
/// Every entry receives the erased data pointer produced by
/// `Arc::<E>::into_raw`.
struct ExecutorVTable {
    type_id: fn() -> TypeId,
    clone: unsafe fn(*const ()) -> *const (),
    drop: unsafe fn(*const ()),
    context: unsafe fn(*const ()) -> *const ExecutionContext,
    on_work_started: unsafe fn(*const ()),
    on_work_finished: unsafe fn(*const ()),
    post: unsafe fn(*const (), Waker),
    dispatch: unsafe fn(*const (), Waker) -> Option<Waker>,
    equals: unsafe fn(*const (), *const ()) -> bool,
}

/// Holder for the per-type vtable, so it can be promoted to `'static`.
struct VTableFor<E>(PhantomData<E>);

impl<E: Executor> VTableFor<E> {
    const VTABLE: ExecutorVTable = ExecutorVTable {
        type_id: TypeId::of::<E>,
        clone: clone_raw::<E>,
        drop: drop_raw::<E>,
        context: context_raw::<E>,
        on_work_started: on_work_started_raw::<E>,
        on_work_finished: on_work_finished_raw::<E>,
        post: post_raw::<E>,
        dispatch: dispatch_raw::<E>,
        equals: equals_raw::<E>,
    };
}

/// Type-erased handle to any [`Executor`].
///
/// Tasks and awaitables hold an `ExecutorRef` so they do not need to be
/// generic over the scheduler. The handle keeps the wrapped executor alive,
/// is two pointers wide, and cloning it only bumps a reference count.
///
/// Two handles compare equal when they point at the same executor value,
/// or when both wrap the same concrete type and that type's `==` says so.
pub struct ExecutorRef {
    /// Pointer obtained from `Arc::<E>::into_raw`.
    data: *const (),

    /// Operations for the concrete executor type.
    vtable: &'static ExecutorVTable,
}

// Safety: the wrapped executor is `Send + Sync` (required by `Executor`) and
// shared through an `Arc`.
unsafe impl Send for ExecutorRef {}
unsafe impl Sync for ExecutorRef {}

impl ExecutorRef {
    /// Wraps a concrete executor.
    pub fn new<E: Executor>(executor: E) -> Self {
        Self::from_arc(Arc::new(executor))
    }

    /// Wraps an executor that is already shared.
    pub fn from_arc<E: Executor>(executor: Arc<E>) -> Self {
        Self {
            data: Arc::into_raw(executor) as *const (),
            vtable: &VTableFor::<E>::VTABLE,
        }
    }

    /// Returns the execution context of the wrapped executor.
    pub fn context(&self) -> &ExecutionContext {
        // Safety: the context lives as long as the executor, which this
        // handle keeps alive.
        unsafe { &*(self.vtable.context)(self.data) }
    }

    /// Forwards to [`Executor::on_work_started`].
    pub fn on_work_started(&self) {
        unsafe { (self.vtable.on_work_started)(self.data) }
    }

    /// Forwards to [`Executor::on_work_finished`].
    pub fn on_work_finished(&self) {
        unsafe { (self.vtable.on_work_finished)(self.data) }
    }

    /// Forwards to [`Executor::dispatch`].
    pub fn dispatch(&self, continuation: Waker) -> Option<Waker> {
        unsafe { (self.vtable.dispatch)(self.data, continuation) }
    }

    /// Forwards to [`Executor::post`].
    pub fn post(&self, continuation: Waker) {
        unsafe { (self.vtable.post)(self.data, continuation) }
    }

    /// Returns `true` if the wrapped executor is of type `E`.
    pub fn is<E: Executor>(&self) -> bool {
        (self.vtable.type_id)() == TypeId::of::<E>()
    }

    /// Returns the wrapped executor if it is of type `E`.
    pub fn downcast_ref<E: Executor>(&self) -> Option<&E> {
        if self.is::<E>() {
            // Safety: the type id matches, so `data` came from an `Arc<E>`.
            Some(unsafe { &*(self.data as *const E) })
        } else {
            None
        }
    }

    /// Returns `true` if both handles share the same executor value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Clone for ExecutorRef {
    fn clone(&self) -> Self {
        Self {
            data: unsafe { (self.vtable.clone)(self.data) },
            vtable: self.vtable,
        }
    }
}

impl Drop for ExecutorRef {
    fn drop(&mut self) {
        unsafe { (self.vtable.drop)(self.data) }
    }
}

impl PartialEq for ExecutorRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }

        if (self.vtable.type_id)() != (other.vtable.type_id)() {
            return false;
        }

        // Safety: both pointers refer to executors of the same type.
        unsafe { (self.vtable.equals)(self.data, other.data) }
    }
}

impl Eq for ExecutorRef {}

impl fmt::Debug for ExecutorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRef")
            .field("data", &self.data)
            .field("context", &self.context().id())
            .finish()
    }
}

/// Reborrows the erased pointer as the concrete executor.
///
/// # Safety
///
/// `ptr` must come from `Arc::<E>::into_raw` and the `Arc` must still be alive.
unsafe fn as_executor<'a, E>(ptr: *const ()) -> &'a E {
    unsafe { &*(ptr as *const E) }
}

/// Takes one more strong reference on the executor.
///
/// # Safety
///
/// Same as [`as_executor`].
unsafe fn clone_raw<E: Executor>(ptr: *const ()) -> *const () {
    unsafe { Arc::increment_strong_count(ptr as *const E) };
    ptr
}

/// Releases the strong reference held by a handle.
///
/// # Safety
///
/// Same as [`as_executor`]; the handle's reference is gone afterwards.
unsafe fn drop_raw<E: Executor>(ptr: *const ()) {
    drop(unsafe { Arc::from_raw(ptr as *const E) });
}

/// Returns the executor's execution context.
unsafe fn context_raw<E: Executor>(ptr: *const ()) -> *const ExecutionContext {
    unsafe { as_executor::<E>(ptr) }.context()
}

/// Forwards [`Executor::on_work_started`].
unsafe fn on_work_started_raw<E: Executor>(ptr: *const ()) {
    unsafe { as_executor::<E>(ptr) }.on_work_started();
}

/// Forwards [`Executor::on_work_finished`].
unsafe fn on_work_finished_raw<E: Executor>(ptr: *const ()) {
    unsafe { as_executor::<E>(ptr) }.on_work_finished();
}

/// Queues `continuation` on the executor.
unsafe fn post_raw<E: Executor>(ptr: *const (), continuation: Waker) {
    unsafe { as_executor::<E>(ptr) }.post(continuation);
}

/// Forwards [`Executor::dispatch`].
unsafe fn dispatch_raw<E: Executor>(ptr: *const (), continuation: Waker) -> Option<Waker> {
    unsafe { as_executor::<E>(ptr) }.dispatch(continuation)
}

/// Compares two executors of the same concrete type.
///
/// # Safety
///
/// Both pointers must satisfy the contract of [`as_executor`] for `E`.
unsafe fn equals_raw<E: Executor>(a: *const (), b: *const ()) -> bool {
    unsafe { as_executor::<E>(a) == as_executor::<E>(b) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::{InlineExecutor, QueueExecutor};

    #[test]
    fn clones_compare_equal() {
        let handle = ExecutorRef::new(InlineExecutor::new());
        let copy = handle.clone();

        assert!(handle.ptr_eq(&copy));
        assert_eq!(handle, copy);
        assert_eq!(handle.context(), copy.context());
    }

    #[test]
    fn equal_concrete_executors_compare_equal() {
        let executor = InlineExecutor::new();
        let a = ExecutorRef::new(executor.clone());
        let b = ExecutorRef::new(executor);

        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn different_types_never_compare_equal() {
        let a = ExecutorRef::new(InlineExecutor::new());
        let b = ExecutorRef::new(QueueExecutor::new());

        assert_ne!(a, b);
        assert!(a.is::<InlineExecutor>());
        assert!(b.downcast_ref::<QueueExecutor>().is_some());
        assert!(b.downcast_ref::<InlineExecutor>().is_none());
    }

    #[test]
    fn null_handles_compare_equal() {
        let a: Option<ExecutorRef> = None;
        let b: Option<ExecutorRef> = None;

        assert_eq!(a, b);
        assert_ne!(a, Some(ExecutorRef::new(InlineExecutor::new())));
    }

    #[test]
    fn work_accounting_is_forwarded() {
        let executor = InlineExecutor::new();
        let handle = ExecutorRef::new(executor.clone());

        handle.on_work_started();
        assert_eq!(executor.outstanding_work(), 1);

        handle.on_work_finished();
        assert_eq!(executor.outstanding_work(), 0);
    }

    #[test]
    fn dropping_handles_releases_the_executor() {
        let executor = Arc::new(InlineExecutor::new());
        let handle = ExecutorRef::from_arc(executor.clone());
        let copy = handle.clone();

        assert_eq!(Arc::strong_count(&executor), 3);
        drop(handle);
        drop(copy);
        assert_eq!(Arc::strong_count(&executor), 1);
    }
}
