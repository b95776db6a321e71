use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{RawWaker, RawWakerVTable, Waker};
use std::thread::{self, Thread};

/// Blocks a driving thread until its root task is woken.
pub(crate) struct Parker {
    /// The thread to unpark.
    thread: Thread,

    /// Set by a wake, cleared by the next `park`.
    notified: AtomicBool,
}

impl Parker {
    /// Creates a parker for the calling thread.
    pub(crate) fn current() -> Arc<Self> {
        Arc::new(Self {
            thread: thread::current(),
            notified: AtomicBool::new(false),
        })
    }

    /// Parks the calling thread until a wake arrives.
    ///
    /// Returns at once if a wake happened since the last call.
    pub(crate) fn park(&self) {
        while !self.notified.swap(false, Ordering::AcqRel) {
            thread::park();
        }
    }

    fn unpark(&self) {
        if !self.notified.swap(true, Ordering::AcqRel) {
            self.thread.unpark();
        }
    }
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

/// Creates a [`Waker`] that unparks the parker's thread.
///
/// The data pointer comes from `Arc::into_raw`, so the vtable functions
/// manage the reference count exactly like an `Arc` clone would.
pub(crate) fn parker_waker(parker: Arc<Parker>) -> Waker {
    unsafe { Waker::from_raw(RawWaker::new(Arc::into_raw(parker) as *const (), &VTABLE)) }
}

/// Clones the raw waker.
///
/// Takes one more reference on the `Arc<Parker>` behind `ptr`.
fn clone_raw(ptr: *const ()) -> RawWaker {
    let arc = unsafe { Arc::<Parker>::from_raw(ptr as *const Parker) };
    let cloned = arc.clone();
    mem::forget(arc);

    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTABLE)
}

/// Unparks the driving thread and consumes the waker's reference.
fn wake_raw(ptr: *const ()) {
    let arc = unsafe { Arc::<Parker>::from_raw(ptr as *const Parker) };
    arc.unpark();
}

/// Unparks the driving thread, leaving the reference count untouched.
fn wake_by_ref_raw(ptr: *const ()) {
    let arc = unsafe { Arc::<Parker>::from_raw(ptr as *const Parker) };
    arc.unpark();
    mem::forget(arc);
}

/// Drops the raw waker, releasing its reference on the parker.
fn drop_raw(ptr: *const ()) {
    drop(unsafe { Arc::<Parker>::from_raw(ptr as *const Parker) });
}
