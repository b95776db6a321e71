use super::record::Record;
use crate::error::{Error, Result};
use crate::runtime::env::Environment;

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Operations that depend on the concrete body type of a frame.
pub(crate) struct FrameVTable {
    /// Polls the body once.
    pub(crate) resume: unsafe fn(NonNull<()>, &mut Context<'_>) -> Poll<()>,

    /// Drops the frame contents and releases its memory.
    pub(crate) destroy: unsafe fn(NonNull<()>),
}

/// The part of a frame every handle can see without knowing the body type.
///
/// Always the first field of a `#[repr(C)]` frame, so a pointer to the
/// frame is also a pointer to its header.
#[repr(C)]
pub(crate) struct Header<T> {
    pub(crate) vtable: &'static FrameVTable,
    pub(crate) record: Record<T>,
}

/// Raw handle to a task frame.
///
/// A `TaskHandle` does not own the frame: it is what a [`Task`](super::Task)
/// wraps, and what a driver keeps after [`release`](super::Task::release).
/// Whoever holds the released handle must eventually call
/// [`destroy`](Self::destroy) exactly once.
///
/// All operations are `unsafe` because the handle cannot know whether the
/// frame is still alive.
pub struct TaskHandle<T> {
    ptr: NonNull<Header<T>>,
}

// Safety: moving the handle between threads moves the right to drive the
// frame; the frame itself is only built from `Send` bodies.
unsafe impl<T: Send> Send for TaskHandle<T> {}

impl<T> TaskHandle<T> {
    pub(crate) fn from_header(ptr: NonNull<Header<T>>) -> Self {
        Self { ptr }
    }

    /// Returns the frame address, for identity comparisons and logs.
    pub fn addr(self) -> *const () {
        self.ptr.as_ptr() as *const ()
    }

    /// Borrows the completion record.
    ///
    /// # Safety
    ///
    /// The frame must be alive for `'a`.
    pub(crate) unsafe fn record<'a>(self) -> &'a Record<T>
    where
        T: 'a,
    {
        unsafe { &(*self.ptr.as_ptr()).record }
    }

    /// Installs the environment the task will run under.
    ///
    /// # Safety
    ///
    /// The frame must be alive.
    ///
    /// # Panics
    ///
    /// Unwinds with a [`ProtocolViolation`](crate::ProtocolViolation) if an
    /// environment was already installed.
    pub unsafe fn set_environment(self, env: Arc<Environment>) {
        unsafe { self.record() }.install_environment(env);
    }

    /// Returns the environment installed in the frame, if any.
    ///
    /// # Safety
    ///
    /// The frame must be alive for `'a`.
    pub unsafe fn environment<'a>(self) -> Option<&'a Arc<Environment>>
    where
        T: 'a,
    {
        unsafe { self.record() }.environment()
    }

    /// Resumes the body until its next suspension point.
    ///
    /// Returns `Ready` once the task reached a terminal state.
    ///
    /// # Safety
    ///
    /// The frame must be alive and no other resumption may be in progress.
    ///
    /// # Panics
    ///
    /// Unwinds with a [`ProtocolViolation`](crate::ProtocolViolation) if no
    /// environment is installed or if the task already finished.
    pub unsafe fn resume(self, cx: &mut Context<'_>) -> Poll<()> {
        unsafe {
            let vtable = (*self.ptr.as_ptr()).vtable;
            (vtable.resume)(self.ptr.cast(), cx)
        }
    }

    /// Returns `true` once the task reached a terminal state.
    ///
    /// # Safety
    ///
    /// The frame must be alive.
    pub unsafe fn is_done(self) -> bool {
        unsafe { self.record() }.is_done()
    }

    /// Returns the captured failure, if any.
    ///
    /// # Safety
    ///
    /// The frame must be alive for `'a` and [`take_result`](Self::take_result)
    /// must not be called while the reference is in use.
    pub unsafe fn failure<'a>(self) -> Option<&'a Error>
    where
        T: 'a,
    {
        unsafe { self.record().failure() }
    }

    /// Hands out the captured failure or moves out the stored value.
    ///
    /// # Safety
    ///
    /// The frame must be alive and no reference from
    /// [`failure`](Self::failure) may be in use.
    ///
    /// # Panics
    ///
    /// Unwinds with a [`ProtocolViolation`](crate::ProtocolViolation) if the
    /// task has not finished.
    pub unsafe fn take_result(self) -> Result<T> {
        unsafe { self.record().take_result() }
    }

    /// Drops the frame contents and returns its memory to the allocator
    /// that served it.
    ///
    /// # Safety
    ///
    /// The frame must be alive and the handle (and every copy of it) must
    /// not be used afterwards.
    pub unsafe fn destroy(self) {
        unsafe {
            let vtable = (*self.ptr.as_ptr()).vtable;
            (vtable.destroy)(self.ptr.cast());
        }
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TaskHandle<T> {}

impl<T> PartialEq for TaskHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for TaskHandle<T> {}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskHandle").field(&self.ptr).finish()
    }
}
