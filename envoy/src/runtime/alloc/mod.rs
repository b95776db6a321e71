//! Per-frame memory allocation.
//!
//! Every task frame is obtained from the allocator that is active on the
//! current thread when the task is created, falling back to the process
//! default. The allocator that served a frame is remembered inside the
//! allocation itself, so the frame is always released through the same
//! allocator no matter what is active at release time.
//!
//! The active allocator lives in a thread-local slot. It is overwritten, not
//! stacked, whenever a task whose environment names a different allocator
//! resumes on this thread.

pub(crate) mod frame;

use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};

use tracing::trace;

/// Shared reference to a frame allocator.
pub type FrameAllocatorRef = Arc<dyn FrameAllocator>;

/// A source of memory for task frames.
pub trait FrameAllocator: Send + Sync {
    /// Allocates a block described by `layout`.
    ///
    /// Returns `None` if the request cannot be served.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Releases a block previously returned by [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same allocator
    /// with the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process default allocator, backed by the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalFrameAllocator;

impl FrameAllocator for GlobalFrameAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0, "frames are never zero-sized");

        // Safety: frame layouts always have a non-zero size.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// Returns the shared process default frame allocator.
pub fn default_frame_allocator() -> FrameAllocatorRef {
    static DEFAULT: OnceLock<FrameAllocatorRef> = OnceLock::new();

    DEFAULT
        .get_or_init(|| Arc::new(GlobalFrameAllocator))
        .clone()
}

/// Returns `true` if both references name the same allocator instance.
pub fn same_allocator(a: &FrameAllocatorRef, b: &FrameAllocatorRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

thread_local! {
    /// The allocator serving frames created on this thread right now.
    static CURRENT_FRAME_ALLOCATOR: RefCell<Option<FrameAllocatorRef>> =
        const { RefCell::new(None) };
}

/// Returns the allocator active on this thread, if any.
pub fn current_frame_allocator() -> Option<FrameAllocatorRef> {
    CURRENT_FRAME_ALLOCATOR.with(|slot| slot.borrow().clone())
}

/// Overwrites the allocator active on this thread and returns the previous
/// one.
pub fn set_current_frame_allocator(allocator: Option<FrameAllocatorRef>) -> Option<FrameAllocatorRef> {
    CURRENT_FRAME_ALLOCATOR.with(|slot| slot.replace(allocator))
}

/// Makes `allocator` the active one unless it already is.
///
/// Called by tasks on every resumption. `None` leaves the slot untouched,
/// so frames keep following whatever the caller installed.
pub(crate) fn sync_frame_allocator(allocator: Option<&FrameAllocatorRef>) {
    let Some(allocator) = allocator else {
        return;
    };

    CURRENT_FRAME_ALLOCATOR.with(|slot| {
        let mut slot = slot.borrow_mut();

        if slot.as_ref().is_some_and(|current| same_allocator(current, allocator)) {
            return;
        }

        trace!(allocator = ?Arc::as_ptr(allocator), "frame allocator re-synchronized");
        *slot = Some(allocator.clone());
    });
}

/// Scoped installation of a frame allocator on the current thread.
///
/// The previous slot value is restored when the guard is dropped. An
/// executor that resumes work on a different thread than the one that
/// suspended it can use this guard to re-establish the allocator before
/// resuming.
#[must_use = "the allocator is uninstalled as soon as the guard is dropped"]
pub struct FrameAllocatorGuard {
    /// Slot value to restore on drop.
    previous: Option<FrameAllocatorRef>,

    /// The guard belongs to the thread whose slot it modified.
    _not_send: PhantomData<*const ()>,
}

impl FrameAllocatorGuard {
    /// Installs `allocator` as the active one until the guard is dropped.
    pub fn new(allocator: Option<FrameAllocatorRef>) -> Self {
        Self {
            previous: set_current_frame_allocator(allocator),
            _not_send: PhantomData,
        }
    }
}

impl Drop for FrameAllocatorGuard {
    fn drop(&mut self) {
        set_current_frame_allocator(self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_slot() {
        let a: FrameAllocatorRef = Arc::new(GlobalFrameAllocator);
        let b: FrameAllocatorRef = Arc::new(GlobalFrameAllocator);

        let _outer = FrameAllocatorGuard::new(Some(a.clone()));
        {
            let _inner = FrameAllocatorGuard::new(Some(b.clone()));
            assert!(same_allocator(&current_frame_allocator().unwrap(), &b));
        }

        assert!(same_allocator(&current_frame_allocator().unwrap(), &a));
    }

    #[test]
    fn sync_overwrites_without_stacking() {
        let a: FrameAllocatorRef = Arc::new(GlobalFrameAllocator);
        let b: FrameAllocatorRef = Arc::new(GlobalFrameAllocator);
        let _guard = FrameAllocatorGuard::new(Some(a.clone()));

        sync_frame_allocator(Some(&b));
        assert!(same_allocator(&current_frame_allocator().unwrap(), &b));

        sync_frame_allocator(None);
        assert!(same_allocator(&current_frame_allocator().unwrap(), &b));
    }

    #[test]
    fn default_allocator_is_shared() {
        assert!(same_allocator(
            &default_frame_allocator(),
            &default_frame_allocator()
        ));
    }
}
