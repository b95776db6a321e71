use super::{FrameAllocatorRef, current_frame_allocator, default_frame_allocator};
use crate::error::{Error, Result};

use std::alloc::Layout;
use std::ptr::NonNull;

use tracing::trace;

/// Computes the full allocation for a frame of layout `frame`.
///
/// The allocator that serves the frame is stored right after it, aligned
/// to pointer size. Returns the full layout and the trailer offset.
fn frame_layout(frame: Layout) -> Option<(Layout, usize)> {
    let (layout, trailer) = frame.extend(Layout::new::<FrameAllocatorRef>()).ok()?;

    Some((layout.pad_to_align(), trailer))
}

/// Allocates memory for a frame from the allocator active on this thread.
///
/// The returned pointer is suitable for a value of layout `frame`. It must
/// be released with [`release_frame`] using the same `frame` layout.
pub(crate) fn allocate_frame(frame: Layout) -> Result<NonNull<u8>> {
    let alloc_failed = || Error::AllocFailed {
        size: frame.size(),
        align: frame.align(),
    };

    let (layout, trailer) = frame_layout(frame).ok_or_else(alloc_failed)?;
    let allocator = current_frame_allocator().unwrap_or_else(default_frame_allocator);

    let ptr = allocator.allocate(layout).ok_or_else(alloc_failed)?;

    // Safety: `trailer` lies inside the block and is aligned for the reference.
    unsafe {
        ptr.as_ptr()
            .add(trailer)
            .cast::<FrameAllocatorRef>()
            .write(allocator);
    }

    trace!(ptr = ?ptr, size = layout.size(), "frame allocated");

    Ok(ptr)
}

/// Releases a frame through the allocator that served it.
///
/// # Safety
///
/// `ptr` must come from [`allocate_frame`] called with the same `frame`
/// layout, the frame contents must already be dropped, and the pointer must
/// not be used afterwards.
pub(crate) unsafe fn release_frame(ptr: NonNull<u8>, frame: Layout) {
    let (layout, trailer) = frame_layout(frame).expect("frame layout was valid at allocation");

    let allocator = unsafe { ptr.as_ptr().add(trailer).cast::<FrameAllocatorRef>().read() };

    trace!(ptr = ?ptr, size = layout.size(), "frame released");

    unsafe { allocator.deallocate(ptr, layout) };
}
