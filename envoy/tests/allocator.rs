use envoy::{
    ExecutorRef, FrameAllocator, FrameAllocatorGuard, FrameAllocatorRef, GlobalFrameAllocator,
    InlineExecutor, Runner, Task, current_frame_allocator, same_allocator,
    set_current_frame_allocator, yield_now,
};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Counting {
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl Counting {
    fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl FrameAllocator for Counting {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.allocated.fetch_add(1, Ordering::SeqCst);
        GlobalFrameAllocator.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.released.fetch_add(1, Ordering::SeqCst);
        unsafe { GlobalFrameAllocator.deallocate(ptr, layout) }
    }
}

fn inline() -> ExecutorRef {
    ExecutorRef::new(InlineExecutor::new())
}

fn leaf(x: u64) -> Task<u64> {
    Task::new(move |_| async move { Ok(x * 2) })
}

#[test]
fn test_release_targets_serving_allocator() {
    let a = Arc::new(Counting::default());
    let b = Arc::new(Counting::default());

    let task = {
        let _guard = FrameAllocatorGuard::new(Some(a.clone() as FrameAllocatorRef));
        leaf(1)
    };

    let _guard = FrameAllocatorGuard::new(Some(b.clone() as FrameAllocatorRef));
    drop(task);

    assert_eq!((a.allocated(), a.released()), (1, 1));
    assert_eq!((b.allocated(), b.released()), (0, 0));
}

#[test]
fn test_children_use_the_chain_allocator() {
    let counting = Arc::new(Counting::default());

    let root = Task::new(|io| async move {
        let a = io.wait(leaf(1)).await?;
        let b = io.wait(leaf(2)).await?;
        Ok(a + b)
    });

    let value = Runner::new(inline())
        .allocator(counting.clone())
        .run(root)
        .unwrap();

    assert_eq!(value, 6);
    assert_eq!(counting.allocated(), 2);
    assert_eq!(counting.released(), 2);
}

#[test]
fn test_grandchildren_use_the_chain_allocator() {
    let counting = Arc::new(Counting::default());

    let root = Task::new(|io| async move {
        let middle = Task::new(|io| async move { io.wait(leaf(4)).await });
        io.wait(middle).await
    });

    let value = Runner::new(inline())
        .allocator(counting.clone())
        .run(root)
        .unwrap();

    assert_eq!(value, 8);
    assert_eq!(counting.allocated(), 2);
    assert_eq!(counting.released(), 2);
}

#[test]
fn test_slot_is_resynced_on_later_resumption() {
    let counting = Arc::new(Counting::default());

    let root = Task::new(|io| async move {
        set_current_frame_allocator(None);
        io.wait(yield_now()).await;

        let child = leaf(3);
        assert!(current_frame_allocator().is_some());
        io.wait(child).await
    });

    let value = Runner::new(inline())
        .allocator(counting.clone())
        .run(root)
        .unwrap();

    assert_eq!(value, 6);
    assert_eq!(counting.allocated(), 1);
    assert_eq!(counting.released(), 1);
}

#[test]
fn test_io_reports_chain_allocator() {
    let counting: FrameAllocatorRef = Arc::new(Counting::default());
    let expected = counting.clone();

    let root = Task::new(move |io| async move {
        let child = Task::new(|io| async move { Ok(io.allocator()) });
        let seen = io.wait(child).await?;

        assert!(same_allocator(seen.as_ref().unwrap(), &expected));
        Ok(())
    });

    Runner::new(inline()).allocator(counting).run(root).unwrap();
}

#[test]
fn test_driver_restores_the_slot() {
    let counting: FrameAllocatorRef = Arc::new(Counting::default());
    set_current_frame_allocator(None);

    let root = Task::new(|io| async move { io.wait(leaf(1)).await });
    Runner::new(inline()).allocator(counting).run(root).unwrap();

    assert!(current_frame_allocator().is_none());
}

#[test]
fn test_ambient_allocator_without_chain_allocator() {
    let counting = Arc::new(Counting::default());
    let _guard = FrameAllocatorGuard::new(Some(counting.clone() as FrameAllocatorRef));

    let root = leaf(21);
    let value = Runner::new(inline()).run(root).unwrap();

    assert_eq!(value, 42);
    assert_eq!(counting.allocated(), 1);
    assert_eq!(counting.released(), 1);
}
