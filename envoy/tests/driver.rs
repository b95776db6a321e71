use envoy::{
    Error, Executor, ExecutorRef, InlineExecutor, ProtocolViolation, QueueExecutor, Runner, Task,
    run_sync, yield_now,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_run_sync_returns_value() {
    let executor = ExecutorRef::new(InlineExecutor::new());
    let value = run_sync(executor, Task::new(|_| async { Ok("done") })).unwrap();

    assert_eq!(value, "done");
}

#[test]
fn test_work_is_bracketed() {
    let executor = InlineExecutor::new();
    let observed = Arc::new(AtomicUsize::new(usize::MAX));
    let seen = observed.clone();

    let task = Task::new(move |io| async move {
        let executor = io.executor();
        let inline = executor.downcast_ref::<InlineExecutor>().unwrap();

        seen.store(inline.outstanding_work(), Ordering::SeqCst);
        Ok(())
    });

    run_sync(ExecutorRef::new(executor.clone()), task).unwrap();

    assert_eq!(observed.load(Ordering::SeqCst), 1);
    assert_eq!(executor.outstanding_work(), 0);
}

#[test]
fn test_work_is_finished_on_failure() {
    let executor = InlineExecutor::new();

    let result = run_sync(
        ExecutorRef::new(executor.clone()),
        Task::new(|_| async { Err::<(), _>(Error::msg("nope")) }),
    );

    assert!(result.is_err());
    assert_eq!(executor.outstanding_work(), 0);
}

#[test]
fn test_yield_now_on_inline_executor() {
    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();

    let task = Task::new(move |io| async move {
        for _ in 0..3 {
            io.wait(yield_now()).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }

        Ok(())
    });

    run_sync(ExecutorRef::new(InlineExecutor::new()), task).unwrap();
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_yield_now_through_queue_pumped_elsewhere() {
    let queue = QueueExecutor::new();
    let pump = queue.clone();
    let done = Arc::new(AtomicBool::new(false));
    let stop = done.clone();
    let resumed = Arc::new(AtomicUsize::new(0));
    let count = resumed.clone();

    let pumping = thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            count.fetch_add(pump.run_pending(), Ordering::SeqCst);
            thread::yield_now();
        }
    });

    let task = Task::new(|io| async move {
        io.wait(yield_now()).await;
        io.wait(yield_now()).await;
        Ok(5)
    });

    let value = run_sync(ExecutorRef::new(queue.clone()), task).unwrap();

    done.store(true, Ordering::SeqCst);
    pumping.join().unwrap();

    assert_eq!(value, 5);
    assert_eq!(resumed.load(Ordering::SeqCst), 2);
    assert_eq!(queue.pending(), 0);
    assert_eq!(queue.outstanding_work(), 0);
}

#[test]
fn test_queue_dispatch_defers_outside_its_context() {
    let queue = QueueExecutor::new();

    assert!(!queue.context().running_in_this_thread());
    assert!(queue.dispatch(std::task::Waker::noop().clone()).is_none());
    assert_eq!(queue.pending(), 1);

    assert_eq!(queue.run_pending(), 1);
    assert_eq!(queue.pending(), 0);
}

#[test]
fn test_panicking_body_is_reported() {
    let result = Runner::new(ExecutorRef::new(InlineExecutor::new())).run(Task::new(|_| async {
        if true {
            panic!("root exploded");
        }

        Ok(())
    }));

    let error = result.unwrap_err();
    assert!(error.is_panic());
    assert!(error.to_string().contains("root exploded"));
}

#[test]
fn test_driving_a_null_task_is_a_violation() {
    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        run_sync(ExecutorRef::new(InlineExecutor::new()), Task::<()>::default())
    }))
    .unwrap_err();

    let violation = payload.downcast_ref::<ProtocolViolation>().unwrap();
    assert_eq!(violation.message(), "driven a null or released task");
}
