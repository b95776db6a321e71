use envoy::{
    Environment, Error, ExecutorRef, FrameAllocatorRef, GlobalFrameAllocator, InlineExecutor,
    Runner, StopSource, Task, ready, run_sync, run_sync_with, same_allocator, stopped,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

type Seen = Arc<Mutex<Vec<Arc<Environment>>>>;

fn inline() -> ExecutorRef {
    ExecutorRef::new(InlineExecutor::new())
}

/// A chain of `depth` nested tasks, each recording the environment it sees.
fn level(depth: usize, seen: Seen) -> Task<()> {
    Task::new(move |io| async move {
        seen.lock().unwrap().push(io.environment());

        if depth > 1 {
            io.wait(level(depth - 1, seen.clone())).await?;
        }

        Ok(())
    })
}

fn compute(x: i32) -> Task<i32> {
    Task::new(move |io| async move {
        let tens = io.wait(ready(x * 10)).await;
        Ok(tens + 1)
    })
}

fn stop_requested() -> Task<bool> {
    Task::new(|io| async move { Ok(io.stop_token().is_stop_requested()) })
}

#[test]
fn test_environment_reaches_three_levels() {
    let executor = inline();
    let source = StopSource::new();
    let allocator: FrameAllocatorRef = Arc::new(GlobalFrameAllocator);
    let seen = Seen::default();

    Runner::new(executor.clone())
        .stop_token(source.token())
        .allocator(allocator.clone())
        .run(level(3, seen.clone()))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);

    for env in seen.iter() {
        assert!(Arc::ptr_eq(env, &seen[0]));
        assert_eq!(env.executor(), &executor);
        assert_eq!(env.stop_token(), &source.token());
        assert!(same_allocator(env.allocator().unwrap(), &allocator));
    }
}

#[test]
fn test_nested_computations_sum() {
    let sum = Task::new(|io| async move {
        let a = io.wait(compute(3)).await?;
        let b = io.wait(compute(7)).await?;
        Ok(a + b)
    });

    assert_eq!(run_sync(inline(), sum).unwrap(), 102);
}

#[test]
fn test_children_see_the_root_executor() {
    let executor = inline();
    let expected = executor.clone();

    let task = Task::new(move |io| async move {
        let child = Task::new(|io| async move { Ok(io.executor()) });
        let seen = io.wait(child).await?;

        assert_eq!(seen, expected);
        assert!(seen.is::<InlineExecutor>());
        Ok(())
    });

    run_sync(executor, task).unwrap();
}

#[test]
fn test_stop_not_requested() {
    let source = StopSource::new();

    let requested = run_sync_with(inline(), source.token(), stop_requested()).unwrap();
    assert!(!requested);
}

#[test]
fn test_stop_requested_before_start() {
    let source = StopSource::new();
    source.request_stop();

    let requested = run_sync_with(inline(), source.token(), stop_requested()).unwrap();
    assert!(requested);
}

#[test]
fn test_default_token_cannot_stop() {
    let task = Task::new(|io| async move { Ok(io.stop_token().is_stop_possible()) });

    assert!(!run_sync(inline(), task).unwrap());
}

#[test]
fn test_stopped_wakes_the_driver() {
    let source = StopSource::new();
    let requester = source.clone();

    let task = Task::new(|io| async move {
        io.wait(stopped()).await;
        Err::<(), _>(Error::Cancelled)
    });

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        requester.request_stop();
    });

    let result = run_sync_with(inline(), source.token(), task);
    stopper.join().unwrap();

    assert!(result.unwrap_err().is_cancelled());
}
