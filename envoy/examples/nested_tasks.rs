//! Example: nested tasks sharing one environment

use envoy::{
    ExecutorRef, InlineExecutor, Io, StopSource, Task, ready, run_sync, run_sync_with, stopped,
    yield_now,
};
use std::thread;
use std::time::Duration;

fn compute(x: i32) -> Task<i32> {
    Task::new(move |io| async move {
        let tens = io.wait(ready(x * 10)).await;
        Ok(tens + 1)
    })
}

fn report(io: &Io) {
    println!("stop requested: {}", io.stop_token().is_stop_requested());
}

fn main() -> envoy::Result<()> {
    let sum = Task::new(|io| async move {
        let a = io.wait(compute(3)).await?;
        let b = io.wait(compute(7)).await?;
        println!("{a} + {b} = {}", a + b);

        let (c, d) = envoy::join!(io, compute(1), compute(2));
        Ok(a + b + c? + d?)
    });

    let total = run_sync(ExecutorRef::new(InlineExecutor::new()), sum)?;
    println!("total: {total}");

    // Same shape of chain, this time with a stop source this thread controls.
    let source = StopSource::new();
    let requester = source.clone();

    let waiting = Task::new(|io| async move {
        report(&io);
        io.wait(yield_now()).await;
        io.wait(stopped()).await;
        report(&io);
        Ok(())
    });

    let watcher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        requester.request_stop();
    });

    run_sync_with(
        ExecutorRef::new(InlineExecutor::new()),
        source.token(),
        waiting,
    )?;

    watcher
        .join()
        .map_err(|_| envoy::Error::msg("watcher thread panicked"))
}
