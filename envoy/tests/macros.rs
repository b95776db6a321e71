use envoy::{Task, join, ready, yield_now};
use std::sync::Arc;

fn compute(x: i32) -> Task<i32> {
    Task::new(move |io| async move {
        let tens = io.wait(ready(x * 10)).await;
        Ok(tens + 1)
    })
}

#[envoy::test]
async fn test_without_io_handle() {
    let numbers = [1, 2, 3];
    assert_eq!(numbers.iter().sum::<i32>(), 6);
}

#[envoy::test]
async fn test_with_io_handle(io: envoy::Io) {
    let value = io.wait(compute(4)).await?;
    assert_eq!(value, 41);
}

#[envoy::test]
async fn test_root_environment_is_inline(io: envoy::Io) {
    assert!(io.executor().is::<envoy::InlineExecutor>());
    assert!(!io.stop_token().is_stop_possible());
    assert!(io.allocator().is_none());
}

#[envoy::test]
#[should_panic(expected = "kaboom")]
async fn test_panic_fails_the_test() {
    let explode = || -> i32 { panic!("kaboom") };
    assert_eq!(explode(), 0);
}

#[envoy::test]
#[should_panic(expected = "task failed: broken")]
async fn test_error_fails_the_test(io: envoy::Io) {
    let broken = Task::new(|_| async { Err::<(), _>(envoy::Error::msg("broken")) });
    io.wait(broken).await?;
}

#[envoy::test]
async fn test_join_single(io: envoy::Io) {
    let value = join!(io, ready(9));
    assert_eq!(value, 9);
}

#[envoy::test]
async fn test_join_tasks(io: envoy::Io) {
    let (a, b) = join!(io, compute(3), compute(7));
    assert_eq!(a? + b?, 102);
}

#[envoy::test]
async fn test_join_mixed_awaitables(io: envoy::Io) {
    let (a, (), b) = join!(io, ready("hello"), yield_now(), compute(1),);

    assert_eq!(a, "hello");
    assert_eq!(b?, 11);
}

#[envoy::test]
async fn test_join_shares_the_environment(io: envoy::Io) {
    let env_of = || Task::new(|io| async move { Ok(io.environment()) });

    let (a, b) = join!(io, env_of(), env_of());
    let (a, b) = (a?, b?);

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &io.environment()));
}
