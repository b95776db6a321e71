use super::awaitable::IoAwaitable;
use super::env::Environment;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Awaitable that hands control back to the executor exactly once.
#[derive(Debug)]
pub struct YieldNow {
    yielded: bool,
}

impl IoAwaitable for YieldNow {
    type Output = ();

    /// On the first poll the continuation is posted to the environment's
    /// executor and the awaitable suspends. The next poll completes.
    fn poll_io(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        env: &Arc<Environment>,
    ) -> Poll<()> {
        if !self.yielded {
            self.yielded = true;
            env.executor().post(cx.waker().clone());
            return Poll::Pending;
        }

        Poll::Ready(())
    }
}

/// Yields execution back to the executor.
///
/// The continuation goes through [`Executor::post`](crate::Executor::post),
/// so other work queued on the executor runs first.
///
/// # Examples
///
/// ```rust,ignore
/// Task::new(|io| async move {
///     io.wait(yield_now()).await;
///     Ok(())
/// })
/// ```
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}
