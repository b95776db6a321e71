//! # Envoy
//!
//! **Envoy** is a minimal async task protocol for Rust. It lets
//! independently written asynchronous units (tasks, I/O completions, timers)
//! interoperate under one scheduling abstraction, and hands every one of
//! them the environment of the chain that awaits it without any explicit
//! parameter threading in user code.
//!
//! Envoy is deliberately small. It provides:
//!
//! - An **executor capability** ([`Executor`]) and its type-erased handle
//!   ([`ExecutorRef`]), plus two reference executors
//! - An **environment snapshot** ([`Environment`]) bundling the executor,
//!   a cancellation token ([`StopToken`]) and a frame allocator
//! - The **awaitable protocol** ([`IoAwaitable`], [`IoRunnable`]), whose
//!   single suspension entry point carries the environment downwards
//! - **Lazy, single-owner tasks** ([`Task`]) whose frames come from a
//!   pluggable [`FrameAllocator`] and always return to the allocator that
//!   served them
//! - A **synchronous driver** ([`run_sync`], [`Runner`]) for root tasks
//! - **Ergonomic macros** like `#[envoy::main]`, `#[envoy::test]` and `join!`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use envoy::{Io, Task};
//!
//! fn compute(x: i32) -> Task<i32> {
//!     Task::new(move |io| async move {
//!         let tens = io.wait(envoy::ready(x * 10)).await;
//!         Ok(tens + 1)
//!     })
//! }
//!
//! #[envoy::main]
//! async fn main(io: Io) {
//!     let a = io.wait(compute(3)).await?;
//!     let b = io.wait(compute(7)).await?;
//!
//!     println!("{a} + {b} = {}", a + b);
//! }
//! ```
//!
//! ## Failures
//!
//! A task body returns [`Result`]. An error or a panic inside the body is
//! captured in the task and only surfaces when someone asks for the result,
//! either by awaiting the task or through [`Task::take_result`].

mod error;
mod runtime;
mod utils;

pub use error::{BoxError, Error, ProtocolViolation, Result};

pub use runtime::alloc::{
    FrameAllocator, FrameAllocatorGuard, FrameAllocatorRef, GlobalFrameAllocator,
    current_frame_allocator, default_frame_allocator, same_allocator, set_current_frame_allocator,
};
pub use runtime::awaitable::{IoAwaitable, IoRunnable, Ready, ready};
pub use runtime::builder::Runner;
pub use runtime::context::ExecutionContext;
pub use runtime::env::Environment;
pub use runtime::executor::{Executor, ExecutorRef, InlineExecutor, QueueExecutor};
pub use runtime::stop::{StopRegistration, StopSource, StopToken, Stopped, stopped};
pub use runtime::task::{Io, Task, TaskHandle, Wait};
pub use runtime::yield_now::{YieldNow, yield_now};
pub use runtime::{run_sync, run_sync_with};

pub use envoy_macros::*;
