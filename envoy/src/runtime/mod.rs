//! Protocol runtime components.
//!
//! This module contains the building blocks of the task protocol:
//! - execution contexts and the executor capability,
//! - the environment snapshot and cooperative cancellation,
//! - per-frame allocation,
//! - the awaitable and runnable capabilities,
//! - tasks, and a synchronous driver for root tasks.
//!
//! Most users will interact with the re-exports at the crate root rather
//! than with these modules directly.

mod driver;

pub(crate) mod alloc;
pub(crate) mod awaitable;
pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod env;
pub(crate) mod executor;
pub(crate) mod stop;
pub(crate) mod yield_now;

pub mod task;

pub use driver::{run_sync, run_sync_with};
