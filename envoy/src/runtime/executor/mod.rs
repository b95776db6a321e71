//! The executor capability.
//!
//! This module defines what a scheduler must provide to take part in the
//! protocol, and how tasks refer to a scheduler without being generic over
//! its concrete type.
//!
//! It is composed of:
//! - [`core`]: the [`Executor`] trait itself,
//! - [`handle`]: [`ExecutorRef`], the type-erased, cheaply clonable handle,
//! - [`inline`]: an executor that resumes everything on the calling thread,
//! - [`queue`]: an executor that defers posted work to an explicit run loop.
//!
//! Real thread pools and I/O reactors live outside this crate; they only
//! need to implement [`Executor`].

pub(crate) mod core;
pub(crate) mod handle;
pub(crate) mod inline;
pub(crate) mod queue;

pub use self::core::Executor;
pub use handle::ExecutorRef;
pub use inline::InlineExecutor;
pub use queue::QueueExecutor;
