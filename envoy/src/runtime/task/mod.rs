//! Tasks.
//!
//! A [`Task`] is a lazy, single-owner computation backed by one frame. The
//! frame holds a header (function table and completion record) followed by
//! the body future, and lives in memory obtained from the frame allocator
//! active when the task was built.
//!
//! Bodies are written against the [`Io`] handle they receive, which exposes
//! the environment and turns awaitables into futures through [`Io::wait`].
//!
//! Drivers work with the raw [`TaskHandle`] obtained through
//! [`Task::release`].

pub(crate) mod handle;
pub(crate) mod record;
pub(crate) mod state;
pub(crate) mod waker;

pub mod core;
pub mod io;

pub use self::core::Task;
pub use handle::TaskHandle;
pub use io::{Io, Wait};
