//! Small data structures used internally by the runtime.
//!
//! [`Slab`] gives registrations a stable key they can later be removed by.

mod slab;

pub(crate) use slab::Slab;
