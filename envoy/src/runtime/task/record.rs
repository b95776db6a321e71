use super::state::{COMPLETED, CREATED, FAILED, SUSPENDED, is_terminal};
use crate::error::{Error, Result, violation};
use crate::runtime::env::Environment;

use std::cell::{Cell, UnsafeCell};
use std::sync::{Arc, OnceLock};
use std::task::Waker;

use tracing::{debug, trace};

/// Slot holding a task's environment.
///
/// Shared between the completion record and the task's [`Io`](super::Io)
/// handle, written exactly once when the task is first awaited or driven.
pub(crate) type EnvSlot = Arc<OnceLock<Arc<Environment>>>;

/// Per-task mutable state.
///
/// The record lives in the task frame and is only ever touched by the one
/// party currently driving the task, so plain cells are enough.
pub(crate) struct Record<T> {
    /// Lifecycle state (see [`super::state`]).
    pub(crate) state: Cell<u8>,

    /// Where to resume once the task finishes. `None` is the no-op
    /// continuation.
    continuation: Cell<Option<Waker>>,

    /// Environment of the chain this task runs in.
    env: EnvSlot,

    /// Failure captured from the body.
    failure: UnsafeCell<Option<Error>>,

    /// Value returned by the body.
    result: UnsafeCell<Option<T>>,
}

impl<T> Record<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Cell::new(CREATED),
            continuation: Cell::new(None),
            env: Arc::new(OnceLock::new()),
            failure: UnsafeCell::new(None),
            result: UnsafeCell::new(None),
        }
    }

    /// Returns a shared handle to the environment slot.
    pub(crate) fn env_slot(&self) -> EnvSlot {
        self.env.clone()
    }

    /// Returns the installed environment, if any.
    pub(crate) fn environment(&self) -> Option<&Arc<Environment>> {
        self.env.get()
    }

    /// Installs the environment the task will run under.
    ///
    /// # Panics
    ///
    /// Panics if an environment was already installed.
    pub(crate) fn install_environment(&self, env: Arc<Environment>) {
        if self.state.get() != CREATED || self.env.set(env).is_err() {
            violation("task environment installed twice");
        }

        self.state.set(SUSPENDED);
    }

    /// Records the party waiting on this task.
    ///
    /// Called on every poll of the awaiting party; the stored waker is only
    /// replaced when it would wake a different task.
    pub(crate) fn set_continuation(&self, waker: &Waker) {
        let continuation = match self.continuation.take() {
            Some(current) if current.will_wake(waker) => current,
            _ => waker.clone(),
        };

        self.continuation.set(Some(continuation));
    }

    /// Reads the continuation, leaving the no-op continuation behind.
    pub(crate) fn take_continuation(&self) -> Option<Waker> {
        self.continuation.take()
    }

    /// Stores the outcome of the body and moves to a terminal state.
    pub(crate) fn complete(&self, outcome: Result<T>) {
        match outcome {
            Ok(value) => {
                // Safety: only the party driving the task writes the record.
                unsafe { *self.result.get() = Some(value) };
                self.state.set(COMPLETED);
                trace!("task completed");
            }
            Err(error) => {
                debug!(%error, "task failure captured");
                unsafe { *self.failure.get() = Some(error) };
                self.state.set(FAILED);
            }
        }

        // Consumed exactly once. The awaiting party is the one polling us
        // right now and resumes inline through the `Ready` it receives.
        drop(self.take_continuation());
    }

    /// Returns the captured failure, if any.
    ///
    /// # Safety
    ///
    /// No call to [`take_result`](Self::take_result) may happen while the
    /// returned reference is alive.
    pub(crate) unsafe fn failure(&self) -> Option<&Error> {
        unsafe { (*self.failure.get()).as_ref() }
    }

    /// Hands out the failure or moves out the value.
    ///
    /// # Safety
    ///
    /// No reference returned by [`failure`](Self::failure) may be alive.
    ///
    /// # Panics
    ///
    /// Panics if the task has not reached a terminal state.
    pub(crate) unsafe fn take_result(&self) -> Result<T> {
        if !is_terminal(self.state.get()) {
            violation("task result requested before completion");
        }

        if let Some(error) = unsafe { (*self.failure.get()).take() } {
            return Err(error);
        }

        unsafe { (*self.result.get()).take() }.ok_or(Error::ResultTaken)
    }

    /// Returns `true` once the body has finished, successfully or not.
    pub(crate) fn is_done(&self) -> bool {
        is_terminal(self.state.get())
    }
}
