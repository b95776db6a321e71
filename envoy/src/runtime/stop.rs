//! Cooperative cancellation.
//!
//! A [`StopSource`] owns the right to request a stop; any number of
//! [`StopToken`]s observe it. The protocol never unwinds a suspended
//! computation: awaitables poll the token from their environment and decide
//! for themselves whether to finish early.

use crate::runtime::awaitable::IoAwaitable;
use crate::runtime::env::Environment;
use crate::utils::Slab;

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use tracing::debug;

/// State shared between a source and its tokens.
struct StopState {
    /// Set once a stop has been requested. Never cleared.
    requested: AtomicBool,

    /// Wakers to notify when the stop is requested, keyed by registration.
    /// Emptied by the request; nothing is inserted afterwards.
    waiters: Mutex<Slab<Waker>>,
}

/// The requesting side of a cancellation signal.
///
/// Clones share the same signal.
#[derive(Clone)]
pub struct StopSource {
    state: Arc<StopState>,
}

impl StopSource {
    /// Creates a source with no stop requested.
    pub fn new() -> Self {
        Self {
            state: Arc::new(StopState {
                requested: AtomicBool::new(false),
                waiters: Mutex::new(Slab::new()),
            }),
        }
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> StopToken {
        StopToken {
            state: Some(self.state.clone()),
        }
    }

    /// Requests a stop and wakes every registered waiter.
    ///
    /// Returns `true` if this call made the request, `false` if a stop had
    /// already been requested.
    pub fn request_stop(&self) -> bool {
        if self.state.requested.swap(true, Ordering::AcqRel) {
            return false;
        }

        let waiters: Vec<Waker> = self.state.waiters.lock().unwrap().drain().collect();
        debug!(waiters = waiters.len(), "stop requested");

        for waker in waiters {
            waker.wake();
        }

        true
    }

    /// Returns `true` once a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.state.requested.load(Ordering::Acquire)
    }
}

impl Default for StopSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSource")
            .field("stop_requested", &self.is_stop_requested())
            .finish()
    }
}

/// A read-only view of a cancellation signal.
///
/// The default token has no source: a stop can never be requested through it.
#[derive(Clone, Default)]
pub struct StopToken {
    state: Option<Arc<StopState>>,
}

impl StopToken {
    /// Returns a token that is not associated with any source.
    pub fn none() -> Self {
        Self { state: None }
    }

    /// Returns `true` if a stop can ever be requested through this token.
    pub fn is_stop_possible(&self) -> bool {
        self.state.is_some()
    }

    /// Returns `true` once the associated source requested a stop.
    pub fn is_stop_requested(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.requested.load(Ordering::Acquire))
    }

    /// Registers `waker` to be woken when a stop is requested.
    ///
    /// The waker stays registered until the returned [`StopRegistration`]
    /// is dropped or the stop is requested.
    ///
    /// Returns `None` if the token has no source, or if the stop was
    /// already requested; in the latter case the waker is woken right away.
    pub fn register(&self, waker: &Waker) -> Option<StopRegistration> {
        let state = self.state.as_ref()?;

        if state.requested.load(Ordering::Acquire) {
            waker.wake_by_ref();
            return None;
        }

        let mut waiters = state.waiters.lock().unwrap();

        // The request sets the flag before draining under this lock.
        if state.requested.load(Ordering::Acquire) {
            drop(waiters);
            waker.wake_by_ref();
            return None;
        }

        let key = waiters.insert(waker.clone());

        Some(StopRegistration {
            state: state.clone(),
            key,
        })
    }
}

/// A waker registered with a [`StopToken`].
///
/// Dropping the registration removes the waker from the token's source.
#[must_use = "dropping the registration deregisters the waker"]
pub struct StopRegistration {
    state: Arc<StopState>,
    key: usize,
}

impl StopRegistration {
    /// Replaces the registered waker with `waker`.
    ///
    /// Keeps the current one if both wake the same task. If the stop was
    /// requested in the meantime, `waker` is woken instead.
    pub fn update(&self, waker: &Waker) {
        let mut waiters = self.state.waiters.lock().unwrap();

        match waiters.get_mut(self.key) {
            Some(current) if current.will_wake(waker) => {}
            Some(current) => *current = waker.clone(),
            None => {
                drop(waiters);
                waker.wake_by_ref();
            }
        }
    }
}

impl Drop for StopRegistration {
    fn drop(&mut self) {
        if let Ok(mut waiters) = self.state.waiters.lock() {
            waiters.remove(self.key);
        }
    }
}

impl fmt::Debug for StopRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopRegistration")
            .field("key", &self.key)
            .finish()
    }
}

impl PartialEq for StopToken {
    /// Tokens are equal when they observe the same source, or when neither
    /// has a source.
    fn eq(&self, other: &Self) -> bool {
        match (&self.state, &other.state) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for StopToken {}

impl fmt::Debug for StopToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopToken")
            .field("stop_possible", &self.is_stop_possible())
            .field("stop_requested", &self.is_stop_requested())
            .finish()
    }
}

/// Returns an awaitable that completes once the environment's stop token
/// reports a stop request.
///
/// With a token that has no source the awaitable never completes; race it
/// against other work instead of awaiting it alone.
pub fn stopped() -> Stopped {
    Stopped { registration: None }
}

/// Awaitable returned by [`stopped`].
///
/// Dropping it before the stop is requested deregisters its waker.
#[derive(Debug)]
pub struct Stopped {
    registration: Option<StopRegistration>,
}

impl IoAwaitable for Stopped {
    type Output = ();

    fn poll_io(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        env: &Arc<Environment>,
    ) -> Poll<()> {
        let this = self.get_mut();
        let token = env.stop_token();

        if !token.is_stop_requested() {
            match &this.registration {
                Some(registration) => registration.update(cx.waker()),
                None => this.registration = token.register(cx.waker()),
            }
        }

        if token.is_stop_requested() {
            this.registration = None;
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
