/// Frame built, body not started, no environment installed yet.
pub(crate) const CREATED: u8 = 0;

/// Environment installed; the body is waiting to be resumed.
///
/// A task is in this state both before its first resumption and between
/// resumptions while one of its inner awaits is pending.
pub(crate) const SUSPENDED: u8 = 1;

/// The body is being polled.
///
/// At most one resumption may observe this state at a time.
pub(crate) const RUNNING: u8 = 2;

/// The body returned a value, which is stored in the record.
pub(crate) const COMPLETED: u8 = 3;

/// The body returned an error or panicked; the failure is stored in the
/// record.
pub(crate) const FAILED: u8 = 4;

/// Returns `true` for the two terminal states.
pub(crate) fn is_terminal(state: u8) -> bool {
    state == COMPLETED || state == FAILED
}
