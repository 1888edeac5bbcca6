//! # Cancellation Contexts
//!
//! The producer's acquire is the only operation that blocks. A [`Context`]
//! bounds that wait with a cancel signal, a deadline, or both.
//!
//! ```text
//!   acquire ──select──┬── reclaim channel   -> Ok(slot)
//!                     ├── cancel signal     -> Err(Cancelled)
//!                     └── deadline timer    -> Err(DeadlineExceeded)
//! ```
//!
//! The cancel signal is a channel that never carries a message. Dropping its
//! only sender disconnects it, which wakes every clone of the receiver.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, never, Receiver, Sender, TryRecvError};

use crate::error::RotatorError;

/// Cancellation and deadline scope for a blocking acquire.
///
/// Cheap to clone; clones observe the same cancel signal and deadline.
#[derive(Clone, Debug)]
pub struct Context {
    signal: Receiver<()>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never fires.
    #[must_use]
    pub fn background() -> Self {
        Self {
            signal: never(),
            deadline: None,
        }
    }

    /// A context that fires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that fires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            signal: never(),
            deadline: Some(deadline),
        }
    }

    /// A context that fires when the returned handle is cancelled or dropped.
    #[must_use]
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (sender, signal) = bounded(0);
        let ctx = Self {
            signal,
            deadline: None,
        };
        (ctx, CancelHandle { sender: Some(sender) })
    }

    /// Adds a deadline, keeping whichever of the existing and new deadline
    /// comes first.
    #[must_use]
    pub fn and_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// The deadline, if any.
    #[inline]
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Polls the context without blocking.
    ///
    /// Returns the error an acquire would fail with right now, or `None` if
    /// the context is still live. Cancellation wins over an expired deadline.
    #[must_use]
    pub fn err(&self) -> Option<RotatorError> {
        if matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected)) {
            return Some(RotatorError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(RotatorError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns whether the context has fired.
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Receiver that disconnects when the context is cancelled.
    #[inline]
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Fresh one-shot timer for the deadline.
    ///
    /// Timers deliver a single message, so every wait builds its own.
    pub(crate) fn timer(&self) -> Receiver<Instant> {
        match self.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => never(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

/// Fires the paired [`Context`] when cancelled or dropped.
#[derive(Debug)]
pub struct CancelHandle {
    sender: Option<Sender<()>>,
}

impl CancelHandle {
    /// Cancels the paired context. Idempotent.
    pub fn cancel(&mut self) {
        self.sender.take();
    }

    /// Returns whether [`cancel`](Self::cancel) was already called.
    #[inline]
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.sender.is_none()
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
