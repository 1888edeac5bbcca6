//! # Producer Handle
//!
//! The single writer. Every operation takes `&mut self` and the handle is not
//! `Clone`, so "one producer at a time" is enforced by the borrow checker.

#![allow(unsafe_code)]

use std::fmt;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{select, Receiver, TryRecvError};

use super::shared::{Shared, SlotId};
use crate::cancel::Context;
use crate::error::{RotatorError, RotatorResult};

/// Where the producer stands in the publish cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProducerState {
    /// Holds a back buffer it may mutate freely.
    Writable(SlotId),
    /// Published its back buffer and waits for the old front to come back.
    Submitted,
    /// Got the old front back, but readers may still be pinning it.
    ///
    /// Only reached when an acquire is cancelled mid-drain. Behaves like
    /// [`Submitted`](Self::Submitted) for publish; the next acquire resumes
    /// draining without waiting for another advance.
    Reclaimed(SlotId),
}

/// Writer side of a rotator.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    state: ProducerState,
    reclaimed: Receiver<SlotId>,
}

impl<T> Producer<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, back: SlotId, reclaimed: Receiver<SlotId>) -> Self {
        Self {
            shared,
            state: ProducerState::Writable(back),
            reclaimed,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ProducerState {
        self.state
    }

    /// The writable slot, or `None` while submitted.
    #[inline]
    #[must_use]
    pub const fn back_slot(&self) -> Option<SlotId> {
        match self.state {
            ProducerState::Writable(slot) => Some(slot),
            ProducerState::Submitted | ProducerState::Reclaimed(_) => None,
        }
    }

    /// Returns the back buffer for writing.
    ///
    /// While writable this returns the same buffer on every call without
    /// blocking. After [`publish`](Self::publish) it blocks until a reader's
    /// advance adopts the submission and the vacated front is no longer
    /// pinned by any reader.
    ///
    /// # Errors
    ///
    /// Fails with the context's error if it fires first. The producer stays
    /// submitted and a later call can still succeed.
    pub fn acquire(&mut self, ctx: &Context) -> RotatorResult<&mut T> {
        let slot = match self.state {
            ProducerState::Writable(slot) => slot,
            ProducerState::Reclaimed(slot) => self.drain(slot, ctx)?,
            ProducerState::Submitted => {
                let slot = self.wait_reclaimed(ctx)?;
                self.state = ProducerState::Reclaimed(slot);
                self.drain(slot, ctx)?
            }
        };
        self.state = ProducerState::Writable(slot);
        // SAFETY: slot is our back buffer and no reader pins it.
        Ok(unsafe { self.shared.slot_mut(slot) })
    }

    /// Non-blocking [`acquire`](Self::acquire).
    ///
    /// Returns `None` instead of waiting when no buffer is ready.
    pub fn try_acquire(&mut self) -> Option<&mut T> {
        let slot = match self.state {
            ProducerState::Writable(slot) => slot,
            ProducerState::Reclaimed(slot) => self.try_drain(slot)?,
            ProducerState::Submitted => match self.reclaimed.try_recv() {
                Ok(slot) => {
                    self.state = ProducerState::Reclaimed(slot);
                    self.try_drain(slot)?
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            },
        };
        self.state = ProducerState::Writable(slot);
        // SAFETY: slot is our back buffer and no reader pins it.
        Some(unsafe { self.shared.slot_mut(slot) })
    }

    /// Marks the back buffer as the next front.
    ///
    /// Everything written through [`acquire`](Self::acquire) before this call
    /// is visible to the reader whose advance adopts it. A no-op unless the
    /// producer is writable.
    pub fn publish(&mut self) {
        if let ProducerState::Writable(slot) = self.state {
            self.shared.submit(slot);
            self.state = ProducerState::Submitted;
            tracing::trace!(rotator = %self.shared.config().name, slot = ?slot, "published back buffer");
        }
    }

    fn wait_reclaimed(&self, ctx: &Context) -> RotatorResult<SlotId> {
        if let Ok(slot) = self.reclaimed.try_recv() {
            return Ok(slot);
        }
        let timer = ctx.timer();
        let outcome = select! {
            recv(self.reclaimed) -> slot => match slot {
                Ok(slot) => Ok(slot),
                Err(_) => unreachable!("reclaim sender lives as long as the producer"),
            },
            recv(ctx.signal()) -> _ => Err(RotatorError::Cancelled),
            recv(timer) -> _ => Err(RotatorError::DeadlineExceeded),
        };
        if let Err(err) = outcome {
            self.cancelled(err);
        }
        outcome
    }

    /// Waits for readers still pinning a reclaimed slot to let go.
    fn drain(&self, slot: SlotId, ctx: &Context) -> RotatorResult<SlotId> {
        let config = self.shared.config();
        let mut spins = 0_u32;
        while self.shared.readers(slot) > 0 {
            if let Some(err) = ctx.err() {
                self.cancelled(err);
                return Err(err);
            }
            if spins < config.drain_spin_iterations {
                spins += 1;
                std::hint::spin_loop();
            } else {
                thread::sleep(config.drain_sleep());
            }
        }
        Ok(slot)
    }

    fn try_drain(&self, slot: SlotId) -> Option<SlotId> {
        (self.shared.readers(slot) == 0).then_some(slot)
    }

    fn cancelled(&self, err: RotatorError) {
        self.shared.record_cancellation();
        tracing::debug!(
            rotator = %self.shared.config().name,
            state = ?self.state,
            error = %err,
            "acquire abandoned"
        );
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("rotator", &self.shared.config().name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::rotator;
    use std::time::Duration;

    #[test]
    fn test_acquire_is_idempotent() {
        let (mut producer, _reader) = rotator(0_u32, 0_u32);
        let ctx = Context::background();

        let first: *const u32 = producer.acquire(&ctx).unwrap();
        *producer.acquire(&ctx).unwrap() = 7;
        let second: *const u32 = producer.acquire(&ctx).unwrap();

        assert!(std::ptr::eq(first, second));
        assert_eq!(*producer.acquire(&ctx).unwrap(), 7);
        assert_eq!(producer.state(), ProducerState::Writable(SlotId::First));
    }

    #[test]
    fn test_publish_is_idempotent() {
        let (mut producer, reader) = rotator(0_u32, 0_u32);
        producer.publish();
        assert_eq!(producer.state(), ProducerState::Submitted);
        assert_eq!(producer.back_slot(), None);

        producer.publish();
        producer.publish();
        assert_eq!(reader.stats().publishes, 1);
    }

    #[test]
    fn test_acquire_after_publish_times_out() {
        let (mut producer, _reader) = rotator(0_u32, 0_u32);
        producer.publish();

        let err = producer
            .acquire(&Context::with_timeout(Duration::from_millis(10)))
            .unwrap_err();
        assert_eq!(err, RotatorError::DeadlineExceeded);
        assert_eq!(producer.state(), ProducerState::Submitted);
    }

    #[test]
    fn test_acquire_with_cancelled_context() {
        let (mut producer, reader) = rotator(0_u32, 0_u32);
        producer.publish();

        let (ctx, handle) = Context::with_cancel();
        drop(handle);
        assert_eq!(producer.acquire(&ctx).unwrap_err(), RotatorError::Cancelled);
        assert_eq!(reader.stats().cancellations, 1);
    }

    #[test]
    fn test_try_acquire() {
        let (mut producer, reader) = rotator(0_u32, 0_u32);
        assert!(producer.try_acquire().is_some());

        producer.publish();
        assert!(producer.try_acquire().is_none());

        assert!(reader.advance().changed());
        assert_eq!(producer.try_acquire().copied(), Some(0));
        assert_eq!(producer.back_slot(), Some(SlotId::Second));
    }

    #[test]
    fn test_drain_cancelled_keeps_reclaimed_slot() {
        let (mut producer, reader) = rotator(0_u32, 5_u32);
        *producer.acquire(&Context::background()).unwrap() = 1;

        // Pin the old front before it is vacated.
        let stale = reader.front();
        producer.publish();
        assert!(reader.advance().changed());

        let err = producer
            .acquire(&Context::with_timeout(Duration::from_millis(10)))
            .unwrap_err();
        assert_eq!(err, RotatorError::DeadlineExceeded);
        assert_eq!(producer.state(), ProducerState::Reclaimed(SlotId::Second));
        assert!(producer.try_acquire().is_none());
        assert_eq!(*stale, 5);

        // Publishing while reclaimed changes nothing.
        producer.publish();
        assert_eq!(reader.stats().publishes, 1);

        drop(stale);
        assert_eq!(*producer.acquire(&Context::background()).unwrap(), 5);
    }
}
