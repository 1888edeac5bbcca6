//! # Shared Rotator State
//!
//! The two slots, their role labels, and the handoff points, shared between
//! one [`Producer`] and any number of [`Reader`]s.

#![allow(unsafe_code)]
//!
//! ## Safety Model
//!
//! - The producer is the only party that ever takes `&mut` to a slot, and
//!   only to the slot it holds as back.
//! - Readers only take `&` to a slot after pinning it (reader count > 0) and
//!   re-validating that it is still front.
//! - A slot returned through the reclaim channel is written again only after
//!   its reader count has drained to zero.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Sender, TrySendError};

use super::{Producer, Reader};
use crate::config::RotatorConfig;

/// Pending cell value meaning "no submission waiting".
const EMPTY: usize = 2;

/// One of the two storage slots.
///
/// The rotator's whole role assignment is one bit: which slot is front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotId {
    /// Initially the back buffer (holds the first constructor value).
    First,
    /// Initially the front buffer (holds the second constructor value).
    Second,
}

impl SlotId {
    /// The other slot.
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    /// Storage index (0 or 1).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    /// Decodes the low role bit.
    #[inline]
    const fn from_bit(raw: usize) -> Self {
        if raw & 1 == 0 {
            Self::First
        } else {
            Self::Second
        }
    }

    /// Decodes a pending cell value.
    #[inline]
    const fn from_pending(raw: usize) -> Option<Self> {
        if raw == EMPTY {
            None
        } else {
            Some(Self::from_bit(raw))
        }
    }
}

/// Counters for profiling a rotator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RotatorStats {
    /// Publishes that moved a back buffer into the pending cell.
    pub publishes: u64,
    /// Advances that adopted a pending buffer as front.
    pub adoptions: u64,
    /// Acquires that failed on their context.
    pub cancellations: u64,
}

#[derive(Default)]
struct Counters {
    publishes: AtomicU64,
    adoptions: AtomicU64,
    cancellations: AtomicU64,
}

/// State behind the producer and reader handles.
pub(crate) struct Shared<T> {
    /// The two buffers. `UnsafeCell` because access rights follow roles.
    slots: [UnsafeCell<T>; 2],
    /// Pinned readers per slot.
    readers: [AtomicUsize; 2],
    /// Slot currently readable as front (low bit).
    front: AtomicUsize,
    /// Slot published but not yet adopted, or `EMPTY`.
    pending: AtomicUsize,
    /// Returns the vacated front to the producer.
    reclaim: Sender<SlotId>,
    counters: Counters,
    config: RotatorConfig,
}

// SAFETY: values are written on the producer's thread and read on readers'
// threads, so T must be Send; readers share `&T`, so T must also be Sync.
unsafe impl<T: Send> Send for Shared<T> {}
// SAFETY: see above; cross-thread access is partitioned by slot role.
unsafe impl<T: Send + Sync> Sync for Shared<T> {}

impl<T> Shared<T> {
    #[inline]
    pub(crate) fn config(&self) -> &RotatorConfig {
        &self.config
    }

    /// Current front slot.
    #[inline]
    pub(crate) fn front(&self) -> SlotId {
        SlotId::from_bit(self.front.load(Ordering::SeqCst))
    }

    /// Whether a publish is waiting for adoption.
    #[inline]
    pub(crate) fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) != EMPTY
    }

    /// Number of readers currently pinning `slot`.
    #[inline]
    pub(crate) fn readers(&self, slot: SlotId) -> usize {
        self.readers[slot.index()].load(Ordering::SeqCst)
    }

    /// Pins the current front and returns it.
    ///
    /// Retries only when an advance swapped front between the load and the
    /// pin, so it is lock-free.
    pub(crate) fn pin_front(&self) -> SlotId {
        loop {
            let slot = self.front();
            self.readers[slot.index()].fetch_add(1, Ordering::SeqCst);
            if self.front() == slot {
                return slot;
            }
            self.unpin(slot);
        }
    }

    #[inline]
    pub(crate) fn unpin(&self, slot: SlotId) {
        self.readers[slot.index()].fetch_sub(1, Ordering::Release);
    }

    /// Moves `slot` into the pending cell, overwriting any unseen submission.
    pub(crate) fn submit(&self, slot: SlotId) {
        self.pending.store(slot.index(), Ordering::Release);
        self.counters.publishes.fetch_add(1, Ordering::Relaxed);
    }

    /// Adopts the pending slot as front, if any.
    ///
    /// Exactly one concurrent caller wins a given submission. The vacated
    /// front (never the adopted slot) goes back to the producer.
    pub(crate) fn adopt_pending(&self) -> Option<SlotId> {
        let next = SlotId::from_pending(self.pending.swap(EMPTY, Ordering::AcqRel))?;
        let vacated = SlotId::from_bit(self.front.swap(next.index(), Ordering::SeqCst));
        let generation = self.counters.adoptions.fetch_add(1, Ordering::Relaxed) + 1;

        match self.reclaim.try_send(vacated) {
            Ok(()) => tracing::trace!(
                rotator = %self.config.name,
                front = ?next,
                reclaimed = ?vacated,
                generation,
                "adopted pending buffer"
            ),
            Err(TrySendError::Disconnected(_)) => tracing::debug!(
                rotator = %self.config.name,
                front = ?next,
                generation,
                "adopted pending buffer after producer dropped"
            ),
            Err(TrySendError::Full(_)) => tracing::error!(
                rotator = %self.config.name,
                reclaimed = ?vacated,
                "reclaim channel full; more than one buffer in flight"
            ),
        }
        Some(next)
    }

    pub(crate) fn record_cancellation(&self) {
        self.counters.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> RotatorStats {
        RotatorStats {
            publishes: self.counters.publishes.load(Ordering::Relaxed),
            adoptions: self.counters.adoptions.load(Ordering::Relaxed),
            cancellations: self.counters.cancellations.load(Ordering::Relaxed),
        }
    }

    /// Shared access to a slot.
    ///
    /// # Safety
    ///
    /// The caller must hold a pin on `slot` taken while it was front, or be
    /// the producer holding `slot` as a drained back buffer.
    #[inline]
    pub(crate) unsafe fn slot(&self, slot: SlotId) -> &T {
        &*self.slots[slot.index()].get()
    }

    /// Exclusive access to a slot.
    ///
    /// # Safety
    ///
    /// The caller must be the producer holding `slot` as back, with its
    /// reader count drained to zero, and must not let the reference outlive
    /// the back role.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slot_mut(&self, slot: SlotId) -> &mut T {
        &mut *self.slots[slot.index()].get()
    }
}

/// Creates a rotator with default configuration.
///
/// `back` seeds the producer's first writable buffer and `front` is what
/// readers see until the first advance.
///
/// ```rust
/// let (_producer, reader) = twinbuf::rotator(String::new(), String::from("ready"));
/// assert_eq!(&*reader.front(), "ready");
/// ```
#[must_use]
pub fn rotator<T>(back: T, front: T) -> (Producer<T>, Reader<T>) {
    rotator_with_config(back, front, RotatorConfig::default())
}

/// Creates a rotator with explicit configuration.
#[must_use]
pub fn rotator_with_config<T>(back: T, front: T, config: RotatorConfig) -> (Producer<T>, Reader<T>) {
    let (reclaim, reclaimed) = bounded(1);
    let shared = Arc::new(Shared {
        slots: [UnsafeCell::new(back), UnsafeCell::new(front)],
        readers: [AtomicUsize::new(0), AtomicUsize::new(0)],
        front: AtomicUsize::new(SlotId::Second.index()),
        pending: AtomicUsize::new(EMPTY),
        reclaim,
        counters: Counters::default(),
        config,
    });
    let producer = Producer::new(Arc::clone(&shared), SlotId::First, reclaimed);
    (producer, Reader::new(shared))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_roles() {
        assert_eq!(SlotId::First.other(), SlotId::Second);
        assert_eq!(SlotId::Second.other(), SlotId::First);
        assert_eq!(SlotId::First.index(), 0);
        assert_eq!(SlotId::Second.index(), 1);
    }

    #[test]
    fn test_pending_decoding() {
        assert_eq!(SlotId::from_pending(EMPTY), None);
        assert_eq!(SlotId::from_pending(0), Some(SlotId::First));
        assert_eq!(SlotId::from_pending(1), Some(SlotId::Second));
    }

    #[test]
    fn test_initial_roles() {
        let (producer, reader) = rotator(1_u32, 2_u32);
        assert_eq!(producer.back_slot(), Some(SlotId::First));
        assert_eq!(reader.front().slot(), SlotId::Second);
        assert_eq!(*reader.front(), 2);
        assert!(!reader.has_pending());
    }

    #[test]
    fn test_pin_counts() {
        let (_producer, reader) = rotator(0_u8, 0_u8);
        let shared = reader.shared();

        let a = reader.front();
        let b = reader.front();
        assert_eq!(shared.readers(SlotId::Second), 2);
        assert_eq!(shared.readers(SlotId::First), 0);

        drop(a);
        drop(b);
        assert_eq!(shared.readers(SlotId::Second), 0);
    }

    #[test]
    fn test_adopt_sends_vacated_front() {
        let (_producer, reader) = rotator(0_u8, 0_u8);
        let shared = reader.shared();

        shared.submit(SlotId::First);
        assert_eq!(shared.adopt_pending(), Some(SlotId::First));
        assert_eq!(shared.front(), SlotId::First);
        assert_eq!(shared.adopt_pending(), None);

        let stats = shared.stats();
        assert_eq!(stats.publishes, 1);
        assert_eq!(stats.adoptions, 1);
    }
}
