//! # Reader Handles
//!
//! Any number of readers, on any threads. Reading and advancing never block.

#![allow(unsafe_code)]

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::shared::{RotatorStats, Shared, SlotId};

/// Reader side of a rotator. Clone it freely.
pub struct Reader<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Reader<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// Borrows the current front value.
    ///
    /// The buffer stays pinned until the guard drops: the producer cannot get
    /// it back for writing in the meantime, so the guard always sees one
    /// complete published value. Drop guards promptly, since a pinned buffer
    /// holds up the producer's next acquire.
    #[inline]
    #[must_use]
    pub fn front(&self) -> FrontGuard<'_, T> {
        FrontGuard::pin(&self.shared)
    }

    /// Copies the current front value.
    #[must_use]
    pub fn read_current(&self) -> T
    where
        T: Clone,
    {
        (*self.front()).clone()
    }

    /// Adopts a pending publish as the new front, if there is one.
    ///
    /// Safe to race from many threads: for each publish exactly one caller
    /// gets `changed() == true`, the rest see the front as it stands.
    pub fn advance(&self) -> Advance<'_, T> {
        let changed = self.shared.adopt_pending().is_some();
        Advance {
            front: self.front(),
            changed,
        }
    }

    /// Whether a publish is waiting for an advance.
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.shared.has_pending()
    }

    /// Number of publishes adopted so far.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.stats().adoptions
    }

    /// Snapshot of the rotator's counters.
    #[must_use]
    pub fn stats(&self) -> RotatorStats {
        self.shared.stats()
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Shared<T> {
        &self.shared
    }
}

impl<T> Clone for Reader<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("rotator", &self.shared.config().name)
            .field("front", &self.shared.front())
            .field("pending", &self.shared.has_pending())
            .finish_non_exhaustive()
    }
}

/// Pinned borrow of the front buffer.
pub struct FrontGuard<'a, T> {
    shared: &'a Shared<T>,
    slot: SlotId,
}

impl<'a, T> FrontGuard<'a, T> {
    fn pin(shared: &'a Shared<T>) -> Self {
        let slot = shared.pin_front();
        Self { shared, slot }
    }

    /// The slot this guard pins.
    #[inline]
    #[must_use]
    pub const fn slot(&self) -> SlotId {
        self.slot
    }
}

impl<T> Deref for FrontGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: pinned while front; the producer waits for the pin count
        // to drain before writing this slot again.
        unsafe { self.shared.slot(self.slot) }
    }
}

impl<T> Drop for FrontGuard<'_, T> {
    fn drop(&mut self) {
        self.shared.unpin(self.slot);
    }
}

impl<T: fmt::Debug> fmt::Debug for FrontGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontGuard")
            .field("slot", &self.slot)
            .field("value", &**self)
            .finish()
    }
}

/// Outcome of [`Reader::advance`]: the front value and whether this call
/// adopted it.
pub struct Advance<'a, T> {
    front: FrontGuard<'a, T>,
    changed: bool,
}

impl<'a, T> Advance<'a, T> {
    /// True if this call swapped a pending publish in.
    #[inline]
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.changed
    }

    /// Splits into the front guard and the changed flag.
    #[must_use]
    pub fn into_parts(self) -> (FrontGuard<'a, T>, bool) {
        (self.front, self.changed)
    }
}

impl<T> Deref for Advance<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.front
    }
}

impl<T: fmt::Debug> fmt::Debug for Advance<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advance")
            .field("front", &self.front)
            .field("changed", &self.changed)
            .finish()
    }
}
