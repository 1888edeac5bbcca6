//! # Buffer Rotation
//!
//! ## The Problem
//!
//! ```text
//! Producer:  WRITE the next version
//! Readers:   READ the latest version
//!
//! One buffer + no sync:   TORN READS
//! One buffer + Mutex:     READERS STALL THE PRODUCER
//! Fresh buffer per write: ALLOCATION ON EVERY UPDATE
//! ```
//!
//! ## The Solution: Two Slots, Rotating Roles
//!
//! ```text
//!   Producer ──acquire──> [back]            [front] <──front/advance── Readers
//!       │                    │                 ▲
//!       └──publish──> pending cell ──advance───┘
//!                                              │
//!   Producer <──── reclaim channel (cap 1) <───┘  old front, once unpinned
//! ```
//!
//! Slots never move. Only the back/front labels swap, through two single-slot
//! handoff points: the pending cell (producer to readers) and the reclaim
//! channel (readers to producer).

mod producer;
mod reader;
mod shared;

pub use producer::{Producer, ProducerState};
pub use reader::{Advance, FrontGuard, Reader};
pub use shared::{rotator, rotator_with_config, RotatorStats, SlotId};
