//! # TWINBUF
//!
//! Read-optimized double buffering: one producer prepares the next version
//! of a value while any number of readers observe the latest published one.
//!
//! ## Architecture Rules
//!
//! 1. **Exactly two buffers** - allocated once at construction, only their
//!    roles (back / front) ever change
//! 2. **Readers never block** - reading and advancing are lock-free
//! 3. **Bounded backpressure** - at most one publish is ever pending; the
//!    producer waits for the freed front before writing again
//!
//! ## Example
//!
//! ```rust
//! use twinbuf::{rotator, Context};
//!
//! let (mut producer, reader) = rotator(0_u64, 0_u64);
//!
//! *producer.acquire(&Context::background()).unwrap() = 42;
//! producer.publish();
//!
//! let advanced = reader.advance();
//! assert!(advanced.changed());
//! assert_eq!(*advanced, 42);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod sync;

pub use cancel::{CancelHandle, Context};
pub use config::RotatorConfig;
pub use error::{ConfigError, RotatorError, RotatorResult};
pub use sync::{
    rotator, rotator_with_config, Advance, FrontGuard, Producer, ProducerState, Reader,
    RotatorStats, SlotId,
};
