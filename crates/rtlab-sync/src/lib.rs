//! Synchronization fabric for cooperating periodic and sporadic real-time tasks.
//!
//! This crate provides the primitives tasks use to coordinate with each other:
//!
//! - **Semaphore**: counting/binary semaphore with FIFO wake order and direct
//!   handoff to the oldest waiter
//! - **Guarded**: a value only reachable while its binary semaphore is held
//! - **Handoff**: producer → consumer link (binary "latest" or counting "queued")
//! - **ShutdownSignal**: cooperative, one-shot shutdown latch that wakes every
//!   blocked wait it is attached to
//!
//! # Error policy
//!
//! Bounded waits that expire return [`SyncError::Timeout`], which callers treat
//! as routine and retry. Shutdown surfaces as [`SyncError::Shutdown`] and ends
//! the caller's loop.
//!
//! # Example
//!
//! ```
//! use rtlab_sync::{Handoff, ShutdownSignal};
//! use std::thread;
//!
//! let shutdown = ShutdownSignal::new();
//! let link = std::sync::Arc::new(Handoff::latest("samples", Some(&shutdown)));
//!
//! let consumer = {
//!     let link = link.clone();
//!     thread::spawn(move || link.receive())
//! };
//!
//! link.publish(42)?;
//! assert_eq!(consumer.join().ok(), Some(Ok(42)));
//! # Ok::<(), rtlab_sync::SyncError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![warn(missing_docs)]

pub mod error;
pub mod guarded;
pub mod handoff;
pub mod semaphore;
pub mod shutdown;

pub mod prelude;

pub use error::{SyncError, SyncResult};
pub use guarded::{Guarded, GuardedRef};
pub use handoff::{Handoff, HandoffMode, Publish};
pub use semaphore::{Permit, Release, Semaphore, SemaphoreBuilder};
pub use shutdown::ShutdownSignal;
