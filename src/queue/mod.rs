//! Outbound message queues.
//!
//! - [`OutboundQueue`]: FIFO of messages waiting for the frame writer. Entries
//!   carry an optional due time; the writer always takes the first due entry
//!   in arrival order and sleeps when nothing is due.
//! - [`SmartSleepQueue`]: at most one deferred message per `(node, child)`,
//!   released onto the outbound queue when the node wakes up.
//!
//! Both are internally synchronized; compound operations (match-and-remove,
//! replace-if-present, drain-by-node) happen under a single lock.

pub mod outbound;
pub mod smart_sleep;

pub use outbound::OutboundQueue;
pub use smart_sleep::SmartSleepQueue;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
