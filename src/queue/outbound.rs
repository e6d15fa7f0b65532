use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};

use super::lock;
use crate::protocol::Message;

/// How long the writer parks on an empty queue before re-checking.
const IDLE_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: Mutex<VecDeque<Message>>,
    notify: Notify,
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and wake the writer.
    pub fn push(&self, message: Message) {
        lock(&self.entries).push_back(message);
        self.notify.notify_one();
    }

    /// Number of queued messages, due or not.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Drop every pending message, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut entries = lock(&self.entries);
        let dropped = entries.len();
        entries.clear();
        dropped
    }

    /// Remove the first queued message carrying the same frame as `frame`.
    pub fn remove_matching(&self, frame: &Message) -> Option<Message> {
        let mut entries = lock(&self.entries);
        let index = entries.iter().position(|m| m.same_frame(frame))?;
        entries.remove(index)
    }

    /// Take the first message that is due at `now`.
    ///
    /// When nothing is due, returns the earliest pending due time (or `None`
    /// for an empty queue).
    pub fn take_due(&self, now: Instant) -> Result<Message, Option<Instant>> {
        let mut entries = lock(&self.entries);
        match entries.iter().position(|m| m.is_due(now)) {
            Some(index) => entries.remove(index).ok_or(None),
            None => Err(entries.iter().filter_map(|m| m.next_send).min()),
        }
    }

    /// Wait until a message is due and take it.
    pub async fn pop_due(&self) -> Message {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wake_at = match self.take_due(Instant::now()) {
                Ok(message) => return message,
                Err(next) => next.unwrap_or_else(|| Instant::now() + IDLE_WAIT),
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_until(wake_at) => {}
            }
        }
    }
}
