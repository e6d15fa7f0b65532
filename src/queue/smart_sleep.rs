use std::collections::BTreeMap;
use std::sync::Mutex;

use super::lock;
use crate::protocol::Message;

/// Deferred messages for smart-sleeping nodes, keyed by `(node_id, child_id)`.
#[derive(Debug, Default)]
pub struct SmartSleepQueue {
    entries: Mutex<BTreeMap<(u8, u8), Message>>,
}

impl SmartSleepQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a message, replacing any pending one for the same node and child.
    /// Returns the replaced message.
    pub fn push(&self, message: Message) -> Option<Message> {
        lock(&self.entries).insert((message.node_id, message.child_id), message)
    }

    /// Remove and return every pending message for `node_id`, ordered by child id.
    pub fn take_node(&self, node_id: u8) -> Vec<Message> {
        let mut entries = lock(&self.entries);
        let keys: Vec<(u8, u8)> = entries
            .range((node_id, u8::MIN)..=(node_id, u8::MAX))
            .map(|(key, _)| *key)
            .collect();
        keys.into_iter()
            .filter_map(|key| entries.remove(&key))
            .collect()
    }

    /// A copy of the pending message for `(node_id, child_id)`.
    pub fn get(&self, node_id: u8, child_id: u8) -> Option<Message> {
        lock(&self.entries).get(&(node_id, child_id)).cloned()
    }

    /// Number of held messages.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// True if no message is held.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Drop every held message, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut entries = lock(&self.entries);
        let dropped = entries.len();
        entries.clear();
        dropped
    }
}
