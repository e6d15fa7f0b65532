use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use chrono::Utc;

use super::{MAX_NODE_ID, MIN_NODE_ID, Node, is_valid_node_id};
use crate::node::model::Child;
use crate::protocol::{Message, MessageType, NO_CHILD_ID};
use crate::queue::lock;

/// What changed while recording an inbound message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    pub discovered: bool,
    pub became_reachable: bool,
}

#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: Mutex<BTreeMap<u8, Node>>,
}

impl NodeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a node with this id is known.
    pub fn contains(&self, id: u8) -> bool {
        lock(&self.nodes).contains_key(&id)
    }

    /// A copy of the node, if known.
    pub fn get(&self, id: u8) -> Option<Node> {
        lock(&self.nodes).get(&id).cloned()
    }

    /// Number of known nodes.
    pub fn len(&self) -> usize {
        lock(&self.nodes).len()
    }

    /// True if no node is known.
    pub fn is_empty(&self) -> bool {
        lock(&self.nodes).is_empty()
    }

    /// Ids of every known node, ascending.
    pub fn ids(&self) -> BTreeSet<u8> {
        lock(&self.nodes).keys().copied().collect()
    }

    /// Copies of every known node, ordered by id.
    pub fn snapshot(&self) -> Vec<Node> {
        lock(&self.nodes).values().cloned().collect()
    }

    /// Register an empty node under `id`. Returns `false` if it already exists.
    pub fn insert(&self, id: u8) -> bool {
        let mut nodes = lock(&self.nodes);
        if nodes.contains_key(&id) {
            return false;
        }
        nodes.insert(id, Node::new(id));
        true
    }

    /// Forget a node, returning it if it was known.
    pub fn remove(&self, id: u8) -> Option<Node> {
        lock(&self.nodes).remove(&id)
    }

    /// Find the lowest valid id that is neither in the table nor in `excluded`
    /// and register an empty node for it, in one critical section.
    pub fn reserve_lowest(&self, excluded: &BTreeSet<u8>) -> Option<u8> {
        let mut nodes = lock(&self.nodes);
        let id = (MIN_NODE_ID..=MAX_NODE_ID)
            .find(|id| !nodes.contains_key(id) && !excluded.contains(id))?;
        nodes.insert(id, Node::new(id));
        Some(id)
    }

    /// Record an inbound message from a sensor node: create the node if
    /// unknown, refresh `last_seen`, mark it reachable, attach presented
    /// children and remember set values.
    pub fn observe(&self, message: &Message) -> Option<Observation> {
        if !is_valid_node_id(message.node_id) {
            return None;
        }

        let mut nodes = lock(&self.nodes);
        let mut observation = Observation::default();
        let node = nodes.entry(message.node_id).or_insert_with(|| {
            observation.discovered = true;
            Node::new(message.node_id)
        });

        node.last_seen = Some(Utc::now());
        if !node.reachable {
            node.reachable = true;
            observation.became_reachable = true;
        }

        if message.child_id != NO_CHILD_ID {
            match message.msg_type {
                MessageType::Presentation => {
                    let child = node
                        .children
                        .entry(message.child_id)
                        .or_insert_with(|| Child::new(message.child_id));
                    child.sensor_type = Some(message.sub_type);
                    child.description = message.payload.clone();
                }
                MessageType::Set => {
                    node.children
                        .entry(message.child_id)
                        .or_insert_with(|| Child::new(message.child_id))
                        .values
                        .insert((message.msg_type, message.sub_type), message.payload.clone());
                }
                _ => {}
            }
        }

        Some(observation)
    }

    /// Set every node's reachability, returning the ids that changed.
    pub fn set_all_reachable(&self, reachable: bool) -> Vec<u8> {
        let mut nodes = lock(&self.nodes);
        nodes
            .values_mut()
            .filter(|node| node.reachable != reachable)
            .map(|node| {
                node.reachable = reachable;
                node.id
            })
            .collect()
    }
}
