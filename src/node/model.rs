use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::protocol::MessageType;

/// One sub-endpoint (sensor/actuator) of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub id: u8,
    /// Sensor type announced in the child's presentation, if seen.
    pub sensor_type: Option<u8>,
    pub description: String,
    /// Last value per `(msgType, subType)`.
    pub values: BTreeMap<(MessageType, u8), String>,
}

impl Child {
    /// A child with no presentation or values yet.
    pub fn new(id: u8) -> Self {
        Self {
            id,
            sensor_type: None,
            description: String::new(),
            values: BTreeMap::new(),
        }
    }

    /// Last value recorded for `(msg_type, sub_type)`.
    pub fn value(&self, msg_type: MessageType, sub_type: u8) -> Option<&str> {
        self.values.get(&(msg_type, sub_type)).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: u8,
    pub reachable: bool,
    /// `None` until the first frame from this node arrives (reserved ids).
    pub last_seen: Option<DateTime<Utc>>,
    pub children: BTreeMap<u8, Child>,
}

impl Node {
    /// An unreachable node with no children.
    pub fn new(id: u8) -> Self {
        Self {
            id,
            reachable: false,
            last_seen: None,
            children: BTreeMap::new(),
        }
    }

    /// Look up a child by id.
    pub fn child(&self, child_id: u8) -> Option<&Child> {
        self.children.get(&child_id)
    }
}
