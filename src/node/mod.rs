//! Sensor-network node bookkeeping.
//!
//! [`NodeTable`] is the single mutex-guarded map of known nodes; every
//! lookup-or-create, child attach and reachability flip is one critical
//! section. [`NodeIdAllocator`] hands out free ids and keeps the on-disk id
//! cache in sync with the table.

pub mod allocator;
pub mod model;
pub mod table;

pub use allocator::NodeIdAllocator;
pub use model::{Child, Node};
pub use table::{NodeTable, Observation};

/// Lowest id a sensor node may use (0 is the gateway).
pub const MIN_NODE_ID: u8 = 1;
/// Highest id a sensor node may use (255 is broadcast).
pub const MAX_NODE_ID: u8 = 254;

/// True for ids a sensor node may use.
pub fn is_valid_node_id(id: u8) -> bool {
    (MIN_NODE_ID..=MAX_NODE_ID).contains(&id)
}
