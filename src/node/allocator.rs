//! Node id allocation.
//!
//! An id is free when it is neither in the node table nor in the set of ids
//! already given out (seeded from the id cache at startup). Allocation picks
//! the lowest free id in `1..=254`, registers an empty node for it, and
//! rewrites the cache with every known id.

use std::collections::BTreeSet;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::node::NodeTable;
use crate::persistence::{CacheWriter, IdCache};
use crate::queue::lock;
use crate::utils::{GatewayError, Result};

#[derive(Debug)]
pub struct NodeIdAllocator {
    writer: CacheWriter,
    given: Mutex<BTreeSet<u8>>,
}

impl NodeIdAllocator {
    /// Create an allocator seeded from `cache`. An unreadable cache is
    /// logged and treated as empty.
    pub fn new(cache: IdCache) -> Self {
        let given = cache.load().unwrap_or_else(|e| {
            warn!(path = %cache.path().display(), "Ignoring unreadable id cache: {e}");
            BTreeSet::new()
        });
        Self {
            writer: CacheWriter::new(cache),
            given: Mutex::new(given),
        }
    }

    /// Ids handed out so far, including those seeded from the cache.
    pub fn given_ids(&self) -> BTreeSet<u8> {
        lock(&self.given).clone()
    }

    /// Reserve the lowest free id, register it in `nodes` and persist the cache.
    ///
    /// Fails with [`GatewayError::IdsExhausted`] when `1..=254` is full.
    pub fn reserve(&self, nodes: &NodeTable) -> Result<u8> {
        let mut given = lock(&self.given);
        let id = nodes
            .reserve_lowest(&given)
            .ok_or(GatewayError::IdsExhausted)?;
        given.insert(id);
        self.persist(&given, nodes);
        info!(node_id = id, "Reserved node id");
        Ok(id)
    }

    /// Record an id that showed up on the network without being allocated
    /// here. Returns `true` if it was new.
    pub fn remember(&self, id: u8, nodes: &NodeTable) -> bool {
        let mut given = lock(&self.given);
        if !given.insert(id) {
            return false;
        }
        self.persist(&given, nodes);
        true
    }

    fn persist(&self, given: &BTreeSet<u8>, nodes: &NodeTable) {
        let mut all = nodes.ids();
        all.extend(given.iter().copied());
        self.writer.write(all);
    }
}
