//! The `persistence` module stores the set of node ids already handed out,
//! so a restart never reassigns the id of a node that is merely offline.
//!
//! The cache is a small JSON array of integers written atomically (write to a
//! sibling temp file, then rename). [`CacheWriter`] moves those writes onto the
//! blocking pool so a slow disk never stalls inbound frame handling.

pub mod id_cache;
pub mod writer;

pub use id_cache::IdCache;
pub use writer::CacheWriter;
