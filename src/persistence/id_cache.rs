use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct IdCache {
    path: PathBuf,
}

impl IdCache {
    /// A cache stored at `path`. Nothing is read until [`IdCache::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached ids. A missing file is an empty cache.
    pub fn load(&self) -> Result<BTreeSet<u8>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };
        let ids: Vec<u8> = serde_json::from_slice(&data)?;
        debug!(path = %self.path.display(), count = ids.len(), "Loaded node id cache");
        Ok(ids.into_iter().collect())
    }

    /// Replace the cache contents with `ids`, in ascending order.
    pub fn store(&self, ids: &BTreeSet<u8>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let list: Vec<u8> = ids.iter().copied().collect();
        let serialized = serde_json::to_vec(&list)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, serialized)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), count = list.len(), "Stored node id cache");
        Ok(())
    }
}
