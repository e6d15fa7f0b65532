use std::collections::BTreeSet;
use std::path::Path;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::warn;

use crate::persistence::IdCache;

#[derive(Debug)]
enum Mode {
    /// No runtime was available at construction; write on the caller's thread.
    Inline,
    /// A background task writes the latest snapshot on the blocking pool.
    Background(watch::Sender<BTreeSet<u8>>),
}

/// Keeps file I/O for the id cache off the task that reports new ids.
///
/// Snapshots are coalesced: if several arrive while a write is in flight,
/// only the newest one is written next. The background task ends when the
/// writer is dropped.
#[derive(Debug)]
pub struct CacheWriter {
    cache: IdCache,
    mode: Mode,
}

impl CacheWriter {
    /// Create a writer for `cache`. Inside a tokio runtime the writes run on a
    /// background task; outside one they run inline.
    pub fn new(cache: IdCache) -> Self {
        let mode = match Handle::try_current() {
            Ok(handle) => {
                let (tx, rx) = watch::channel(BTreeSet::new());
                handle.spawn(run_cache_writer(cache.clone(), rx));
                Mode::Background(tx)
            }
            Err(_) => Mode::Inline,
        };
        Self { cache, mode }
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        self.cache.path()
    }

    /// True when writes happen on a background task.
    pub fn is_background(&self) -> bool {
        matches!(self.mode, Mode::Background(_))
    }

    /// Schedule `ids` to replace the cache contents.
    pub fn write(&self, ids: BTreeSet<u8>) {
        match &self.mode {
            Mode::Inline => store_logged(&self.cache, &ids),
            Mode::Background(tx) => {
                tx.send_replace(ids);
            }
        }
    }
}

async fn run_cache_writer(cache: IdCache, mut snapshots: watch::Receiver<BTreeSet<u8>>) {
    while snapshots.changed().await.is_ok() {
        let ids = snapshots.borrow_and_update().clone();
        let cache = cache.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || store_logged(&cache, &ids)).await {
            warn!("Id cache write task failed: {e}");
        }
    }
}

fn store_logged(cache: &IdCache, ids: &BTreeSet<u8>) {
    if let Err(e) = cache.store(ids) {
        warn!(path = %cache.path().display(), "Failed to write id cache: {e}");
    }
}
