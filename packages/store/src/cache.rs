//! Process-wide sharing of backing stores.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use strata_core_store::Codec;

use crate::entry::BackingStore;

/// Hands out one [`BackingStore`] per resolved file path.
///
/// The cache only holds weak references; an entry lives for as long as
/// some controller holds it, and is forgotten when the last one releases
/// it.
#[derive(Debug, Default)]
pub struct BackingStoreCache {
    entries: Mutex<HashMap<PathBuf, Weak<BackingStore>>>,
}

impl BackingStoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the shared entry for `path`, creating it if needed.
    ///
    /// `codec` is only used when a new entry is created.
    pub fn acquire(&self, path: &Path, codec: Arc<dyn Codec>) -> Arc<BackingStore> {
        let path = resolve_path(path);
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&path).and_then(Weak::upgrade) {
            log::trace!("reusing cached store for {}", path.display());
            return existing;
        }
        log::debug!("opening store for {} as {}", path.display(), codec.format());
        let entry = Arc::new(BackingStore::open(path.clone(), codec));
        entries.insert(path, Arc::downgrade(&entry));
        entry
    }

    /// Give back a handle obtained from [`acquire`](Self::acquire).
    pub fn release(&self, handle: Arc<BackingStore>) {
        let path = handle.path().to_path_buf();
        let mut entries = self.lock();
        drop(handle);
        if entries.get(&path).is_some_and(|w| w.strong_count() == 0) {
            log::trace!("dropping cached store for {}", path.display());
            entries.remove(&path);
        }
    }

    /// Detach every entry.
    ///
    /// Controllers keep the entries they hold; later acquisitions create
    /// fresh ones.
    pub fn clear(&self) {
        let mut entries = self.lock();
        log::debug!("clearing {} cached stores", entries.len());
        entries.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Weak<BackingStore>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn resolve_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
