use std::path::Path;
use std::sync::Arc;

use crate::cache::BackingStoreCache;
use crate::registry::FormatRegistry;
use crate::settings::Settings;
use crate::Error;

/// Everything settings controllers in one process share: the backing
/// store cache and the format registry.
#[derive(Debug, Default)]
pub struct SettingsContext {
    cache: Arc<BackingStoreCache>,
    registry: FormatRegistry,
}

impl SettingsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: FormatRegistry) -> Self {
        Self {
            cache: Arc::new(BackingStoreCache::new()),
            registry,
        }
    }

    pub fn cache(&self) -> &Arc<BackingStoreCache> {
        &self.cache
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Open a controller over `paths`, most specific first.
    pub fn open<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> Result<Settings, Error> {
        Settings::open(Arc::clone(&self.cache), &self.registry, paths)
    }
}
