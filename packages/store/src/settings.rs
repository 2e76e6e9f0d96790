//! The settings controller.

use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;

use strata_core_store::key::{join, validate_name};
use strata_core_store::{Codec, Format, Key, Status, Value};

use crate::cache::BackingStoreCache;
use crate::entry::BackingStore;
use crate::groups::{AddressStack, ArraySize};
use crate::merge::{self, ChildKind};
use crate::registry::FormatRegistry;
use crate::Error;

/// A view over an ordered list of settings files.
///
/// The first file is the primary layer: every write goes there. Reads fall
/// back through the remaining layers in order unless fallbacks are turned
/// off. Keys are addressed relative to the current group/array stack.
///
/// Edits stay in memory until [`sync`](Self::sync). Dropping a `Settings`
/// releases its layers but does not write them.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use strata_store::{BackingStoreCache, FormatRegistry, Settings};
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache = Arc::new(BackingStoreCache::new());
/// let registry = FormatRegistry::new();
///
/// let mut settings = Settings::open(cache, &registry, [dir.path().join("app.ini")]).unwrap();
/// settings.enter_group("window").unwrap();
/// settings.set_value("width", 640).unwrap();
/// settings.leave_group().unwrap();
/// settings.sync().unwrap();
///
/// assert_eq!(settings.value("window/width").and_then(|v| v.to_int()), Some(640));
/// ```
pub struct Settings {
    cache: Arc<BackingStoreCache>,
    layers: Vec<Arc<BackingStore>>,
    /// Last parse generation of each layer folded into `status`.
    seen: Vec<Cell<u64>>,
    stack: AddressStack,
    status: Cell<Status>,
    fallbacks: bool,
    atomic_sync: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("layers", &self.layers)
            .field("group", &self.stack.current_prefix())
            .field("status", &self.status.get())
            .finish()
    }
}

impl Settings {
    /// Open `paths` (most specific first), choosing codecs from `registry`.
    pub fn open<P: AsRef<Path>>(
        cache: Arc<BackingStoreCache>,
        registry: &FormatRegistry,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Self, Error> {
        Self::open_with(cache, paths, |path| registry.codec_for_path(path))
    }

    /// Open `paths` with a codec chosen per path by `codec_for`.
    pub fn open_with<P: AsRef<Path>>(
        cache: Arc<BackingStoreCache>,
        paths: impl IntoIterator<Item = P>,
        mut codec_for: impl FnMut(&Path) -> Arc<dyn Codec>,
    ) -> Result<Self, Error> {
        let layers: Vec<Arc<BackingStore>> = paths
            .into_iter()
            .map(|p| {
                let path = p.as_ref();
                cache.acquire(path, codec_for(path))
            })
            .collect();
        if layers.is_empty() {
            return Err(Error::NoLayers);
        }
        log::debug!(
            "settings over {}",
            layers
                .iter()
                .map(|l| l.path().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            seen: layers.iter().map(|_| Cell::new(0)).collect(),
            cache,
            layers,
            stack: AddressStack::new(),
            status: Cell::new(Status::NoError),
            fallbacks: true,
            atomic_sync: true,
        })
    }

    fn primary(&self) -> &Arc<BackingStore> {
        &self.layers[0]
    }

    /// Layers consulted for reads.
    fn visible(&self) -> &[Arc<BackingStore>] {
        if self.fallbacks {
            &self.layers
        } else {
            &self.layers[..1]
        }
    }

    fn raise(&self, status: Status) {
        self.status.set(self.status.get().merge(status));
    }

    /// Fold the outcome of any parse that happened since we last looked.
    fn note_loads(&self) {
        for (layer, seen) in self.layers.iter().zip(&self.seen) {
            let (generation, status) = layer.load_report();
            if generation != 0 && generation != seen.get() {
                seen.set(generation);
                self.raise(status);
            }
        }
    }

    // ---- values ----

    pub fn value(&self, key: &str) -> Option<Value> {
        let path = match self.stack.resolve(key) {
            Ok(path) => path,
            Err(e) => {
                log::debug!("ignoring lookup of '{}': {}", key, e);
                return None;
            }
        };
        let value = merge::get(self.visible(), &path);
        self.note_loads();
        value
    }

    pub fn value_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.value(key).unwrap_or_else(|| default.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Set `key` in the primary layer.
    pub fn set_value(&self, key: &str, value: impl Into<Value>) -> Result<(), Error> {
        let path = self.stack.resolve(key)?;
        self.set_path(&path, value.into())
    }

    fn set_path(&self, path: &str, value: Value) -> Result<(), Error> {
        let primary = self.primary();
        let key = Key::parse(path, primary.case_sensitivity())?;
        log::trace!("set {} = {}", key, value);
        primary.set(key, value);
        self.note_loads();
        Ok(())
    }

    /// Remove `key` and everything below it.
    ///
    /// Keys that only exist in fallback layers are hidden too, whether or
    /// not fallbacks are currently enabled. Removing a key that exists in
    /// no layer changes nothing.
    pub fn remove(&self, key: &str) -> Result<(), Error> {
        let path = self.stack.resolve(key)?;
        let layers = &self.layers[..];

        let mut targets = Vec::new();
        if merge::get(layers, &path).is_some() {
            targets.push(path.clone());
        }
        targets.extend(
            merge::children(layers, &path, ChildKind::AllKeys)
                .into_iter()
                .map(|rel| join(&path, &rel)),
        );

        let primary = self.primary();
        for target in &targets {
            primary.remove(Key::parse(target, primary.case_sensitivity())?);
        }
        log::trace!("removed {} keys under '{}'", targets.len(), path);
        self.note_loads();
        Ok(())
    }

    /// Remove every key in the primary layer. Fallback layers are untouched.
    pub fn clear(&self) {
        let primary = self.primary();
        let (effective, _) = primary.view();
        for key in effective.keys() {
            primary.remove(key.clone());
        }
        self.note_loads();
    }

    // ---- listing ----

    fn list(&self, kind: ChildKind) -> Vec<String> {
        let names = merge::children(self.visible(), &self.stack.current_prefix(), kind);
        self.note_loads();
        names
    }

    /// Every key below the current group, as relative paths.
    pub fn all_keys(&self) -> Vec<String> {
        self.list(ChildKind::AllKeys)
    }

    /// Keys directly in the current group.
    pub fn child_keys(&self) -> Vec<String> {
        self.list(ChildKind::ChildKeys)
    }

    /// Groups directly in the current group.
    pub fn child_groups(&self) -> Vec<String> {
        self.list(ChildKind::ChildGroups)
    }

    // ---- groups and arrays ----

    pub fn enter_group(&mut self, name: &str) -> Result<(), Error> {
        self.stack.enter_group(name)
    }

    pub fn leave_group(&mut self) -> Result<(), Error> {
        self.stack.leave_group().map(|_| ())
    }

    /// The current group prefix, `""` at the top level.
    pub fn group(&self) -> String {
        self.stack.current_prefix()
    }

    /// Enter an array for reading and return its size.
    ///
    /// The size comes from `<name>/size`, or failing that from the number
    /// of contiguous elements `1, 2, ...` present.
    pub fn begin_read_array(&mut self, name: &str) -> Result<usize, Error> {
        validate_name(name)?;
        let prefix = join(&self.stack.current_prefix(), name);
        let layers = self.visible();
        let size = match merge::get(layers, &join(&prefix, "size")).and_then(|v| v.to_int()) {
            Some(n) if n >= 0 => n as usize,
            _ => merge::contiguous_elements(layers, &prefix),
        };
        self.note_loads();
        self.stack.enter_array(name, ArraySize::Known(size), false)?;
        Ok(size)
    }

    /// Enter an array for writing.
    pub fn enter_array(&mut self, name: &str, size: ArraySize) -> Result<(), Error> {
        self.stack.enter_array(name, size, true)
    }

    /// Select element `i` (0-based) of the innermost array.
    pub fn set_array_index(&mut self, i: usize) -> Result<(), Error> {
        self.stack.set_array_index(i)
    }

    /// Leave the innermost array, recording its size if it was written.
    pub fn leave_array(&mut self) -> Result<(), Error> {
        let frame = self.stack.leave_array()?;
        if let Some(size) = frame.final_size() {
            let path = join(&join(&self.stack.current_prefix(), frame.name()), "size");
            self.set_path(&path, Value::Integer(size as i64))?;
        }
        Ok(())
    }

    // ---- persistence ----

    /// Write pending edits of the primary layer, then pick up external
    /// changes to every layer.
    pub fn sync(&self) -> Result<(), Error> {
        let result = self.primary().flush(self.atomic_sync);
        if let Err(e) = &result {
            log::warn!("sync of {} failed: {}", self.file_name().display(), e);
            self.raise(if e.is_format_error() {
                Status::FormatError
            } else {
                Status::AccessError
            });
        }
        self.update();
        self.note_loads();
        result
    }

    /// Re-read any layer that changed on disk. In-process edits win.
    pub fn update(&self) {
        for layer in &self.layers {
            if layer.refresh() {
                log::trace!("{} will be re-read", layer.path().display());
            }
        }
    }

    /// Sticky status: the first error since the last reset.
    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn reset_status(&self) {
        self.status.set(Status::NoError);
    }

    // ---- configuration ----

    /// Path of the primary layer.
    pub fn file_name(&self) -> &Path {
        self.primary().path()
    }

    pub fn format(&self) -> Format {
        self.primary().format()
    }

    pub fn is_writable(&self) -> bool {
        self.primary().is_writable()
    }

    pub fn fallbacks_enabled(&self) -> bool {
        self.fallbacks
    }

    pub fn set_fallbacks_enabled(&mut self, enabled: bool) {
        self.fallbacks = enabled;
    }

    pub fn atomic_sync_required(&self) -> bool {
        self.atomic_sync
    }

    /// Choose between temp-file-and-rename (the default) and in-place
    /// writes.
    pub fn set_atomic_sync_required(&mut self, required: bool) {
        self.atomic_sync = required;
    }
}

impl Drop for Settings {
    fn drop(&mut self) {
        for layer in self.layers.drain(..) {
            self.cache.release(layer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn open(paths: &[&std::path::PathBuf]) -> (Arc<BackingStoreCache>, Settings) {
        let cache = Arc::new(BackingStoreCache::new());
        let settings = Settings::open(Arc::clone(&cache), &FormatRegistry::new(), paths.iter()).unwrap();
        (cache, settings)
    }

    #[test]
    fn requires_a_layer() {
        let cache = Arc::new(BackingStoreCache::new());
        let empty: [&Path; 0] = [];
        assert!(matches!(
            Settings::open(cache, &FormatRegistry::new(), empty),
            Err(Error::NoLayers)
        ));
    }

    #[test]
    fn keys_resolve_against_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.ini");
        let (_cache, mut settings) = open(&[&path]);

        settings.enter_group("window").unwrap();
        settings.set_value("width", 640).unwrap();
        assert_eq!(settings.group(), "window");
        assert_eq!(settings.child_keys(), vec!["width"]);
        settings.leave_group().unwrap();

        assert_eq!(settings.value("window/width"), Some(Value::Integer(640)));
        assert_eq!(settings.child_groups(), vec!["window"]);
    }

    #[test]
    fn value_or_and_contains() {
        let dir = tempfile::tempdir().unwrap();
        let (_cache, settings) = open(&[&dir.path().join("s.ini")]);
        assert!(!settings.contains("missing"));
        assert_eq!(settings.value_or("missing", "dflt"), Value::from("dflt"));
        settings.set_value("present", true).unwrap();
        assert!(settings.contains("present"));
    }

    #[test]
    fn empty_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (_cache, settings) = open(&[&dir.path().join("s.ini")]);
        assert!(settings.set_value("", 1).is_err());
        assert_eq!(settings.value(""), None);
    }

    #[test]
    fn remove_takes_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.ini");
        fs::write(&path, "[g]\na=1\n[g/sub]\nb=2\n[h]\nc=3\n").unwrap();
        let (_cache, settings) = open(&[&path]);

        settings.remove("g").unwrap();
        assert_eq!(settings.all_keys(), vec!["h/c"]);
    }

    #[test]
    fn clear_only_touches_primary() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.ini");
        let system = dir.path().join("system.ini");
        fs::write(&user, "a=1\n").unwrap();
        fs::write(&system, "b=2\n").unwrap();
        let (_cache, settings) = open(&[&user, &system]);

        settings.clear();
        assert_eq!(settings.all_keys(), vec!["b"]);
    }

    #[test]
    fn write_array_records_size() {
        let dir = tempfile::tempdir().unwrap();
        let (_cache, mut settings) = open(&[&dir.path().join("s.ini")]);

        settings.enter_array("items", ArraySize::AutoGrow).unwrap();
        for (i, name) in ["a", "b"].iter().enumerate() {
            settings.set_array_index(i).unwrap();
            settings.set_value("name", *name).unwrap();
        }
        settings.leave_array().unwrap();

        assert_eq!(settings.value("items/size"), Some(Value::Integer(2)));
        assert_eq!(settings.value("items/2/name"), Some(Value::from("b")));
        assert_eq!(settings.begin_read_array("items").unwrap(), 2);
    }

    #[test]
    fn read_array_counts_elements_without_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.ini");
        fs::write(&path, "[list/1]\nv=a\n[list/2]\nv=b\n").unwrap();
        let (_cache, mut settings) = open(&[&path]);

        assert_eq!(settings.begin_read_array("list").unwrap(), 2);
        settings.set_array_index(1).unwrap();
        assert_eq!(settings.value("v"), Some(Value::from("b")));
        settings.leave_array().unwrap();
        // Reading never writes a size.
        assert!(!settings.contains("list/size"));
    }

    #[test]
    fn format_fault_raises_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.ini");
        fs::write(&path, "[bad]\nnope\n").unwrap();
        let (_cache, settings) = open(&[&path]);

        assert_eq!(settings.value("bad/nope"), None);
        assert_eq!(settings.status(), Status::FormatError);
        settings.reset_status();
        assert_eq!(settings.value("bad/nope"), None);
        assert_eq!(settings.status(), Status::NoError);
    }

    #[test]
    fn drop_releases_layers() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, settings) = open(&[&dir.path().join("a.ini"), &dir.path().join("b.ini")]);
        assert_eq!(cache.len(), 2);
        drop(settings);
        assert!(cache.is_empty());
    }
}
