//! One settings file, shared by every controller that opened it.
//!
//! A [`BackingStore`] holds the last parsed snapshot of its file plus the
//! edits made in this process. Reads see `(snapshot ∪ added) − removed`;
//! a flush folds the edits into a fresh snapshot and writes it out.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use strata_core_store::{Bytes, CaseSensitivity, Codec, Format, Key, KeyValueMap, Status, Value};

use crate::Error;

/// Size and modification time of a file, used to notice external edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    /// Stat `path`; `None` when it does not exist or is not a file.
    pub fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        if !meta.is_file() {
            return None;
        }
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Result of looking a key up in a single layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(Value),
    /// Removed in this process; lower layers must not be consulted.
    Tombstone,
    Miss,
}

#[derive(Debug, Default)]
struct EntryState {
    stamp: Option<FileStamp>,
    parsed_stamp: Option<FileStamp>,
    snapshot: Option<KeyValueMap>,
    added: KeyValueMap,
    removed: BTreeSet<Key>,
    next_position: usize,
    load_status: Status,
    generation: u64,
}

impl EntryState {
    fn is_dirty(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    fn effective(&self) -> KeyValueMap {
        let mut map = self.snapshot.clone().unwrap_or_default();
        map.retain(|k, _| !self.removed.contains(k));
        for (key, value) in self.added.iter() {
            map.replace(key.clone(), value.clone());
        }
        map
    }
}

pub struct BackingStore {
    path: PathBuf,
    codec: Arc<dyn Codec>,
    state: Mutex<EntryState>,
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStore")
            .field("path", &self.path)
            .field("format", &self.codec.format())
            .finish()
    }
}

impl BackingStore {
    /// Create an entry for `path`. Nothing is read until first use.
    pub fn open(path: PathBuf, codec: Arc<dyn Codec>) -> Self {
        let stamp = FileStamp::of(&path);
        Self {
            path,
            codec,
            state: Mutex::new(EntryState {
                stamp,
                ..EntryState::default()
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.codec.format()
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.codec.case_sensitivity()
    }

    /// Whether the file could be written: it is absent, or a writable
    /// regular file.
    pub fn is_writable(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) => meta.is_file() && !meta.permissions().readonly(),
            Err(_) => true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().is_dirty()
    }

    pub fn lookup(&self, key: &Key) -> Lookup {
        let mut state = self.lock();
        self.ensure_loaded(&mut state);
        if let Some(value) = state.added.get(key) {
            return Lookup::Hit(value.clone());
        }
        if state.removed.contains(key) {
            return Lookup::Tombstone;
        }
        match state.snapshot.as_ref().and_then(|s| s.get(key)) {
            Some(value) => Lookup::Hit(value.clone()),
            None => Lookup::Miss,
        }
    }

    /// The effective map and the keys tombstoned in this process.
    pub fn view(&self) -> (KeyValueMap, BTreeSet<Key>) {
        let mut state = self.lock();
        self.ensure_loaded(&mut state);
        (state.effective(), state.removed.clone())
    }

    /// Set `key`. A key already present keeps its stored spelling and its
    /// place in the file; a new key goes after everything seen so far.
    pub fn set(&self, key: Key, value: Value) {
        let mut state = self.lock();
        self.ensure_loaded(&mut state);
        state.removed.remove(&key);

        let stored = state
            .snapshot
            .as_ref()
            .and_then(|s| s.get_key(&key))
            .or_else(|| state.added.get_key(&key))
            .cloned();
        let key = match stored {
            Some(k) if k.position().is_some() => k,
            other => {
                let position = state.next_position;
                state.next_position += 1;
                other.unwrap_or(key).with_position(position)
            }
        };
        state.added.replace(key, value);
    }

    /// Tombstone `key` in this layer.
    pub fn remove(&self, key: Key) {
        let mut state = self.lock();
        state.added.remove(&key);
        state.removed.insert(key);
    }

    /// Parse generation and the status of the most recent parse.
    pub fn load_report(&self) -> (u64, Status) {
        let state = self.lock();
        (state.generation, state.load_status)
    }

    /// Re-stat the file and drop the snapshot if it changed on disk.
    ///
    /// In-process edits are kept and still take precedence. Returns true
    /// when the next read will re-parse.
    pub fn refresh(&self) -> bool {
        let mut state = self.lock();
        self.restat(&mut state)
    }

    /// Write the effective map back to the file.
    ///
    /// A flush with no pending edits does nothing. On failure the pending
    /// edits are kept so a later flush can retry.
    pub fn flush(&self, atomic: bool) -> Result<(), Error> {
        let mut state = self.lock();
        if !state.is_dirty() {
            return Ok(());
        }
        if !self.is_writable() {
            log::warn!("refusing to write read-only {}", self.path.display());
            return Err(Error::ReadOnly {
                path: self.path.clone(),
            });
        }

        self.restat(&mut state);
        if state.load_status == Status::AccessError {
            // The last read failed; writing now would lose the file's contents.
            state.snapshot = None;
        }
        self.ensure_loaded(&mut state);
        if state.load_status == Status::AccessError && state.stamp.is_some() {
            return Err(Error::Core(strata_core_store::Error::io(
                &self.path,
                io::Error::other("existing file could not be read"),
            )));
        }

        let effective = state.effective();
        let bytes = self.codec.encode(&effective)?;
        write_file(&self.path, &bytes, atomic)
            .map_err(|e| strata_core_store::Error::io(&self.path, e))?;

        log::debug!(
            "wrote {} keys to {} ({} bytes)",
            effective.len(),
            self.path.display(),
            bytes.len()
        );
        state.snapshot = Some(effective);
        state.added = KeyValueMap::new();
        state.removed.clear();
        state.stamp = FileStamp::of(&self.path);
        state.parsed_stamp = state.stamp;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn restat(&self, state: &mut EntryState) -> bool {
        state.stamp = FileStamp::of(&self.path);
        if state.snapshot.is_some() && state.stamp != state.parsed_stamp {
            log::debug!("{} changed on disk", self.path.display());
            state.snapshot = None;
        }
        state.snapshot.is_none()
    }

    fn ensure_loaded(&self, state: &mut EntryState) {
        if state.snapshot.is_some() {
            return;
        }
        state.generation += 1;
        // The stamp taken at open may be stale by the first read.
        state.stamp = FileStamp::of(&self.path);
        state.parsed_stamp = state.stamp;

        if state.stamp.is_none() {
            state.load_status = Status::NoError;
            state.snapshot = Some(KeyValueMap::new());
            return;
        }

        match fs::read(&self.path) {
            Ok(raw) => {
                let decoded = self.codec.decode(&Bytes::from(raw));
                if !decoded.is_clean() {
                    log::warn!(
                        "{}: skipped {} malformed section(s)",
                        self.path.display(),
                        decoded.faults.len()
                    );
                }
                state.load_status = if decoded.is_clean() {
                    Status::NoError
                } else {
                    Status::FormatError
                };
                if let Some(max) = decoded.map.max_position() {
                    state.next_position = state.next_position.max(max + 1);
                }
                log::debug!(
                    "parsed {} keys from {}",
                    decoded.map.len(),
                    self.path.display()
                );
                state.snapshot = Some(decoded.map);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} vanished before it was read", self.path.display());
                state.stamp = None;
                state.parsed_stamp = None;
                state.load_status = Status::NoError;
                state.snapshot = Some(KeyValueMap::new());
            }
            Err(e) => {
                log::warn!("cannot read {}: {}", self.path.display(), e);
                state.load_status = Status::AccessError;
                state.snapshot = Some(KeyValueMap::new());
            }
        }
    }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if state.is_dirty() {
            log::warn!(
                "discarding unsynced changes to {}",
                self.path.display()
            );
        }
    }
}

fn write_file(path: &Path, bytes: &[u8], atomic: bool) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    if atomic {
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(tmp.path(), meta.permissions())?;
        }
        tmp.persist(path).map_err(|e| e.error)?;
    } else {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    Ok(())
}
