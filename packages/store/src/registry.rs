//! Mapping from file extensions to codecs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use strata_core_store::{Bytes, CaseSensitivity, Codec, Decoded, Error, Format, FnCodec, KeyValueMap};
use strata_ini_store::IniCodec;

/// Chooses a codec for each settings file by its extension.
///
/// Files with an unknown or missing extension use the default codec,
/// which is INI unless configured otherwise.
pub struct FormatRegistry {
    codecs: RwLock<HashMap<Format, Arc<dyn Codec>>>,
    default: Arc<dyn Codec>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_default(IniCodec::new())
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.formats())
            .field("default", &self.default.format())
            .finish()
    }
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(codec: impl Codec + 'static) -> Self {
        Self {
            codecs: RwLock::new(HashMap::new()),
            default: Arc::new(codec),
        }
    }

    /// Use `codec` for files ending in `extension`.
    ///
    /// The extension is matched case-insensitively and may carry a
    /// leading dot. Returns the codec previously registered for it.
    pub fn register(&self, extension: &str, codec: impl Codec + 'static) -> Option<Arc<dyn Codec>> {
        let format = Format::from_extension(extension);
        log::debug!("registering codec for .{}", format);
        self.codecs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(format, Arc::new(codec))
    }

    /// Register a format from a reader and a writer function.
    pub fn register_fn<R, W>(
        &self,
        extension: &str,
        reader: R,
        writer: W,
        case: CaseSensitivity,
    ) -> Option<Arc<dyn Codec>>
    where
        R: Fn(&Bytes) -> Decoded + Send + Sync + 'static,
        W: Fn(&KeyValueMap) -> Result<Bytes, Error> + Send + Sync + 'static,
    {
        let format = Format::from_extension(extension);
        self.register(extension, FnCodec::new(format, reader, writer, case))
    }

    /// The codec registered for exactly `format`, if any.
    pub fn codec(&self, format: &Format) -> Option<Arc<dyn Codec>> {
        self.codecs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(format)
            .cloned()
    }

    /// The codec to use for `path`.
    pub fn codec_for_path(&self, path: &Path) -> Arc<dyn Codec> {
        Format::for_path(path)
            .and_then(|format| self.codec(&format))
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    /// Registered formats, sorted.
    pub fn formats(&self) -> Vec<Format> {
        let mut formats: Vec<Format> = self
            .codecs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        formats.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        formats
    }
}
