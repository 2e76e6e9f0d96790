//! Format identifiers for backing files.

use std::borrow::Cow;
use std::fmt;

/// Names the on-disk format of a backing file.
///
/// Formats are keyed by file extension (lowercase, without the dot), so a
/// codec registered for `conf` is found for `app.conf` and `APP.CONF` alike.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Format(pub Cow<'static, str>);

impl Format {
    /// The built-in INI dialect.
    pub const INI: Format = Format(Cow::Borrowed("ini"));

    /// JSON documents.
    pub const JSON: Format = Format(Cow::Borrowed("json"));

    /// Create a format from a static string.
    pub const fn from_static(s: &'static str) -> Self {
        Format(Cow::Borrowed(s))
    }

    /// Create a format from a file extension.
    ///
    /// A leading dot is ignored and the result is lowercased.
    ///
    /// ```rust
    /// use strata_core_store::Format;
    ///
    /// assert_eq!(Format::from_extension(".INI"), Format::INI);
    /// ```
    pub fn from_extension(extension: &str) -> Self {
        Format(Cow::Owned(
            extension.trim_start_matches('.').to_ascii_lowercase(),
        ))
    }

    /// Format implied by a file name, if it has an extension.
    pub fn for_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for Format {
    fn from(s: &'static str) -> Self {
        Format(Cow::Borrowed(s))
    }
}

impl AsRef<str> for Format {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
