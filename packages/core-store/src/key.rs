//! Normalized keys with case-folding and rewrite metadata.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Path separator used inside keys.
pub const SEPARATOR: char = '/';

/// Errors related to key parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key is empty once separators are normalized away.
    Empty,
    /// A single-segment name (group or array) contains a separator.
    NestedName { name: String },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Empty => write!(f, "empty key"),
            KeyError::NestedName { name } => {
                write!(f, "name '{}' must not contain '{}'", name, SEPARATOR)
            }
        }
    }
}

impl std::error::Error for KeyError {}

/// How key text is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    /// Produce the comparison form of `text` under this policy.
    pub fn fold(self, text: &str) -> String {
        match self {
            CaseSensitivity::Sensitive => text.to_string(),
            CaseSensitivity::Insensitive => text.to_lowercase(),
        }
    }
}

/// A normalized, comparable settings key.
///
/// Equality, ordering and hashing use only the comparison form. The
/// original text and on-disk position ride along so a rewrite can keep the
/// caller's casing and the file's key order.
#[derive(Clone, Debug)]
pub struct Key {
    folded: String,
    original: String,
    position: Option<usize>,
}

impl Key {
    /// Parse a raw key path.
    ///
    /// Empty segments are dropped, so `/a//b/` and `a/b` are the same key.
    ///
    /// ```rust
    /// use strata_core_store::{CaseSensitivity, Key};
    ///
    /// let key = Key::parse("/General//Width/", CaseSensitivity::Insensitive).unwrap();
    /// assert_eq!(key.as_str(), "General/Width");
    /// assert_eq!(key.folded(), "general/width");
    /// ```
    pub fn parse(raw: &str, case: CaseSensitivity) -> Result<Self, KeyError> {
        let original = normalize(raw);
        if original.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Key {
            folded: case.fold(&original),
            original,
            position: None,
        })
    }

    /// Same key, tagged with its position in a file or edit sequence.
    #[must_use]
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Original-case text.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Comparison form.
    pub fn folded(&self) -> &str {
        &self.folded
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Original-case segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.original.split(SEPARATOR)
    }

    /// Original-case path of the enclosing section, `""` at the root.
    pub fn section(&self) -> &str {
        match self.original.rfind(SEPARATOR) {
            Some(i) => &self.original[..i],
            None => "",
        }
    }

    /// Comparison form of the enclosing section.
    pub fn folded_section(&self) -> &str {
        match self.folded.rfind(SEPARATOR) {
            Some(i) => &self.folded[..i],
            None => "",
        }
    }

    /// Final segment in original case.
    pub fn name(&self) -> &str {
        match self.original.rfind(SEPARATOR) {
            Some(i) => &self.original[i + 1..],
            None => &self.original,
        }
    }

    /// True if this key is `prefix` itself or lies below it.
    ///
    /// `prefix` is a comparison-form path; the empty prefix matches
    /// everything.
    pub fn is_within(&self, folded_prefix: &str) -> bool {
        if folded_prefix.is_empty() {
            return true;
        }
        match self.folded.strip_prefix(folded_prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// Original-case path relative to a prefix of `depth` segments.
    ///
    /// Returns `None` when nothing remains below the prefix.
    pub fn relative(&self, depth: usize) -> Option<String> {
        let rest: Vec<&str> = self.segments().skip(depth).collect();
        if rest.is_empty() {
            None
        } else {
            Some(rest.join("/"))
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded.cmp(&other.folded)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Collapse repeated separators and strip leading/trailing ones.
pub fn normalize(raw: &str) -> String {
    raw.split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join two already-normalized paths.
pub fn join(prefix: &str, rest: &str) -> String {
    match (prefix.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}{}{}", prefix, SEPARATOR, rest),
    }
}

/// Validate a single-segment group or array name.
pub fn validate_name(name: &str) -> Result<(), KeyError> {
    if name.is_empty() {
        return Err(KeyError::Empty);
    }
    if name.contains(SEPARATOR) {
        return Err(KeyError::NestedName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Macro for creating case-sensitive keys from literals.
///
/// # Example
///
/// ```rust
/// use strata_core_store::key;
///
/// let k = key!("window/geometry");
/// assert_eq!(k.name(), "geometry");
/// ```
#[macro_export]
macro_rules! key {
    ($s:expr) => {
        $crate::Key::parse($s, $crate::CaseSensitivity::Sensitive).expect("invalid key literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_slashes() {
        assert_eq!(key!("foo/bar/"), key!("foo/bar"));
        assert_eq!(key!("foo//bar"), key!("foo/bar"));
        assert_eq!(key!("/foo/bar").as_str(), "foo/bar");
    }

    #[test]
    fn empty_keys_rejected() {
        assert_eq!(Key::parse("", CaseSensitivity::Sensitive), Err(KeyError::Empty));
        assert_eq!(Key::parse("///", CaseSensitivity::Sensitive), Err(KeyError::Empty));
    }

    #[test]
    fn case_policy_controls_equality() {
        let a = Key::parse("Window/Width", CaseSensitivity::Insensitive).unwrap();
        let b = Key::parse("window/WIDTH", CaseSensitivity::Insensitive).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Window/Width");

        let c = Key::parse("Window/Width", CaseSensitivity::Sensitive).unwrap();
        let d = Key::parse("window/width", CaseSensitivity::Sensitive).unwrap();
        assert_ne!(c, d);
    }

    #[test]
    fn position_does_not_affect_equality() {
        let a = key!("a").with_position(3);
        let b = key!("a");
        assert_eq!(a, b);
        assert_eq!(a.position(), Some(3));
        assert_eq!(b.position(), None);
    }

    #[test]
    fn section_and_name() {
        let k = key!("a/b/c");
        assert_eq!(k.section(), "a/b");
        assert_eq!(k.name(), "c");

        let root = key!("top");
        assert_eq!(root.section(), "");
        assert_eq!(root.name(), "top");
    }

    #[test]
    fn within_respects_segment_boundaries() {
        let k = key!("ab/c");
        assert!(k.is_within(""));
        assert!(k.is_within("ab"));
        assert!(k.is_within("ab/c"));
        assert!(!k.is_within("a"));
        assert!(!k.is_within("ab/c/d"));
    }

    #[test]
    fn relative_paths() {
        let k = key!("a/b/c");
        assert_eq!(k.relative(0).as_deref(), Some("a/b/c"));
        assert_eq!(k.relative(1).as_deref(), Some("b/c"));
        assert_eq!(k.relative(3), None);
    }

    #[test]
    fn join_handles_empty_sides() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", ""), "a");
        assert_eq!(join("a", "b/c"), "a/b/c");
    }

    #[test]
    fn validate_names() {
        assert!(validate_name("group").is_ok());
        assert_eq!(validate_name(""), Err(KeyError::Empty));
        assert!(matches!(
            validate_name("a/b"),
            Err(KeyError::NestedName { .. })
        ));
    }

    #[test]
    fn key_error_display() {
        let e = KeyError::NestedName {
            name: "a/b".to_string(),
        };
        assert!(e.to_string().contains("a/b"));
        assert_eq!(KeyError::Empty.to_string(), "empty key");
    }
}
