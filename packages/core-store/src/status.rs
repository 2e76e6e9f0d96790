//! Sticky status reported by settings operations.

use std::fmt;

/// Outcome of the I/O and parsing done on behalf of a settings object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    NoError,
    /// A backing file could not be read or written.
    AccessError,
    /// A backing file could not be parsed, or a map could not be encoded.
    FormatError,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::NoError
    }

    /// Fold a new outcome into a sticky status: the first error wins.
    #[must_use]
    pub fn merge(self, other: Status) -> Status {
        if self == Status::NoError {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NoError => write!(f, "no error"),
            Status::AccessError => write!(f, "access error"),
            Status::FormatError => write!(f, "format error"),
        }
    }
}
