//! Error types for the core layer.

use std::path::PathBuf;

use crate::format::Format;
use crate::key::KeyError;

/// Errors at the core layer.
#[derive(Debug)]
pub enum Error {
    /// Key validation error.
    Key(KeyError),

    /// Codec failed to encode a map.
    Encode { format: Format, message: String },

    /// Reading or writing a backing file failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    pub fn encode(format: Format, message: impl Into<String>) -> Self {
        Error::Encode {
            format,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Key(e) => write!(f, "key error: {}", e),
            Error::Encode { format, message } => {
                write!(f, "encode error ({}): {}", format, message)
            }
            Error::Io { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Key(e) => Some(e),
            Error::Io { source, .. } => Some(source),
            Error::Encode { .. } => None,
        }
    }
}

impl From<KeyError> for Error {
    fn from(e: KeyError) -> Self {
        Error::Key(e)
    }
}
