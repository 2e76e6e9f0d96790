use std::path::PathBuf;

use strata_core_store::KeyError;

use crate::groups::FrameKind;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Key(#[from] KeyError),

    #[error("cannot leave {expected}: the address stack is empty")]
    EmptyStack { expected: FrameKind },

    #[error("cannot leave {expected}: innermost frame '{name}' is {found}")]
    FrameMismatch {
        expected: FrameKind,
        found: FrameKind,
        name: String,
    },

    #[error("array '{name}' has no current index; call set_array_index first")]
    ArrayIndexUnset { name: String },

    #[error("set_array_index called outside of an array")]
    NotInArray,

    #[error("settings need at least one backing file")]
    NoLayers,

    #[error("backing file {} is not writable", path.display())]
    ReadOnly { path: PathBuf },

    #[error("{0}")]
    Core(#[from] strata_core_store::Error),
}

impl Error {
    /// True for errors raised while encoding a map for writing.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::Core(strata_core_store::Error::Encode { .. }))
    }
}
