//! Layered settings over a shared cache of backing files.
//!
//! A [`Settings`] controller reads through an ordered list of files, most
//! specific first, and writes to the first one. Controllers created from
//! the same [`SettingsContext`] share one in-memory copy of each file, so
//! an unsynced edit made through one is visible through the others.

pub mod cache;
pub mod context;
pub mod entry;
mod error;
pub mod groups;
pub mod merge;
pub mod registry;
pub mod settings;

pub use cache::BackingStoreCache;
pub use context::SettingsContext;
pub use entry::{BackingStore, FileStamp, Lookup};
pub use error::Error;
pub use groups::{AddressStack, ArraySize, FrameKind, GroupFrame};
pub use merge::ChildKind;
pub use registry::FormatRegistry;
pub use settings::Settings;

pub use strata_core_store::{CaseSensitivity, Codec, Format, Status, Value};
