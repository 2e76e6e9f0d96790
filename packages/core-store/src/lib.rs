//! Strata core: the vocabulary shared by every layer.
//!
//! - `Key`: normalized, case-folded key path that remembers its original text
//! - `Value`: one typed settings value
//! - `KeyValueMap`: the flat content of one backing file
//! - `Codec`: converts file bytes to and from a `KeyValueMap`
//! - `Status`: sticky outcome of I/O and parsing
//!
//! # Example
//!
//! ```rust
//! use strata_core_store::{key, KeyValueMap, Value};
//!
//! let mut map = KeyValueMap::new();
//! map.insert(key!("window/width"), Value::from(640i64));
//! assert_eq!(map.get(&key!("window/width")), Some(&Value::Integer(640)));
//! ```

pub use bytes::Bytes;

mod error;
mod format;
pub mod key;
mod map;
mod status;
mod traits;
mod value;

pub use error::Error;
pub use format::Format;
pub use key::{CaseSensitivity, Key, KeyError};
pub use map::KeyValueMap;
pub use status::Status;
pub use traits::{Codec, Decoded, FnCodec, Fault};
pub use value::Value;
