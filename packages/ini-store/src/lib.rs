//! INI dialect codec for Strata.
//!
//! The dialect:
//!
//! ```ini
//! ; whole-line comments start with ';' or '#'
//! top=1
//!
//! [window]
//! title="Main, window"
//! docks=left, right
//! geometry=@ByteArray(AAEC)
//!
//! [recent]
//! size=1
//!
//! [recent/1]
//! path=/tmp/a.txt
//! ```
//!
//! Keys and section names are percent-escaped, strings are quoted when they
//! would otherwise read back differently, and lists of fewer than two
//! elements use `@List(...)` markup.

mod codec;
pub mod escape;
pub mod grammar;

pub use codec::IniCodec;
