//! The codec contract between backing files and key/value maps.

use std::fmt;

use bytes::Bytes;

use crate::{CaseSensitivity, Error, Format, KeyValueMap};

/// A problem found while decoding one section of a file.
///
/// The section's keys are left out of the decoded map; other sections are
/// unaffected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    /// Original-case section path, `""` for the root.
    pub section: String,
    /// 1-based physical line where the problem starts, when known.
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let section = if self.section.is_empty() {
            "<root>"
        } else {
            &self.section
        };
        match self.line {
            Some(line) => write!(f, "[{}] line {}: {}", section, line, self.message),
            None => write!(f, "[{}] {}", section, self.message),
        }
    }
}

/// Result of decoding a file: everything that parsed, plus what didn't.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoded {
    pub map: KeyValueMap,
    pub faults: Vec<Fault>,
}

impl Decoded {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

impl From<KeyValueMap> for Decoded {
    fn from(map: KeyValueMap) -> Self {
        Decoded {
            map,
            faults: Vec::new(),
        }
    }
}

/// Codec for converting between file bytes and a [`KeyValueMap`].
///
/// Decoding never fails outright: malformed input is reported as
/// [`Fault`]s and the rest of the file is still returned. Encoding may
/// fail when a map cannot be expressed in the format.
///
/// # Implementing Custom Codecs
///
/// ```rust
/// use strata_core_store::{
///     CaseSensitivity, Codec, Decoded, Error, Format, Key, KeyValueMap, Value,
/// };
/// use bytes::Bytes;
///
/// /// One `key value` pair per line.
/// struct SpaceCodec;
///
/// impl Codec for SpaceCodec {
///     fn decode(&self, bytes: &Bytes) -> Decoded {
///         let text = String::from_utf8_lossy(bytes);
///         let mut map = KeyValueMap::new();
///         for (i, line) in text.lines().enumerate() {
///             if let Some((k, v)) = line.split_once(' ') {
///                 if let Ok(key) = Key::parse(k, CaseSensitivity::Sensitive) {
///                     map.insert(key.with_position(i), Value::from(v));
///                 }
///             }
///         }
///         map.into()
///     }
///
///     fn encode(&self, map: &KeyValueMap) -> Result<Bytes, Error> {
///         let mut out = String::new();
///         for (k, v) in map.ordered() {
///             out.push_str(&format!("{} {}\n", k, v));
///         }
///         Ok(Bytes::from(out))
///     }
///
///     fn format(&self) -> Format {
///         Format::from_static("space")
///     }
/// }
/// ```
pub trait Codec: Send + Sync {
    /// Decode raw bytes into a map.
    fn decode(&self, bytes: &Bytes) -> Decoded;

    /// Encode a map into raw bytes.
    fn encode(&self, map: &KeyValueMap) -> Result<Bytes, Error>;

    /// The format this codec reads and writes.
    fn format(&self) -> Format;

    /// How keys in files of this format are compared.
    fn case_sensitivity(&self) -> CaseSensitivity {
        CaseSensitivity::Sensitive
    }
}

type ReadFn = dyn Fn(&Bytes) -> Decoded + Send + Sync;
type WriteFn = dyn Fn(&KeyValueMap) -> Result<Bytes, Error> + Send + Sync;

/// A codec assembled from a reader and a writer function.
pub struct FnCodec {
    format: Format,
    reader: Box<ReadFn>,
    writer: Box<WriteFn>,
    case: CaseSensitivity,
}

impl FnCodec {
    pub fn new<R, W>(format: Format, reader: R, writer: W, case: CaseSensitivity) -> Self
    where
        R: Fn(&Bytes) -> Decoded + Send + Sync + 'static,
        W: Fn(&KeyValueMap) -> Result<Bytes, Error> + Send + Sync + 'static,
    {
        Self {
            format,
            reader: Box::new(reader),
            writer: Box::new(writer),
            case,
        }
    }
}

impl Codec for FnCodec {
    fn decode(&self, bytes: &Bytes) -> Decoded {
        (self.reader)(bytes)
    }

    fn encode(&self, map: &KeyValueMap) -> Result<Bytes, Error> {
        (self.writer)(map)
    }

    fn format(&self) -> Format {
        self.format.clone()
    }

    fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }
}

impl<T: Codec + ?Sized> Codec for Box<T> {
    fn decode(&self, bytes: &Bytes) -> Decoded {
        self.as_ref().decode(bytes)
    }

    fn encode(&self, map: &KeyValueMap) -> Result<Bytes, Error> {
        self.as_ref().encode(map)
    }

    fn format(&self) -> Format {
        self.as_ref().format()
    }

    fn case_sensitivity(&self) -> CaseSensitivity {
        self.as_ref().case_sensitivity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{key, Value};

    fn lines_codec() -> FnCodec {
        FnCodec::new(
            Format::from_static("lines"),
            |bytes| {
                let mut map = KeyValueMap::new();
                for (i, line) in String::from_utf8_lossy(bytes).lines().enumerate() {
                    map.insert(key!(line).with_position(i), Value::from(true));
                }
                map.into()
            },
            |map| {
                let names: Vec<&str> = map.ordered().iter().map(|(k, _)| k.as_str()).collect();
                Ok(Bytes::from(names.join("\n")))
            },
            CaseSensitivity::Insensitive,
        )
    }

    #[test]
    fn fn_codec_delegates() {
        let codec = lines_codec();
        let decoded = codec.decode(&Bytes::from_static(b"b\na"));
        assert!(decoded.is_clean());
        assert_eq!(decoded.map.len(), 2);

        let bytes = codec.encode(&decoded.map).unwrap();
        assert_eq!(&bytes[..], b"b\na");
        assert_eq!(codec.case_sensitivity(), CaseSensitivity::Insensitive);
        assert_eq!(codec.format().as_str(), "lines");
    }

    #[test]
    fn boxed_codec_is_a_codec() {
        let boxed: Box<dyn Codec> = Box::new(lines_codec());
        assert_eq!(boxed.format().as_str(), "lines");
    }

    #[test]
    fn fault_display() {
        let fault = Fault {
            section: String::new(),
            line: Some(3),
            message: "missing '='".to_string(),
        };
        assert_eq!(fault.to_string(), "[<root>] line 3: missing '='");
    }
}
