//! The INI codec: `[section]` headers, `key=value` lines, `;`/`#` comments.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use strata_core_store::key::{join, normalize};
use strata_core_store::{
    CaseSensitivity, Codec, Decoded, Error, Fault, Format, Key, KeyValueMap, Value,
};

use crate::escape::{escape_path, escape_segment, unescape};
use crate::grammar::{self, trim_ascii};

/// Codec for the built-in INI dialect.
///
/// # Example
///
/// ```rust
/// use strata_core_store::{key, Bytes, Codec, Value};
/// use strata_ini_store::IniCodec;
///
/// let codec = IniCodec::new();
/// let decoded = codec.decode(&Bytes::from_static(b"[window]\nwidth=640\n"));
/// assert_eq!(decoded.map.get(&key!("window/width")), Some(&Value::Integer(640)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct IniCodec {
    case: CaseSensitivity,
}

impl IniCodec {
    /// A case-sensitive INI codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// An INI codec that compares keys without regard to case.
    pub fn case_insensitive() -> Self {
        Self {
            case: CaseSensitivity::Insensitive,
        }
    }
}

/// The section a line belongs to while parsing.
enum Section {
    Valid { original: String, folded: String },
    /// A header that failed to parse; its lines are skipped.
    Broken,
}

impl Codec for IniCodec {
    fn decode(&self, bytes: &Bytes) -> Decoded {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => Cow::Borrowed(text),
            Err(e) => {
                log::warn!("INI data is not valid UTF-8 ({}), decoding lossily", e);
                String::from_utf8_lossy(bytes)
            }
        };

        let mut section = Section::Valid {
            original: String::new(),
            folded: String::new(),
        };
        let mut staged: Vec<(String, Key, Value)> = Vec::new();
        let mut faults: Vec<Fault> = Vec::new();
        let mut faulted: HashSet<String> = HashSet::new();
        let mut position = 0;

        for (line_no, line) in logical_lines(&text) {
            let line = trim_ascii(&line);
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                section = match header.strip_suffix(']').map(unescape) {
                    Some(Ok(name)) => {
                        let original = normalize(&name);
                        Section::Valid {
                            folded: self.case.fold(&original),
                            original,
                        }
                    }
                    Some(Err(message)) => {
                        faults.push(fault(header, line_no, message));
                        Section::Broken
                    }
                    None => {
                        faults.push(fault(header, line_no, "unmatched '['"));
                        Section::Broken
                    }
                };
                continue;
            }

            let (original, folded) = match &section {
                Section::Valid { original, folded } => (original, folded),
                Section::Broken => continue,
            };

            let parsed = parse_entry(line, original, self.case);
            match parsed {
                Ok((key, value)) => {
                    staged.push((folded.clone(), key.with_position(position), value));
                    position += 1;
                }
                Err(message) => {
                    faults.push(fault(original, line_no, message));
                    faulted.insert(folded.clone());
                }
            }
        }

        for f in &faults {
            log::warn!("skipping malformed INI section: {}", f);
        }

        let map = staged
            .into_iter()
            .filter(|(section, _, _)| !faulted.contains(section))
            .map(|(_, key, value)| (key, value))
            .collect();

        Decoded { map, faults }
    }

    fn encode(&self, map: &KeyValueMap) -> Result<Bytes, Error> {
        // Sections in order of first appearance; the root always leads.
        let mut sections: Vec<(&str, Vec<(&Key, &Value)>)> = vec![("", Vec::new())];
        let mut index: HashMap<&str, usize> = HashMap::new();
        index.insert("", 0);

        for (key, value) in map.ordered() {
            let slot = *index.entry(key.folded_section()).or_insert_with(|| {
                sections.push((key.section(), Vec::new()));
                sections.len() - 1
            });
            sections[slot].1.push((key, value));
        }

        let mut out = String::new();
        for (name, entries) in &sections {
            if entries.is_empty() {
                continue;
            }
            if !name.is_empty() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push('[');
                out.push_str(&escape_path(name));
                out.push_str("]\n");
            }
            for (key, value) in entries {
                out.push_str(&escape_segment(key.name()));
                out.push('=');
                out.push_str(&grammar::render(value));
                out.push('\n');
            }
        }

        Ok(Bytes::from(out))
    }

    fn format(&self) -> Format {
        Format::INI
    }

    fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }
}

fn fault(section: &str, line: usize, message: impl Into<String>) -> Fault {
    Fault {
        section: section.to_string(),
        line: Some(line),
        message: message.into(),
    }
}

/// Parse one `key=value` line inside `section`.
fn parse_entry(line: &str, section: &str, case: CaseSensitivity) -> Result<(Key, Value), String> {
    let (raw_key, raw_value) = line
        .split_once('=')
        .ok_or_else(|| format!("missing '=' in '{}'", line))?;

    let name = normalize(&unescape(trim_ascii(raw_key))?);
    if name.is_empty() {
        return Err(format!("empty key in '{}'", line));
    }
    let key = Key::parse(&join(section, &name), case).map_err(|e| e.to_string())?;

    let value = grammar::parse(raw_value).map_err(|e| format!("{} (key '{}')", e, key))?;
    Ok((key, value))
}

/// Join physical lines ending in an unescaped backslash.
///
/// Comment lines never continue, so a trailing backslash in a comment is
/// kept as text. Yields the 1-based number of the first physical line of
/// each logical line.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut buf = String::new();
    let mut start = 0;

    for (i, physical) in text.split('\n').enumerate() {
        let physical = physical.strip_suffix('\r').unwrap_or(physical);
        if buf.is_empty() {
            let lead = physical.trim_start_matches(|c: char| c.is_ascii_whitespace());
            if lead.starts_with(';') || lead.starts_with('#') {
                lines.push((i + 1, physical.to_string()));
                continue;
            }
            start = i + 1;
            buf.push_str(physical);
        } else {
            buf.push_str(physical.trim_start_matches(|c: char| c.is_ascii_whitespace()));
        }

        let trailing = buf.trim_end_matches(|c: char| c.is_ascii_whitespace());
        let backslashes = trailing.len() - trailing.trim_end_matches('\\').len();
        if backslashes % 2 == 1 {
            let keep = trailing.len() - 1;
            buf.truncate(keep);
            continue;
        }
        lines.push((start, std::mem::take(&mut buf)));
    }
    if !buf.is_empty() {
        lines.push((start, buf));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core_store::key;

    fn decode(text: &str) -> Decoded {
        IniCodec::new().decode(&Bytes::from(text.to_string()))
    }

    fn encode(map: &KeyValueMap) -> String {
        let bytes = IniCodec::new().encode(map).unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn parses_sections_comments_and_types() {
        let decoded = decode(
            "; leading comment\n\
             top=1\n\
             \n\
             [window]\n\
             # another comment\n\
             width = 640\n\
             title = \"Main, window\"\n\
             visible=true\n\
             [window/docks]\n\
             names=left, right\n\
             []\n\
             after_reset=2.5\n",
        );
        assert!(decoded.is_clean());
        let map = &decoded.map;
        assert_eq!(map.get(&key!("top")), Some(&Value::Integer(1)));
        assert_eq!(map.get(&key!("window/width")), Some(&Value::Integer(640)));
        assert_eq!(
            map.get(&key!("window/title")),
            Some(&Value::from("Main, window"))
        );
        assert_eq!(map.get(&key!("window/visible")), Some(&Value::Bool(true)));
        assert_eq!(
            map.get(&key!("window/docks/names")),
            Some(&Value::from(vec!["left", "right"]))
        );
        assert_eq!(map.get(&key!("after_reset")), Some(&Value::Float(2.5)));
    }

    #[test]
    fn positions_follow_file_order() {
        let decoded = decode("b=1\na=2\n[s]\nz=3\n");
        let names: Vec<&str> = decoded
            .map
            .ordered()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a", "s/z"]);
    }

    #[test]
    fn continuation_lines_join() {
        let decoded = decode("list=a, \\\n    b, \\\n  c\nnext=1\n");
        assert!(decoded.is_clean());
        assert_eq!(
            decoded.map.get(&key!("list")),
            Some(&Value::from(vec!["a", "b", "c"]))
        );
        assert_eq!(decoded.map.get(&key!("next")), Some(&Value::Integer(1)));
    }

    #[test]
    fn escaped_backslash_is_not_a_continuation() {
        let decoded = decode("path=\"c:\\\\\"\nnext=1\n");
        assert!(decoded.is_clean());
        assert_eq!(decoded.map.get(&key!("path")), Some(&Value::from("c:\\")));
        assert_eq!(decoded.map.get(&key!("next")), Some(&Value::Integer(1)));
    }

    #[test]
    fn comment_ending_in_backslash_does_not_continue() {
        let decoded = decode("; see C:\\\nkey=1\n# dir\\\n[s]\na=2\n");
        assert!(decoded.is_clean());
        assert_eq!(decoded.map.get(&key!("key")), Some(&Value::Integer(1)));
        assert_eq!(decoded.map.get(&key!("s/a")), Some(&Value::Integer(2)));
    }

    #[test]
    fn crlf_line_endings() {
        let decoded = decode("[s]\r\na=1\r\n");
        assert_eq!(decoded.map.get(&key!("s/a")), Some(&Value::Integer(1)));
    }

    #[test]
    fn malformed_line_drops_only_its_section() {
        let decoded = decode(
            "[good]\n\
             a=1\n\
             [bad]\n\
             b=2\n\
             c=\"unterminated\n\
             [good2]\n\
             d=3\n",
        );
        assert_eq!(decoded.faults.len(), 1);
        assert_eq!(decoded.faults[0].section, "bad");
        assert_eq!(decoded.faults[0].line, Some(5));
        assert_eq!(decoded.map.get(&key!("good/a")), Some(&Value::Integer(1)));
        assert_eq!(decoded.map.get(&key!("good2/d")), Some(&Value::Integer(3)));
        assert_eq!(decoded.map.get(&key!("bad/b")), None);
    }

    #[test]
    fn unmatched_bracket_skips_following_lines() {
        let decoded = decode("a=1\n[broken\nb=2\n[ok]\nc=3\n");
        assert_eq!(decoded.faults.len(), 1);
        assert_eq!(decoded.map.get(&key!("a")), Some(&Value::Integer(1)));
        assert_eq!(decoded.map.get(&key!("b")), None);
        assert_eq!(decoded.map.get(&key!("ok/c")), Some(&Value::Integer(3)));
    }

    #[test]
    fn missing_equals_and_empty_key_are_faults() {
        assert_eq!(decode("[s]\njust text\n").faults.len(), 1);
        assert_eq!(decode("[s]\n=value\n").faults.len(), 1);
        assert_eq!(decode("[s]\nbad%zz=1\n").faults.len(), 1);
    }

    #[test]
    fn writes_root_first_then_sections() {
        let map: KeyValueMap = vec![
            (key!("window/width").with_position(0), Value::from(640i64)),
            (key!("top").with_position(1), Value::from("x")),
            (key!("window/height").with_position(2), Value::from(480i64)),
        ]
        .into_iter()
        .collect();

        assert_eq!(encode(&map), "top=x\n\n[window]\nwidth=640\nheight=480\n");
    }

    #[test]
    fn round_trip_preserves_values_and_order() {
        let text = "zeta=1\nalpha=two\n\n[arr]\nsize=2\n\n[arr/1]\nname=first\n\n[arr/2]\nname=second\n";
        let decoded = decode(text);
        assert!(decoded.is_clean());
        assert_eq!(encode(&decoded.map), text);
    }

    #[test]
    fn special_keys_and_values_round_trip() {
        let map: KeyValueMap = vec![
            (key!("odd key=[x]/;name"), Value::from("x=1,\ny")),
            (key!("list"), Value::from(vec!["a, b", "c"])),
            (key!("blob"), Value::Bytes(vec![0, 159, 146, 150])),
            (key!("ratio"), Value::Float(0.1)),
            (key!("flag"), Value::Bool(false)),
            (key!("empty"), Value::StringList(Vec::new())),
        ]
        .into_iter()
        .collect();

        let decoded = decode(&encode(&map));
        assert!(decoded.is_clean());
        assert_eq!(decoded.map, map);
    }

    #[test]
    fn case_insensitive_codec_folds_keys() {
        let codec = IniCodec::case_insensitive();
        let decoded = codec.decode(&Bytes::from_static(b"[Window]\nWidth=1\n"));
        let lookup = Key::parse("window/width", CaseSensitivity::Insensitive).unwrap();
        assert_eq!(decoded.map.get(&lookup), Some(&Value::Integer(1)));
        assert_eq!(decoded.map.get_key(&lookup).unwrap().as_str(), "Window/Width");
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let decoded = decode("a=1\na=2\n");
        assert_eq!(decoded.map.len(), 1);
        assert_eq!(decoded.map.get(&key!("a")), Some(&Value::Integer(2)));
    }
}
