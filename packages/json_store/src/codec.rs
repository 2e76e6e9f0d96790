//! JSON codec implementation.

use base64::Engine;
use bytes::Bytes;
use serde_json::{Map, Value as JsonValue};
use strata_core_store::key::join;
use strata_core_store::{
    CaseSensitivity, Codec, Decoded, Error, Fault, Format, Key, KeyValueMap, Value,
};

/// Object key marking a base64-encoded byte array.
const BYTES_TAG: &str = "$bytes";

/// A codec that stores settings as a nested JSON object.
///
/// Groups become nested objects. Arrays of strings map to string lists;
/// other arrays are flattened into 1-based child groups plus a `size` key,
/// the same shape the settings array API produces.
///
/// # Example
///
/// ```rust
/// use strata_core_store::{key, Bytes, Codec, Value};
/// use strata_json_store::JsonCodec;
///
/// let codec = JsonCodec;
/// let decoded = codec.decode(&Bytes::from_static(br#"{"window": {"width": 640}}"#));
/// assert_eq!(decoded.map.get(&key!("window/width")), Some(&Value::Integer(640)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, bytes: &Bytes) -> Decoded {
        let root = match serde_json::from_slice::<JsonValue>(bytes) {
            Ok(JsonValue::Object(root)) => root,
            Ok(other) => return root_fault(format!("expected an object, found {}", kind(&other))),
            Err(e) => return root_fault(e.to_string()),
        };

        let mut flattener = Flattener::default();
        flattener.object("", root);

        for f in &flattener.faults {
            log::warn!("skipping malformed JSON entry: {}", f);
        }
        Decoded {
            map: flattener.map,
            faults: flattener.faults,
        }
    }

    fn encode(&self, map: &KeyValueMap) -> Result<Bytes, Error> {
        let mut root = Map::new();
        for (key, value) in map.ordered() {
            insert_at(&mut root, key, to_json(key, value)?)?;
        }
        let bytes = serde_json::to_vec_pretty(&JsonValue::Object(root))
            .map_err(|e| Error::encode(Format::JSON, e.to_string()))?;
        Ok(Bytes::from(bytes))
    }

    fn format(&self) -> Format {
        Format::JSON
    }

    fn case_sensitivity(&self) -> CaseSensitivity {
        CaseSensitivity::Sensitive
    }
}

fn root_fault(message: String) -> Decoded {
    log::warn!("unreadable JSON settings document: {}", message);
    Decoded {
        map: KeyValueMap::new(),
        faults: vec![Fault {
            section: String::new(),
            line: None,
            message,
        }],
    }
}

fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[derive(Default)]
struct Flattener {
    map: KeyValueMap,
    faults: Vec<Fault>,
    position: usize,
}

impl Flattener {
    fn insert(&mut self, path: &str, value: Value) {
        match Key::parse(path, CaseSensitivity::Sensitive) {
            Ok(key) => {
                self.map.insert(key.with_position(self.position), value);
                self.position += 1;
            }
            Err(e) => self.fault(path, e.to_string()),
        }
    }

    fn fault(&mut self, path: &str, message: String) {
        self.faults.push(Fault {
            section: path.to_string(),
            line: None,
            message,
        });
    }

    fn object(&mut self, prefix: &str, object: Map<String, JsonValue>) {
        for (name, value) in object {
            let path = join(prefix, &name);
            self.value(&path, value);
        }
    }

    fn value(&mut self, path: &str, value: JsonValue) {
        match value {
            JsonValue::Null => {}
            JsonValue::Bool(b) => self.insert(path, Value::Bool(b)),
            JsonValue::Number(n) => {
                let value = if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::String(n.to_string())
                };
                self.insert(path, value);
            }
            JsonValue::String(s) => self.insert(path, Value::String(s)),
            JsonValue::Array(items) => {
                if items.iter().all(JsonValue::is_string) {
                    let list = items
                        .into_iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect();
                    self.insert(path, Value::StringList(list));
                } else {
                    let size = items.len();
                    for (i, item) in items.into_iter().enumerate() {
                        self.value(&join(path, &(i + 1).to_string()), item);
                    }
                    self.insert(&join(path, "size"), Value::Integer(size as i64));
                }
            }
            JsonValue::Object(object) => match tagged_bytes(&object) {
                Some(Ok(bytes)) => self.insert(path, Value::Bytes(bytes)),
                Some(Err(message)) => self.fault(path, message),
                None => self.object(path, object),
            },
        }
    }
}

/// Decode `{"$bytes": "<base64>"}`, if that is what `object` is.
fn tagged_bytes(object: &Map<String, JsonValue>) -> Option<Result<Vec<u8>, String>> {
    if object.len() != 1 {
        return None;
    }
    let encoded = object.get(BYTES_TAG)?.as_str()?;
    Some(
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| format!("invalid {} payload: {}", BYTES_TAG, e)),
    )
}

fn to_json(key: &Key, value: &Value) -> Result<JsonValue, Error> {
    Ok(match value {
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| {
                Error::encode(
                    Format::JSON,
                    format!("key '{}': {} has no JSON representation", key, f),
                )
            })?,
        Value::String(s) => JsonValue::String(s.clone()),
        Value::StringList(list) => {
            JsonValue::Array(list.iter().cloned().map(JsonValue::String).collect())
        }
        Value::Bytes(bytes) => {
            let mut tagged = Map::new();
            tagged.insert(
                BYTES_TAG.to_string(),
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes)),
            );
            JsonValue::Object(tagged)
        }
    })
}

/// Place `value` at the key's path, creating intermediate objects.
fn insert_at(root: &mut Map<String, JsonValue>, key: &Key, value: JsonValue) -> Result<(), Error> {
    let conflict = || {
        Error::encode(
            Format::JSON,
            format!("key '{}' is both a value and a group", key),
        )
    };

    let segments: Vec<&str> = key.segments().collect();
    let (leaf, parents) = segments.split_last().ok_or_else(conflict)?;

    let mut current = root;
    for segment in parents {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        current = match slot {
            JsonValue::Object(object) if !is_tagged(object) => object,
            _ => return Err(conflict()),
        };
    }

    if matches!(current.get(*leaf), Some(JsonValue::Object(o)) if !is_tagged(o)) {
        return Err(conflict());
    }
    current.insert(leaf.to_string(), value);
    Ok(())
}

fn is_tagged(object: &Map<String, JsonValue>) -> bool {
    object.len() == 1 && object.contains_key(BYTES_TAG)
}
