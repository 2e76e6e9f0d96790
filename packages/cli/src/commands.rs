//! Command execution against an open [`Settings`].

use std::io::Write;

use base64::Engine;
use serde_json::{Map, Number, Value as JsonValue};
use strata_core_store::Value;
use strata_store::Settings;

use crate::cli::{Command, ValueType};
use crate::error::CliError;

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// `get` found nothing.
    Missing,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Done => 0,
            Outcome::Missing => 1,
        }
    }
}

/// Run `command`, writing its output to `out`.
pub fn execute(
    settings: &mut Settings,
    command: &Command,
    out: &mut impl Write,
) -> Result<Outcome, CliError> {
    match command {
        Command::Get { key } => match settings.value(key) {
            Some(value) => {
                writeln!(out, "{}", display(&value))?;
                Ok(Outcome::Done)
            }
            None => {
                log::info!("no value for '{}'", key);
                Ok(Outcome::Missing)
            }
        },
        Command::Set { key, value, kind } => {
            settings.set_value(key, parse_typed(value, *kind)?)?;
            Ok(Outcome::Done)
        }
        Command::Remove { key } => {
            settings.remove(key)?;
            Ok(Outcome::Done)
        }
        Command::Keys { prefix } => {
            for key in in_group(settings, prefix.as_deref(), Settings::all_keys)? {
                writeln!(out, "{}", key)?;
            }
            Ok(Outcome::Done)
        }
        Command::Groups { prefix } => {
            for group in in_group(settings, prefix.as_deref(), Settings::child_groups)? {
                writeln!(out, "{}", group)?;
            }
            Ok(Outcome::Done)
        }
        Command::Dump { json } => {
            let entries: Vec<(String, Value)> = settings
                .all_keys()
                .into_iter()
                .filter_map(|key| settings.value(&key).map(|v| (key, v)))
                .collect();
            if *json {
                let object: Map<String, JsonValue> =
                    entries.iter().map(|(k, v)| (k.clone(), to_json(v))).collect();
                serde_json::to_writer_pretty(&mut *out, &JsonValue::Object(object))?;
                writeln!(out)?;
            } else {
                for (key, value) in &entries {
                    writeln!(out, "{} = {}", key, display(value))?;
                }
            }
            Ok(Outcome::Done)
        }
    }
}

/// Run `f` with the group stack pointed at `prefix`.
fn in_group<T>(
    settings: &mut Settings,
    prefix: Option<&str>,
    f: impl FnOnce(&Settings) -> T,
) -> Result<T, CliError> {
    let segments: Vec<&str> = prefix
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    for segment in &segments {
        settings.enter_group(segment)?;
    }
    let result = f(&*settings);
    for _ in &segments {
        settings.leave_group()?;
    }
    Ok(result)
}

/// Interpret a command-line value.
pub fn parse_typed(raw: &str, kind: ValueType) -> Result<Value, CliError> {
    let invalid = |kind: &'static str| CliError::InvalidValue {
        value: raw.to_string(),
        kind,
    };
    match kind {
        ValueType::Auto => strata_ini_store::grammar::parse(raw).map_err(|_| invalid("a settings value")),
        ValueType::String => Ok(Value::from(raw)),
        ValueType::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid("an integer")),
        ValueType::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid("a float")),
        ValueType::Bool => Value::from(raw.trim())
            .to_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid("a boolean")),
        ValueType::List => Ok(Value::StringList(
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Bytes(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        other => other.to_string(),
    }
}

fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::from(*i),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => JsonValue::Number(n),
            None => JsonValue::String(f.to_string()),
        },
        Value::String(s) => JsonValue::String(s.clone()),
        Value::StringList(list) => {
            JsonValue::Array(list.iter().cloned().map(JsonValue::String).collect())
        }
        Value::Bytes(bytes) => serde_json::json!({
            "$bytes": base64::engine::general_purpose::STANDARD.encode(bytes)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use strata_store::SettingsContext;

    fn run(settings: &mut Settings, command: Command) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = execute(settings, &command, &mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn typed_values() {
        assert_eq!(parse_typed("42", ValueType::Auto).unwrap(), Value::Integer(42));
        assert_eq!(parse_typed("42", ValueType::String).unwrap(), Value::from("42"));
        assert_eq!(parse_typed(" 7 ", ValueType::Int).unwrap(), Value::Integer(7));
        assert_eq!(parse_typed("1.5", ValueType::Float).unwrap(), Value::Float(1.5));
        assert_eq!(parse_typed("yes", ValueType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(
            parse_typed("a, b,,c", ValueType::List).unwrap(),
            Value::from(vec!["a", "b", "c"])
        );
        assert!(matches!(
            parse_typed("seven", ValueType::Int),
            Err(CliError::InvalidValue { kind: "an integer", .. })
        ));
    }

    #[test]
    fn get_set_remove() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SettingsContext::new();
        let mut settings = ctx.open([dir.path().join("app.ini")]).unwrap();

        let set = Command::Set {
            key: "net/port".to_string(),
            value: "8080".to_string(),
            kind: ValueType::Auto,
        };
        assert_eq!(run(&mut settings, set).0, Outcome::Done);

        let get = Command::Get {
            key: "net/port".to_string(),
        };
        assert_eq!(run(&mut settings, get.clone()), (Outcome::Done, "8080\n".to_string()));

        run(&mut settings, Command::Remove { key: "net".to_string() });
        assert_eq!(run(&mut settings, get), (Outcome::Missing, String::new()));
    }

    #[test]
    fn listing_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ini");
        fs::write(&path, "top=1\n[a]\nx=1\n[a/b]\ny=2\n[a/c]\nz=3\n").unwrap();
        let ctx = SettingsContext::new();
        let mut settings = ctx.open([&path]).unwrap();

        let (_, keys) = run(&mut settings, Command::Keys { prefix: Some("a".to_string()) });
        assert_eq!(keys, "b/y\nc/z\nx\n");
        let (_, groups) = run(&mut settings, Command::Groups { prefix: Some("/a/".to_string()) });
        assert_eq!(groups, "b\nc\n");
        let (_, groups) = run(&mut settings, Command::Groups { prefix: None });
        assert_eq!(groups, "a\n");
        assert_eq!(settings.group(), "");
    }

    #[test]
    fn dump_as_text_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ini");
        fs::write(&path, "name=demo\n[list]\nitems=a, b\n").unwrap();
        let ctx = SettingsContext::new();
        let mut settings = ctx.open([&path]).unwrap();

        let (_, text) = run(&mut settings, Command::Dump { json: false });
        assert_eq!(text, "list/items = a, b\nname = demo\n");

        let (_, json) = run(&mut settings, Command::Dump { json: true });
        let parsed: JsonValue = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({"name": "demo", "list/items": ["a", "b"]})
        );
    }

    #[test]
    fn bytes_render_as_base64() {
        assert_eq!(display(&Value::Bytes(b"hi".to_vec())), "aGk=");
        assert_eq!(
            to_json(&Value::Float(f64::INFINITY)),
            JsonValue::String("inf".to_string())
        );
    }
}
