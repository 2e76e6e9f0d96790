//! Value grammar: typed values to and from the right-hand side of `key=value`.

use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use strata_core_store::Value;

use crate::escape::{quote, unquote};

const LIST_MARKUP: &str = "@List(";
const BYTES_MARKUP: &str = "@ByteArray(";
const FLOAT_MARKUP: &str = "@Float(";

lazy_static! {
    static ref INTEGER: Regex = Regex::new(r"^[+-]?[0-9]+$").unwrap();
    static ref FLOAT: Regex =
        Regex::new(r"^[+-]?([0-9]+\.[0-9]*|\.[0-9]+|[0-9]+)([eE][+-]?[0-9]+)?$").unwrap();
}

pub(crate) fn trim_ascii(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}

/// Render a value so that [`parse`] gives it back unchanged.
pub fn render(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format!("{:?}", f),
        Value::Float(f) if f.is_nan() => format!("{}NaN)", FLOAT_MARKUP),
        Value::Float(f) if *f > 0.0 => format!("{}inf)", FLOAT_MARKUP),
        Value::Float(_) => format!("{}-inf)", FLOAT_MARKUP),
        Value::String(s) => {
            if is_plain(s) && classify_bare(s).as_str() == Some(s.as_str()) {
                s.clone()
            } else {
                quote(s)
            }
        }
        Value::StringList(list) => {
            let elements: Vec<String> = list.iter().map(|s| render_element(s)).collect();
            if list.len() >= 2 {
                elements.join(", ")
            } else {
                format!("{}{})", LIST_MARKUP, elements.join(", "))
            }
        }
        Value::Bytes(bytes) => format!(
            "{}{})",
            BYTES_MARKUP,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ),
    }
}

/// Parse the raw text after `=` into a typed value.
pub fn parse(raw: &str) -> Result<Value, String> {
    let raw = trim_ascii(raw);
    if raw.is_empty() {
        return Ok(Value::String(String::new()));
    }
    if raw.starts_with('@') {
        return parse_markup(raw);
    }

    let tokens = split_list(raw)?;
    if tokens.len() > 1 {
        return tokens
            .into_iter()
            .map(parse_element)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::StringList);
    }

    let token = trim_ascii(tokens[0]);
    if token.starts_with('"') {
        return unquote(token).map(Value::String);
    }
    if token.contains('"') {
        return Err(format!("stray quote in '{}'", token));
    }
    Ok(classify_bare(token))
}

/// Interpret an unquoted token: bool, integer, real or plain string.
fn classify_bare(token: &str) -> Value {
    match token {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if INTEGER.is_match(token) {
        if let Ok(i) = token.parse::<i64>() {
            return Value::Integer(i);
        }
    }
    if FLOAT.is_match(token) {
        if let Ok(f) = token.parse::<f64>() {
            return Value::Float(f);
        }
    }
    Value::String(token.to_string())
}

/// A string that can be written without quotes and read back as itself.
fn is_plain(s: &str) -> bool {
    let edges_ok = match (s.chars().next(), s.chars().last()) {
        (Some(first), Some(last)) => !first.is_whitespace() && !last.is_whitespace(),
        _ => false,
    };
    edges_ok
        && !s.starts_with('@')
        && !s
            .chars()
            .any(|c| c.is_control() || matches!(c, '"' | '\\' | ','))
}

fn render_element(s: &str) -> String {
    if is_plain(s) {
        s.to_string()
    } else {
        quote(s)
    }
}

fn parse_element(token: &str) -> Result<String, String> {
    let token = trim_ascii(token);
    if token.starts_with('"') {
        unquote(token)
    } else if token.contains('"') {
        Err(format!("stray quote in list element '{}'", token))
    } else {
        Ok(token.to_string())
    }
}

/// Split on commas that are outside double quotes.
fn split_list(s: &str) -> Result<Vec<&str>, String> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' => in_quote = !in_quote,
            ',' if !in_quote => {
                tokens.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quote {
        return Err("unterminated quote".to_string());
    }
    tokens.push(&s[start..]);
    Ok(tokens)
}

fn parse_markup(raw: &str) -> Result<Value, String> {
    let inner = |prefix: &str| -> Option<&str> {
        raw.strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(')'))
    };

    if let Some(body) = inner(LIST_MARKUP) {
        if trim_ascii(body).is_empty() {
            return Ok(Value::StringList(Vec::new()));
        }
        return split_list(body)?
            .into_iter()
            .map(parse_element)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::StringList);
    }

    if let Some(body) = inner(BYTES_MARKUP) {
        return base64::engine::general_purpose::STANDARD
            .decode(trim_ascii(body))
            .map(Value::Bytes)
            .map_err(|e| format!("invalid byte array: {}", e));
    }

    if let Some(body) = inner(FLOAT_MARKUP) {
        return match trim_ascii(body).to_ascii_lowercase().as_str() {
            "nan" => Ok(Value::Float(f64::NAN)),
            "inf" | "+inf" => Ok(Value::Float(f64::INFINITY)),
            "-inf" => Ok(Value::Float(f64::NEG_INFINITY)),
            other => Err(format!("invalid float literal '{}'", other)),
        };
    }

    Err(format!("unrecognized value markup '{}'", raw))
}
