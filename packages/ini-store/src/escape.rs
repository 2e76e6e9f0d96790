//! Byte-safe escaping for keys, section names and quoted strings.

/// Characters that stay literal inside an escaped key segment.
fn is_key_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~') || !c.is_ascii()
}

/// Percent-escape one key segment.
///
/// Non-ASCII characters are kept as-is; every other ASCII byte that is not
/// an alphanumeric or one of `_ - . ~` becomes `%XX`.
pub fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if is_key_safe(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", b));
            }
        }
    }
    out
}

/// Percent-escape every segment of a key path, keeping the separators.
pub fn escape_path(path: &str) -> String {
    path.split('/')
        .map(escape_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Reverse `%XX` escaping. The decoded bytes must be UTF-8.
pub fn unescape(raw: &str) -> Result<String, String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| format!("invalid escape at byte {} of '{}'", i, raw))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| format!("escaped key '{}' is not valid UTF-8", raw))
}

/// Render a string in double quotes with backslash escapes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Parse a token that starts with a double quote.
///
/// The closing quote must be the last character of the token.
pub fn unquote(token: &str) -> Result<String, String> {
    let mut chars = token.chars();
    if chars.next() != Some('"') {
        return Err(format!("expected quoted string, found '{}'", token));
    }

    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('0') => out.push('\0'),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let decoded = u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 2)
                        .and_then(char::from_u32)
                        .ok_or_else(|| format!("invalid \\x escape '\\x{}'", hex))?;
                    out.push(decoded);
                }
                Some(other) => return Err(format!("unknown escape '\\{}'", other)),
                None => return Err("unterminated quote".to_string()),
            },
            '"' => {
                let rest = chars.as_str();
                if !rest.is_empty() {
                    return Err(format!("unexpected '{}' after closing quote", rest));
                }
                return Ok(out);
            }
            c => out.push(c),
        }
    }
    Err("unterminated quote".to_string())
}
