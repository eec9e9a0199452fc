//! Line parser for `hexbytes=token` table sources.
//!
//! Besides plain entries the parser accepts the two common table-file markers:
//! `/FF=<END>` declares a string terminator and `*FE=<NEWLINE>` a line break.
//! Both may omit the token, which then defaults to `<END>` / `<NEWLINE>`.

use super::pattern::BytePattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryValue {
    Char(String),
    Control(String),
    Param(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker {
    Terminator,
    Newline,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedLine {
    pub pattern: BytePattern,
    pub value: EntryValue,
    pub marker: Option<Marker>,
}

fn is_control_name(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('<') && token.ends_with('>')
}

/// Strip an inline comment (`# ...` preceded by whitespace).
fn strip_inline_comment(token: &str) -> &str {
    let first = token.chars().next().map_or(0, char::len_utf8);
    match token[first..].find(" #") {
        Some(pos) => {
            let stripped = &token[..first + pos];
            if stripped.trim().is_empty() {
                stripped
            } else {
                stripped.trim_end()
            }
        }
        None => token,
    }
}

/// Parse one source line. Blank lines and `#` comments yield `Ok(None)`.
pub(crate) fn parse_line(raw: &str) -> Result<Option<ParsedLine>, String> {
    let line = raw.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (marker, body) = match trimmed.as_bytes()[0] {
        b'/' => (Some(Marker::Terminator), &trimmed[1..]),
        b'*' => (Some(Marker::Newline), &trimmed[1..]),
        _ => (None, trimmed),
    };

    let (hex, token) = match body.split_once('=') {
        Some((hex, token)) => (hex.trim(), strip_inline_comment(token)),
        None if marker.is_some() => (body.trim(), ""),
        None => return Err(format!("missing '=' in '{}'", line)),
    };

    let pattern = BytePattern::parse(hex)?;

    let token = match (marker, token.is_empty()) {
        (Some(Marker::Terminator), true) => "<END>",
        (Some(Marker::Newline), true) => "<NEWLINE>",
        (None, true) => return Err(format!("empty token for {}", pattern)),
        (_, false) => token,
    };

    let value = if pattern.has_wildcards() {
        if !is_control_name(token) {
            return Err(format!(
                "parameterized pattern {} must map to a <...> control token, got '{}'",
                pattern, token
            ));
        }
        for wildcard in pattern.wildcards() {
            if !token.contains(wildcard.placeholder()) {
                return Err(format!(
                    "template '{}' does not reference wildcard {}",
                    token, wildcard
                ));
            }
        }
        EntryValue::Param(token.to_string())
    } else if is_control_name(token) {
        EntryValue::Control(token.to_string())
    } else {
        if marker.is_some() {
            return Err(format!("marker entry {} must be a control token", pattern));
        }
        EntryValue::Char(token.to_string())
    };

    Ok(Some(ParsedLine {
        pattern,
        value,
        marker,
    }))
}
