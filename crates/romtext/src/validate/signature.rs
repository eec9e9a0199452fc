use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Byte pattern expected at a fixed offset. `None` bytes match anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub offset: usize,
    pub pattern: Vec<Option<u8>>,
    pub description: String,
}

impl Signature {
    pub fn new(offset: usize, pattern: &str) -> Result<Self> {
        Ok(Self {
            offset,
            pattern: parse_pattern(pattern)?,
            description: String::new(),
        })
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        let Some(window) = self
            .offset
            .checked_add(self.pattern.len())
            .and_then(|end| data.get(self.offset..end))
        else {
            return false;
        };
        self.pattern
            .iter()
            .zip(window)
            .all(|(expected, actual)| expected.is_none_or(|b| b == *actual))
    }

    /// Bytes actually present where the signature is expected.
    pub fn found(&self, data: &[u8]) -> String {
        let end = (self.offset + self.pattern.len()).min(data.len());
        let found: Vec<Option<u8>> = data
            .get(self.offset..end)
            .unwrap_or_default()
            .iter()
            .map(|&b| Some(b))
            .collect();
        format_pattern(&found)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at 0x{:X}", format_pattern(&self.pattern), self.offset)
    }
}

/// Parse `4E 45 53 1A`, `4E45531A` or `4E ?? 53 1A` style patterns.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let compact: String = pattern.split_whitespace().collect();
    if compact.len() % 2 != 0 {
        return Err(Error::Config(format!(
            "Signature pattern '{}' has an odd number of digits",
            pattern
        )));
    }

    let mut bytes = Vec::with_capacity(compact.len() / 2);
    for i in (0..compact.len()).step_by(2) {
        let token = compact
            .get(i..i + 2)
            .ok_or_else(|| Error::Config(format!("Invalid signature pattern '{}'", pattern)))?;
        if token == "??" {
            bytes.push(None);
            continue;
        }
        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::Config(format!("Invalid signature token '{}': {}", token, e))
        })?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::Config("Signature pattern is empty".to_string()));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_forms() {
        let spaced = parse_pattern("4E 45 53 1A").unwrap();
        let compact = parse_pattern("4E45531A").unwrap();
        assert_eq!(spaced, compact);
        assert_eq!(parse_pattern("4E ?? 53").unwrap()[1], None);
        assert!(parse_pattern("4E4").is_err());
        assert!(parse_pattern("").is_err());
        assert!(parse_pattern("ZZ").is_err());
    }

    #[test]
    fn test_ines_header_signature() {
        let header = Signature::new(0, "4E45531A").unwrap();
        assert!(header.matches(b"NES\x1A\x02\x01"));
        assert!(!header.matches(b"NES\x00"));
        assert!(!header.matches(b"NE"));
        assert_eq!(header.found(b"NES\x00"), "4E 45 53 00");
        assert_eq!(header.to_string(), "4E 45 53 1A at 0x0");
    }
}
