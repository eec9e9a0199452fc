use std::fmt;

use super::token::Wildcard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternByte {
    Literal(u8),
    Wild(Wildcard),
}

impl PatternByte {
    /// Whether some byte value satisfies both positions.
    fn compatible(&self, other: &PatternByte) -> bool {
        match (self, other) {
            (PatternByte::Literal(a), PatternByte::Literal(b)) => a == b,
            _ => true,
        }
    }
}

/// Byte pattern of a table entry, e.g. `F0XX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BytePattern {
    bytes: Vec<PatternByte>,
}

impl BytePattern {
    /// Parse hex digit pairs with `XX`/`YY` wildcard placeholders.
    pub fn parse(hex: &str) -> Result<Self, String> {
        let hex = hex.trim();
        if hex.is_empty() {
            return Err("empty byte pattern".to_string());
        }
        if hex.len() % 2 != 0 {
            return Err(format!("odd number of hex digits in '{}'", hex));
        }

        let mut bytes = Vec::with_capacity(hex.len() / 2);
        let mut seen = Vec::new();
        for i in (0..hex.len()).step_by(2) {
            let pair = hex
                .get(i..i + 2)
                .ok_or_else(|| format!("invalid byte pattern '{}'", hex))?;
            if let Ok(wildcard) = pair.parse::<Wildcard>() {
                if seen.contains(&wildcard) {
                    return Err(format!("wildcard {} repeated in '{}'", pair, hex));
                }
                seen.push(wildcard);
                bytes.push(PatternByte::Wild(wildcard));
                continue;
            }
            let value = u8::from_str_radix(pair, 16)
                .map_err(|e| format!("invalid hex byte '{}': {}", pair, e))?;
            bytes.push(PatternByte::Literal(value));
        }

        Ok(Self { bytes })
    }

    pub fn literal(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().copied().map(PatternByte::Literal).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn first_literal(&self) -> Option<u8> {
        match self.bytes.first() {
            Some(PatternByte::Literal(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn wildcards(&self) -> impl Iterator<Item = Wildcard> + '_ {
        self.bytes.iter().filter_map(|b| match b {
            PatternByte::Wild(w) => Some(*w),
            PatternByte::Literal(_) => None,
        })
    }

    pub fn has_wildcards(&self) -> bool {
        self.wildcards().next().is_some()
    }

    /// Match at `data[pos..]`, returning captured wildcard values.
    pub fn match_at(&self, data: &[u8], pos: usize) -> Option<Vec<(Wildcard, u8)>> {
        let window = data.get(pos..pos.checked_add(self.bytes.len())?)?;
        let mut args = Vec::new();
        for (expected, &actual) in self.bytes.iter().zip(window) {
            match expected {
                PatternByte::Literal(b) if *b != actual => return None,
                PatternByte::Literal(_) => {}
                PatternByte::Wild(w) => args.push((*w, actual)),
            }
        }
        Some(args)
    }

    /// Produce concrete bytes, substituting wildcard arguments.
    pub fn fill(&self, args: &[(Wildcard, u8)]) -> Option<Vec<u8>> {
        self.bytes
            .iter()
            .map(|b| match b {
                PatternByte::Literal(v) => Some(*v),
                PatternByte::Wild(w) => args.iter().find(|(a, _)| a == w).map(|(_, v)| *v),
            })
            .collect()
    }

    /// True when one pattern can match a prefix of the other's input.
    ///
    /// Two multi-byte entries for which this holds would make decoding depend
    /// on declaration order.
    pub fn is_prefix_ambiguous_with(&self, other: &BytePattern) -> bool {
        let shared = self.len().min(other.len());
        self.bytes[..shared]
            .iter()
            .zip(&other.bytes[..shared])
            .all(|(a, b)| a.compatible(b))
    }

    /// A lone wildcard byte, e.g. `XX`. It is tried before single-byte
    /// literals and can shadow any of them.
    pub fn is_wild_byte(&self) -> bool {
        self.len() == 1 && self.has_wildcards()
    }

    /// Whether two table entries would make decoding order-dependent.
    ///
    /// Multi-byte patterns are checked against each other; a single-byte
    /// literal may share its value with the first byte of a longer entry.
    /// Wild bytes are checked against everything.
    pub fn conflicts_with(&self, other: &BytePattern) -> bool {
        let checked =
            (self.len() > 1 && other.len() > 1) || self.is_wild_byte() || other.is_wild_byte();
        checked && self.is_prefix_ambiguous_with(other)
    }
}

impl fmt::Display for BytePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.bytes {
            match b {
                PatternByte::Literal(v) => write!(f, "{:02X}", v)?,
                PatternByte::Wild(w) => f.write_str(w.placeholder())?,
            }
        }
        Ok(())
    }
}
