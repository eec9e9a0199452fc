//! Encoding tables.
//!
//! An [`EncodingTable`] maps byte sequences to [`Token`]s and back. Entries come
//! from a line-oriented `hexbytes=token` source:
//!
//! ```text
//! 41=A
//! 42=B
//! FE=<NEWLINE>
//! /FF=<END>
//! F0XX=<DELAY:XX>
//! ```
//!
//! Decoding prefers the longest multi-byte entry at a position and falls back
//! to single-byte entries. Multi-byte patterns must be prefix-unambiguous, so at
//! most one of them can match any input; construction rejects tables where
//! that does not hold. A lone wildcard byte (`XX=<BYTE:XX>`) would shadow every
//! other entry and is held to the same rule.

mod parse;
mod pattern;
mod preset;
mod token;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

use parse::{EntryValue, Marker, parse_line};
pub use pattern::{BytePattern, PatternByte};
pub use preset::{TablePreset, preset_source};
pub use token::{Token, Wildcard, render_tokens};

/// Control names treated as terminators when the table declares none.
pub const DEFAULT_TERMINATORS: &[&str] = &["<END>", "<NULL>"];

#[derive(Debug, Clone)]
struct TableEntry {
    pattern: BytePattern,
    value: EntryValue,
    line: usize,
}

impl TableEntry {
    fn token(&self, args: Vec<(Wildcard, u8)>) -> Token {
        match &self.value {
            EntryValue::Char(symbol) => Token::Char(symbol.clone()),
            EntryValue::Control(name) => Token::Control(name.clone()),
            EntryValue::Param(template) => Token::Param {
                template: template.clone(),
                args,
            },
        }
    }
}

/// Result of decoding a bounded byte run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedRun {
    /// Tokens before the terminator.
    pub tokens: Vec<Token>,
    /// Bytes consumed, terminator included.
    pub consumed: usize,
    pub terminator: Option<Token>,
    /// Absolute offsets of bytes replaced by `Token::Unknown`.
    pub unknown_offsets: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub characters: usize,
    pub control_codes: usize,
    pub parameterized: usize,
    pub multi_byte: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct EncodingTable {
    entries: Vec<TableEntry>,
    single: Vec<Option<usize>>,
    multi_by_first: HashMap<u8, Vec<usize>>,
    multi_wild_first: Vec<usize>,
    chars: HashMap<String, usize>,
    controls: HashMap<String, usize>,
    params: Vec<usize>,
    terminators: HashSet<String>,
    newline: Option<String>,
    longest_symbol: usize,
}

impl EncodingTable {
    /// Load a table file. UTF-8 is tried first, then Shift-JIS.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path)?;
        let source = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => {
                debug!("{} is not UTF-8, decoding as Shift-JIS", path.display());
                let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(e.as_bytes());
                if had_errors {
                    return Err(Error::TableLoad {
                        line: 0,
                        message: format!("{} is neither UTF-8 nor Shift-JIS", path.display()),
                    });
                }
                decoded.into_owned()
            }
        };

        let table = Self::parse(&source)?;
        let stats = table.stats();
        info!(
            "Loaded encoding table {} ({} characters, {} control codes, {} parameterized)",
            path.display(),
            stats.characters,
            stats.control_codes,
            stats.parameterized
        );
        Ok(table)
    }

    /// Parse a table source, rejecting duplicate and ambiguous byte patterns.
    pub fn parse(source: &str) -> Result<Self> {
        let mut entries: Vec<TableEntry> = Vec::new();
        let mut declared: HashMap<BytePattern, usize> = HashMap::new();
        let mut terminators = HashSet::new();
        let mut newline = None;

        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let Some(parsed) =
                parse_line(raw).map_err(|message| Error::TableLoad { line, message })?
            else {
                continue;
            };

            if let Some(first) = declared.get(&parsed.pattern) {
                return Err(Error::TableLoad {
                    line,
                    message: format!(
                        "duplicate byte pattern {} (first declared on line {})",
                        parsed.pattern, first
                    ),
                });
            }

            if let Some(other) = entries
                .iter()
                .find(|e| e.pattern.conflicts_with(&parsed.pattern))
            {
                return Err(Error::TableLoad {
                    line,
                    message: format!(
                        "byte pattern {} is ambiguous with {} (line {})",
                        parsed.pattern, other.pattern, other.line
                    ),
                });
            }

            if let EntryValue::Control(name) = &parsed.value {
                match parsed.marker {
                    Some(Marker::Terminator) => {
                        terminators.insert(name.clone());
                    }
                    Some(Marker::Newline) => newline = Some(name.clone()),
                    None => {}
                }
            }

            declared.insert(parsed.pattern.clone(), line);
            entries.push(TableEntry {
                pattern: parsed.pattern,
                value: parsed.value,
                line,
            });
        }

        if terminators.is_empty() {
            terminators = DEFAULT_TERMINATORS.iter().map(|s| s.to_string()).collect();
        }

        Ok(Self::index(entries, terminators, newline))
    }

    fn index(
        entries: Vec<TableEntry>,
        terminators: HashSet<String>,
        newline: Option<String>,
    ) -> Self {
        let mut single = vec![None; 256];
        let mut multi_by_first: HashMap<u8, Vec<usize>> = HashMap::new();
        let mut multi_wild_first = Vec::new();
        let mut chars = HashMap::new();
        let mut controls = HashMap::new();
        let mut params = Vec::new();
        let mut longest_symbol = 1;

        for (i, entry) in entries.iter().enumerate() {
            if entry.pattern.len() == 1 {
                match entry.pattern.first_literal() {
                    Some(b) => single[b as usize] = Some(i),
                    None => multi_wild_first.push(i),
                }
            } else {
                match entry.pattern.first_literal() {
                    Some(b) => multi_by_first.entry(b).or_default().push(i),
                    None => multi_wild_first.push(i),
                }
            }

            // First declaration wins for the reverse direction.
            match &entry.value {
                EntryValue::Char(symbol) => {
                    longest_symbol = longest_symbol.max(symbol.chars().count());
                    chars.entry(symbol.clone()).or_insert(i);
                }
                EntryValue::Control(name) => {
                    controls.entry(name.clone()).or_insert(i);
                }
                EntryValue::Param(_) => params.push(i),
            }
        }

        for candidates in multi_by_first.values_mut() {
            candidates.sort_by_key(|&i| std::cmp::Reverse(entries[i].pattern.len()));
        }
        multi_wild_first.sort_by_key(|&i| std::cmp::Reverse(entries[i].pattern.len()));

        Self {
            entries,
            single,
            multi_by_first,
            multi_wild_first,
            chars,
            controls,
            params,
            terminators,
            newline,
            longest_symbol,
        }
    }

    /// Replace the set of control names that end a string.
    pub fn with_terminators<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        if !names.is_empty() {
            self.terminators = names;
        }
        self
    }

    pub fn is_terminator(&self, token: &Token) -> bool {
        matches!(token, Token::Control(name) if self.terminators.contains(name))
    }

    /// Terminator token used when re-appending an end marker.
    pub fn default_terminator(&self) -> Option<Token> {
        let mut names: Vec<&String> = self
            .terminators
            .iter()
            .filter(|name| self.controls.contains_key(*name))
            .collect();
        names.sort_by_key(|name| self.controls[*name]);
        names.first().map(|name| Token::Control((*name).clone()))
    }

    pub fn newline(&self) -> Option<&str> {
        self.newline.as_deref()
    }

    /// The single-byte character or control entry for `byte`, if any.
    pub fn lookup_byte(&self, byte: u8) -> Option<Token> {
        let index = self.single[byte as usize]?;
        Some(self.entries[index].token(Vec::new()))
    }

    /// Decode one token at `data[start..]`.
    pub fn decode(&self, data: &[u8], start: usize) -> Result<(Token, usize)> {
        let Some(&byte) = data.get(start) else {
            return Err(Error::StructuralValidation(format!(
                "decode at 0x{:X} past the end of a {}-byte buffer",
                start,
                data.len()
            )));
        };

        let multi = self
            .multi_by_first
            .get(&byte)
            .into_iter()
            .flatten()
            .chain(&self.multi_wild_first);
        for &i in multi {
            let entry = &self.entries[i];
            if let Some(args) = entry.pattern.match_at(data, start) {
                return Ok((entry.token(args), entry.pattern.len()));
            }
        }

        match self.single[byte as usize] {
            Some(i) => Ok((self.entries[i].token(Vec::new()), 1)),
            None => Err(Error::UnknownByteSequence {
                offset: start,
                byte,
            }),
        }
    }

    /// Decode from `start` until a terminator or `max_len` bytes.
    ///
    /// Unknown bytes become `Token::Unknown` placeholders and decoding
    /// continues; their offsets are recorded in the result.
    pub fn decode_run(&self, data: &[u8], start: usize, max_len: usize) -> DecodedRun {
        let end = start.saturating_add(max_len).min(data.len());
        let window = &data[..end];
        let mut run = DecodedRun::default();
        let mut pos = start;

        while pos < end {
            match self.decode(window, pos) {
                Ok((token, consumed)) => {
                    pos += consumed;
                    if self.is_terminator(&token) {
                        run.terminator = Some(token);
                        break;
                    }
                    run.tokens.push(token);
                }
                Err(_) => {
                    run.unknown_offsets.push(pos);
                    run.tokens.push(Token::Unknown(window[pos]));
                    pos += 1;
                }
            }
        }

        run.consumed = pos - start;
        run
    }

    /// Encode a single token.
    pub fn encode(&self, token: &Token) -> Result<Vec<u8>> {
        let entry = match token {
            Token::Unknown(byte) => return Ok(vec![*byte]),
            Token::Char(symbol) => self.chars.get(symbol),
            Token::Control(name) => self.controls.get(name),
            Token::Param { template, .. } => self.params.iter().find(|&&i| {
                matches!(&self.entries[i].value, EntryValue::Param(t) if t == template)
            }),
        };

        let args: &[(Wildcard, u8)] = match token {
            Token::Param { args, .. } => args,
            _ => &[],
        };

        entry
            .and_then(|&i| self.entries[i].pattern.fill(args))
            .ok_or_else(|| Error::UnencodableToken(token.to_string()))
    }

    pub fn encode_all(&self, tokens: &[Token]) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(tokens.len());
        for token in tokens {
            bytes.extend(self.encode(token)?);
        }
        Ok(bytes)
    }

    /// Split editable text into tokens.
    ///
    /// `<...>` groups become control, parameterized, or `<UNK:XX>` tokens;
    /// other text is matched greedily against the longest table symbol.
    /// Unmatched characters are kept as `Token::Char` so that encoding, not
    /// tokenizing, reports them.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let mut tokens = Vec::new();
        let mut ci = 0;

        while ci + 1 < boundaries.len() {
            let at = boundaries[ci];
            let rest = &text[at..];

            if rest.starts_with('<') {
                if let Some(close) = rest.find('>') {
                    let group = &rest[..=close];
                    tokens.push(self.control_token(group));
                    ci += group.chars().count();
                    continue;
                }
            }

            let max = self.longest_symbol.min(boundaries.len() - 1 - ci);
            let matched = (1..=max).rev().find_map(|n| {
                let symbol = &text[at..boundaries[ci + n]];
                self.chars.contains_key(symbol).then_some((symbol, n))
            });
            match matched {
                Some((symbol, n)) => {
                    tokens.push(Token::char(symbol));
                    ci += n;
                }
                None => {
                    tokens.push(Token::char(&text[at..boundaries[ci + 1]]));
                    ci += 1;
                }
            }
        }

        tokens
    }

    fn control_token(&self, group: &str) -> Token {
        if let Some(hex) = group
            .strip_prefix("<UNK:")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                return Token::Unknown(byte);
            }
        }
        if self.controls.contains_key(group) {
            return Token::control(group);
        }
        for &i in &self.params {
            if let EntryValue::Param(template) = &self.entries[i].value {
                if let Some(args) = token::match_template(template, group) {
                    return Token::Param {
                        template: template.clone(),
                        args,
                    };
                }
            }
        }
        if self.chars.contains_key(group) {
            return Token::char(group);
        }
        Token::control(group)
    }

    /// Tokenize then encode text.
    pub fn encode_text(&self, text: &str) -> Result<Vec<u8>> {
        self.encode_all(&self.tokenize(text))
    }

    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            total: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            match entry.value {
                EntryValue::Char(_) => stats.characters += 1,
                EntryValue::Control(_) => stats.control_codes += 1,
                EntryValue::Param(_) => stats.parameterized += 1,
            }
            if entry.pattern.len() > 1 {
                stats.multi_byte += 1;
            }
        }
        stats
    }
}

impl FromStr for EncodingTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = "# Test encoding table
41=A
42=B
43=C
48=H
49=I
20=\x20
FE=<NEWLINE>
FF=<END>
# Multi-byte pattern
F0XX=<DELAY:XX>
F1XXYY=<COLOR:XX,YY>
8081=th
";

    fn table() -> EncodingTable {
        EncodingTable::parse(TABLE).unwrap()
    }

    #[test]
    fn test_table_loading() {
        let table = table();
        assert_eq!(table.decode(&[0x41], 0).unwrap(), (Token::char("A"), 1));
        assert_eq!(table.decode(&[0x20], 0).unwrap(), (Token::char(" "), 1));
        assert_eq!(
            table.decode(&[0xFE], 0).unwrap(),
            (Token::control("<NEWLINE>"), 1)
        );
        assert_eq!(table.encode(&Token::char("A")).unwrap(), vec![0x41]);
    }

    #[test]
    fn test_decode_prefers_multi_byte() {
        let table = table();
        let (token, consumed) = table.decode(&[0xF0, 0x05], 0).unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(token.to_string(), "<DELAY:05>");

        let (token, consumed) = table.decode(&[0x80, 0x81], 0).unwrap();
        assert_eq!((token, consumed), (Token::char("th"), 2));
    }

    #[test]
    fn test_decode_unknown_byte() {
        let table = table();
        match table.decode(&[0x41, 0x99], 1) {
            Err(Error::UnknownByteSequence { offset, byte }) => {
                assert_eq!(offset, 1);
                assert_eq!(byte, 0x99);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // Truncated parameterized sequence is unknown too.
        assert!(table.decode(&[0xF0], 0).is_err());
    }

    #[test]
    fn test_decode_run_stops_at_terminator() {
        let table = table();
        let data = [0x41, 0x42, 0x43, 0xFF, 0x41];
        let run = table.decode_run(&data, 0, 16);
        assert_eq!(render_tokens(&run.tokens), "ABC");
        assert_eq!(run.consumed, 4);
        assert_eq!(run.terminator, Some(Token::control("<END>")));
    }

    #[test]
    fn test_decode_run_respects_max_len() {
        let table = table();
        let data = [0x41, 0x42, 0xF0, 0x05, 0xFF];
        let run = table.decode_run(&data, 0, 3);
        assert_eq!(run.consumed, 3);
        assert!(run.terminator.is_none());
        // The DELAY sequence straddles the limit and cannot match.
        assert_eq!(run.tokens[2], Token::Unknown(0xF0));
        assert_eq!(run.unknown_offsets, vec![2]);
    }

    #[test]
    fn test_round_trip_bytes() {
        let table = table();
        let data = [0x48, 0x49, 0xF0, 0x10, 0x20, 0xF1, 0x01, 0x02, 0x80, 0x81, 0xFE, 0x41];
        let run = table.decode_run(&data, 0, data.len());
        assert!(run.unknown_offsets.is_empty());
        assert_eq!(table.encode_all(&run.tokens).unwrap(), data.to_vec());
    }

    #[test]
    fn test_tokenize_and_encode_text() {
        let table = table();
        assert_eq!(
            table.encode_text("A<NEWLINE>B").unwrap(),
            vec![0x41, 0xFE, 0x42]
        );
        assert_eq!(
            table.encode_text("<DELAY:0A>HI").unwrap(),
            vec![0xF0, 0x0A, 0x48, 0x49]
        );
        assert_eq!(table.encode_text("thA").unwrap(), vec![0x80, 0x81, 0x41]);
        assert_eq!(table.encode_text("<UNK:99>").unwrap(), vec![0x99]);
    }

    #[test]
    fn test_unencodable_character() {
        let table = table();
        match table.encode_text("HÉ") {
            Err(Error::UnencodableToken(token)) => assert_eq!(token, "É"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            table.encode_text("<WAIT>"),
            Err(Error::UnencodableToken(_))
        ));
    }

    #[test]
    fn test_duplicate_pattern_rejected() {
        let err = EncodingTable::parse("41=A\n41=B\n").unwrap_err();
        match err {
            Error::TableLoad { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("duplicate"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_patterns_rejected() {
        assert!(EncodingTable::parse("F0XX=<DELAY:XX>\nF001=<FAST>\n").is_err());
        assert!(EncodingTable::parse("F0XX=<DELAY:XX>\nF0XX01=<X:XX>\n").is_err());
        // A single-byte entry may share the first byte of a longer one.
        assert!(EncodingTable::parse("F0=A\nF0XX=<DELAY:XX>\n").is_ok());
    }

    #[test]
    fn test_wild_byte_entry_is_checked_for_ambiguity() {
        let err = EncodingTable::parse("41=A\nXX=<BYTE:XX>\n").unwrap_err();
        match err {
            Error::TableLoad { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("ambiguous"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(EncodingTable::parse("XX=<BYTE:XX>\nF0XX=<DELAY:XX>\n").is_err());

        let table = EncodingTable::parse("XX=<BYTE:XX>\n").unwrap();
        let (token, consumed) = table.decode(&[0x7E], 0).unwrap();
        assert_eq!((token.to_string().as_str(), consumed), ("<BYTE:7E>", 1));
    }

    #[test]
    fn test_every_entry_round_trips() {
        let table = table();
        for entry in &table.entries {
            for value in [0x00, 0x5A, 0xFF] {
                let args: Vec<(Wildcard, u8)> =
                    entry.pattern.wildcards().map(|w| (w, value)).collect();
                let bytes = entry.pattern.fill(&args).unwrap();

                let (token, consumed) = table.decode(&bytes, 0).unwrap();
                assert_eq!(consumed, bytes.len(), "line {}", entry.line);
                assert_eq!(table.encode(&token).unwrap(), bytes, "line {}", entry.line);
                assert_eq!(
                    table.encode_text(&token.to_string()).unwrap(),
                    bytes,
                    "line {}",
                    entry.line
                );
            }
        }
    }

    #[test]
    fn test_terminators() {
        let table = EncodingTable::parse("41=A\n/00=<STOP>\n").unwrap();
        assert!(table.is_terminator(&Token::control("<STOP>")));
        assert!(!table.is_terminator(&Token::control("<END>")));
        assert_eq!(table.default_terminator(), Some(Token::control("<STOP>")));

        let table = table.with_terminators(["<END>"]);
        assert!(table.is_terminator(&Token::control("<END>")));
    }

    #[test]
    fn test_lookup_byte() {
        let table = table();
        assert_eq!(table.lookup_byte(0x41), Some(Token::char("A")));
        assert_eq!(table.lookup_byte(0xFF), Some(Token::control("<END>")));
        assert_eq!(table.lookup_byte(0xF0), None);
        assert_eq!(table.lookup_byte(0x80), None);
    }

    #[test]
    fn test_get_stats() {
        let stats = table().stats();
        assert_eq!(stats.characters, 7);
        assert_eq!(stats.control_codes, 2);
        assert_eq!(stats.parameterized, 2);
        assert_eq!(stats.multi_byte, 3);
    }

    #[test]
    fn test_load_shift_jis_table() {
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode("01=あ\n02=い\nFF=<END>\n");
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encoded).unwrap();

        let table = EncodingTable::load(file.path()).unwrap();
        assert_eq!(table.encode_text("いあ").unwrap(), vec![0x02, 0x01]);
    }
}
