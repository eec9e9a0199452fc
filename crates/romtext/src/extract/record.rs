use serde::Serialize;

use crate::error::{Error, Result};
use crate::rom::ByteRange;
use crate::table::{EncodingTable, Token, render_tokens};

/// A pointer table entry that refers to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointerRef {
    /// Index of the pointer table in the location list.
    pub location: usize,
    pub entry_index: usize,
    pub pointer_address: usize,
}

/// One extracted string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRecord {
    pub id: String,
    /// Index of the originating location.
    pub location: usize,
    /// Original span, terminator included.
    pub range: ByteRange,
    pub tokens: Vec<Token>,
    /// Terminator the original string ended with, if any.
    pub terminator: Option<Token>,
    /// Bytes a rewrite may occupy without relocating.
    pub capacity: usize,
    pub translation: Vec<Token>,
    pub pointer_refs: Vec<PointerRef>,
    pub unknown_bytes: usize,
}

impl TextRecord {
    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn original_len(&self) -> usize {
        self.range.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }

    /// Bytes the record owns before reinjection. For a fixed location this is
    /// the whole declared slot, which an in-place rewrite may grow into.
    pub fn slot(&self) -> ByteRange {
        ByteRange::with_len(self.start(), self.capacity.max(self.original_len()))
    }

    /// Records reached only through a fixed address cannot move.
    pub fn is_relocatable(&self) -> bool {
        !self.pointer_refs.is_empty()
    }

    pub fn is_translated(&self) -> bool {
        !self.translation.is_empty()
    }

    pub fn has_unknown_bytes(&self) -> bool {
        self.unknown_bytes > 0
    }

    pub fn original_text(&self) -> String {
        render_tokens(&self.tokens)
    }

    pub fn translated_text(&self) -> String {
        render_tokens(&self.translation)
    }

    pub fn set_translation(&mut self, tokens: Vec<Token>) {
        self.translation = tokens;
    }

    /// Tokenize `text` with `table` and store it as the translation.
    pub fn set_translation_text(&mut self, table: &EncodingTable, text: &str) {
        self.translation = table.tokenize(text);
    }

    /// Bytes the translation encodes to, terminator re-appended.
    ///
    /// A terminator typed at the end of the translation is dropped first so
    /// it is not written twice.
    pub fn encode_translation(&self, table: &EncodingTable) -> Result<Vec<u8>> {
        let mut tokens: &[Token] = &self.translation;
        if let Some((last, rest)) = tokens.split_last() {
            if table.is_terminator(last) {
                tokens = rest;
            }
        }

        let mut bytes = table.encode_all(tokens)?;
        if let Some(terminator) = &self.terminator {
            bytes.extend(table.encode(terminator)?);
        }
        Ok(bytes)
    }

    /// Encoded translation prepared for a new address. A string extracted
    /// without a terminator gains the table's default one.
    pub fn relocation_bytes(&self, table: &EncodingTable, encoded: &[u8]) -> Result<Vec<u8>> {
        let mut bytes = encoded.to_vec();
        if !self.is_terminated() {
            let terminator = table.default_terminator().ok_or_else(|| {
                Error::UnencodableToken(format!("{} has no terminator to relocate with", self.id))
            })?;
            bytes.extend(table.encode(&terminator)?);
        }
        Ok(bytes)
    }
}
