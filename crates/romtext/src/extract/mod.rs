//! Text extraction.
//!
//! The [`Extractor`] walks every configured [`TextLocation`] and decodes the
//! bytes it points at into [`TextRecord`]s. Problems that only affect one
//! string (unknown bytes, a missing terminator, a stray pointer) are collected
//! as [`Diagnostic`]s and extraction carries on.

mod record;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::location::{FixedLocation, PointerTable, TextLocation};
use crate::rom::ByteRange;
use crate::table::{EncodingTable, Token};

pub use record::{PointerRef, TextRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    UnknownByte {
        record: String,
        offset: usize,
        byte: u8,
    },
    MissingTerminator {
        record: String,
        start: usize,
        max_length: usize,
    },
    PointerOutOfRange {
        pointer: usize,
        target: i64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownByte {
                record,
                offset,
                byte,
            } => write!(f, "{}: unknown byte {:02X} at 0x{:X}", record, byte, offset),
            Diagnostic::MissingTerminator {
                record,
                start,
                max_length,
            } => write!(
                f,
                "{}: no terminator within {} bytes of 0x{:X}",
                record, max_length, start
            ),
            Diagnostic::PointerOutOfRange { pointer, target } => write!(
                f,
                "pointer at 0x{:X} resolves outside the image: {:#X}",
                pointer, target
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub records: usize,
    pub characters: usize,
    pub control_codes: usize,
    pub unknown_bytes: usize,
    /// Pointer references beyond the first for each record.
    pub aliases: usize,
    pub unterminated: usize,
    pub skipped_pointers: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub records: Vec<TextRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    pub fn get(&self, id: &str) -> Option<&TextRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TextRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn stats(&self) -> ExtractionStats {
        let mut stats = ExtractionStats {
            records: self.records.len(),
            ..Default::default()
        };
        for record in &self.records {
            for token in &record.tokens {
                match token {
                    Token::Char(symbol) => stats.characters += symbol.chars().count(),
                    Token::Control(_) | Token::Param { .. } => stats.control_codes += 1,
                    Token::Unknown(_) => {}
                }
            }
            stats.unknown_bytes += record.unknown_bytes;
            stats.aliases += record.pointer_refs.len().saturating_sub(1);
            if !record.is_terminated() {
                stats.unterminated += 1;
            }
        }
        stats.skipped_pointers = self
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::PointerOutOfRange { .. }))
            .count();
        stats
    }
}

pub struct Extractor<'a> {
    table: &'a EncodingTable,
}

impl<'a> Extractor<'a> {
    pub fn new(table: &'a EncodingTable) -> Self {
        Self { table }
    }

    /// Extract every location in declaration order.
    pub fn extract(&self, data: &[u8], locations: &[TextLocation]) -> Result<Extraction> {
        let mut extraction = Extraction::default();
        let mut by_start: HashMap<usize, usize> = HashMap::new();
        let mut fixed_count = 0;
        let mut pointer_count = 0;

        for (index, location) in locations.iter().enumerate() {
            match location {
                TextLocation::Fixed(fixed) => {
                    fixed_count += 1;
                    let id = format!("string_{:03}", fixed_count);
                    let record = self.extract_fixed(data, index, fixed, id, &mut extraction)?;
                    extraction.records.push(record);
                }
                TextLocation::PointerTable(table) => self.extract_pointer_table(
                    data,
                    index,
                    table,
                    &mut pointer_count,
                    &mut by_start,
                    &mut extraction,
                )?,
            }
        }

        check_overlaps(&extraction.records)?;

        let stats = extraction.stats();
        info!(
            "Extracted {} records ({} characters, {} unknown bytes, {} aliases)",
            stats.records, stats.characters, stats.unknown_bytes, stats.aliases
        );
        Ok(extraction)
    }

    fn extract_fixed(
        &self,
        data: &[u8],
        index: usize,
        fixed: &FixedLocation,
        id: String,
        extraction: &mut Extraction,
    ) -> Result<TextRecord> {
        if fixed.address >= data.len() {
            return Err(Error::Config(format!(
                "fixed location {} at 0x{:X} is outside the image",
                id, fixed.address
            )));
        }
        let capacity = fixed.max_length.min(data.len() - fixed.address);
        Ok(self.decode_record(data, index, fixed.address, capacity, capacity, id, extraction))
    }

    fn extract_pointer_table(
        &self,
        data: &[u8],
        index: usize,
        table: &PointerTable,
        pointer_count: &mut usize,
        by_start: &mut HashMap<usize, usize>,
        extraction: &mut Extraction,
    ) -> Result<()> {
        let (resolved, skipped) = table.resolve(data)?;
        for error in skipped {
            if let Error::PointerOutOfRange { pointer, target } = error {
                extraction
                    .diagnostics
                    .push(Diagnostic::PointerOutOfRange { pointer, target });
            }
        }

        for pointer in resolved {
            let reference = PointerRef {
                location: index,
                entry_index: pointer.entry_index,
                pointer_address: pointer.pointer_address,
            };

            if let Some(&existing) = by_start.get(&pointer.target) {
                let record = &mut extraction.records[existing];
                debug!(
                    "Pointer {} aliases {} at 0x{:X}",
                    pointer.entry_index, record.id, pointer.target
                );
                record.pointer_refs.push(reference);
                continue;
            }

            *pointer_count += 1;
            let id = format!("ptr_{:03}", *pointer_count);
            let mut record =
                self.decode_record(data, index, pointer.target, table.max_length, 0, id, extraction);
            record.capacity = record.range.len();
            record.pointer_refs.push(reference);
            by_start.insert(pointer.target, extraction.records.len());
            extraction.records.push(record);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_record(
        &self,
        data: &[u8],
        location: usize,
        start: usize,
        max_length: usize,
        capacity: usize,
        id: String,
        extraction: &mut Extraction,
    ) -> TextRecord {
        let run = self.table.decode_run(data, start, max_length);

        for &offset in &run.unknown_offsets {
            extraction.diagnostics.push(Diagnostic::UnknownByte {
                record: id.clone(),
                offset,
                byte: data[offset],
            });
        }
        if run.terminator.is_none() {
            warn!(
                "{}: no terminator within {} bytes of 0x{:X}",
                id, max_length, start
            );
            extraction.diagnostics.push(Diagnostic::MissingTerminator {
                record: id.clone(),
                start,
                max_length,
            });
        }

        TextRecord {
            id,
            location,
            range: ByteRange::with_len(start, run.consumed),
            tokens: run.tokens,
            terminator: run.terminator,
            capacity,
            translation: Vec::new(),
            pointer_refs: Vec::new(),
            unknown_bytes: run.unknown_offsets.len(),
        }
    }
}

/// Reject records whose slots overlap.
fn check_overlaps(records: &[TextRecord]) -> Result<()> {
    let mut spans: Vec<(ByteRange, &str)> = records
        .iter()
        .map(|r| (r.slot(), r.id.as_str()))
        .filter(|(slot, _)| !slot.is_empty())
        .collect();
    spans.sort();

    for pair in spans.windows(2) {
        let ((a, a_id), (b, b_id)) = (pair[0], pair[1]);
        if a.overlaps(&b) {
            return Err(Error::Config(format!(
                "strings {} ({}) and {} ({}) overlap",
                a_id, a, b_id, b
            )));
        }
    }
    Ok(())
}
