//! Reinjection of edited text.
//!
//! Records are re-encoded in parallel, then placed one at a time in record
//! order: in place when the new bytes fit the original slot, otherwise in the
//! lowest free range the record's pointers can address. Every pointer that
//! refers to a moved record is rewritten.
//!
//! Encoding failures and lack of space fail a single record. A write that
//! would touch a protected region, or a pointer value that no longer fits its
//! width, fails the whole run and restores the image.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::extract::TextRecord;
use crate::rom::{ByteRange, RomImage};
use crate::space::{FreeSpaceMap, scan_padding};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going after a record fails.
    #[default]
    BestEffort,
    /// Roll back the whole run on the first failed record.
    AbortAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// No translation, or the translation encodes to the original bytes.
    Unchanged,
    InPlace { range: ByteRange },
    Relocated { from: ByteRange, to: ByteRange },
    Failed { error: String },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Outcome::InPlace { .. } | Outcome::Relocated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub id: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReinjectionReport {
    pub outcomes: Vec<RecordOutcome>,
    /// Set when `abort_all` rolled the image back.
    pub aborted: bool,
    pub free_space_remaining: usize,
}

impl ReinjectionReport {
    pub fn get(&self, id: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.id == id)
            .map(|o| &o.outcome)
    }

    /// Start offset of a record after reinjection.
    pub fn final_start(&self, record: &TextRecord) -> usize {
        match self.get(&record.id) {
            Some(Outcome::Relocated { to, .. }) if !self.aborted => to.start,
            _ => record.start(),
        }
    }

    pub fn written(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_written()).count()
    }

    pub fn relocated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Relocated { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_failed()).count()
    }
}

pub struct Reinjector<'a> {
    config: &'a EngineConfig,
}

impl<'a> Reinjector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Initial free space: declared ranges plus padding runs, minus protected
    /// regions, pointer tables and every record slot.
    pub fn free_space(&self, data: &[u8], records: &[TextRecord]) -> Result<FreeSpaceMap> {
        let image = ByteRange::new(0, data.len());
        let mut map = FreeSpaceMap::from_ranges(self.config.free_ranges.iter().copied());

        if let Some(scan) = self.config.padding_scan {
            let region = self.config.text_region.unwrap_or(image);
            for run in scan_padding(data, region, scan.byte, scan.min_run) {
                map.free(run);
            }
        }

        for region in &self.config.protected {
            map.reserve(region.range);
        }
        for location in &self.config.locations {
            if let Some(table) = location.as_pointer_table() {
                map.reserve(table.table_range()?);
            }
        }
        for record in records {
            map.reserve(record.slot());
        }
        map.restrict_to(image);

        debug!(
            "Free space: {} bytes in {} ranges",
            map.total(),
            map.ranges().len()
        );
        Ok(map)
    }

    /// Write every translated record into `rom`.
    pub fn run(&self, rom: &mut RomImage, records: &[TextRecord]) -> Result<ReinjectionReport> {
        let table = &*self.config.table;
        let encoded: Vec<Option<Result<Vec<u8>>>> = records
            .par_iter()
            .map(|record| {
                record
                    .is_translated()
                    .then(|| record.encode_translation(table))
            })
            .collect();

        let snapshot = rom.snapshot();
        let mut free = self.free_space(rom.working(), records)?;
        let mut report = ReinjectionReport::default();

        for (record, bytes) in records.iter().zip(encoded) {
            let outcome = match bytes {
                None => Outcome::Unchanged,
                Some(Ok(bytes)) => match self.place(rom, &mut free, record, &bytes) {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_fatal() => {
                        warn!("{}: {}; rolling back", record.id, e);
                        rom.restore(snapshot);
                        return Err(e);
                    }
                    Err(e) => failed(record, e),
                },
                Some(Err(e)) => failed(record, e),
            };

            let is_failed = outcome.is_failed();
            report.outcomes.push(RecordOutcome {
                id: record.id.clone(),
                outcome,
            });

            if is_failed && self.config.policy == FailurePolicy::AbortAll {
                warn!("{} failed under abort_all; rolling back", record.id);
                rom.restore(snapshot);
                report.aborted = true;
                return Ok(report);
            }
        }

        if let Err(e) = free.check_invariants() {
            rom.restore(snapshot);
            return Err(e);
        }
        report.free_space_remaining = free.total();
        info!(
            "Reinjected {} records ({} relocated, {} failed)",
            report.written(),
            report.relocated(),
            report.failed()
        );
        Ok(report)
    }

    fn place(
        &self,
        rom: &mut RomImage,
        free: &mut FreeSpaceMap,
        record: &TextRecord,
        bytes: &[u8],
    ) -> Result<Outcome> {
        let original = rom.read_bytes(record.start(), record.original_len())?;
        if original == bytes {
            return Ok(Outcome::Unchanged);
        }

        if bytes.len() <= record.capacity {
            let written = ByteRange::with_len(record.start(), bytes.len());
            let touched = ByteRange::new(record.start(), written.end.max(record.range.end));
            self.config.check_writable(&touched)?;

            rom.write_bytes(written.start, bytes)?;
            if written.end < record.range.end {
                let tail = ByteRange::new(written.end, record.range.end);
                rom.fill(tail, self.config.pad_byte)?;
                if record.is_relocatable() {
                    free.free(tail);
                }
            }
            debug!("{}: {} bytes written in place at {}", record.id, bytes.len(), written);
            return Ok(Outcome::InPlace { range: written });
        }

        if !record.is_relocatable() {
            return Err(Error::InsufficientSpace {
                record: record.id.clone(),
                needed: bytes.len(),
            });
        }

        let bytes = record.relocation_bytes(&self.config.table, bytes)?;
        let insufficient = || Error::InsufficientSpace {
            record: record.id.clone(),
            needed: bytes.len(),
        };

        let within = self.relocation_window(rom.len(), record).ok_or_else(insufficient)?;
        let to = free.allocate(bytes.len(), within).ok_or_else(insufficient)?;
        self.config.check_writable(&to)?;

        let mut pointer_writes = Vec::with_capacity(record.pointer_refs.len());
        for reference in &record.pointer_refs {
            let table = self.config.pointer_table(reference.location).ok_or_else(|| {
                Error::StructuralValidation(format!(
                    "{} refers to location {} which is not a pointer table",
                    record.id, reference.location
                ))
            })?;
            let value = table.encode_target(to.start)?;
            let range = ByteRange::with_len(reference.pointer_address, value.len());
            self.config.check_writable(&range)?;
            pointer_writes.push((range.start, value));
        }

        rom.write_bytes(to.start, &bytes)?;
        for (address, value) in pointer_writes {
            rom.write_bytes(address, &value)?;
        }
        self.config.check_writable(&record.range)?;
        rom.fill(record.range, self.config.pad_byte)?;
        free.free(record.range);

        info!(
            "{}: relocated {} -> {} ({} pointers)",
            record.id,
            record.range,
            to,
            record.pointer_refs.len()
        );
        Ok(Outcome::Relocated {
            from: record.range,
            to,
        })
    }

    /// Text region intersected with the window every referencing table can
    /// address.
    fn relocation_window(&self, image_len: usize, record: &TextRecord) -> Option<ByteRange> {
        let mut window = self
            .config
            .text_region
            .unwrap_or(ByteRange::new(0, image_len))
            .clamp_to(image_len)?;
        for reference in &record.pointer_refs {
            let table = self.config.pointer_table(reference.location)?;
            window = window.intersection(&table.addressable_window(image_len)?)?;
        }
        Some(window)
    }
}

fn failed(record: &TextRecord, error: Error) -> Outcome {
    warn!("{}: {}", record.id, error);
    Outcome::Failed {
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;
    use crate::location::{BankWindow, Endianness, PointerFormat, PointerTable, TextLocation};
    use crate::table::EncodingTable;

    const TABLE: &str = "41=A\n42=B\n43=C\n44=D\n45=E\n48=H\n49=I\n4C=L\n4F=O\n57=W\n52=R\n20=\x20\nFF=<END>\n";

    fn table() -> EncodingTable {
        EncodingTable::parse(TABLE).unwrap()
    }

    /// 0x100-byte image with a 2-entry LE16 pointer table at 0 (base -0x8000)
    /// pointing at "HELLO" (0x10) and "ABC" (0x20); 0x80..0xC0 is free.
    fn pointer_image() -> Vec<u8> {
        let mut data = vec![0u8; 0x100];
        data[0..4].copy_from_slice(&[0x10, 0x80, 0x20, 0x80]);
        data[0x10..0x16].copy_from_slice(&[0x48, 0x45, 0x4C, 0x4C, 0x4F, 0xFF]);
        data[0x20..0x24].copy_from_slice(&[0x41, 0x42, 0x43, 0xFF]);
        data
    }

    fn pointer_config(policy: FailurePolicy) -> EngineConfig {
        EngineConfig::builder(table())
            .location(
                PointerTable::new(0, 2, PointerFormat::LITTLE_ENDIAN_16).with_base_offset(-0x8000),
            )
            .free_range(ByteRange::new(0x80, 0xC0))
            .policy(policy)
            .build()
    }

    fn extract(config: &EngineConfig, data: &[u8]) -> Vec<TextRecord> {
        Extractor::new(&config.table)
            .extract(data, &config.locations)
            .unwrap()
            .records
    }

    #[test]
    fn test_shrink_in_place_frees_tail() {
        let config = pointer_config(FailurePolicy::BestEffort);
        let mut rom = RomImage::new(pointer_image());
        let mut records = extract(&config, rom.working());
        records[0].set_translation_text(&config.table, "HI");

        let report = Reinjector::new(&config).run(&mut rom, &records).unwrap();
        assert_eq!(
            report.get("ptr_001"),
            Some(&Outcome::InPlace {
                range: ByteRange::new(0x10, 0x13)
            })
        );
        assert_eq!(&rom.working()[0x10..0x16], &[0x48, 0x49, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(report.get("ptr_002"), Some(&Outcome::Unchanged));
        assert_eq!(report.free_space_remaining, 0x40 + 3);
    }

    #[test]
    fn test_grow_relocates_and_rewrites_pointer() {
        let config = pointer_config(FailurePolicy::BestEffort);
        let mut rom = RomImage::new(pointer_image());
        let mut records = extract(&config, rom.working());
        records[1].set_translation_text(&config.table, "ABCDE ABCDE");

        let report = Reinjector::new(&config).run(&mut rom, &records).unwrap();
        assert_eq!(
            report.get("ptr_002"),
            Some(&Outcome::Relocated {
                from: ByteRange::new(0x20, 0x24),
                to: ByteRange::new(0x80, 0x8C),
            })
        );
        assert_eq!(&rom.working()[2..4], &[0x80, 0x80]);
        assert_eq!(&rom.working()[0x20..0x24], &[0xFF; 4]);
        assert_eq!(rom.working()[0x8B], 0xFF);
        assert_eq!(rom.len(), 0x100);
    }

    #[test]
    fn test_relocations_reuse_vacated_slots() {
        // Strings at 0x10, 0x18 and 0x20; 12 bytes of declared free space.
        let mut data = vec![0u8; 0x200];
        data[0..6].copy_from_slice(&[0x10, 0x80, 0x18, 0x80, 0x20, 0x80]);
        data[0x10..0x18].copy_from_slice(&[0x41, 0x42, 0x43, 0x44, 0x45, 0x41, 0x42, 0xFF]);
        data[0x18..0x1B].copy_from_slice(&[0x48, 0x49, 0xFF]);
        data[0x20..0x23].copy_from_slice(&[0x41, 0x42, 0xFF]);
        let config = EngineConfig::builder(table())
            .location(
                PointerTable::new(0, 3, PointerFormat::LITTLE_ENDIAN_16).with_base_offset(-0x8000),
            )
            .free_range(ByteRange::new(0x100, 0x10C))
            .build();
        let mut rom = RomImage::new(data);
        let mut records = extract(&config, rom.working());
        records[0].set_translation_text(&config.table, "ABCDEABCDEA");
        records[1].set_translation_text(&config.table, "HIHIH");
        records[2].set_translation_text(&config.table, "ABCD");

        let report = Reinjector::new(&config).run(&mut rom, &records).unwrap();
        let moved = |id| match report.get(id) {
            Some(Outcome::Relocated { to, .. }) => *to,
            other => panic!("{} not relocated: {:?}", id, other),
        };
        assert_eq!(moved("ptr_001"), ByteRange::new(0x100, 0x10C));
        // Lowest fit inside the slot ptr_001 just vacated.
        assert_eq!(moved("ptr_002"), ByteRange::new(0x10, 0x16));
        // Spans the leftover of ptr_001's slot merged with ptr_002's.
        assert_eq!(moved("ptr_003"), ByteRange::new(0x16, 0x1B));
        assert_eq!(report.free_space_remaining, 3);
        assert_eq!(
            &rom.working()[0..6],
            &[0x00, 0x81, 0x10, 0x80, 0x16, 0x80]
        );

        let again = extract(&config, rom.working());
        let texts: Vec<String> = again.iter().map(TextRecord::original_text).collect();
        assert_eq!(texts, vec!["ABCDEABCDEA", "HIHIH", "ABCD"]);
    }

    #[test]
    fn test_unterminated_string_gains_terminator_when_relocated() {
        // "ABCD" runs into the end of the image with no terminator.
        let mut data = vec![0u8; 0x40];
        data[0..2].copy_from_slice(&[0x3C, 0x80]);
        data[0x3C..0x40].copy_from_slice(&[0x41, 0x42, 0x43, 0x44]);
        let config = EngineConfig::builder(table())
            .location(
                PointerTable::new(0, 1, PointerFormat::LITTLE_ENDIAN_16).with_base_offset(-0x8000),
            )
            .free_range(ByteRange::new(0x10, 0x30))
            .build();
        let mut rom = RomImage::new(data);
        let mut records = extract(&config, rom.working());
        assert!(!records[0].is_terminated());
        records[0].set_translation_text(&config.table, "ABCDE");

        let report = Reinjector::new(&config).run(&mut rom, &records).unwrap();
        assert_eq!(
            report.get("ptr_001"),
            Some(&Outcome::Relocated {
                from: ByteRange::new(0x3C, 0x40),
                to: ByteRange::new(0x10, 0x16),
            })
        );
        assert_eq!(&rom.working()[0x10..0x16], &[0x41, 0x42, 0x43, 0x44, 0x45, 0xFF]);

        let again = extract(&config, rom.working());
        assert_eq!(again[0].start(), 0x10);
        assert_eq!(again[0].original_text(), "ABCDE");
        assert!(again[0].is_terminated());
    }

    #[test]
    fn test_fixed_record_cannot_relocate() {
        let config = EngineConfig::builder(table())
            .location(TextLocation::fixed(0x10, 6))
            .free_range(ByteRange::new(0x80, 0xC0))
            .build();
        let mut rom = RomImage::new(pointer_image());
        let mut records = extract(&config, rom.working());
        records[0].set_translation_text(&config.table, "HELLO WORLD");

        let report = Reinjector::new(&config).run(&mut rom, &records).unwrap();
        assert!(report.get("string_001").unwrap().is_failed());
        assert!(!rom.is_modified());
    }

    #[test]
    fn test_no_fit_is_insufficient_space() {
        let config = EngineConfig::builder(table())
            .location(
                PointerTable::new(0, 2, PointerFormat::LITTLE_ENDIAN_16).with_base_offset(-0x8000),
            )
            .free_range(ByteRange::new(0x80, 0x84))
            .build();
        let mut rom = RomImage::new(pointer_image());
        let mut records = extract(&config, rom.working());
        records[1].set_translation_text(&config.table, "ABCDE");

        let report = Reinjector::new(&config).run(&mut rom, &records).unwrap();
        match report.get("ptr_002") {
            Some(Outcome::Failed { error }) => assert!(error.contains("No free range")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!rom.is_modified());
    }

    #[test]
    fn test_abort_all_rolls_back() {
        let config = pointer_config(FailurePolicy::AbortAll);
        let mut rom = RomImage::new(pointer_image());
        let mut records = extract(&config, rom.working());
        records[0].set_translation_text(&config.table, "HI");
        records[1].set_translation_text(&config.table, "XYZ");

        let report = Reinjector::new(&config).run(&mut rom, &records).unwrap();
        assert!(report.aborted);
        assert!(!rom.is_modified());
    }

    #[test]
    fn test_protected_write_is_fatal() {
        let config = EngineConfig::builder(table())
            .location(TextLocation::fixed(0x10, 8))
            .protect(ByteRange::new(0x14, 0x18), "code")
            .build();
        let mut rom = RomImage::new(pointer_image());
        let mut records = extract(&config, rom.working());
        records[0].set_translation_text(&config.table, "HI");

        let err = Reinjector::new(&config).run(&mut rom, &records).unwrap_err();
        assert!(matches!(err, Error::ProtectedRegionViolation { .. }));
        assert!(!rom.is_modified());
    }

    #[test]
    fn test_pointer_overflow_is_fatal() {
        // 8-bit pointers into a bank mapped at 0x80: offsets past 0x7F need
        // a stored value above 0xFF.
        let narrow = PointerFormat::new(1, Endianness::Little).unwrap();
        let mut data = pointer_image();
        data[0..2].copy_from_slice(&[0x90, 0xA0]);
        let bank = BankWindow {
            size: 0x100,
            index: 0,
            header: 0,
            cpu_base: 0x80,
        };
        let config = EngineConfig::builder(table())
            .location(PointerTable::new(0, 2, narrow).with_bank(bank))
            .free_range(ByteRange::new(0x80, 0xC0))
            .build();
        let mut rom = RomImage::new(data);
        let mut records = extract(&config, rom.working());
        assert_eq!(records[1].original_text(), "ABC");
        records[0].set_translation_text(&config.table, "HI");
        records[1].set_translation_text(&config.table, "ABCDE");

        let err = Reinjector::new(&config).run(&mut rom, &records).unwrap_err();
        assert!(matches!(err, Error::StructuralValidation(_)));
        assert!(!rom.is_modified());
    }
}
