//! Integrity checks before and after reinjection.
//!
//! Pre-flight checks confirm the input image is the one the project was set
//! up for. Post-flight checks confirm the candidate image is safe to patch
//! and refresh the internal checksum. Any failed check blocks patch output.

mod checksum;
mod signature;

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::extract::TextRecord;
use crate::reinject::ReinjectionReport;
use crate::rom::{RomImage, crc32};

pub use checksum::{ChecksumAlgorithm, ChecksumField};
pub use signature::{Signature, format_pattern, parse_pattern};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationConfig {
    pub expected_size: Option<usize>,
    pub expected_crc32: Option<u32>,
    pub header: Option<Signature>,
    pub known_patterns: Vec<Signature>,
    pub checksum: Option<ChecksumField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    #[strum(serialize = "PASS")]
    Pass,
    #[strum(serialize = "WARN")]
    Warn,
    #[strum(serialize = "FAIL")]
    Fail,
    #[strum(serialize = "SKIP")]
    Skipped,
}

impl CheckStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "✓",
            CheckStatus::Warn => "⚠",
            CheckStatus::Fail => "✗",
            CheckStatus::Skipped => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

impl Check {
    fn new<S: Into<String>>(name: &'static str, status: CheckStatus, message: S) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
}

impl ValidationReport {
    fn push(&mut self, check: Check) {
        match check.status {
            CheckStatus::Fail => warn!("{} failed: {}", check.name, check.message),
            CheckStatus::Warn => warn!("{}: {}", check.name, check.message),
            _ => info!("{}: {}", check.name, check.message),
        }
        self.checks.push(check);
    }

    pub fn get(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn passed(&self) -> usize {
        self.count(CheckStatus::Pass)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// Any failed check blocks patch output.
    pub fn is_blocking(&self) -> bool {
        self.count(CheckStatus::Fail) > 0
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.checks.extend(other.checks);
    }

    pub fn summary(&self) -> String {
        let run = self.checks.len() - self.count(CheckStatus::Skipped);
        format!(
            "Passed: {}/{} ({} warnings, {} failures)",
            self.passed(),
            run,
            self.count(CheckStatus::Warn),
            self.count(CheckStatus::Fail)
        )
    }

    /// Human-readable listing of every check.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for check in &self.checks {
            let _ = writeln!(
                out,
                "{} {:<4}  {:<22} {}",
                check.status.symbol(),
                check.status,
                check.name,
                check.message
            );
        }
        out.push_str(&self.summary());
        out
    }
}

pub struct Validator<'a> {
    config: &'a EngineConfig,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    fn rules(&self) -> &ValidationConfig {
        &self.config.validation
    }

    /// Checks on the untouched input image.
    pub fn preflight(&self, data: &[u8]) -> ValidationReport {
        let mut report = ValidationReport::default();
        report.push(self.check_file_size(data));
        report.push(self.check_crc32(data));
        report.push(self.check_header(data));
        report.push(self.check_known_patterns(data));
        report.push(self.check_stored_checksum(data));
        report
    }

    /// Checks on the candidate image. Rewrites the internal checksum first, so
    /// every later check sees the bytes the patch will carry.
    pub fn postflight(
        &self,
        rom: &mut RomImage,
        records: &[TextRecord],
        reinjection: &ReinjectionReport,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        report.push(self.update_checksum(rom));
        report.push(self.check_size_consistency(rom));
        report.push(self.check_pointer_consistency(rom.working(), records, reinjection));
        report.push(self.check_protected_regions(rom));
        report.push(check_control_codes(self.config, records));
        report.push(check_untranslated(records));
        report
    }

    fn check_file_size(&self, data: &[u8]) -> Check {
        match self.rules().expected_size {
            Some(expected) if expected == data.len() => Check::new(
                "file_size",
                CheckStatus::Pass,
                format!("ROM size is {} bytes", data.len()),
            ),
            Some(expected) => Check::new(
                "file_size",
                CheckStatus::Fail,
                format!("expected {} bytes, found {}", expected, data.len()),
            ),
            None => Check::new(
                "file_size",
                CheckStatus::Skipped,
                format!("no expected size configured ({} bytes)", data.len()),
            ),
        }
    }

    fn check_crc32(&self, data: &[u8]) -> Check {
        let actual = crc32(data);
        match self.rules().expected_crc32 {
            Some(expected) if expected == actual => Check::new(
                "crc32",
                CheckStatus::Pass,
                format!("CRC32 matches: {:08X}", actual),
            ),
            Some(expected) => Check::new(
                "crc32",
                CheckStatus::Warn,
                format!("expected {:08X}, found {:08X}", expected, actual),
            ),
            None => Check::new(
                "crc32",
                CheckStatus::Skipped,
                format!("no expected CRC32 configured (found {:08X})", actual),
            ),
        }
    }

    fn check_header(&self, data: &[u8]) -> Check {
        match &self.rules().header {
            Some(header) if header.matches(data) => {
                Check::new("header", CheckStatus::Pass, format!("found {}", header))
            }
            Some(header) => Check::new(
                "header",
                CheckStatus::Fail,
                format!("expected {}, found {}", header, header.found(data)),
            ),
            None => Check::new("header", CheckStatus::Skipped, "no header signature configured"),
        }
    }

    fn check_known_patterns(&self, data: &[u8]) -> Check {
        let patterns = &self.rules().known_patterns;
        if patterns.is_empty() {
            return Check::new("known_patterns", CheckStatus::Skipped, "no patterns configured");
        }
        let missing: Vec<String> = patterns
            .iter()
            .filter(|p| !p.matches(data))
            .map(|p| {
                if p.description.is_empty() {
                    p.to_string()
                } else {
                    format!("{} ({})", p.description, p)
                }
            })
            .collect();
        if missing.is_empty() {
            Check::new(
                "known_patterns",
                CheckStatus::Pass,
                format!("{} patterns found", patterns.len()),
            )
        } else {
            Check::new(
                "known_patterns",
                CheckStatus::Fail,
                format!("missing: {}", missing.join(", ")),
            )
        }
    }

    fn check_stored_checksum(&self, data: &[u8]) -> Check {
        let Some(field) = &self.rules().checksum else {
            return Check::new("checksum", CheckStatus::Skipped, "no checksum configured");
        };
        match (field.read(data), field.compute(data)) {
            (Ok(stored), Ok(computed)) if stored == computed => Check::new(
                "checksum",
                CheckStatus::Pass,
                format!("{} checksum {:#X} is valid", field.algorithm, stored),
            ),
            (Ok(stored), Ok(computed)) => Check::new(
                "checksum",
                CheckStatus::Warn,
                format!(
                    "{} checksum stored {:#X}, computed {:#X}",
                    field.algorithm, stored, computed
                ),
            ),
            (Err(e), _) | (_, Err(e)) => {
                Check::new("checksum", CheckStatus::Fail, e.to_string())
            }
        }
    }

    fn check_size_consistency(&self, rom: &RomImage) -> Check {
        let (original, modified) = (rom.original().len(), rom.working().len());
        if original == modified {
            Check::new(
                "size_consistency",
                CheckStatus::Pass,
                format!("size unchanged ({} bytes)", modified),
            )
        } else {
            Check::new(
                "size_consistency",
                CheckStatus::Fail,
                format!("size changed from {} to {} bytes", original, modified),
            )
        }
    }

    fn check_pointer_consistency(
        &self,
        data: &[u8],
        records: &[TextRecord],
        reinjection: &ReinjectionReport,
    ) -> Check {
        let mut checked = 0;
        let mut mismatched = Vec::new();

        for record in records {
            let expected = reinjection.final_start(record);
            for reference in &record.pointer_refs {
                checked += 1;
                let actual = self
                    .config
                    .pointer_table(reference.location)
                    .and_then(|table| {
                        let raw = table.format.read(data, reference.pointer_address)?;
                        Some(raw as i64 + table.effective_base())
                    });
                if actual != Some(expected as i64) {
                    mismatched.push(format!(
                        "{} entry {} (0x{:X})",
                        record.id, reference.entry_index, reference.pointer_address
                    ));
                }
            }
        }

        if checked == 0 {
            Check::new("pointer_consistency", CheckStatus::Skipped, "no pointers")
        } else if mismatched.is_empty() {
            Check::new(
                "pointer_consistency",
                CheckStatus::Pass,
                format!("{} pointers resolve to their records", checked),
            )
        } else {
            Check::new(
                "pointer_consistency",
                CheckStatus::Fail,
                format!("{} stale pointers: {}", mismatched.len(), mismatched.join(", ")),
            )
        }
    }

    fn check_protected_regions(&self, rom: &RomImage) -> Check {
        let regions = &self.config.protected;
        if regions.is_empty() {
            return Check::new("protected_regions", CheckStatus::Skipped, "none configured");
        }
        let touched: Vec<String> = regions
            .iter()
            .filter_map(|region| {
                let range = region.range.clamp_to(rom.len())?;
                let original = &rom.original()[range.start..range.end];
                let modified = &rom.working()[range.start..range.end];
                (original != modified).then(|| region.label())
            })
            .collect();

        if touched.is_empty() {
            Check::new(
                "protected_regions",
                CheckStatus::Pass,
                format!("{} regions unchanged", regions.len()),
            )
        } else {
            Check::new(
                "protected_regions",
                CheckStatus::Fail,
                format!("modified: {}", touched.join(", ")),
            )
        }
    }

    fn update_checksum(&self, rom: &mut RomImage) -> Check {
        let Some(field) = &self.rules().checksum else {
            return Check::new("checksum_update", CheckStatus::Skipped, "no checksum configured");
        };
        match field.update(rom.working_mut()) {
            Ok((old, new)) if old == new => Check::new(
                "checksum_update",
                CheckStatus::Pass,
                format!("{} checksum unchanged ({:#X})", field.algorithm, new),
            ),
            Ok((old, new)) => Check::new(
                "checksum_update",
                CheckStatus::Pass,
                format!("{} checksum updated {:#X} -> {:#X}", field.algorithm, old, new),
            ),
            Err(e) => Check::new("checksum_update", CheckStatus::Fail, e.to_string()),
        }
    }
}

/// Control codes (terminators aside) must survive translation.
fn check_control_codes(config: &EngineConfig, records: &[TextRecord]) -> Check {
    let table = &config.table;
    let count = |tokens: &[crate::table::Token]| {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for key in tokens
            .iter()
            .filter(|t| !table.is_terminator(t))
            .filter_map(|t| t.control_key())
        {
            *counts.entry(key).or_default() += 1;
        }
        counts
    };

    let changed: Vec<&str> = records
        .iter()
        .filter(|r| r.is_translated())
        .filter(|r| count(&r.tokens) != count(&r.translation))
        .map(|r| r.id.as_str())
        .collect();

    if changed.is_empty() {
        Check::new("control_codes", CheckStatus::Pass, "control codes preserved")
    } else {
        Check::new(
            "control_codes",
            CheckStatus::Warn,
            format!("control codes differ in {}", changed.join(", ")),
        )
    }
}

fn check_untranslated(records: &[TextRecord]) -> Check {
    let untranslated = records.iter().filter(|r| !r.is_translated()).count();
    if untranslated == 0 {
        Check::new(
            "untranslated",
            CheckStatus::Pass,
            format!("all {} strings translated", records.len()),
        )
    } else {
        Check::new(
            "untranslated",
            CheckStatus::Warn,
            format!("{} of {} strings untranslated", untranslated, records.len()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;
    use crate::location::{PointerFormat, PointerTable};
    use crate::reinject::Reinjector;
    use crate::rom::ByteRange;
    use crate::table::EncodingTable;

    const TABLE: &str = "41=A\n42=B\n43=C\n48=H\n49=I\nFE=<NEWLINE>\nFF=<END>\n";

    fn nes_image() -> Vec<u8> {
        let mut data = vec![0u8; 0x80];
        data[0..4].copy_from_slice(b"NES\x1A");
        data[0x10..0x14].copy_from_slice(&[0x20, 0x80, 0x28, 0x80]);
        data[0x20..0x24].copy_from_slice(&[0x48, 0xFE, 0x49, 0xFF]);
        data[0x28..0x2B].copy_from_slice(&[0x41, 0x42, 0xFF]);
        data
    }

    fn config() -> EngineConfig {
        let validation = ValidationConfig {
            expected_size: Some(0x80),
            expected_crc32: Some(0),
            header: Some(Signature::new(0, "4E 45 53 1A").unwrap()),
            known_patterns: vec![Signature::new(0x10, "20 80 ?? 80").unwrap()],
            checksum: Some(ChecksumField {
                algorithm: ChecksumAlgorithm::Sum8,
                address: 0x7F,
                endianness: crate::location::Endianness::Little,
                covered: ByteRange::new(0x10, 0x7F),
            }),
        };
        EngineConfig::builder(EncodingTable::parse(TABLE).unwrap())
            .location(
                PointerTable::new(0x10, 2, PointerFormat::LITTLE_ENDIAN_16)
                    .with_base_offset(-0x8000),
            )
            .free_range(ByteRange::new(0x40, 0x70))
            .protect(ByteRange::new(0, 0x10), "header")
            .validation(validation)
            .build()
    }

    #[test]
    fn test_preflight() {
        let config = config();
        let report = Validator::new(&config).preflight(&nes_image());
        assert_eq!(report.get("file_size").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.get("crc32").unwrap().status, CheckStatus::Warn);
        assert_eq!(report.get("header").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.get("known_patterns").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.get("checksum").unwrap().status, CheckStatus::Warn);
        assert!(!report.is_blocking());
    }

    #[test]
    fn test_preflight_wrong_header_blocks() {
        let config = config();
        let mut data = nes_image();
        data[3] = 0;
        let report = Validator::new(&config).preflight(&data);
        let header = report.get("header").unwrap();
        assert_eq!(header.status, CheckStatus::Fail);
        assert!(header.message.contains("4E 45 53 00"));
        assert!(report.is_blocking());
    }

    #[test]
    fn test_postflight_after_relocation() {
        let config = config();
        let mut rom = RomImage::new(nes_image());
        let mut records = Extractor::new(&config.table)
            .extract(rom.working(), &config.locations)
            .unwrap()
            .records;
        records[0].set_translation_text(&config.table, "HIHI");
        records[1].set_translation_text(&config.table, "CAB");

        let reinjection = Reinjector::new(&config).run(&mut rom, &records).unwrap();
        let report = Validator::new(&config).postflight(&mut rom, &records, &reinjection);

        assert_eq!(report.get("size_consistency").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.get("pointer_consistency").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.get("protected_regions").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.get("checksum_update").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.get("control_codes").unwrap().status, CheckStatus::Warn);
        assert_eq!(report.get("untranslated").unwrap().status, CheckStatus::Pass);
        assert!(!report.is_blocking());

        let field = config.validation.checksum.unwrap();
        let data = rom.working();
        assert_eq!(field.read(data).unwrap(), field.compute(data).unwrap());
    }

    #[test]
    fn test_postflight_detects_stale_pointer_and_protected_write() {
        let config = config();
        let mut rom = RomImage::new(nes_image());
        let records = Extractor::new(&config.table)
            .extract(rom.working(), &config.locations)
            .unwrap()
            .records;
        let reinjection = ReinjectionReport::default();

        rom.write_bytes(0x10, &[0x00, 0x80]).unwrap();
        rom.write_bytes(0x04, &[0x01]).unwrap();
        let report = Validator::new(&config).postflight(&mut rom, &records, &reinjection);

        assert_eq!(report.get("pointer_consistency").unwrap().status, CheckStatus::Fail);
        assert_eq!(report.get("protected_regions").unwrap().status, CheckStatus::Fail);
        assert_eq!(report.get("untranslated").unwrap().status, CheckStatus::Warn);
        assert!(report.is_blocking());
    }

    #[test]
    fn test_render_summary() {
        let mut report = ValidationReport::default();
        report.push(Check::new("file_size", CheckStatus::Pass, "ok"));
        report.push(Check::new("crc32", CheckStatus::Warn, "mismatch"));
        report.push(Check::new("header", CheckStatus::Skipped, "none"));
        let rendered = report.render();
        assert!(rendered.contains("✓ PASS"));
        assert!(rendered.contains("⚠ WARN"));
        assert!(rendered.ends_with("Passed: 1/2 (1 warnings, 0 failures)"));
    }
}
