//! Project configuration.
//!
//! A project is described by a TOML document ([`ProjectConfig`]) which is
//! turned into an immutable [`EngineConfig`] before any engine call.
//!
//! ```toml
//! [game]
//! name = "Example Quest"
//! crc32 = "0x1A2B3C4D"
//!
//! [text_detection]
//! method = "pointer_table"
//! encoding_table = "tables/example.tbl"
//!
//! [text_detection.pointer_table]
//! address = "0x8000"
//! count = 64
//! format = "little_endian_16bit"
//! base_offset = "-0x7FF0"
//!
//! [[protected]]
//! start = "0x0000"
//! end = "0x0010"
//! name = "iNES header"
//! ```

pub mod address;
mod engine;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::{Error, Result};
use crate::location::{
    BankWindow, DEFAULT_POINTER_MAX_LENGTH, Endianness, FixedLocation, PointerFormat,
    PointerTable, TextLocation,
};
use crate::reinject::FailurePolicy;
use crate::rom::ByteRange;
use crate::space::PaddingScan;
use crate::validate::{ChecksumAlgorithm, ChecksumField, Signature, ValidationConfig};

pub use engine::{EngineConfig, EngineConfigBuilder, ProtectedRegion};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DetectionMethod {
    #[default]
    FixedLocations,
    PointerTable,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "address::optional_u32")]
    pub crc32: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StringSection {
    #[serde(deserialize_with = "address::unsigned")]
    pub address: usize,
    #[serde(deserialize_with = "address::unsigned")]
    pub max_length: usize,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BankSection {
    #[serde(deserialize_with = "address::unsigned")]
    pub size: usize,
    pub index: usize,
    #[serde(default, deserialize_with = "address::unsigned")]
    pub header: usize,
    #[serde(deserialize_with = "address::unsigned")]
    pub cpu_base: usize,
}

fn default_pointer_max_length() -> usize {
    DEFAULT_POINTER_MAX_LENGTH
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointerTableSection {
    #[serde(deserialize_with = "address::unsigned")]
    pub address: usize,
    pub count: usize,
    #[serde(default)]
    pub format: PointerFormat,
    #[serde(default, deserialize_with = "address::signed")]
    pub base_offset: i64,
    #[serde(
        default = "default_pointer_max_length",
        deserialize_with = "address::unsigned"
    )]
    pub max_length: usize,
    #[serde(default)]
    pub bank: Option<BankSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDetectionSection {
    #[serde(default)]
    pub method: DetectionMethod,
    pub encoding_table: PathBuf,
    /// Control tokens that end a string; the table's defaults when empty.
    #[serde(default)]
    pub terminators: Vec<String>,
    #[serde(default)]
    pub strings: Vec<StringSection>,
    #[serde(default)]
    pub pointer_table: Option<PointerTableSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RangeSection {
    #[serde(deserialize_with = "address::unsigned")]
    pub start: usize,
    #[serde(deserialize_with = "address::unsigned")]
    pub end: usize,
    #[serde(default)]
    pub name: String,
}

impl RangeSection {
    fn to_range(&self) -> Result<ByteRange> {
        ByteRange::try_new(self.start, self.end)
    }
}

fn default_pad_byte() -> u8 {
    0xFF
}

fn default_min_run() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaddingSection {
    #[serde(default = "default_pad_byte", deserialize_with = "address::byte")]
    pub byte: u8,
    #[serde(default = "default_min_run")]
    pub min_run: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FreeSpaceSection {
    #[serde(default)]
    pub ranges: Vec<RangeSection>,
    #[serde(default)]
    pub text_region: Option<RangeSection>,
    #[serde(default)]
    pub scan_padding: Option<PaddingSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternSection {
    #[serde(default, deserialize_with = "address::unsigned")]
    pub offset: usize,
    pub bytes: String,
    #[serde(default)]
    pub description: String,
}

impl PatternSection {
    fn to_signature(&self) -> Result<Signature> {
        Ok(Signature::new(self.offset, &self.bytes)?.with_description(self.description.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChecksumSection {
    pub algorithm: ChecksumAlgorithm,
    #[serde(deserialize_with = "address::unsigned")]
    pub address: usize,
    #[serde(default)]
    pub endianness: Endianness,
    #[serde(deserialize_with = "address::unsigned")]
    pub start: usize,
    #[serde(deserialize_with = "address::unsigned")]
    pub end: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationSection {
    #[serde(default, deserialize_with = "address::optional_unsigned")]
    pub expected_size: Option<usize>,
    #[serde(default)]
    pub header: Option<PatternSection>,
    #[serde(default)]
    pub known_patterns: Vec<PatternSection>,
    #[serde(default)]
    pub checksum: Option<ChecksumSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReinjectionSection {
    #[serde(default)]
    pub policy: FailurePolicy,
    #[serde(default = "default_pad_byte", deserialize_with = "address::byte")]
    pub pad_byte: u8,
}

impl Default for ReinjectionSection {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::default(),
            pad_byte: default_pad_byte(),
        }
    }
}

/// The project document as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub game: GameSection,
    pub text_detection: TextDetectionSection,
    #[serde(default)]
    pub free_space: FreeSpaceSection,
    #[serde(default)]
    pub validation: ValidationSection,
    #[serde(default)]
    pub protected: Vec<RangeSection>,
    #[serde(default)]
    pub reinjection: ReinjectionSection,
}

impl ProjectConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = content.parse()?;
        debug!(
            "Loaded project config {} (game: {})",
            path.as_ref().display(),
            config.game.name
        );
        Ok(config)
    }

    /// Text locations for the configured detection method.
    pub fn locations(&self) -> Result<Vec<TextLocation>> {
        let detection = &self.text_detection;
        match detection.method {
            DetectionMethod::FixedLocations => {
                if detection.strings.is_empty() {
                    return Err(Error::Config(
                        "fixed_locations requires at least one [[text_detection.strings]] entry"
                            .to_string(),
                    ));
                }
                Ok(detection
                    .strings
                    .iter()
                    .map(|s| {
                        TextLocation::Fixed(FixedLocation {
                            address: s.address,
                            max_length: s.max_length,
                            description: s.description.clone(),
                        })
                    })
                    .collect())
            }
            DetectionMethod::PointerTable => {
                let section = detection.pointer_table.as_ref().ok_or_else(|| {
                    Error::Config(
                        "pointer_table requires a [text_detection.pointer_table] section"
                            .to_string(),
                    )
                })?;
                let mut table = PointerTable::new(section.address, section.count, section.format)
                    .with_base_offset(section.base_offset)
                    .with_max_length(section.max_length);
                table.table_range()?;
                if let Some(bank) = &section.bank {
                    if bank.size == 0 {
                        return Err(Error::Config("bank size must not be zero".to_string()));
                    }
                    let window = BankWindow {
                        size: bank.size,
                        index: bank.index,
                        header: bank.header,
                        cpu_base: bank.cpu_base,
                    };
                    if window.checked_range().is_none() {
                        return Err(Error::Config(format!(
                            "bank {} of size 0x{:X} lies beyond the address space",
                            bank.index, bank.size
                        )));
                    }
                    table = table.with_bank(window);
                }
                Ok(vec![TextLocation::PointerTable(table)])
            }
        }
    }

    pub fn validation_config(&self) -> Result<ValidationConfig> {
        let section = &self.validation;
        let checksum = section
            .checksum
            .as_ref()
            .map(|c| -> Result<ChecksumField> {
                Ok(ChecksumField {
                    algorithm: c.algorithm,
                    address: c.address,
                    endianness: c.endianness,
                    covered: RangeSection {
                        start: c.start,
                        end: c.end,
                        name: String::new(),
                    }
                    .to_range()?,
                })
            })
            .transpose()?;

        Ok(ValidationConfig {
            expected_size: section.expected_size,
            expected_crc32: self.game.crc32,
            header: section
                .header
                .as_ref()
                .map(PatternSection::to_signature)
                .transpose()?,
            known_patterns: section
                .known_patterns
                .iter()
                .map(PatternSection::to_signature)
                .collect::<Result<_>>()?,
            checksum,
        })
    }

    pub fn free_ranges(&self) -> Result<Vec<ByteRange>> {
        self.free_space
            .ranges
            .iter()
            .map(RangeSection::to_range)
            .collect()
    }

    pub fn text_region(&self) -> Result<Option<ByteRange>> {
        self.free_space
            .text_region
            .as_ref()
            .map(RangeSection::to_range)
            .transpose()
    }

    pub fn padding_scan(&self) -> Option<PaddingScan> {
        self.free_space.scan_padding.as_ref().map(|p| PaddingScan {
            byte: p.byte,
            min_run: p.min_run,
        })
    }

    pub fn protected_regions(&self) -> Result<Vec<ProtectedRegion>> {
        self.protected
            .iter()
            .map(|p| {
                Ok(ProtectedRegion {
                    range: p.to_range()?,
                    name: p.name.clone(),
                })
            })
            .collect()
    }
}

impl FromStr for ProjectConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINTER_PROJECT: &str = r#"
[game]
name = "Example Quest"
region = "JP"
crc32 = "0xCBF43926"

[text_detection]
method = "pointer_table"
encoding_table = "example.tbl"
terminators = ["<END>"]

[text_detection.pointer_table]
address = "0x0010"
count = 4
format = "big_endian_16bit"
base_offset = "-0x7FF0"
max_length = 32

[free_space]
ranges = [{ start = "0x0200", end = "0x0280" }]
text_region = { start = "0x0100", end = "0x0300" }
scan_padding = { byte = "0xFF", min_run = 8 }

[validation]
expected_size = 1024
header = { offset = 0, bytes = "4E 45 53 1A" }
known_patterns = [{ offset = "0x20", bytes = "A9 ?? 8D", description = "loader" }]
checksum = { algorithm = "sum16", address = "0x3FE", endianness = "big_endian", start = 0, end = "0x400" }

[[protected]]
start = 0
end = "0x10"
name = "header"

[reinjection]
policy = "abort_all"
pad_byte = 0
"#;

    #[test]
    fn test_parse_pointer_project() {
        let config: ProjectConfig = POINTER_PROJECT.parse().unwrap();
        assert_eq!(config.game.crc32, Some(0xCBF4_3926));
        assert_eq!(config.text_detection.method, DetectionMethod::PointerTable);

        let locations = config.locations().unwrap();
        let table = locations[0].as_pointer_table().unwrap();
        assert_eq!(table.table_address, 0x10);
        assert_eq!(table.entry_count, 4);
        assert_eq!(table.format, PointerFormat::BIG_ENDIAN_16);
        assert_eq!(table.base_offset, -0x7FF0);
        assert_eq!(table.max_length, 32);

        assert_eq!(config.free_ranges().unwrap(), vec![ByteRange::new(0x200, 0x280)]);
        assert_eq!(
            config.text_region().unwrap(),
            Some(ByteRange::new(0x100, 0x300))
        );
        assert_eq!(config.padding_scan().unwrap().min_run, 8);
        assert_eq!(config.reinjection.policy, FailurePolicy::AbortAll);
        assert_eq!(config.reinjection.pad_byte, 0);

        let protected = config.protected_regions().unwrap();
        assert_eq!(protected[0].name, "header");
    }

    #[test]
    fn test_validation_section() {
        let config: ProjectConfig = POINTER_PROJECT.parse().unwrap();
        let validation = config.validation_config().unwrap();
        assert_eq!(validation.expected_size, Some(1024));
        assert_eq!(validation.expected_crc32, Some(0xCBF4_3926));
        assert!(validation.header.unwrap().matches(b"NES\x1A"));
        assert_eq!(validation.known_patterns[0].pattern[1], None);
        let checksum = validation.checksum.unwrap();
        assert_eq!(checksum.algorithm, ChecksumAlgorithm::Sum16);
        assert_eq!(checksum.covered, ByteRange::new(0, 0x400));
    }

    #[test]
    fn test_fixed_locations_and_defaults() {
        let config: ProjectConfig = r#"
[text_detection]
encoding_table = "t.tbl"

[[text_detection.strings]]
address = "0x100"
max_length = 16
description = "title"

[[text_detection.strings]]
address = 288
max_length = "0x10"
"#
        .parse()
        .unwrap();

        let locations = config.locations().unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(
            locations[0],
            TextLocation::Fixed(FixedLocation {
                address: 0x100,
                max_length: 16,
                description: "title".to_string(),
            })
        );
        assert_eq!(config.reinjection.pad_byte, 0xFF);
        assert_eq!(config.reinjection.policy, FailurePolicy::BestEffort);
    }

    #[test]
    fn test_missing_sections_are_config_errors() {
        let config: ProjectConfig = "[text_detection]\nmethod = \"pointer_table\"\nencoding_table = \"t.tbl\"\n"
            .parse()
            .unwrap();
        assert!(matches!(config.locations(), Err(Error::Config(_))));

        let config: ProjectConfig = "[text_detection]\nencoding_table = \"t.tbl\"\n"
            .parse()
            .unwrap();
        assert!(matches!(config.locations(), Err(Error::Config(_))));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let config: ProjectConfig =
            "[text_detection]\nencoding_table = \"t.tbl\"\n[[protected]]\nstart = 16\nend = 8\n"
                .parse()
                .unwrap();
        assert!(config.protected_regions().is_err());
    }

    #[test]
    fn test_overflowing_table_and_bank_rejected() {
        let config: ProjectConfig = r#"
[text_detection]
method = "pointer_table"
encoding_table = "t.tbl"

[text_detection.pointer_table]
address = "0x10"
count = 9223372036854775807
"#
        .parse()
        .unwrap();
        assert!(matches!(config.locations(), Err(Error::Config(_))));

        let config: ProjectConfig = r#"
[text_detection]
method = "pointer_table"
encoding_table = "t.tbl"

[text_detection.pointer_table]
address = "0x10"
count = 4

[text_detection.pointer_table.bank]
size = "0x4000"
index = 9223372036854775807
cpu_base = "0x8000"
"#
        .parse()
        .unwrap();
        assert!(matches!(config.locations(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(matches!(
            "text_detection = 5".parse::<ProjectConfig>(),
            Err(Error::Toml(_))
        ));
    }
}
