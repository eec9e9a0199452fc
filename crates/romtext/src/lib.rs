//! # romtext
//!
//! Text extraction and reinjection for fixed-size ROM images.
//!
//! This crate provides:
//! - Encoding tables mapping byte sequences to text and control tokens
//! - Text location by fixed address or pointer table
//! - Extraction into editable records and TSV/JSON export
//! - Reinjection with in-place fitting, relocation and pointer rewriting
//! - IPS patch generation and application
//! - Pre- and post-flight integrity validation
//! - Heuristic detection of text in unmapped images
//!
//! ## Feature Flags
//!
//! - `debug-tools`: Enables hexdump, decode and search helpers for
//!   inspecting images. Intended for CLI tools and development.

pub mod config;
#[cfg(feature = "debug-tools")]
pub mod debug;
pub mod detect;
pub mod engine;
pub mod error;
pub mod export;
pub mod extract;
pub mod location;
pub mod patch;
pub mod prelude;
pub mod reinject;
pub mod rom;
pub mod space;
pub mod table;
pub mod validate;

pub use config::{EngineConfig, EngineConfigBuilder, ProjectConfig, ProtectedRegion};
pub use detect::{DetectionSummary, ScanMethod, TextCandidate, TextDetector};
pub use engine::{RunReport, run};
pub use error::{Error, Result};
pub use export::{
    Export, ExportFormat, ExportKind, ExportRow, JsonExporter, Translation, TranslationStatus,
    TsvExporter, apply_translations, read_translations, write_export,
};
pub use extract::{Diagnostic, Extraction, ExtractionStats, Extractor, PointerRef, TextRecord};
pub use location::{
    BankWindow, Endianness, FixedLocation, PointerFormat, PointerTable, TextLocation,
};
pub use patch::{IpsPatch, IpsRecord, PatchEntry, apply_ips, create_ips, diff};
pub use reinject::{FailurePolicy, Outcome, RecordOutcome, ReinjectionReport, Reinjector};
pub use rom::{ByteRange, RomImage, crc32};
pub use space::{FreeSpaceMap, PaddingScan, scan_padding};
pub use table::{EncodingTable, TablePreset, TableStats, Token, Wildcard, preset_source};
pub use validate::{
    CheckStatus, ChecksumAlgorithm, ChecksumField, Signature, ValidationConfig, ValidationReport,
    Validator,
};

// Debug utilities (requires debug-tools feature)
#[cfg(feature = "debug-tools")]
pub use debug::{DecodeView, DecodedToken, TextMatch, find_bytes, find_text, hexdump};
