//! Record export for editing, and import of the edited translations.
//!
//! Both formats carry one row per record: id, address, length, pointer
//! addresses, original text, translated text, status and confidence. Import
//! reads back the id and translated text.

mod format;
mod json;
mod tsv;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::extract::TextRecord;
use crate::table::EncodingTable;

pub use format::ExportFormat;
pub use json::JsonExporter;
pub use tsv::TsvExporter;

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
pub enum TranslationStatus {
    #[default]
    Pending,
    Translated,
    Reviewed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub id: String,
    pub address: usize,
    pub length: usize,
    pub pointers: Vec<usize>,
    pub original: String,
    pub translated: String,
    pub status: TranslationStatus,
    pub confidence: Option<f32>,
}

impl From<&TextRecord> for ExportRow {
    fn from(record: &TextRecord) -> Self {
        Self {
            id: record.id.clone(),
            address: record.start(),
            length: record.original_len(),
            pointers: record.pointer_refs.iter().map(|r| r.pointer_address).collect(),
            original: record.original_text(),
            translated: record.translated_text(),
            status: if record.is_translated() {
                TranslationStatus::Translated
            } else {
                TranslationStatus::Pending
            },
            confidence: None,
        }
    }
}

/// Rows plus document metadata.
#[derive(Debug, Clone)]
pub struct Export {
    pub game: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ExportRow>,
}

impl Export {
    pub fn new<S: Into<String>>(game: S, records: &[TextRecord]) -> Self {
        Self {
            game: game.into(),
            generated_at: Utc::now(),
            rows: records.iter().map(ExportRow::from).collect(),
        }
    }
}

/// One edited row read back from an export document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub id: String,
    pub text: String,
    pub status: TranslationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExportKind {
    Tsv,
    Json,
}

impl ExportKind {
    /// Pick the format from a file extension; TSV unless it ends in `.json`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportKind::Json,
            _ => ExportKind::Tsv,
        }
    }

    pub fn exporter(&self) -> Box<dyn ExportFormat> {
        match self {
            ExportKind::Tsv => Box::new(TsvExporter),
            ExportKind::Json => Box::new(JsonExporter),
        }
    }
}

pub fn write_export<P: AsRef<Path>>(path: P, export: &Export) -> Result<()> {
    let path = path.as_ref();
    let kind = ExportKind::from_path(path);
    fs::write(path, kind.exporter().format_rows(export))?;
    info!("Exported {} records to {} ({})", export.rows.len(), path.display(), kind);
    Ok(())
}

pub fn read_translations<P: AsRef<Path>>(path: P) -> Result<Vec<Translation>> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)?;
    ExportKind::from_path(path).exporter().parse(&source)
}

/// Store each translation on the record with the same id.
///
/// Empty text and `skipped` rows leave the record untranslated. An id with
/// no matching record is an import error. Returns the number applied.
pub fn apply_translations(
    records: &mut [TextRecord],
    table: &EncodingTable,
    translations: &[Translation],
) -> Result<usize> {
    let mut applied = 0;
    for translation in translations {
        let record = records
            .iter_mut()
            .find(|r| r.id == translation.id)
            .ok_or_else(|| Error::Import(format!("unknown record id '{}'", translation.id)))?;

        if translation.text.is_empty() || translation.status == TranslationStatus::Skipped {
            record.set_translation(Vec::new());
            continue;
        }
        record.set_translation_text(table, &translation.text);
        let unknown = record.translation.iter().filter(|t| t.is_unknown()).count();
        if unknown > 0 {
            warn!("{}: translation carries {} unknown byte placeholders", record.id, unknown);
        }
        applied += 1;
    }
    info!("Applied {} of {} translations", applied, translations.len());
    Ok(applied)
}
