//! JSON export format implementation

use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};

use super::format::ExportFormat;
use super::{Export, ExportRow, Translation, TranslationStatus};

/// JSON exporter (one object per line, NDJSON format). The first line
/// carries the export metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

#[derive(Debug, Deserialize)]
struct JsonRow {
    id: Option<String>,
    #[serde(default)]
    translated: String,
    #[serde(default)]
    status: TranslationStatus,
}

impl ExportFormat for JsonExporter {
    fn header(&self, export: &Export) -> Option<String> {
        Some(
            json!({
                "game": export.game,
                "generated_at": export.generated_at.to_rfc3339(),
                "records": export.rows.len(),
            })
            .to_string(),
        )
    }

    fn format_row(&self, row: &ExportRow) -> String {
        // ExportRow only holds strings and integers
        serde_json::to_string(row).unwrap_or_default()
    }

    fn parse(&self, source: &str) -> Result<Vec<Translation>> {
        let mut translations = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: JsonRow = serde_json::from_str(line)
                .map_err(|e| Error::Import(format!("line {}: {}", index + 1, e)))?;
            // Metadata line has no id
            let Some(id) = row.id else { continue };
            translations.push(Translation {
                id,
                text: row.translated,
                status: row.status,
            });
        }
        Ok(translations)
    }
}
