//! TSV export format implementation

use crate::error::{Error, Result};

use super::format::ExportFormat;
use super::{Export, ExportRow, Translation, TranslationStatus};

const COLUMNS: [&str; 8] = [
    "id",
    "address",
    "length",
    "pointers",
    "original",
    "translated",
    "status",
    "confidence",
];

/// Tab-separated exporter. Lines starting with `#` are comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvExporter;

impl ExportFormat for TsvExporter {
    fn header(&self, export: &Export) -> Option<String> {
        Some(format!(
            "# {} exported {}\n{}",
            export.game,
            export.generated_at.to_rfc3339(),
            COLUMNS.join("\t")
        ))
    }

    fn format_row(&self, row: &ExportRow) -> String {
        let pointers: Vec<String> = row.pointers.iter().map(|p| format!("0x{:06X}", p)).collect();
        [
            escape(&row.id),
            format!("0x{:06X}", row.address),
            row.length.to_string(),
            pointers.join(","),
            escape(&row.original),
            escape(&row.translated),
            row.status.to_string(),
            row.confidence.map(|c| format!("{:.2}", c)).unwrap_or_default(),
        ]
        .join("\t")
    }

    fn parse(&self, source: &str) -> Result<Vec<Translation>> {
        let mut lines = source
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.starts_with('#') && !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| Error::Import("TSV document has no header row".to_string()))?;
        let header: Vec<&str> = header.split('\t').collect();
        let column = |name: &str| {
            header
                .iter()
                .position(|c| c.trim() == name)
                .ok_or_else(|| Error::Import(format!("TSV header has no '{}' column", name)))
        };
        let id_col = column("id")?;
        let text_col = column("translated")?;
        let status_col = column("status").ok();

        let mut translations = Vec::new();
        for (index, line) in lines {
            let fields: Vec<&str> = line.split('\t').collect();
            let id = fields.get(id_col).ok_or_else(|| {
                Error::Import(format!("line {}: missing id column", index + 1))
            })?;
            let text = fields.get(text_col).copied().unwrap_or_default();
            let status = match status_col.and_then(|c| fields.get(c)) {
                Some(s) if !s.is_empty() => s.parse().map_err(|_| {
                    Error::Import(format!("line {}: unknown status '{}'", index + 1, s))
                })?,
                _ => TranslationStatus::default(),
            };
            translations.push(Translation {
                id: unescape(id),
                text: unescape(text),
                status,
            });
        }
        Ok(translations)
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
