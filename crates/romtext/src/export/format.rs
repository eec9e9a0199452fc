//! ExportFormat trait definition

use crate::error::Result;

use super::{Export, ExportRow, Translation};

/// Common interface for record export formats (TSV, JSON).
pub trait ExportFormat {
    /// Lines written before the first row, if the format has any.
    fn header(&self, export: &Export) -> Option<String>;

    fn format_row(&self, row: &ExportRow) -> String;

    /// Read back `id` + translated text from a document this format wrote.
    fn parse(&self, source: &str) -> Result<Vec<Translation>>;

    fn format_rows(&self, export: &Export) -> String {
        let mut output = String::new();
        if let Some(header) = self.header(export) {
            output.push_str(&header);
            output.push('\n');
        }
        for row in &export.rows {
            output.push_str(&self.format_row(row));
            output.push('\n');
        }
        output
    }
}
