use memchr::memmem;
use serde::Serialize;

use crate::error::Result;
use crate::table::EncodingTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMatch {
    pub offset: usize,
    pub len: usize,
}

/// Every offset where `needle` occurs, overlapping matches included.
pub fn find_bytes(data: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let finder = memmem::Finder::new(needle);
    let mut found = Vec::new();
    let mut start = 0;
    while let Some(pos) = finder.find(&data[start..]) {
        found.push(start + pos);
        start += pos + 1;
    }
    found
}

/// Encode `text` through the table and locate it in the image.
pub fn find_text(table: &EncodingTable, data: &[u8], text: &str) -> Result<Vec<TextMatch>> {
    let needle = table.encode_text(text)?;
    Ok(find_bytes(data, &needle)
        .into_iter()
        .map(|offset| TextMatch {
            offset,
            len: needle.len(),
        })
        .collect())
}
