//! Search command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use romtext::{EncodingTable, RomImage, find_text};

use super::hex_utils::format_hex_address;

/// Run the search command
pub fn run(table_path: &Path, rom_path: &Path, text: &str, limit: usize) -> Result<()> {
    let table = EncodingTable::load(table_path)
        .with_context(|| format!("Failed to load table {}", table_path.display()))?;
    let rom = RomImage::load(rom_path)
        .with_context(|| format!("Failed to read ROM {}", rom_path.display()))?;

    let encoded = table.encode_text(text)?;
    let hex: Vec<String> = encoded.iter().map(|b| format!("{:02X}", b)).collect();
    println!("Searching for {:?} ({})", text, hex.join(" "));

    let matches = find_text(&table, rom.original(), text)?;
    for m in matches.iter().take(limit) {
        println!("  {}", format_hex_address(m.offset));
    }
    if matches.len() > limit {
        println!("  ... and {} more", matches.len() - limit);
    }
    println!("Found {} matches", matches.len());
    Ok(())
}
