//! Detect command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use romtext::{EncodingTable, RomImage, TextDetector};

use super::hex_utils::format_hex_address;

/// Run the detect command
pub fn run(
    table_path: &Path,
    rom_path: &Path,
    limit: usize,
    threshold: f64,
    json: bool,
) -> Result<()> {
    let table = EncodingTable::load(table_path)
        .with_context(|| format!("Failed to load table {}", table_path.display()))?;
    let rom = RomImage::load(rom_path)
        .with_context(|| format!("Failed to read ROM {}", rom_path.display()))?;

    let summary = TextDetector::new(&table)
        .with_threshold(threshold)
        .analyze(rom.original(), limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("=== Text detection: {} ===", rom_path.display());
    for candidate in &summary.candidates {
        let confidence = format!("{:>4.0}%", candidate.confidence * 100.0);
        let confidence = if candidate.confidence > 0.8 {
            confidence.green().to_string()
        } else {
            confidence.yellow().to_string()
        };
        println!(
            "{} {} {:>4}  {:<10} {:?}",
            confidence,
            format_hex_address(candidate.address),
            candidate.length,
            candidate.method.to_string(),
            candidate.sample
        );
    }
    println!();
    println!(
        "Found {} candidates ({} high, {} medium confidence) in {} bytes",
        summary.candidates_found,
        summary.high_confidence,
        summary.medium_confidence,
        summary.rom_size
    );
    Ok(())
}
