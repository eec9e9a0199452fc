//! Decode command implementation.
//!
//! Prints a hexdump of the range followed by each decoded token.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use romtext::{DecodeView, EncodingTable, RomImage, hexdump};

use super::hex_utils::{format_hex_address, parse_hex_address};

/// Run the decode command
pub fn run(table_path: &Path, rom_path: &Path, address: &str, length: usize) -> Result<()> {
    let table = EncodingTable::load(table_path)
        .with_context(|| format!("Failed to load table {}", table_path.display()))?;
    let rom = RomImage::load(rom_path)
        .with_context(|| format!("Failed to read ROM {}", rom_path.display()))?;
    let address = parse_hex_address(address)?;

    let view = DecodeView::new(&table, rom.original(), address, length);
    println!(
        "Decode at {} ({} bytes):",
        format_hex_address(view.address),
        view.bytes.len()
    );
    println!();
    for line in hexdump(&view.bytes, view.address) {
        println!("{}", line);
    }
    println!();

    for decoded in &view.tokens {
        let hex: Vec<String> = decoded.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        let token = decoded.token.to_string();
        let token = if decoded.token.is_unknown() {
            token.red().to_string()
        } else if decoded.token.is_control() {
            token.cyan().to_string()
        } else {
            token
        };
        println!("{}  {:<12} {}", format_hex_address(decoded.offset), hex.join(" "), token);
    }
    println!();
    println!("Text: {}", view.text());
    Ok(())
}
