//! Diff command implementation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use romtext::{IpsPatch, diff};

use super::hex_utils::format_hex_address;

/// Run the diff command
pub fn run(original: &Path, modified: &Path, output: &Path) -> Result<()> {
    let before = fs::read(original)
        .with_context(|| format!("Failed to read {}", original.display()))?;
    let after = fs::read(modified)
        .with_context(|| format!("Failed to read {}", modified.display()))?;

    let entries = diff(&before, &after)?;
    for entry in &entries {
        println!("{}: {} bytes", format_hex_address(entry.offset), entry.len());
    }

    let patch = IpsPatch::from_entries(&entries, &after)?;
    fs::write(output, patch.to_bytes())?;
    println!(
        "{} entries, {} IPS records written to {}",
        entries.len(),
        patch.records().len(),
        output.display()
    );
    Ok(())
}
