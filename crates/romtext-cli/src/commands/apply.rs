//! Apply command implementation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use romtext::{IpsPatch, crc32};

/// Run the apply command
pub fn run(rom: &Path, patch: &Path, output: &Path) -> Result<()> {
    let mut data = fs::read(rom).with_context(|| format!("Failed to read {}", rom.display()))?;
    let bytes = fs::read(patch).with_context(|| format!("Failed to read {}", patch.display()))?;
    let patch = IpsPatch::parse(&bytes)?;

    let before = data.len();
    patch.apply(&mut data);
    if data.len() != before {
        eprintln!("Warning: image grew from {} to {} bytes", before, data.len());
    }

    fs::write(output, &data)?;
    println!(
        "Applied {} records; wrote {} (CRC32 {:08X})",
        patch.records().len(),
        output.display(),
        crc32(&data)
    );
    Ok(())
}
