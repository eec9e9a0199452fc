//! Extract command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use romtext::{EngineConfig, Export, RomImage, engine, write_export};

use super::hex_utils::format_hex_address;

/// Run the extract command
pub fn run(config_path: &Path, rom_path: &Path, output: &Path) -> Result<()> {
    let config = EngineConfig::load(config_path)
        .with_context(|| format!("Failed to load project {}", config_path.display()))?;
    let rom = RomImage::load(rom_path)
        .with_context(|| format!("Failed to read ROM {}", rom_path.display()))?;

    let extraction = engine::extract(&config, &rom)?;
    let stats = extraction.stats();

    eprintln!("Game: {}", config.game_name);
    eprintln!(
        "Extracted {} records ({} characters, {} control codes, {} aliases)",
        stats.records, stats.characters, stats.control_codes, stats.aliases
    );
    if stats.unknown_bytes > 0 || stats.unterminated > 0 || stats.skipped_pointers > 0 {
        eprintln!(
            "Diagnostics: {} unknown bytes, {} unterminated, {} skipped pointers",
            stats.unknown_bytes, stats.unterminated, stats.skipped_pointers
        );
    }
    for diagnostic in &extraction.diagnostics {
        eprintln!("  {}", diagnostic);
    }
    for record in extraction.records.iter().take(5) {
        eprintln!(
            "  {} @ {}: {}",
            record.id,
            format_hex_address(record.start()),
            record.original_text()
        );
    }

    write_export(output, &Export::new(&config.game_name, &extraction.records))?;
    eprintln!("Exported to: {}", output.display());
    Ok(())
}
