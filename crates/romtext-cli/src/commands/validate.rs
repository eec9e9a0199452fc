//! Validate command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use romtext::{CheckStatus, EngineConfig, RomImage, Validator};

/// Run the validate command
pub fn run(config_path: &Path, rom_path: &Path, json: bool) -> Result<()> {
    let config = EngineConfig::load(config_path)
        .with_context(|| format!("Failed to load project {}", config_path.display()))?;
    let rom = RomImage::load(rom_path)
        .with_context(|| format!("Failed to read ROM {}", rom_path.display()))?;

    let report = Validator::new(&config).preflight(rom.original());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("=== Validation: {} ===", config.game_name);
        for check in &report.checks {
            let status = format!("{} {}", check.status.symbol(), check.status);
            let status = match check.status {
                CheckStatus::Pass => status.green().to_string(),
                CheckStatus::Warn => status.yellow().to_string(),
                CheckStatus::Fail => status.red().to_string(),
                CheckStatus::Skipped => status.dimmed().to_string(),
            };
            println!("{:<8} {:<16} {}", status, check.name, check.message);
        }
        println!();
        println!("{}", report.summary());
    }

    if report.is_blocking() {
        bail!("Validation failed");
    }
    Ok(())
}
