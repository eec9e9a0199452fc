//! Inject command implementation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use romtext::{
    EngineConfig, FailurePolicy, Outcome, RomImage, apply_translations, engine, read_translations,
};

pub struct InjectArgs {
    pub config: PathBuf,
    pub rom: PathBuf,
    pub translations: PathBuf,
    pub patch: PathBuf,
    pub output_rom: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub policy: Option<FailurePolicy>,
}

/// Run the inject command
pub fn run(args: InjectArgs) -> Result<()> {
    let mut config = EngineConfig::load(&args.config)
        .with_context(|| format!("Failed to load project {}", args.config.display()))?;
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    let mut rom = RomImage::load(&args.rom)
        .with_context(|| format!("Failed to read ROM {}", args.rom.display()))?;

    let mut records = engine::extract(&config, &rom)?.records;
    let translations = read_translations(&args.translations)
        .with_context(|| format!("Failed to read {}", args.translations.display()))?;
    let applied = apply_translations(&mut records, &config.table, &translations)?;
    eprintln!("Loaded {} translations ({} records)", applied, records.len());

    let report = engine::run(&config, &mut rom, &records);

    if let Some(reinjection) = &report.reinjection {
        for outcome in &reinjection.outcomes {
            match &outcome.outcome {
                Outcome::Unchanged => {}
                Outcome::InPlace { range } => {
                    println!("{} {} in place at {}", "✓".green(), outcome.id, range)
                }
                Outcome::Relocated { from, to } => println!(
                    "{} {} relocated {} -> {}",
                    "↪".cyan(),
                    outcome.id,
                    from,
                    to
                ),
                Outcome::Failed { error } => {
                    println!("{} {} {}", "✗".red(), outcome.id, error.red())
                }
            }
        }
        println!();
    }
    println!("{}", report.render());

    if let Some(path) = &args.report {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        eprintln!("Report written to: {}", path.display());
    }

    let Some(patch) = &report.patch else {
        bail!(
            "No patch emitted: {}",
            report.error.as_deref().unwrap_or("validation failed")
        );
    };
    fs::write(&args.patch, patch)?;
    println!("{} Patch written to {}", "✓".green(), args.patch.display());

    if let Some(path) = &args.output_rom {
        rom.save_working(path)?;
        println!("{} Patched ROM written to {}", "✓".green(), path.display());
    }
    Ok(())
}
