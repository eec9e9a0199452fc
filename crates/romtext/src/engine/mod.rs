//! End-to-end pipeline: pre-flight, reinjection, post-flight, patch.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::extract::{Extraction, Extractor, TextRecord};
use crate::patch::{IpsPatch, diff};
use crate::reinject::{ReinjectionReport, Reinjector};
use crate::rom::RomImage;
use crate::validate::{ValidationReport, Validator};

/// Extract every configured location from the image's original bytes.
pub fn extract(config: &EngineConfig, rom: &RomImage) -> Result<Extraction> {
    Extractor::new(&config.table).extract(rom.original(), &config.locations)
}

/// Result of one engine run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub preflight: ValidationReport,
    pub reinjection: Option<ReinjectionReport>,
    pub postflight: ValidationReport,
    /// Error that stopped the run before a patch could be built.
    pub error: Option<String>,
    pub patch_entries: usize,
    pub bytes_changed: usize,
    #[serde(skip)]
    pub patch: Option<Vec<u8>>,
}

impl RunReport {
    pub fn patch_emitted(&self) -> bool {
        self.patch.is_some()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Pre-flight:\n{}\n", self.preflight.render());
        if let Some(reinjection) = &self.reinjection {
            let _ = writeln!(
                out,
                "Reinjection: {} written, {} relocated, {} failed{}",
                reinjection.written(),
                reinjection.relocated(),
                reinjection.failed(),
                if reinjection.aborted { " (aborted)" } else { "" }
            );
            for outcome in reinjection.outcomes.iter().filter(|o| o.outcome.is_failed()) {
                let _ = writeln!(out, "  {}: {:?}", outcome.id, outcome.outcome);
            }
            out.push('\n');
        }
        if !self.postflight.checks.is_empty() {
            let _ = writeln!(out, "Post-flight:\n{}\n", self.postflight.render());
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out, "Error: {}", error);
        }
        if self.patch_emitted() {
            let _ = write!(
                out,
                "Patch: {} entries, {} bytes changed",
                self.patch_entries, self.bytes_changed
            );
        } else {
            out.push_str("Patch: not emitted");
        }
        out
    }
}

/// Run the whole pipeline over `rom` with translated `records`.
///
/// A blocking pre-flight check stops before any write. Structural errors
/// during reinjection leave the image rolled back and are reported in
/// `error`. The patch is only built when no post-flight check failed.
pub fn run(config: &EngineConfig, rom: &mut RomImage, records: &[TextRecord]) -> RunReport {
    let validator = Validator::new(config);
    let mut report = RunReport {
        preflight: validator.preflight(rom.original()),
        ..Default::default()
    };
    if report.preflight.is_blocking() {
        warn!("Pre-flight validation failed; nothing written");
        report.error = Some("pre-flight validation failed".to_string());
        return report;
    }

    let reinjection = match Reinjector::new(config).run(rom, records) {
        Ok(reinjection) => reinjection,
        Err(e) => {
            warn!("Reinjection aborted: {}", e);
            report.error = Some(e.to_string());
            return report;
        }
    };
    if reinjection.aborted {
        report.error = Some("a record failed under abort_all; image rolled back".to_string());
        report.reinjection = Some(reinjection);
        return report;
    }

    report.postflight = validator.postflight(rom, records, &reinjection);
    report.reinjection = Some(reinjection);
    if report.postflight.is_blocking() {
        warn!("Post-flight validation failed; patch not emitted");
        report.error = Some("post-flight validation failed".to_string());
        return report;
    }

    match build_patch(rom) {
        Ok((patch, entries, changed)) => {
            info!("Patch built: {} entries, {} bytes changed", entries, changed);
            report.patch = Some(patch);
            report.patch_entries = entries;
            report.bytes_changed = changed;
        }
        Err(e) => {
            warn!("Patch generation failed: {}", e);
            report.error = Some(e.to_string());
        }
    }
    report
}

fn build_patch(rom: &RomImage) -> Result<(Vec<u8>, usize, usize)> {
    let entries = diff(rom.original(), rom.working())?;
    let changed = entries.iter().map(|e| e.len()).sum();
    let patch = IpsPatch::from_entries(&entries, rom.working())?;
    Ok((patch.to_bytes(), entries.len(), changed))
}
