use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::location::{PointerTable, TextLocation};
use crate::reinject::FailurePolicy;
use crate::rom::ByteRange;
use crate::space::PaddingScan;
use crate::table::EncodingTable;
use crate::validate::ValidationConfig;

use super::ProjectConfig;

/// A range the engine must never write to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedRegion {
    pub range: ByteRange,
    pub name: String,
}

impl ProtectedRegion {
    pub fn new<S: Into<String>>(range: ByteRange, name: S) -> Self {
        Self {
            range,
            name: name.into(),
        }
    }

    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.range.to_string()
        } else {
            format!("{} ({})", self.name, self.range)
        }
    }
}

/// Everything an engine run needs. Built once and shared by reference.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub game_name: String,
    pub table: Arc<EncodingTable>,
    pub locations: Vec<TextLocation>,
    pub free_ranges: Vec<ByteRange>,
    /// Relocations land inside this region; anywhere in the image when unset.
    pub text_region: Option<ByteRange>,
    pub padding_scan: Option<PaddingScan>,
    pub protected: Vec<ProtectedRegion>,
    pub pad_byte: u8,
    pub policy: FailurePolicy,
    pub validation: ValidationConfig,
}

impl EngineConfig {
    pub fn builder(table: EncodingTable) -> EngineConfigBuilder {
        EngineConfigBuilder::new(table)
    }

    /// Load a project file; the encoding table path is resolved relative to it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let project = ProjectConfig::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_project(&project, base_dir)
    }

    pub fn from_project(project: &ProjectConfig, base_dir: &Path) -> Result<Self> {
        let detection = &project.text_detection;
        let table_path = base_dir.join(&detection.encoding_table);
        let table = EncodingTable::load(&table_path).map_err(|e| match e {
            Error::Io(io) => Error::Config(format!(
                "cannot read encoding table {}: {}",
                table_path.display(),
                io
            )),
            other => other,
        })?;
        let table = table.with_terminators(detection.terminators.iter().cloned());

        let config = Self {
            game_name: project.game.name.clone(),
            table: Arc::new(table),
            locations: project.locations()?,
            free_ranges: project.free_ranges()?,
            text_region: project.text_region()?,
            padding_scan: project.padding_scan(),
            protected: project.protected_regions()?,
            pad_byte: project.reinjection.pad_byte,
            policy: project.reinjection.policy,
            validation: project.validation_config()?,
        };
        info!(
            "Engine configured: {} locations, {} free ranges, {} protected regions",
            config.locations.len(),
            config.free_ranges.len(),
            config.protected.len()
        );
        Ok(config)
    }

    pub fn pointer_table(&self, location: usize) -> Option<&PointerTable> {
        self.locations.get(location)?.as_pointer_table()
    }

    /// First protected region overlapping `range`.
    pub fn protected_overlap(&self, range: &ByteRange) -> Option<&ProtectedRegion> {
        self.protected.iter().find(|p| p.range.overlaps(range))
    }

    /// Fail with `ProtectedRegionViolation` if `range` touches a protected region.
    pub fn check_writable(&self, range: &ByteRange) -> Result<()> {
        match self.protected_overlap(range) {
            Some(region) => Err(Error::ProtectedRegionViolation {
                start: range.start,
                end: range.end,
                region: region.label(),
            }),
            None => Ok(()),
        }
    }
}

/// Builder for EngineConfig
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    table: EncodingTable,
    game_name: Option<String>,
    locations: Vec<TextLocation>,
    free_ranges: Vec<ByteRange>,
    text_region: Option<ByteRange>,
    padding_scan: Option<PaddingScan>,
    protected: Vec<ProtectedRegion>,
    pad_byte: Option<u8>,
    policy: Option<FailurePolicy>,
    validation: Option<ValidationConfig>,
}

impl EngineConfigBuilder {
    fn new(table: EncodingTable) -> Self {
        Self {
            table,
            game_name: None,
            locations: Vec::new(),
            free_ranges: Vec::new(),
            text_region: None,
            padding_scan: None,
            protected: Vec::new(),
            pad_byte: None,
            policy: None,
            validation: None,
        }
    }

    pub fn game_name<S: Into<String>>(mut self, name: S) -> Self {
        self.game_name = Some(name.into());
        self
    }

    /// Append a text location
    pub fn location<L: Into<TextLocation>>(mut self, location: L) -> Self {
        self.locations.push(location.into());
        self
    }

    /// Declare a free range
    pub fn free_range(mut self, range: ByteRange) -> Self {
        self.free_ranges.push(range);
        self
    }

    pub fn text_region(mut self, range: ByteRange) -> Self {
        self.text_region = Some(range);
        self
    }

    pub fn padding_scan(mut self, byte: u8, min_run: usize) -> Self {
        self.padding_scan = Some(PaddingScan { byte, min_run });
        self
    }

    pub fn protect<S: Into<String>>(mut self, range: ByteRange, name: S) -> Self {
        self.protected.push(ProtectedRegion::new(range, name));
        self
    }

    pub fn pad_byte(mut self, byte: u8) -> Self {
        self.pad_byte = Some(byte);
        self
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        EngineConfig {
            game_name: self.game_name.unwrap_or_default(),
            table: Arc::new(self.table),
            locations: self.locations,
            free_ranges: self.free_ranges,
            text_region: self.text_region,
            padding_scan: self.padding_scan,
            protected: self.protected,
            pad_byte: self.pad_byte.unwrap_or(0xFF),
            policy: self.policy.unwrap_or_default(),
            validation: self.validation.unwrap_or_default(),
        }
    }
}
