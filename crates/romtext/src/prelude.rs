//! Prelude module for convenient imports
//!
//! ```ignore
//! use romtext::prelude::*;
//! ```
//!
//! This brings the following into scope:
//!
//! - Configuration: `EngineConfig`, `ProjectConfig`
//! - Image and table: `RomImage`, `EncodingTable`, `Token`
//! - Pipeline: `Extractor`, `TextRecord`, `Reinjector`, `Validator`
//! - Error handling: `Error`, `Result`

// Configuration
pub use crate::config::{EngineConfig, ProjectConfig};

// Error handling
pub use crate::error::{Error, Result};

// Image and encoding
pub use crate::rom::{ByteRange, RomImage};
pub use crate::table::{EncodingTable, Token};

// Pipeline
pub use crate::extract::{Extractor, TextRecord};
pub use crate::location::TextLocation;
pub use crate::reinject::{FailurePolicy, Outcome, Reinjector};
pub use crate::validate::{ValidationReport, Validator};

// Export format trait
pub use crate::export::ExportFormat;
