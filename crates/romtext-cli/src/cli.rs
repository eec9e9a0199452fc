//! Command-line definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use romtext::FailurePolicy;

#[derive(Parser)]
#[command(name = "romtext")]
#[command(version, about = "ROM text extraction and reinjection")]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract text records to a TSV or JSON file
    Extract {
        /// Project configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Input ROM image
        rom: PathBuf,
        /// Output file; `.json` selects JSON, anything else TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Reinject translations and write an IPS patch
    Inject {
        #[arg(short, long)]
        config: PathBuf,
        rom: PathBuf,
        /// Edited TSV or JSON export
        translations: PathBuf,
        /// IPS patch output
        #[arg(short, long)]
        patch: PathBuf,
        /// Also write the patched image
        #[arg(long)]
        output_rom: Option<PathBuf>,
        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
        /// Override the configured failure policy (best_effort, abort_all)
        #[arg(long)]
        policy: Option<FailurePolicy>,
    },

    /// Create an IPS patch from two images of equal size
    Diff {
        original: PathBuf,
        modified: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Apply an IPS patch
    Apply {
        rom: PathBuf,
        patch: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the pre-flight checks on an image
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        rom: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show encoding table statistics, or encode text through it
    Table {
        table: PathBuf,
        /// Text to encode
        #[arg(long)]
        encode: Option<String>,
    },

    /// Write a starter table from presets (`name` or `name@start`)
    TableInit {
        /// ascii_uppercase, ascii_lowercase, digits, control_codes
        #[arg(required = true)]
        presets: Vec<String>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Hex and decoded view of an address
    Decode {
        #[arg(short, long)]
        table: PathBuf,
        rom: PathBuf,
        /// Address (hex with 0x or $ prefix, or decimal)
        address: String,
        #[arg(short, long, default_value = "64")]
        length: usize,
    },

    /// Find encoded text in an image
    Search {
        #[arg(short, long)]
        table: PathBuf,
        rom: PathBuf,
        text: String,
        /// Maximum number of matches to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Rank likely text regions in an unmapped image
    Detect {
        #[arg(short, long)]
        table: PathBuf,
        rom: PathBuf,
        /// Maximum number of candidates to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Minimum confidence (0.0 to 1.0)
        #[arg(long, default_value = "0.6")]
        threshold: f64,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}
