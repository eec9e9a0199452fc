mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "romtext=info",
        1 => "romtext=debug",
        _ => "romtext=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Extract {
            config,
            rom,
            output,
        } => commands::extract::run(&config, &rom, &output),
        Command::Inject {
            config,
            rom,
            translations,
            patch,
            output_rom,
            report,
            policy,
        } => commands::inject::run(commands::inject::InjectArgs {
            config,
            rom,
            translations,
            patch,
            output_rom,
            report,
            policy,
        }),
        Command::Diff {
            original,
            modified,
            output,
        } => commands::diff::run(&original, &modified, &output),
        Command::Apply { rom, patch, output } => commands::apply::run(&rom, &patch, &output),
        Command::Validate { config, rom, json } => commands::validate::run(&config, &rom, json),
        Command::Table { table, encode } => commands::table::run(&table, encode.as_deref()),
        Command::TableInit { presets, output } => {
            commands::table::init(&presets, output.as_deref())
        }
        Command::Decode {
            table,
            rom,
            address,
            length,
        } => commands::decode::run(&table, &rom, &address, length),
        Command::Search {
            table,
            rom,
            text,
            limit,
        } => commands::search::run(&table, &rom, &text, limit),
        Command::Detect {
            table,
            rom,
            limit,
            threshold,
            json,
        } => commands::detect::run(&table, &rom, limit, threshold, json),
    }
}
