//! Table command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use romtext::{EncodingTable, TablePreset, preset_source};

use super::hex_utils::parse_hex_address;

/// Run the table command
pub fn run(path: &Path, encode: Option<&str>) -> Result<()> {
    let table = EncodingTable::load(path)
        .with_context(|| format!("Failed to load table {}", path.display()))?;

    if let Some(text) = encode {
        let bytes = table.encode_text(text)?;
        let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        println!("{}", hex.join(" "));
        return Ok(());
    }

    let stats = table.stats();
    println!("Table: {}", path.display());
    println!("  Entries:        {}", stats.total);
    println!("  Characters:     {}", stats.characters);
    println!("  Control codes:  {}", stats.control_codes);
    println!("  Parameterized:  {}", stats.parameterized);
    println!("  Multi-byte:     {}", stats.multi_byte);
    if let Some(terminator) = table.default_terminator() {
        println!("  Terminator:     {}", terminator);
    }
    Ok(())
}

/// Parse `name` or `name@start`. Without a start byte, letters and digits
/// begin at their ASCII values and control codes at 0x00.
fn parse_preset(arg: &str) -> Result<(TablePreset, u8)> {
    let (name, start) = match arg.split_once('@') {
        Some((name, start)) => (name, Some(start)),
        None => (arg, None),
    };
    let preset: TablePreset = name
        .parse()
        .with_context(|| format!("Unknown preset '{}'", name))?;
    let start = match start {
        Some(start) => {
            let value = parse_hex_address(start)?;
            match u8::try_from(value) {
                Ok(byte) => byte,
                Err(_) => bail!("Preset start {} is not a byte", start),
            }
        }
        None => match preset {
            TablePreset::AsciiUppercase => b'A',
            TablePreset::AsciiLowercase => b'a',
            TablePreset::Digits => b'0',
            TablePreset::ControlCodes => 0x00,
        },
    };
    Ok((preset, start))
}

/// Run the table-init command
pub fn init(presets: &[String], output: Option<&Path>) -> Result<()> {
    let presets = presets
        .iter()
        .map(|arg| parse_preset(arg))
        .collect::<Result<Vec<_>>>()?;
    let source = preset_source(&presets)?;

    EncodingTable::parse(&source).context("Preset table does not parse")?;

    match output {
        Some(path) => {
            std::fs::write(path, &source)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} ({} presets)", path.display(), presets.len());
        }
        None => print!("{}", source),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preset() {
        assert_eq!(parse_preset("digits").unwrap(), (TablePreset::Digits, b'0'));
        assert_eq!(
            parse_preset("ascii_uppercase@0x80").unwrap(),
            (TablePreset::AsciiUppercase, 0x80)
        );
        assert!(parse_preset("ascii_uppercase@0x100").is_err());
        assert!(parse_preset("runes").is_err());
    }
}
