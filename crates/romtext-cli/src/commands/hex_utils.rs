//! Address parsing and formatting utilities.

use anyhow::{Result, bail};
use romtext::config::address::parse_address;

/// Parse an image offset: `0x1000`, `$1000` or decimal `4096`.
pub fn parse_hex_address(s: &str) -> Result<usize> {
    let value = parse_address(s).map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;
    if value < 0 {
        bail!("Invalid address: {} is negative", s);
    }
    Ok(value as usize)
}

/// Format an offset as a 6-digit hex string with 0x prefix.
pub fn format_hex_address(addr: usize) -> String {
    format!("0x{:06X}", addr)
}
