//! Serde helpers accepting addresses as integers or hex strings.
//!
//! `16`, `"16"`, `"0x10"`, `"$10"` and `"-0x10"` are all accepted.

use serde::{Deserialize, Deserializer, de};

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressSerde {
    Int(i64),
    Text(String),
}

impl AddressSerde {
    fn value(self) -> Result<i64, String> {
        match self {
            AddressSerde::Int(value) => Ok(value),
            AddressSerde::Text(text) => parse_address(&text),
        }
    }
}

/// Parse a decimal or hexadecimal (`0x`/`$` prefixed) address.
pub fn parse_address(text: &str) -> Result<i64, String> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };

    let parsed = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .or_else(|| body.strip_prefix('$'))
    {
        i64::from_str_radix(&hex.replace('_', ""), 16)
    } else {
        body.replace('_', "").parse::<i64>()
    };

    let value = parsed.map_err(|e| format!("invalid address '{}': {}", text, e))?;
    Ok(if negative { -value } else { value })
}

pub(crate) fn signed<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    AddressSerde::deserialize(deserializer)?
        .value()
        .map_err(de::Error::custom)
}

pub(crate) fn unsigned<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = signed(deserializer)?;
    usize::try_from(value)
        .map_err(|_| de::Error::custom(format!("address {:#X} must not be negative", value)))
}

pub(crate) fn optional_unsigned<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    unsigned(deserializer).map(Some)
}

pub(crate) fn optional_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = signed(deserializer)?;
    u32::try_from(value)
        .map(Some)
        .map_err(|_| de::Error::custom(format!("{:#X} does not fit 32 bits", value)))
}

pub(crate) fn byte<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = signed(deserializer)?;
    u8::try_from(value).map_err(|_| de::Error::custom(format!("{:#X} is not a byte", value)))
}
