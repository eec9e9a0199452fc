//! Starter mappings for writing a new table.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TablePreset {
    /// `A` to `Z`
    AsciiUppercase,
    /// `a` to `z`
    AsciiLowercase,
    /// `0` to `9`
    Digits,
    /// `<CLEAR>`, `<WAIT>`, `<NEWLINE>` and `<END>` at 0xFC..=0xFF.
    ControlCodes,
}

impl TablePreset {
    /// Symbols keyed by their distance from the start byte.
    fn base(&self) -> Vec<(usize, String)> {
        let run = |range: std::ops::RangeInclusive<char>| {
            range
                .enumerate()
                .map(|(i, c)| (i, c.to_string()))
                .collect::<Vec<_>>()
        };
        match self {
            TablePreset::AsciiUppercase => run('A'..='Z'),
            TablePreset::AsciiLowercase => run('a'..='z'),
            TablePreset::Digits => run('0'..='9'),
            TablePreset::ControlCodes => [
                (0xFC, "<CLEAR>"),
                (0xFD, "<WAIT>"),
                (0xFE, "<NEWLINE>"),
                (0xFF, "<END>"),
            ]
            .into_iter()
            .map(|(offset, name)| (offset, name.to_string()))
            .collect(),
        }
    }

    /// Mappings shifted to begin at `start`.
    pub fn mappings(&self, start: u8) -> Result<Vec<(u8, String)>> {
        self.base()
            .into_iter()
            .map(|(offset, symbol)| {
                u8::try_from(start as usize + offset)
                    .map(|byte| (byte, symbol))
                    .map_err(|_| {
                        Error::Config(format!(
                            "preset {} does not fit in a byte from 0x{:02X}",
                            self, start
                        ))
                    })
            })
            .collect()
    }
}

/// Table source text for `(preset, start byte)` pairs.
///
/// `<END>` is written with the terminator marker and `<NEWLINE>` with the
/// line-break marker. Two presets may not claim the same byte.
pub fn preset_source(presets: &[(TablePreset, u8)]) -> Result<String> {
    let mut out = String::new();
    let mut claimed: [Option<TablePreset>; 256] = [None; 256];

    for &(preset, start) in presets {
        let _ = writeln!(out, "# {} from 0x{:02X}", preset, start);
        for (byte, symbol) in preset.mappings(start)? {
            if let Some(owner) = claimed[byte as usize].replace(preset) {
                return Err(Error::Config(format!(
                    "presets {} and {} both map byte 0x{:02X}",
                    owner, preset, byte
                )));
            }
            let marker = match symbol.as_str() {
                "<END>" => "/",
                "<NEWLINE>" => "*",
                _ => "",
            };
            let _ = writeln!(out, "{}{:02X}={}", marker, byte, symbol);
        }
    }
    Ok(out)
}
