use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};
use crate::rom::ByteRange;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
pub enum Endianness {
    #[default]
    #[serde(rename = "little_endian")]
    #[strum(serialize = "little_endian")]
    Little,
    #[serde(rename = "big_endian")]
    #[strum(serialize = "big_endian")]
    Big,
}

/// Width and byte order of a stored pointer, e.g. `little_endian_16bit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PointerFormat {
    width: usize,
    endianness: Endianness,
}

impl PointerFormat {
    pub const LITTLE_ENDIAN_16: PointerFormat = PointerFormat {
        width: 2,
        endianness: Endianness::Little,
    };

    pub const BIG_ENDIAN_16: PointerFormat = PointerFormat {
        width: 2,
        endianness: Endianness::Big,
    };

    /// `width` is in bytes (1 to 4).
    pub fn new(width: usize, endianness: Endianness) -> Result<Self> {
        if !(1..=4).contains(&width) {
            return Err(Error::Config(format!(
                "unsupported pointer width: {} bytes",
                width
            )));
        }
        Ok(Self { width, endianness })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn max_value(&self) -> u64 {
        (1u64 << (self.width * 8)) - 1
    }

    /// Read one pointer value at `offset`.
    pub fn read(&self, data: &[u8], offset: usize) -> Option<u64> {
        let bytes = data.get(offset..offset.checked_add(self.width)?)?;
        let fold = |acc: u64, &b: &u8| (acc << 8) | u64::from(b);
        Some(match self.endianness {
            Endianness::Little => bytes.iter().rev().fold(0, fold),
            Endianness::Big => bytes.iter().fold(0, fold),
        })
    }

    /// Serialize a pointer value; `None` when it does not fit the width.
    pub fn encode(&self, value: u64) -> Option<Vec<u8>> {
        if value > self.max_value() {
            return None;
        }
        let le = &value.to_le_bytes()[..self.width];
        Some(match self.endianness {
            Endianness::Little => le.to_vec(),
            Endianness::Big => le.iter().rev().copied().collect(),
        })
    }
}

impl Default for PointerFormat {
    fn default() -> Self {
        Self::LITTLE_ENDIAN_16
    }
}

impl fmt::Display for PointerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}bit", self.endianness, self.width * 8)
    }
}

impl FromStr for PointerFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("unknown pointer format '{}'", s));
        let (order, bits) = s.rsplit_once('_').ok_or_else(invalid)?;
        let endianness: Endianness = order.parse().map_err(|_| invalid())?;
        let bits: usize = bits
            .strip_suffix("bit")
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;
        if bits % 8 != 0 {
            return Err(invalid());
        }
        Self::new(bits / 8, endianness)
    }
}

impl TryFrom<String> for PointerFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PointerFormat> for String {
    fn from(format: PointerFormat) -> Self {
        format.to_string()
    }
}

/// Linear-to-bank mapping for banked address spaces.
///
/// Bank `index` occupies `[header + index * size, +size)` in the image and is
/// mapped at `cpu_base` in the CPU address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankWindow {
    pub size: usize,
    pub index: usize,
    #[serde(default)]
    pub header: usize,
    pub cpu_base: usize,
}

impl BankWindow {
    pub fn rom_start(&self) -> usize {
        self.header + self.index * self.size
    }

    pub fn range(&self) -> ByteRange {
        ByteRange::with_len(self.rom_start(), self.size)
    }

    /// `None` when the bank's placement overflows the address space.
    pub fn checked_range(&self) -> Option<ByteRange> {
        let start = self.index.checked_mul(self.size)?.checked_add(self.header)?;
        ByteRange::checked_with_len(start, self.size)
    }

    /// Offset added to a stored pointer to obtain an image offset.
    pub fn base_offset(&self) -> i64 {
        self.rom_start() as i64 - self.cpu_base as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        let format: PointerFormat = "little_endian_16bit".parse().unwrap();
        assert_eq!(format, PointerFormat::LITTLE_ENDIAN_16);
        let format: PointerFormat = "big_endian_24bit".parse().unwrap();
        assert_eq!(format.width(), 3);
        assert_eq!(format.to_string(), "big_endian_24bit");

        assert!("little_endian_12bit".parse::<PointerFormat>().is_err());
        assert!("middle_endian_16bit".parse::<PointerFormat>().is_err());
        assert!("little_endian_64bit".parse::<PointerFormat>().is_err());
    }

    #[test]
    fn test_read_and_encode() {
        let data = [0x10, 0x80, 0x12, 0x34];
        assert_eq!(PointerFormat::LITTLE_ENDIAN_16.read(&data, 0), Some(0x8010));
        assert_eq!(PointerFormat::BIG_ENDIAN_16.read(&data, 2), Some(0x1234));
        assert_eq!(PointerFormat::LITTLE_ENDIAN_16.read(&data, 3), None);

        assert_eq!(
            PointerFormat::LITTLE_ENDIAN_16.encode(0x8020),
            Some(vec![0x20, 0x80])
        );
        assert_eq!(
            PointerFormat::BIG_ENDIAN_16.encode(0x8020),
            Some(vec![0x80, 0x20])
        );
        assert_eq!(PointerFormat::LITTLE_ENDIAN_16.encode(0x1_0000), None);
    }

    #[test]
    fn test_bank_window() {
        let bank = BankWindow {
            size: 0x4000,
            index: 2,
            header: 0x10,
            cpu_base: 0x8000,
        };
        assert_eq!(bank.rom_start(), 0x8010);
        assert_eq!(bank.base_offset(), 0x10);
        assert_eq!(bank.range(), ByteRange::new(0x8010, 0xC010));
    }

    #[test]
    fn test_deserialize_format() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: PointerFormat,
        }
        let w: Wrapper = toml::from_str("format = \"big_endian_32bit\"").unwrap();
        assert_eq!(w.format.width(), 4);
        assert_eq!(w.format.max_value(), 0xFFFF_FFFF);
    }
}
