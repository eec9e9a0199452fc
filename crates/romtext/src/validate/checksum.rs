use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};
use crate::location::{Endianness, PointerFormat};
use crate::rom::ByteRange;

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
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChecksumAlgorithm {
    /// 8-bit byte sum.
    Sum8,
    /// 16-bit byte sum.
    Sum16,
    /// 32-bit byte sum.
    Sum32,
    /// Game Boy header style: `x = x - b - 1` over the covered bytes.
    Complement8,
}

impl ChecksumAlgorithm {
    /// Stored width in bytes.
    pub fn width(&self) -> usize {
        match self {
            ChecksumAlgorithm::Sum8 | ChecksumAlgorithm::Complement8 => 1,
            ChecksumAlgorithm::Sum16 => 2,
            ChecksumAlgorithm::Sum32 => 4,
        }
    }

    fn compute<'a>(&self, bytes: impl Iterator<Item = &'a u8>) -> u64 {
        match self {
            ChecksumAlgorithm::Complement8 => u64::from(
                bytes.fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1)),
            ),
            _ => {
                let mask = (1u64 << (self.width() * 8)) - 1;
                bytes.fold(0u64, |acc, &b| acc.wrapping_add(u64::from(b))) & mask
            }
        }
    }
}

/// An internal checksum stored in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecksumField {
    pub algorithm: ChecksumAlgorithm,
    /// Offset of the stored checksum.
    pub address: usize,
    pub endianness: Endianness,
    /// Bytes covered by the sum. The field itself is skipped if inside.
    pub covered: ByteRange,
}

impl ChecksumField {
    pub fn field_range(&self) -> ByteRange {
        ByteRange::with_len(self.address, self.algorithm.width())
    }

    fn format(&self) -> Result<PointerFormat> {
        PointerFormat::new(self.algorithm.width(), self.endianness)
    }

    fn check_bounds(&self, data: &[u8]) -> Result<()> {
        if self.field_range().end > data.len() || self.covered.end > data.len() {
            return Err(Error::StructuralValidation(format!(
                "checksum field at 0x{:X} or covered range {} lies outside the image",
                self.address, self.covered
            )));
        }
        Ok(())
    }

    pub fn compute(&self, data: &[u8]) -> Result<u64> {
        self.check_bounds(data)?;
        let field = self.field_range();
        let bytes = data[self.covered.start..self.covered.end]
            .iter()
            .enumerate()
            .filter(|(i, _)| !field.contains(self.covered.start + i))
            .map(|(_, b)| b);
        Ok(self.algorithm.compute(bytes))
    }

    pub fn read(&self, data: &[u8]) -> Result<u64> {
        self.check_bounds(data)?;
        self.format()?
            .read(data, self.address)
            .ok_or_else(|| Error::StructuralValidation("checksum field unreadable".to_string()))
    }

    /// Recompute and store the checksum, returning `(old, new)`.
    pub fn update(&self, data: &mut [u8]) -> Result<(u64, u64)> {
        let old = self.read(data)?;
        let new = self.compute(data)?;
        let bytes = self
            .format()?
            .encode(new)
            .ok_or_else(|| Error::StructuralValidation("checksum does not fit".to_string()))?;
        data[self.address..self.address + bytes.len()].copy_from_slice(&bytes);
        Ok((old, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement8_matches_game_boy_header_rule() {
        let mut data = vec![0u8; 0x150];
        data[0x134..0x144].copy_from_slice(b"TETRIS\0\0\0\0\0\0\0\0\0\0");
        let field = ChecksumField {
            algorithm: ChecksumAlgorithm::Complement8,
            address: 0x14D,
            endianness: Endianness::Little,
            covered: ByteRange::new(0x134, 0x14D),
        };
        let mut expected = 0u8;
        for &b in &data[0x134..0x14D] {
            expected = expected.wrapping_sub(b).wrapping_sub(1);
        }
        assert_eq!(field.compute(&data).unwrap(), u64::from(expected));

        let (old, new) = field.update(&mut data).unwrap();
        assert_eq!(old, 0);
        assert_eq!(data[0x14D], new as u8);
    }

    #[test]
    fn test_sum16_skips_its_own_field() {
        let mut data = vec![1u8; 0x20];
        let field = ChecksumField {
            algorithm: ChecksumAlgorithm::Sum16,
            address: 0x1E,
            endianness: Endianness::Big,
            covered: ByteRange::new(0, 0x20),
        };
        assert_eq!(field.compute(&data).unwrap(), 0x1E);
        field.update(&mut data).unwrap();
        assert_eq!(&data[0x1E..], &[0x00, 0x1E]);
        // Stable after writing.
        assert_eq!(field.compute(&data).unwrap(), field.read(&data).unwrap());
    }

    #[test]
    fn test_out_of_bounds_field() {
        let data = vec![0u8; 4];
        let field = ChecksumField {
            algorithm: ChecksumAlgorithm::Sum32,
            address: 2,
            endianness: Endianness::Little,
            covered: ByteRange::new(0, 4),
        };
        assert!(field.compute(&data).is_err());
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(
            "complement8".parse::<ChecksumAlgorithm>().unwrap(),
            ChecksumAlgorithm::Complement8
        );
        assert_eq!(ChecksumAlgorithm::Sum16.to_string(), "sum16");
    }
}
