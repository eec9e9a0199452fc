//! Text location model.
//!
//! A [`TextLocation`] says where strings live in an image: either a fixed
//! `(address, max_length)` slot, or a pointer table whose entries point at
//! terminator-delimited strings.

mod pointer;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::rom::ByteRange;

pub use pointer::{BankWindow, Endianness, PointerFormat};

/// Default upper bound on a pointed string when none is configured.
pub const DEFAULT_POINTER_MAX_LENGTH: usize = 0x400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedLocation {
    pub address: usize,
    pub max_length: usize,
    #[serde(default)]
    pub description: String,
}

impl FixedLocation {
    pub fn new(address: usize, max_length: usize) -> Self {
        Self {
            address,
            max_length,
            description: String::new(),
        }
    }

    pub fn range(&self) -> ByteRange {
        ByteRange::with_len(self.address, self.max_length)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerTable {
    pub table_address: usize,
    pub entry_count: usize,
    pub format: PointerFormat,
    /// Added to each stored value to obtain an image offset. Ignored when a
    /// bank window is set.
    pub base_offset: i64,
    pub max_length: usize,
    pub bank: Option<BankWindow>,
}

/// One decoded pointer table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPointer {
    pub entry_index: usize,
    /// Image offset of the stored pointer bytes.
    pub pointer_address: usize,
    pub raw: u64,
    pub target: usize,
}

impl PointerTable {
    pub fn new(table_address: usize, entry_count: usize, format: PointerFormat) -> Self {
        Self {
            table_address,
            entry_count,
            format,
            base_offset: 0,
            max_length: DEFAULT_POINTER_MAX_LENGTH,
            bank: None,
        }
    }

    pub fn with_base_offset(mut self, base_offset: i64) -> Self {
        self.base_offset = base_offset;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_bank(mut self, bank: BankWindow) -> Self {
        self.bank = Some(bank);
        self
    }

    pub fn effective_base(&self) -> i64 {
        self.bank
            .map(|b| b.base_offset())
            .unwrap_or(self.base_offset)
    }

    /// Bytes occupied by the table itself.
    pub fn table_range(&self) -> Result<ByteRange> {
        self.entry_count
            .checked_mul(self.format.width())
            .and_then(|size| ByteRange::checked_with_len(self.table_address, size))
            .ok_or_else(|| {
                Error::Config(format!(
                    "pointer table at 0x{:X} with {} entries overflows the address space",
                    self.table_address, self.entry_count
                ))
            })
    }

    pub fn entry_address(&self, entry_index: usize) -> usize {
        self.table_address + entry_index * self.format.width()
    }

    /// Image offsets a pointer of this table can express.
    pub fn addressable_window(&self, image_len: usize) -> Option<ByteRange> {
        let window = match self.bank {
            Some(bank) => bank.range(),
            None => {
                let base = self.effective_base();
                let start = base.max(0);
                let end = base.saturating_add(self.format.max_value() as i64 + 1);
                if end <= start {
                    return None;
                }
                ByteRange::new(start as usize, end as usize)
            }
        };
        window.clamp_to(image_len)
    }

    /// Read every entry. Entries pointing outside the image (or outside the
    /// bank window) are returned as `PointerOutOfRange` diagnostics.
    pub fn resolve(&self, data: &[u8]) -> Result<(Vec<ResolvedPointer>, Vec<Error>)> {
        let table_range = self.table_range()?;
        if table_range.end > data.len() {
            return Err(Error::Config(format!(
                "pointer table {} extends past the image end (0x{:X})",
                table_range,
                data.len()
            )));
        }

        let base = self.effective_base();
        let window = self.bank.map(|b| b.range());
        let mut resolved = Vec::with_capacity(self.entry_count);
        let mut skipped = Vec::new();

        for entry_index in 0..self.entry_count {
            let pointer_address = self.entry_address(entry_index);
            let Some(raw) = self.format.read(data, pointer_address) else {
                continue;
            };
            let target = raw as i64 + base;
            let in_image = target >= 0 && (target as usize) < data.len();
            let in_window = window.is_none_or(|w| w.contains(target as usize));
            if !in_image || !in_window {
                warn!(
                    "Pointer {} at 0x{:X} resolves outside the image: {:#X}",
                    entry_index, pointer_address, target
                );
                skipped.push(Error::PointerOutOfRange {
                    pointer: pointer_address,
                    target,
                });
                continue;
            }
            resolved.push(ResolvedPointer {
                entry_index,
                pointer_address,
                raw,
                target: target as usize,
            });
        }

        Ok((resolved, skipped))
    }

    /// Stored bytes for a pointer to image offset `target`.
    pub fn encode_target(&self, target: usize) -> Result<Vec<u8>> {
        let value = target as i64 - self.effective_base();
        u64::try_from(value)
            .ok()
            .and_then(|v| self.format.encode(v))
            .ok_or_else(|| {
                Error::StructuralValidation(format!(
                    "pointer value {:#X} for target 0x{:X} does not fit {}",
                    value, target, self.format
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextLocation {
    Fixed(FixedLocation),
    PointerTable(PointerTable),
}

impl TextLocation {
    pub fn fixed(address: usize, max_length: usize) -> Self {
        TextLocation::Fixed(FixedLocation::new(address, max_length))
    }

    pub fn is_pointer_table(&self) -> bool {
        matches!(self, TextLocation::PointerTable(_))
    }

    pub fn as_pointer_table(&self) -> Option<&PointerTable> {
        match self {
            TextLocation::PointerTable(table) => Some(table),
            TextLocation::Fixed(_) => None,
        }
    }
}

impl From<FixedLocation> for TextLocation {
    fn from(location: FixedLocation) -> Self {
        TextLocation::Fixed(location)
    }
}

impl From<PointerTable> for TextLocation {
    fn from(table: PointerTable) -> Self {
        TextLocation::PointerTable(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_table() -> Vec<u8> {
        let mut data = vec![0u8; 0x100];
        // Three LE16 pointers at 0x00 with base -0x8000.
        data[0..6].copy_from_slice(&[0x10, 0x80, 0x20, 0x80, 0x10, 0x80]);
        data
    }

    #[test]
    fn test_resolve_pointer_table() {
        let table = PointerTable::new(0, 3, PointerFormat::LITTLE_ENDIAN_16)
            .with_base_offset(-0x8000);
        let (resolved, skipped) = table.resolve(&image_with_table()).unwrap();
        assert!(skipped.is_empty());
        let targets: Vec<usize> = resolved.iter().map(|p| p.target).collect();
        assert_eq!(targets, vec![0x10, 0x20, 0x10]);
        assert_eq!(resolved[2].pointer_address, 4);
    }

    #[test]
    fn test_out_of_range_pointer_is_skipped() {
        let mut data = image_with_table();
        data[2..4].copy_from_slice(&[0x00, 0x90]);
        let table = PointerTable::new(0, 3, PointerFormat::LITTLE_ENDIAN_16)
            .with_base_offset(-0x8000);
        let (resolved, skipped) = table.resolve(&data).unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(matches!(
            skipped.as_slice(),
            [Error::PointerOutOfRange {
                pointer: 2,
                target: 0x1000
            }]
        ));
    }

    #[test]
    fn test_table_past_end_is_config_error() {
        let table = PointerTable::new(0xFE, 4, PointerFormat::LITTLE_ENDIAN_16);
        assert!(matches!(
            table.resolve(&image_with_table()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_oversized_table_is_config_error() {
        let wide = PointerFormat::new(3, Endianness::Little).unwrap();
        let table = PointerTable::new(0x10, usize::MAX / 2, wide);
        assert!(matches!(table.table_range(), Err(Error::Config(_))));
        assert!(matches!(
            table.resolve(&image_with_table()),
            Err(Error::Config(_))
        ));

        let table = PointerTable::new(usize::MAX - 1, 2, PointerFormat::LITTLE_ENDIAN_16);
        assert!(matches!(table.table_range(), Err(Error::Config(_))));
    }

    #[test]
    fn test_encode_target_checks_width() {
        let table = PointerTable::new(0, 1, PointerFormat::LITTLE_ENDIAN_16)
            .with_base_offset(-0x8000);
        assert_eq!(table.encode_target(0x30).unwrap(), vec![0x30, 0x80]);

        let narrow = PointerTable::new(0, 1, PointerFormat::new(1, Endianness::Little).unwrap());
        assert!(matches!(
            narrow.encode_target(0x100),
            Err(Error::StructuralValidation(_))
        ));
    }

    #[test]
    fn test_addressable_window() {
        let table = PointerTable::new(0, 1, PointerFormat::new(1, Endianness::Little).unwrap())
            .with_base_offset(0x40);
        assert_eq!(
            table.addressable_window(0x1000),
            Some(ByteRange::new(0x40, 0x140))
        );

        let banked = table.with_bank(BankWindow {
            size: 0x80,
            index: 1,
            header: 0,
            cpu_base: 0x8000,
        });
        assert_eq!(banked.effective_base(), 0x80 - 0x8000);
        assert_eq!(
            banked.addressable_window(0xC0),
            Some(ByteRange::new(0x80, 0xC0))
        );
    }
}
