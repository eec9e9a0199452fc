//! ROM image buffers.
//!
//! A [`RomImage`] pairs the pristine original bytes with a working copy that
//! the reinjector mutates. The working copy is exposed as a slice, never as a
//! `Vec`, so its length cannot change.

mod range;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crc_any::CRCu32;
use tracing::debug;

use crate::error::{Error, Result};

pub use range::ByteRange;

#[derive(Debug, Clone)]
pub struct RomImage {
    original: Arc<[u8]>,
    working: Vec<u8>,
}

impl RomImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            original: Arc::from(bytes.as_slice()),
            working: bytes,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(&path)?;
        debug!(
            "Loaded ROM {} ({} bytes)",
            path.as_ref().display(),
            bytes.len()
        );
        Ok(Self::new(bytes))
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn original(&self) -> &[u8] {
        &self.original
    }

    pub fn working(&self) -> &[u8] {
        &self.working
    }

    pub fn working_mut(&mut self) -> &mut [u8] {
        &mut self.working
    }

    pub fn is_modified(&self) -> bool {
        *self.original != *self.working
    }

    /// Read `len` bytes of the working copy starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.working.len())
            .ok_or_else(|| {
                Error::StructuralValidation(format!(
                    "read of {} bytes at 0x{:X} runs past the image end (0x{:X})",
                    len,
                    offset,
                    self.working.len()
                ))
            })?;
        Ok(&self.working[offset..end])
    }

    /// Overwrite bytes of the working copy. Never grows the image.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.working.len())
            .ok_or_else(|| {
                Error::StructuralValidation(format!(
                    "write of {} bytes at 0x{:X} runs past the image end (0x{:X})",
                    bytes.len(),
                    offset,
                    self.working.len()
                ))
            })?;
        self.working[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill(&mut self, range: ByteRange, byte: u8) -> Result<()> {
        if range.end > self.working.len() {
            return Err(Error::StructuralValidation(format!(
                "fill of {} runs past the image end",
                range
            )));
        }
        self.working[range.start..range.end].fill(byte);
        Ok(())
    }

    /// Copy of the working buffer, used to roll back a failed run.
    pub fn snapshot(&self) -> Vec<u8> {
        self.working.clone()
    }

    pub fn restore(&mut self, snapshot: Vec<u8>) {
        debug_assert_eq!(snapshot.len(), self.original.len());
        self.working = snapshot;
    }

    /// Discard every modification.
    pub fn reset(&mut self) {
        self.working.copy_from_slice(&self.original);
    }

    pub fn into_working(self) -> Vec<u8> {
        self.working
    }

    pub fn save_working<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, &self.working)?;
        Ok(())
    }

    pub fn original_crc32(&self) -> u32 {
        crc32(&self.original)
    }

    pub fn working_crc32(&self) -> u32 {
        crc32(&self.working)
    }
}

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = CRCu32::crc32();
    crc.digest(bytes);
    crc.get_crc()
}
