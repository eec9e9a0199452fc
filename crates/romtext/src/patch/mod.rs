//! Binary diffs between the original and modified images.

mod ips;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

pub use ips::{IpsPatch, IpsRecord};

/// One run of changed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchEntry {
    pub offset: usize,
    pub original: Vec<u8>,
    pub new: Vec<u8>,
}

impl PatchEntry {
    pub fn len(&self) -> usize {
        self.new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty()
    }

    pub fn end(&self) -> usize {
        self.offset + self.new.len()
    }
}

/// Coalesce differing bytes of two equal-length buffers into entries, in
/// increasing offset order.
pub fn diff(original: &[u8], modified: &[u8]) -> Result<Vec<PatchEntry>> {
    if original.len() != modified.len() {
        return Err(Error::StructuralValidation(format!(
            "cannot diff images of different sizes ({} vs {} bytes)",
            original.len(),
            modified.len()
        )));
    }

    let mut entries = Vec::new();
    let mut i = 0;
    while i < original.len() {
        if original[i] == modified[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < original.len() && original[i] != modified[i] {
            i += 1;
        }
        entries.push(PatchEntry {
            offset: start,
            original: original[start..i].to_vec(),
            new: modified[start..i].to_vec(),
        });
    }

    debug!(
        "Diff: {} entries, {} bytes changed",
        entries.len(),
        entries.iter().map(PatchEntry::len).sum::<usize>()
    );
    Ok(entries)
}

/// Apply entries to a copy of `original`.
pub fn apply_entries(original: &[u8], entries: &[PatchEntry]) -> Result<Vec<u8>> {
    let mut data = original.to_vec();
    for entry in entries {
        let target = data.get_mut(entry.offset..entry.end()).ok_or_else(|| {
            Error::InvalidPatch(format!(
                "entry at 0x{:X} runs past the image end (0x{:X})",
                entry.offset,
                original.len()
            ))
        })?;
        target.copy_from_slice(&entry.new);
    }
    Ok(data)
}

/// Build an IPS patch turning `original` into `modified`.
pub fn create_ips(original: &[u8], modified: &[u8]) -> Result<Vec<u8>> {
    let entries = diff(original, modified)?;
    Ok(IpsPatch::from_entries(&entries, modified)?.to_bytes())
}

/// Apply an encoded IPS patch to a copy of `original`.
pub fn apply_ips(original: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
    let mut data = original.to_vec();
    IpsPatch::parse(patch)?.apply(&mut data);
    Ok(data)
}
