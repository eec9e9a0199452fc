use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Half-open byte range `[start, end)` inside a ROM image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted range {start:#x}..{end:#x}");
        Self { start, end }
    }

    /// Checked constructor for offsets that come from configuration.
    pub fn try_new(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(Error::Config(format!(
                "range 0x{:X}..0x{:X} ends before it starts",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn with_len(start: usize, len: usize) -> Self {
        Self::new(start, start + len)
    }

    /// `None` when `start + len` overflows.
    pub fn checked_with_len(start: usize, len: usize) -> Option<Self> {
        Some(Self::new(start, start.checked_add(len)?))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn contains_range(&self, other: &ByteRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersection(&self, other: &ByteRange) -> Option<ByteRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then(|| ByteRange::new(start, end))
    }

    /// Clamp to `[0, limit)`; returns `None` when nothing remains.
    pub fn clamp_to(&self, limit: usize) -> Option<ByteRange> {
        self.intersection(&ByteRange::new(0, limit))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}..0x{:04X}", self.start, self.end)
    }
}
