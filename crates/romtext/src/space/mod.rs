//! Free-space bookkeeping for relocated strings.
//!
//! [`FreeSpaceMap`] is a sorted set of disjoint, non-adjacent byte ranges.
//! Freeing merges with neighbours; allocation is first-fit at the lowest
//! offset.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::rom::ByteRange;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FreeSpaceMap {
    ranges: Vec<ByteRange>,
}

impl FreeSpaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ranges<I: IntoIterator<Item = ByteRange>>(ranges: I) -> Self {
        let mut map = Self::new();
        for range in ranges {
            map.free(range);
        }
        map
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn total(&self) -> usize {
        self.ranges.iter().map(ByteRange::len).sum()
    }

    pub fn largest(&self) -> usize {
        self.ranges.iter().map(ByteRange::len).max().unwrap_or(0)
    }

    pub fn is_free(&self, range: &ByteRange) -> bool {
        self.ranges.iter().any(|r| r.contains_range(range))
    }

    /// Return a range to the map, merging with overlapping or adjacent ranges.
    pub fn free(&mut self, range: ByteRange) {
        if range.is_empty() {
            return;
        }

        let mut merged = range;
        // First range whose end reaches the new start (adjacency counts).
        let first = self.ranges.partition_point(|r| r.end < merged.start);
        let mut last = first;
        while last < self.ranges.len() && self.ranges[last].start <= merged.end {
            merged.start = merged.start.min(self.ranges[last].start);
            merged.end = merged.end.max(self.ranges[last].end);
            last += 1;
        }
        self.ranges.splice(first..last, std::iter::once(merged));
    }

    /// Remove `range` from the map, splitting ranges it cuts through.
    pub fn reserve(&mut self, range: ByteRange) {
        if range.is_empty() {
            return;
        }

        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for r in self.ranges.drain(..) {
            if !r.overlaps(&range) {
                kept.push(r);
                continue;
            }
            if r.start < range.start {
                kept.push(ByteRange::new(r.start, range.start));
            }
            if range.end < r.end {
                kept.push(ByteRange::new(range.end, r.end));
            }
        }
        self.ranges = kept;
    }

    /// Keep only the parts of the map inside `bounds`.
    pub fn restrict_to(&mut self, bounds: ByteRange) {
        self.ranges = self
            .ranges
            .iter()
            .filter_map(|r| r.intersection(&bounds))
            .collect();
    }

    /// Lowest free range of `len` bytes inside `within`, reserved on success.
    pub fn allocate(&mut self, len: usize, within: ByteRange) -> Option<ByteRange> {
        if len == 0 {
            return None;
        }
        let found = self
            .ranges
            .iter()
            .filter_map(|r| r.intersection(&within))
            .find(|r| r.len() >= len)
            .map(|r| ByteRange::with_len(r.start, len))?;
        self.reserve(found);
        Some(found)
    }

    /// Verify ordering and disjointness.
    pub fn check_invariants(&self) -> Result<()> {
        if let Some(empty) = self.ranges.iter().find(|r| r.is_empty()) {
            return Err(Error::StructuralValidation(format!(
                "free-space map holds an empty range {}",
                empty
            )));
        }
        for pair in self.ranges.windows(2) {
            if pair[0].end >= pair[1].start {
                return Err(Error::StructuralValidation(format!(
                    "free-space ranges {} and {} are not disjoint and sorted",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }
}

/// Padding-run detection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaddingScan {
    pub byte: u8,
    pub min_run: usize,
}

/// Runs of `byte` at least `min_run` long inside `within`.
pub fn scan_padding(data: &[u8], within: ByteRange, byte: u8, min_run: usize) -> Vec<ByteRange> {
    let Some(within) = within.clamp_to(data.len()) else {
        return Vec::new();
    };
    let min_run = min_run.max(1);
    let mut runs = Vec::new();
    let mut run_start = None;

    for offset in within.start..within.end {
        match (data[offset] == byte, run_start) {
            (true, None) => run_start = Some(offset),
            (false, Some(start)) => {
                if offset - start >= min_run {
                    runs.push(ByteRange::new(start, offset));
                }
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        if within.end - start >= min_run {
            runs.push(ByteRange::new(start, within.end));
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: usize, end: usize) -> ByteRange {
        ByteRange::new(start, end)
    }

    #[test]
    fn test_free_merges_adjacent_and_overlapping() {
        let mut map = FreeSpaceMap::from_ranges([r(0x40, 0x50), r(0x10, 0x20)]);
        assert_eq!(map.ranges(), &[r(0x10, 0x20), r(0x40, 0x50)]);

        map.free(r(0x20, 0x28));
        assert_eq!(map.ranges(), &[r(0x10, 0x28), r(0x40, 0x50)]);

        map.free(r(0x24, 0x44));
        assert_eq!(map.ranges(), &[r(0x10, 0x50)]);
        map.check_invariants().unwrap();
    }

    #[test]
    fn test_reserve_splits_ranges() {
        let mut map = FreeSpaceMap::from_ranges([r(0x10, 0x40)]);
        map.reserve(r(0x18, 0x20));
        assert_eq!(map.ranges(), &[r(0x10, 0x18), r(0x20, 0x40)]);
        map.reserve(r(0x00, 0x12));
        assert_eq!(map.ranges(), &[r(0x12, 0x18), r(0x20, 0x40)]);
        assert_eq!(map.total(), 0x26);
        map.check_invariants().unwrap();
    }

    #[test]
    fn test_allocate_first_fit() {
        let mut map = FreeSpaceMap::from_ranges([r(0x10, 0x14), r(0x20, 0x40), r(0x80, 0x100)]);
        assert_eq!(map.allocate(8, r(0, 0x1000)), Some(r(0x20, 0x28)));
        assert_eq!(map.allocate(4, r(0, 0x1000)), Some(r(0x10, 0x14)));
        assert_eq!(map.ranges(), &[r(0x28, 0x40), r(0x80, 0x100)]);

        // Bounds restrict candidates.
        assert_eq!(map.allocate(8, r(0x90, 0x98)), Some(r(0x90, 0x98)));
        assert_eq!(map.allocate(0x40, r(0, 0x60)), None);
        map.check_invariants().unwrap();
    }

    #[test]
    fn test_invariant_violation_detected() {
        let map = FreeSpaceMap {
            ranges: vec![r(0x20, 0x30), r(0x10, 0x20)],
        };
        assert!(map.check_invariants().is_err());
    }

    #[test]
    fn test_scan_padding() {
        let mut data = vec![0u8; 0x20];
        data[0x04..0x08].fill(0xFF);
        data[0x10..0x12].fill(0xFF);
        data[0x1C..].fill(0xFF);

        let runs = scan_padding(&data, r(0, 0x20), 0xFF, 3);
        assert_eq!(runs, vec![r(0x04, 0x08), r(0x1C, 0x20)]);

        let runs = scan_padding(&data, r(0x06, 0x1E), 0xFF, 2);
        assert_eq!(runs, vec![r(0x06, 0x08), r(0x10, 0x12), r(0x1C, 0x1E)]);
    }
}
