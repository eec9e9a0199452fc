//! IPS patch format.
//!
//! `PATCH`, then records of a 24-bit big-endian offset and a 16-bit length
//! followed by the payload, then `EOF`. A zero length marks an RLE record:
//! a 16-bit run length and one fill byte.

use crate::error::{Error, Result};

use super::PatchEntry;

const HEADER: &[u8] = b"PATCH";
const FOOTER: &[u8] = b"EOF";
/// Offset whose big-endian encoding reads as the footer.
const EOF_OFFSET: usize = 0x45_4F46;
const MAX_OFFSET: usize = 0xFF_FFFF;
const MAX_RECORD_LEN: usize = 0xFFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpsRecord {
    Data { offset: usize, bytes: Vec<u8> },
    Rle { offset: usize, len: usize, byte: u8 },
}

impl IpsRecord {
    pub fn offset(&self) -> usize {
        match self {
            IpsRecord::Data { offset, .. } | IpsRecord::Rle { offset, .. } => *offset,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IpsRecord::Data { bytes, .. } => bytes.len(),
            IpsRecord::Rle { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpsPatch {
    records: Vec<IpsRecord>,
}

impl IpsPatch {
    pub fn records(&self) -> &[IpsRecord] {
        &self.records
    }

    /// Records for `entries`, payload taken from `modified`.
    ///
    /// Runs longer than 0xFFFF bytes are split. A record that would start at
    /// 0x454F46 is started one byte earlier instead.
    pub fn from_entries(entries: &[PatchEntry], modified: &[u8]) -> Result<Self> {
        let mut records = Vec::new();
        for entry in entries {
            let end = entry.end();
            let mut start = entry.offset;
            if start == EOF_OFFSET {
                start -= 1;
            }

            while start < end {
                if start > MAX_OFFSET {
                    return Err(Error::PatchAddressOverflow {
                        offset: start,
                        bits: 24,
                    });
                }
                let mut len = (end - start).min(MAX_RECORD_LEN);
                if start + len == EOF_OFFSET && start + len < end {
                    len -= 1;
                }
                let bytes = modified.get(start..start + len).ok_or_else(|| {
                    Error::InvalidPatch(format!("entry at 0x{:X} lies outside the image", start))
                })?;
                records.push(IpsRecord::Data {
                    offset: start,
                    bytes: bytes.to_vec(),
                });
                start += len;
            }
        }
        Ok(Self { records })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(HEADER);
        for record in &self.records {
            out.extend_from_slice(&(record.offset() as u32).to_be_bytes()[1..]);
            match record {
                IpsRecord::Data { bytes, .. } => {
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(bytes);
                }
                IpsRecord::Rle { len, byte, .. } => {
                    out.extend_from_slice(&[0, 0]);
                    out.extend_from_slice(&(*len as u16).to_be_bytes());
                    out.push(*byte);
                }
            }
        }
        out.extend_from_slice(FOOTER);
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut rest = bytes
            .strip_prefix(HEADER)
            .ok_or_else(|| Error::InvalidPatch("missing PATCH header".to_string()))?;
        let mut records = Vec::new();

        loop {
            if rest.starts_with(FOOTER) {
                break;
            }
            let (head, tail) = take(rest, 5, "record header")?;
            let offset = be(&head[..3]);
            let len = be(&head[3..5]);
            if len == 0 {
                let (rle, tail) = take(tail, 3, "RLE record")?;
                records.push(IpsRecord::Rle {
                    offset,
                    len: be(&rle[..2]),
                    byte: rle[2],
                });
                rest = tail;
            } else {
                let (payload, tail) = take(tail, len, "record payload")?;
                records.push(IpsRecord::Data {
                    offset,
                    bytes: payload.to_vec(),
                });
                rest = tail;
            }
        }

        Ok(Self { records })
    }

    /// Apply every record; the buffer grows if a record writes past its end.
    pub fn apply(&self, data: &mut Vec<u8>) {
        for record in &self.records {
            let end = record.offset() + record.len();
            if data.len() < end {
                data.resize(end, 0);
            }
            match record {
                IpsRecord::Data { offset, bytes } => {
                    data[*offset..end].copy_from_slice(bytes);
                }
                IpsRecord::Rle { offset, byte, .. } => data[*offset..end].fill(*byte),
            }
        }
    }
}

fn take<'a>(bytes: &'a [u8], n: usize, what: &str) -> Result<(&'a [u8], &'a [u8])> {
    if bytes.len() < n {
        return Err(Error::InvalidPatch(format!("truncated {}", what)));
    }
    Ok(bytes.split_at(n))
}

fn be(bytes: &[u8]) -> usize {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | usize::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(offset: usize, len: usize) -> PatchEntry {
        PatchEntry {
            offset,
            original: vec![0; len],
            new: vec![1; len],
        }
    }

    #[test]
    fn test_long_runs_are_split() {
        let modified = vec![1u8; 0x2_0000];
        let patch = IpsPatch::from_entries(&[entry(0, 0x1_0010)], &modified).unwrap();
        let lens: Vec<usize> = patch.records().iter().map(IpsRecord::len).collect();
        assert_eq!(lens, vec![0xFFFF, 0x11]);
        assert_eq!(patch.records()[1].offset(), 0xFFFF);
    }

    #[test]
    fn test_eof_offset_collision() {
        let modified = vec![1u8; EOF_OFFSET + 0x10];
        let patch = IpsPatch::from_entries(&[entry(EOF_OFFSET, 2)], &modified).unwrap();
        assert_eq!(patch.records()[0].offset(), EOF_OFFSET - 1);
        assert_eq!(patch.records()[0].len(), 3);

        let encoded = patch.to_bytes();
        assert_eq!(&encoded[5..8], &[0x45, 0x4F, 0x45]);
        assert_eq!(IpsPatch::parse(&encoded).unwrap(), patch);
    }

    #[test]
    fn test_split_avoids_eof_offset() {
        let start = EOF_OFFSET - MAX_RECORD_LEN;
        let modified = vec![1u8; EOF_OFFSET + 0x10];
        let patch = IpsPatch::from_entries(&[entry(start, MAX_RECORD_LEN + 4)], &modified).unwrap();
        let offsets: Vec<usize> = patch.records().iter().map(IpsRecord::offset).collect();
        assert_eq!(offsets, vec![start, EOF_OFFSET - 1]);
        assert_eq!(patch.records()[1].len(), 5);
    }

    #[test]
    fn test_offset_overflow() {
        let modified = vec![0u8; MAX_OFFSET + 4];
        assert!(matches!(
            IpsPatch::from_entries(&[entry(MAX_OFFSET + 1, 2)], &modified),
            Err(Error::PatchAddressOverflow { bits: 24, .. })
        ));
    }

    #[test]
    fn test_parse_rle_record() {
        let mut bytes = b"PATCH".to_vec();
        bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x04, 0xAA]);
        bytes.extend_from_slice(&[0x00, 0x00, 0x08, 0x00, 0x01, 0x55]);
        bytes.extend_from_slice(b"EOF");

        let patch = IpsPatch::parse(&bytes).unwrap();
        assert_eq!(
            patch.records()[0],
            IpsRecord::Rle {
                offset: 2,
                len: 4,
                byte: 0xAA
            }
        );
        assert_eq!(patch.to_bytes(), bytes);

        let mut data = vec![0u8; 8];
        patch.apply(&mut data);
        assert_eq!(data, vec![0, 0, 0xAA, 0xAA, 0xAA, 0xAA, 0, 0, 0x55]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(IpsPatch::parse(b"PATC").is_err());
        assert!(IpsPatch::parse(b"PATCH\x00\x00\x01\x00").is_err());
        assert!(IpsPatch::parse(b"PATCH\x00\x00\x01\x00\x04AB").is_err());
        assert!(IpsPatch::parse(b"PATCHEOF").unwrap().records().is_empty());
    }
}
