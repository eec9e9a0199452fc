use serde::Serialize;

use crate::table::{EncodingTable, Token};

/// One token and the bytes it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedToken {
    pub offset: usize,
    pub bytes: Vec<u8>,
    pub token: Token,
}

/// Hex and decoded view of a range of the image.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeView {
    pub address: usize,
    pub bytes: Vec<u8>,
    pub tokens: Vec<DecodedToken>,
}

impl DecodeView {
    /// Decode up to `len` bytes at `address`, one token at a time.
    ///
    /// Bytes the table does not know appear as unknown tokens. Decoding does
    /// not stop at terminators.
    pub fn new(table: &EncodingTable, data: &[u8], address: usize, len: usize) -> Self {
        let end = address.saturating_add(len).min(data.len());
        let start = address.min(end);
        let window = &data[..end];
        let mut tokens = Vec::new();
        let mut offset = start;

        while offset < end {
            let (token, consumed) = match table.decode(window, offset) {
                Ok(decoded) => decoded,
                Err(_) => (Token::Unknown(data[offset]), 1),
            };
            tokens.push(DecodedToken {
                offset,
                bytes: data[offset..offset + consumed].to_vec(),
                token,
            });
            offset += consumed;
        }

        Self {
            address: start,
            bytes: data[start..end].to_vec(),
            tokens,
        }
    }

    pub fn text(&self) -> String {
        self.tokens.iter().map(|t| t.token.to_string()).collect()
    }
}

/// Traditional hexdump lines, 16 bytes each, addressed from `base`.
///
/// ```text
/// 0x000010: 48 45 4C 4C 4F FF 00 00  00 00 00 00 00 00 00 00  |HELLO...........|
/// ```
pub fn hexdump(bytes: &[u8], base: usize) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("0x{:06X}: ", base + i * 16);
            for j in 0..16 {
                if j == 8 {
                    line.push(' ');
                }
                match chunk.get(j) {
                    Some(byte) => line.push_str(&format!("{:02X} ", byte)),
                    None => line.push_str("   "),
                }
            }
            line.push_str(" |");
            for &byte in chunk {
                line.push(if (0x20..0x7F).contains(&byte) {
                    byte as char
                } else {
                    '.'
                });
            }
            line.push('|');
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_view_marks_unknown_bytes() {
        let table = EncodingTable::parse("41=A\n42=B\nF0XX=<DELAY:XX>\nFF=<END>\n").unwrap();
        let data = [0x00, 0x41, 0xF0, 0x10, 0x99, 0xFF, 0x42];
        let view = DecodeView::new(&table, &data, 1, 5);

        assert_eq!(view.bytes, vec![0x41, 0xF0, 0x10, 0x99, 0xFF]);
        assert_eq!(view.text(), "A<DELAY:10><UNK:99><END>");
        assert_eq!(view.tokens[1].offset, 2);
        assert_eq!(view.tokens[1].bytes, vec![0xF0, 0x10]);
    }

    #[test]
    fn test_decode_view_clamps_to_image() {
        let table = EncodingTable::parse("41=A\n").unwrap();
        let view = DecodeView::new(&table, &[0x41, 0x41], 1, 100);
        assert_eq!(view.text(), "A");
        let past = DecodeView::new(&table, &[0x41], 10, 4);
        assert!(past.tokens.is_empty());
    }

    #[test]
    fn test_hexdump_layout() {
        let lines = hexdump(b"HELLO\xFF", 0x10);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("0x000010: 48 45 4C 4C 4F FF "));
        assert!(lines[0].ends_with("|HELLO.|"));
    }
}
