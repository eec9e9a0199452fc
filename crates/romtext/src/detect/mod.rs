//! Heuristic search for text in an image nobody has mapped yet.
//!
//! Three scans run over the image: a sliding Shannon-entropy window, the
//! density of common letters, and the bytes leading up to terminator values.
//! Their candidates are merged where they overlap and ranked by confidence.
//! The result is a starting point for writing a project file, not a
//! location list the engine consumes.

use rayon::prelude::*;
use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::{debug, info};

use crate::rom::ByteRange;
use crate::table::{EncodingTable, Token, render_tokens};

const ENTROPY_WINDOW: usize = 32;
const ENTROPY_STEP: usize = 16;
const FREQUENCY_WINDOW: usize = 20;
const FREQUENCY_STEP: usize = 4;
const MAX_SAMPLE: usize = 32;
const COMMON_LETTERS: &str = " ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanMethod {
    Entropy,
    Frequency,
    Terminator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextCandidate {
    pub address: usize,
    pub length: usize,
    pub confidence: f64,
    /// Decoded text of the first bytes.
    pub sample: String,
    pub method: ScanMethod,
    pub description: String,
}

impl TextCandidate {
    pub fn range(&self) -> ByteRange {
        ByteRange::with_len(self.address, self.length)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionSummary {
    pub rom_size: usize,
    pub candidates_found: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub candidates: Vec<TextCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteClass {
    Unknown,
    Letter,
    Punctuation,
    OtherChar,
    Control,
}

pub struct TextDetector<'a> {
    table: &'a EncodingTable,
    classes: [ByteClass; 256],
    min_string_length: usize,
    max_string_length: usize,
    threshold: f64,
}

impl<'a> TextDetector<'a> {
    pub fn new(table: &'a EncodingTable) -> Self {
        let mut classes = [ByteClass::Unknown; 256];
        for (byte, class) in classes.iter_mut().enumerate() {
            *class = match table.lookup_byte(byte as u8) {
                Some(Token::Char(symbol)) => classify(&symbol),
                Some(Token::Control(_)) => ByteClass::Control,
                _ => ByteClass::Unknown,
            };
        }
        Self {
            table,
            classes,
            min_string_length: 3,
            max_string_length: 100,
            threshold: 0.6,
        }
    }

    /// Minimum confidence a candidate needs to be reported.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_string_lengths(mut self, min: usize, max: usize) -> Self {
        self.min_string_length = min.max(1);
        self.max_string_length = max.max(self.min_string_length);
        self
    }

    /// Candidates at or above the threshold, best first.
    pub fn detect(&self, data: &[u8]) -> Vec<TextCandidate> {
        let mut candidates = self.scan_entropy(data);
        candidates.extend(self.scan_frequency(data));
        candidates.extend(self.scan_terminators(data));
        debug!("{} raw text candidates", candidates.len());

        let mut candidates = self.deduplicate(candidates);
        candidates.retain(|c| c.confidence >= self.threshold);
        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.address.cmp(&b.address))
        });
        candidates
    }

    /// Run [`detect`](Self::detect) and keep the best `limit` candidates.
    pub fn analyze(&self, data: &[u8], limit: usize) -> DetectionSummary {
        let candidates = self.detect(data);
        let high_confidence = candidates.iter().filter(|c| c.confidence > 0.8).count();
        let medium_confidence = candidates
            .iter()
            .filter(|c| (0.6..=0.8).contains(&c.confidence))
            .count();
        info!(
            "Detected {} text candidates ({} high, {} medium confidence)",
            candidates.len(),
            high_confidence,
            medium_confidence
        );

        DetectionSummary {
            rom_size: data.len(),
            candidates_found: candidates.len(),
            high_confidence,
            medium_confidence,
            candidates: candidates.into_iter().take(limit).collect(),
        }
    }

    fn scan_entropy(&self, data: &[u8]) -> Vec<TextCandidate> {
        let Some(last) = data.len().checked_sub(ENTROPY_WINDOW) else {
            return Vec::new();
        };
        let starts: Vec<usize> = (0..last).step_by(ENTROPY_STEP).collect();
        starts
            .par_iter()
            .filter_map(|&start| {
                let window = &data[start..start + ENTROPY_WINDOW];
                let entropy = shannon_entropy(window);
                if entropy <= 2.0 || entropy >= 6.0 {
                    return None;
                }
                let confidence = self.text_confidence(window);
                (confidence > 0.3).then(|| {
                    self.candidate(
                        data,
                        ByteRange::with_len(start, ENTROPY_WINDOW),
                        confidence,
                        ScanMethod::Entropy,
                        format!("entropy {:.2}", entropy),
                    )
                })
            })
            .collect()
    }

    fn scan_frequency(&self, data: &[u8]) -> Vec<TextCandidate> {
        let mut common = [false; 256];
        for letter in COMMON_LETTERS.chars() {
            if let Ok(bytes) = self.table.encode(&Token::char(letter.to_string())) {
                if let [byte] = bytes[..] {
                    common[byte as usize] = true;
                }
            }
        }
        if !common.contains(&true) {
            return Vec::new();
        }

        let Some(last) = data.len().checked_sub(FREQUENCY_WINDOW) else {
            return Vec::new();
        };
        let starts: Vec<usize> = (0..last).step_by(FREQUENCY_STEP).collect();
        starts
            .par_iter()
            .filter_map(|&start| {
                let window = &data[start..start + FREQUENCY_WINDOW];
                let hits = window.iter().filter(|&&b| common[b as usize]).count();
                let ratio = hits as f64 / FREQUENCY_WINDOW as f64;
                (ratio > 0.4).then(|| {
                    self.candidate(
                        data,
                        ByteRange::with_len(start, FREQUENCY_WINDOW),
                        (ratio * 1.5).min(1.0),
                        ScanMethod::Frequency,
                        format!("{:.0}% common characters", ratio * 100.0),
                    )
                })
            })
            .collect()
    }

    /// Each run between two terminator bytes (capped at the maximum string
    /// length) is scored as a string. `0x00` and `0xFF` always count.
    fn scan_terminators(&self, data: &[u8]) -> Vec<TextCandidate> {
        let mut is_end = [false; 256];
        is_end[0x00] = true;
        is_end[0xFF] = true;
        for (byte, end) in is_end.iter_mut().enumerate() {
            if let Some(token) = self.table.lookup_byte(byte as u8) {
                *end |= self.table.is_terminator(&token);
            }
        }

        let ends: Vec<usize> = data
            .iter()
            .enumerate()
            .filter(|(_, b)| is_end[**b as usize])
            .map(|(i, _)| i)
            .collect();
        ends.par_iter()
            .enumerate()
            .filter_map(|(k, &end)| {
                let after_previous = if k == 0 { 0 } else { ends[k - 1] + 1 };
                let start = after_previous.max(end.saturating_sub(self.max_string_length));
                if end - start < self.min_string_length {
                    return None;
                }
                let confidence = self.text_confidence(&data[start..end]);
                (confidence > 0.4).then(|| {
                    self.candidate(
                        data,
                        ByteRange::new(start, end),
                        confidence,
                        ScanMethod::Terminator,
                        format!("terminator {:02X}", data[end]),
                    )
                })
            })
            .collect()
    }

    fn candidate(
        &self,
        data: &[u8],
        range: ByteRange,
        confidence: f64,
        method: ScanMethod,
        description: String,
    ) -> TextCandidate {
        let run = self
            .table
            .decode_run(data, range.start, range.len().min(MAX_SAMPLE));
        TextCandidate {
            address: range.start,
            length: range.len(),
            confidence,
            sample: render_tokens(&run.tokens),
            method,
            description,
        }
    }

    /// Score in `[0, 1]` that `data` is text in this table's encoding.
    fn text_confidence(&self, data: &[u8]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }

        let mut score = 0.0;
        let mut recognized = 0;
        for &byte in data {
            let bonus = match self.classes[byte as usize] {
                ByteClass::Unknown => continue,
                ByteClass::Letter => 0.1,
                ByteClass::Punctuation | ByteClass::Control => 0.05,
                ByteClass::OtherChar => 0.0,
            };
            recognized += 1;
            score += bonus;
        }

        let rate = recognized as f64 / data.len() as f64;
        score += rate * 0.8;
        if rate < 0.5 {
            score *= 0.5;
        }
        if (self.min_string_length..=50).contains(&data.len()) {
            score += 0.1;
        }
        score.min(1.0)
    }

    /// Sorted by address. A candidate overlapping a kept one by more than
    /// half of the shorter length replaces it only when more confident.
    fn deduplicate(&self, mut candidates: Vec<TextCandidate>) -> Vec<TextCandidate> {
        candidates.sort_by_key(|c| c.address);
        let reach = self.max_string_length.max(ENTROPY_WINDOW);
        let mut kept: Vec<TextCandidate> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let clash = kept
                .iter()
                .enumerate()
                .rev()
                .take_while(|(_, existing)| existing.address + reach > candidate.address)
                .find(|(_, existing)| {
                    let shared = existing
                        .range()
                        .intersection(&candidate.range())
                        .map_or(0, |r| r.len());
                    shared * 2 > existing.length.min(candidate.length)
                })
                .map(|(i, _)| i);

            match clash {
                Some(i) if candidate.confidence > kept[i].confidence => kept[i] = candidate,
                Some(_) => {}
                None => kept.push(candidate),
            }
        }
        kept
    }
}

fn classify(symbol: &str) -> ByteClass {
    if symbol.chars().all(char::is_alphabetic) || symbol.chars().all(char::is_whitespace) {
        ByteClass::Letter
    } else if symbol.chars().all(|c| ".,!?".contains(c)) {
        ByteClass::Punctuation
    } else {
        ByteClass::OtherChar
    }
}

/// Shannon entropy in bits per byte.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for &byte in data {
        counts[byte as usize] += 1;
    }
    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&n| n > 0)
        .map(|&n| {
            let p = n as f64 / len;
            -p * p.log2()
        })
        .sum()
}
