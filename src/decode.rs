//! Input decoding with ordered legacy-encoding fallback.
//!
//! # Overview
//!
//! Japanese CSV exports are usually labelled "Shift_JIS" but are frequently
//! produced by Windows tools that emit CP932 (Windows-31J), the Microsoft
//! superset that adds NEC row 13 symbols, IBM extension kanji and a
//! user-defined area. The decoder tries a fixed, ordered list of candidates
//! and accepts the first one that decodes the whole file without error.
//!
//! The two candidates disagree on six symbol code points (for example
//! `0x8160` is WAVE DASH U+301C in JIS X 0208 but FULLWIDTH TILDE U+FF5E in
//! CP932). Both decode such bytes successfully, so the first-listed candidate
//! decides which interpretation is used.
//!
//! # Example
//!
//! ```
//! use sjis_dedupe::decode::{decode_bytes, LegacyEncoding, DEFAULT_CANDIDATES};
//!
//! // "日本語" in Shift_JIS
//! let bytes = [0x93, 0xFA, 0x96, 0x7B, 0x8C, 0xEA];
//! let (text, used) = decode_bytes(&bytes, DEFAULT_CANDIDATES).unwrap();
//! assert_eq!(text, "日本語");
//! assert_eq!(used, LegacyEncoding::ShiftJis);
//!
//! // NEC row 13 "①" only exists in CP932
//! let (text, used) = decode_bytes(&[0x87, 0x40], DEFAULT_CANDIDATES).unwrap();
//! assert_eq!(text, "①");
//! assert_eq!(used, LegacyEncoding::Cp932);
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use encoding_rs::{DecoderResult, SHIFT_JIS};
use thiserror::Error;

use crate::error::DedupeError;

/// A Japanese legacy encoding that input files may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyEncoding {
    /// Shift_JIS restricted to JIS X 0201 and JIS X 0208.
    ShiftJis,
    /// Microsoft code page 932 (Windows-31J).
    Cp932,
}

/// Candidates tried when nothing else is configured.
pub const DEFAULT_CANDIDATES: &[LegacyEncoding] = &[LegacyEncoding::ShiftJis, LegacyEncoding::Cp932];

/// Code points where JIS X 0208 and CP932 map the same bytes differently.
///
/// Pairs are `(cp932, jis)`.
pub(crate) const JIS_CP932_DIVERGENT: &[(char, char)] = &[
    ('\u{FF5E}', '\u{301C}'), // 0x8160 WAVE DASH
    ('\u{2225}', '\u{2016}'), // 0x8161 DOUBLE VERTICAL LINE
    ('\u{FF0D}', '\u{2212}'), // 0x817C MINUS SIGN
    ('\u{FFE0}', '\u{00A2}'), // 0x8191 CENT SIGN
    ('\u{FFE1}', '\u{00A3}'), // 0x8192 POUND SIGN
    ('\u{FFE2}', '\u{00AC}'), // 0x81CA NOT SIGN
];

/// A failed attempt to decode bytes with one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{encoding}: {reason} at byte offset {offset} ({})", hex_bytes(.bytes))]
pub struct DecodeFailure {
    /// Candidate that failed.
    pub encoding: LegacyEncoding,
    /// Offset of the first offending byte.
    pub offset: usize,
    /// The offending byte sequence.
    pub bytes: Vec<u8>,
    /// What was wrong with it.
    pub reason: &'static str,
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl LegacyEncoding {
    /// Canonical lowercase name, as accepted by [`LegacyEncoding::from_label`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ShiftJis => "shift_jis",
            Self::Cp932 => "cp932",
        }
    }

    /// Resolve a user-supplied encoding label.
    ///
    /// Labels are case-insensitive and `-`/`_` are interchangeable.
    ///
    /// # Examples
    ///
    /// ```
    /// use sjis_dedupe::decode::LegacyEncoding;
    ///
    /// assert_eq!(LegacyEncoding::from_label("Shift-JIS"), Some(LegacyEncoding::ShiftJis));
    /// assert_eq!(LegacyEncoding::from_label("windows-31j"), Some(LegacyEncoding::Cp932));
    /// assert_eq!(LegacyEncoding::from_label("euc-jp"), None);
    /// ```
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "shift_jis" | "shiftjis" | "sjis" | "s_jis" | "csshiftjis" => Some(Self::ShiftJis),
            "cp932" | "ms932" | "mskanji" | "ms_kanji" | "windows_31j" | "x_sjis" => {
                Some(Self::Cp932)
            }
            _ => None,
        }
    }

    /// Decode `bytes` completely, failing on the first invalid sequence.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeFailure`] describing the first byte sequence that is
    /// malformed or unmapped in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Result<String, DecodeFailure> {
        match self {
            Self::Cp932 => decode_cp932(bytes),
            Self::ShiftJis => {
                check_jis_x0208(bytes)?;
                let text = decode_cp932(bytes).map_err(|f| DecodeFailure {
                    encoding: Self::ShiftJis,
                    ..f
                })?;
                Ok(to_jis_code_points(&text))
            }
        }
    }
}

impl fmt::Display for LegacyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Single bytes CP932 maps to the Private Use Area.
///
/// The WHATWG decoder treats these as malformed; Windows maps them to
/// U+F8F0..=U+F8F3.
pub(crate) const CP932_SINGLE_BYTE_PUA: &[(u8, char)] = &[
    (0xA0, '\u{F8F0}'),
    (0xFD, '\u{F8F1}'),
    (0xFE, '\u{F8F2}'),
    (0xFF, '\u{F8F3}'),
];

fn cp932_single_byte(byte: u8) -> Option<char> {
    CP932_SINGLE_BYTE_PUA
        .iter()
        .find_map(|&(b, ch)| (b == byte).then_some(ch))
}

/// Decode with the WHATWG Shift_JIS decoder, which is Windows-31J compatible,
/// plus the CP932 single-byte Private Use Area mappings.
fn decode_cp932(bytes: &[u8]) -> Result<String, DecodeFailure> {
    let mut decoder = SHIFT_JIS.new_decoder_without_bom_handling();
    let mut text = String::new();
    let mut pos = 0;

    loop {
        let remaining = &bytes[pos..];
        // Every Shift_JIS byte expands to at most 3 UTF-8 bytes.
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(remaining.len())
            .unwrap_or(remaining.len().saturating_mul(3));
        text.reserve(needed);

        let (result, read) = decoder.decode_to_string_without_replacement(remaining, &mut text, true);
        let consumed = pos + read;
        match result {
            DecoderResult::InputEmpty => return Ok(text),
            DecoderResult::Malformed(bad, extra) => {
                let offset = consumed.saturating_sub(bad as usize + extra as usize);
                if bad == 1 {
                    if let Some(ch) = cp932_single_byte(bytes[offset]) {
                        text.push(ch);
                        pos = consumed;
                        continue;
                    }
                }
                let end = (offset + bad as usize).min(bytes.len());
                return Err(DecodeFailure {
                    encoding: LegacyEncoding::Cp932,
                    offset,
                    bytes: bytes[offset..end].to_vec(),
                    reason: "invalid or unmapped byte sequence",
                });
            }
            DecoderResult::OutputFull => {
                return Err(DecodeFailure {
                    encoding: LegacyEncoding::Cp932,
                    offset: consumed,
                    bytes: Vec::new(),
                    reason: "decoder output buffer exhausted",
                })
            }
        }
    }
}

/// Reject byte sequences that exist in CP932 but not in JIS X 0208 Shift_JIS.
fn check_jis_x0208(bytes: &[u8]) -> Result<(), DecodeFailure> {
    let fail = |offset: usize, len: usize, reason: &'static str| DecodeFailure {
        encoding: LegacyEncoding::ShiftJis,
        offset,
        bytes: bytes[offset..(offset + len).min(bytes.len())].to_vec(),
        reason,
    };

    let mut i = 0;
    while i < bytes.len() {
        let lead = bytes[i];
        match lead {
            0x00..=0x7F | 0xA1..=0xDF => i += 1,
            0x81..=0x9F | 0xE0..=0xEF => {
                let Some(&trail) = bytes.get(i + 1) else {
                    return Err(fail(i, 1, "truncated double-byte character"));
                };
                if !matches!(trail, 0x40..=0x7E | 0x80..=0xFC) {
                    return Err(fail(i, 2, "invalid trail byte"));
                }
                let row = jis_row(lead, trail);
                if !matches!(row, 1..=8 | 16..=84) {
                    return Err(fail(i, 2, "character outside JIS X 0208"));
                }
                i += 2;
            }
            _ => return Err(fail(i, 1, "byte not valid in Shift_JIS")),
        }
    }
    Ok(())
}

/// Whether a Shift_JIS double-byte sequence addresses a JIS X 0208 cell row.
pub(crate) fn is_jis_x0208_pair(lead: u8, trail: u8) -> bool {
    matches!(lead, 0x81..=0x9F | 0xE0..=0xEF)
        && matches!(trail, 0x40..=0x7E | 0x80..=0xFC)
        && matches!(jis_row(lead, trail), 1..=8 | 16..=84)
}

/// JIS X 0208 row (ku) addressed by a Shift_JIS double-byte sequence.
fn jis_row(lead: u8, trail: u8) -> u8 {
    let base = if lead <= 0x9F { lead - 0x81 } else { lead - 0xC1 };
    base * 2 + if trail >= 0x9F { 2 } else { 1 }
}

fn to_jis_code_points(text: &str) -> String {
    text.chars()
        .map(|c| {
            JIS_CP932_DIVERGENT
                .iter()
                .find_map(|&(cp932, jis)| (cp932 == c).then_some(jis))
                .unwrap_or(c)
        })
        .collect()
}

/// Decode `bytes` with each candidate in order, returning the first success.
///
/// # Errors
///
/// Returns the last candidate's [`DecodeFailure`] when none succeeds. An empty
/// candidate list yields a failure at offset 0.
pub fn decode_bytes(
    bytes: &[u8],
    candidates: &[LegacyEncoding],
) -> Result<(String, LegacyEncoding), DecodeFailure> {
    let mut last_failure = None;
    for (idx, &encoding) in candidates.iter().enumerate() {
        match encoding.decode(bytes) {
            Ok(text) => {
                if idx > 0 {
                    log::debug!("Fell back to {} after {} failed candidate(s)", encoding, idx);
                }
                return Ok((text, encoding));
            }
            Err(failure) => {
                log::debug!("Candidate rejected: {}", failure);
                last_failure = Some(failure);
            }
        }
    }
    Err(last_failure.unwrap_or(DecodeFailure {
        encoding: LegacyEncoding::ShiftJis,
        offset: 0,
        bytes: Vec::new(),
        reason: "no candidate encodings configured",
    }))
}

/// Text decoded from an input file.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// The decoded text.
    pub text: String,
    /// The candidate that decoded it.
    pub encoding: LegacyEncoding,
    /// Size of the input in bytes.
    pub bytes_read: usize,
}

/// Read and decode the file at `path`.
///
/// The file handle is closed before decoding starts.
///
/// # Errors
///
/// - [`DedupeError::Open`] if the file cannot be opened or read
/// - [`DedupeError::Decode`] if no candidate decodes the whole file
/// - [`DedupeError::Config`] if `candidates` is empty
pub fn decode_file(path: &Path, candidates: &[LegacyEncoding]) -> Result<Decoded, DedupeError> {
    if candidates.is_empty() {
        return Err(DedupeError::Config(
            "at least one input encoding candidate is required".to_string(),
        ));
    }

    let bytes = fs::read(path).map_err(|source| DedupeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Read {} bytes from {}", bytes.len(), path.display());

    let (text, encoding) = decode_bytes(&bytes, candidates).map_err(|failure| {
        DedupeError::Decode {
            path: path.to_path_buf(),
            tried: candidate_names(candidates),
            detail: failure.to_string(),
        }
    })?;
    log::info!("Decoded {} as {}", path.display(), encoding);

    Ok(Decoded {
        text,
        encoding,
        bytes_read: bytes.len(),
    })
}

/// Comma-separated candidate names for messages.
#[must_use]
pub fn candidate_names(candidates: &[LegacyEncoding]) -> String {
    candidates
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_ascii_passthrough() {
        let (text, used) = decode_bytes(b"a,b\r\nc,d\r\n", DEFAULT_CANDIDATES).unwrap();
        assert_eq!(text, "a,b\r\nc,d\r\n");
        assert_eq!(used, LegacyEncoding::ShiftJis);
    }

    #[test]
    fn test_shift_jis_kanji_and_katakana() {
        // "日本" + half-width "ｱ"
        let bytes = [0x93, 0xFA, 0x96, 0x7B, 0xB1];
        let text = LegacyEncoding::ShiftJis.decode(&bytes).unwrap();
        assert_eq!(text, "日本ｱ");
    }

    #[test]
    fn test_nec_row13_requires_cp932() {
        let bytes = [0x87, 0x40];
        let err = LegacyEncoding::ShiftJis.decode(&bytes).unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.reason, "character outside JIS X 0208");

        assert_eq!(LegacyEncoding::Cp932.decode(&bytes).unwrap(), "①");
    }

    #[test]
    fn test_ibm_extension_requires_cp932() {
        // 0xFA40 is small roman numeral one in CP932
        let bytes = [b'x', 0xFA, 0x40];
        let err = LegacyEncoding::ShiftJis.decode(&bytes).unwrap_err();
        assert_eq!(err.offset, 1);
        assert_eq!(err.bytes, vec![0xFA]);

        let (text, used) = decode_bytes(&bytes, DEFAULT_CANDIDATES).unwrap();
        assert_eq!(text, "x\u{2170}");
        assert_eq!(used, LegacyEncoding::Cp932);
    }

    #[test]
    fn test_divergent_code_points_first_candidate_wins() {
        let bytes = [0x81, 0x60];
        let jis = LegacyEncoding::ShiftJis.decode(&bytes).unwrap();
        let cp932 = LegacyEncoding::Cp932.decode(&bytes).unwrap();
        assert_eq!(jis, "\u{301C}");
        assert_eq!(cp932, "\u{FF5E}");

        let (text, used) = decode_bytes(&bytes, DEFAULT_CANDIDATES).unwrap();
        assert_eq!(text, jis);
        assert_eq!(used, LegacyEncoding::ShiftJis);

        let reversed = [LegacyEncoding::Cp932, LegacyEncoding::ShiftJis];
        let (text, used) = decode_bytes(&bytes, &reversed).unwrap();
        assert_eq!(text, cp932);
        assert_eq!(used, LegacyEncoding::Cp932);
    }

    #[test]
    fn test_undecodable_by_both_reports_last_failure() {
        let bytes = [b'a', b',', 0x81, 0x20];
        let err = decode_bytes(&bytes, DEFAULT_CANDIDATES).unwrap_err();
        assert_eq!(err.encoding, LegacyEncoding::Cp932);
        assert_eq!(err.offset, 2);
        assert!(err.to_string().contains("0x81"));
    }

    #[test]
    fn test_cp932_single_byte_private_use() {
        let bytes = [b'a', 0xA0, 0xFD, b',', 0xFE, 0xFF];
        assert!(LegacyEncoding::ShiftJis.decode(&bytes).is_err());

        let (text, used) = decode_bytes(&bytes, DEFAULT_CANDIDATES).unwrap();
        assert_eq!(text, "a\u{F8F0}\u{F8F1},\u{F8F2}\u{F8F3}");
        assert_eq!(used, LegacyEncoding::Cp932);
    }

    #[test]
    fn test_cp932_single_byte_after_double_byte() {
        // "日" then 0xFF
        let text = LegacyEncoding::Cp932.decode(&[0x93, 0xFA, 0xFF]).unwrap();
        assert_eq!(text, "日\u{F8F3}");
    }

    #[test]
    fn test_is_jis_x0208_pair() {
        assert!(is_jis_x0208_pair(0x93, 0xFA));
        assert!(is_jis_x0208_pair(0x81, 0x60));
        assert!(!is_jis_x0208_pair(0x87, 0x40));
        assert!(!is_jis_x0208_pair(0xFA, 0x40));
        assert!(!is_jis_x0208_pair(0xF0, 0x40));
    }

    #[test]
    fn test_truncated_lead_byte() {
        let bytes = [b'a', 0x81];
        let err = LegacyEncoding::ShiftJis.decode(&bytes).unwrap_err();
        assert_eq!(err.offset, 1);
        assert_eq!(err.reason, "truncated double-byte character");
        assert!(LegacyEncoding::Cp932.decode(&bytes).is_err());
    }

    #[test]
    fn test_byte_0x80_only_in_cp932() {
        assert!(LegacyEncoding::ShiftJis.decode(&[0x80]).is_err());
        assert_eq!(LegacyEncoding::Cp932.decode(&[0x80]).unwrap(), "\u{80}");
    }

    #[test]
    fn test_empty_candidates() {
        let err = decode_bytes(b"abc", &[]).unwrap_err();
        assert_eq!(err.reason, "no candidate encodings configured");
    }

    #[test]
    fn test_jis_row() {
        assert_eq!(jis_row(0x81, 0x40), 1);
        assert_eq!(jis_row(0x81, 0x9F), 2);
        assert_eq!(jis_row(0x87, 0x40), 13);
        assert_eq!(jis_row(0x88, 0x9F), 16);
        assert_eq!(jis_row(0xEA, 0xA4), 84);
        assert_eq!(jis_row(0xED, 0x40), 89);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(LegacyEncoding::from_label("SJIS"), Some(LegacyEncoding::ShiftJis));
        assert_eq!(LegacyEncoding::from_label("shift_jis"), Some(LegacyEncoding::ShiftJis));
        assert_eq!(LegacyEncoding::from_label("CP932"), Some(LegacyEncoding::Cp932));
        assert_eq!(LegacyEncoding::from_label("MS_Kanji"), Some(LegacyEncoding::Cp932));
        assert_eq!(LegacyEncoding::from_label("utf-8"), None);
    }

    #[test]
    fn test_decode_file_missing() {
        let dir = tempdir().unwrap();
        let result = decode_file(&dir.path().join("missing.csv"), DEFAULT_CANDIDATES);
        assert!(matches!(result, Err(DedupeError::Open { .. })));
    }

    #[test]
    fn test_decode_file_reports_candidates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, [b'x', 0x81]).unwrap();

        let err = decode_file(&path, DEFAULT_CANDIDATES).unwrap_err();
        match &err {
            DedupeError::Decode { tried, .. } => assert_eq!(tried, "shift_jis, cp932"),
            other => panic!("Expected Decode error, got {:?}", other),
        }
        assert!(err.to_string().contains("bad.csv"));
    }

    #[test]
    fn test_decode_file_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.csv");
        fs::write(&path, [0x93, 0xFA, b',', b'1']).unwrap();

        let decoded = decode_file(&path, DEFAULT_CANDIDATES).unwrap();
        assert_eq!(decoded.text, "日,1");
        assert_eq!(decoded.encoding, LegacyEncoding::ShiftJis);
        assert_eq!(decoded.bytes_read, 4);
    }

    #[test]
    fn test_decode_file_empty_candidates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.csv");
        fs::write(&path, b"a").unwrap();
        assert!(matches!(
            decode_file(&path, &[]),
            Err(DedupeError::Config(_))
        ));
    }
}
