//! Output encodings.
//!
//! An [`OutputEncoding`] is resolved from a user-supplied label and turns
//! text into bytes, failing on the first character the target cannot
//! represent instead of substituting it.
//!
//! `shift_jis` and `cp932` are distinct targets, mirroring the input side:
//! `shift_jis` only writes JIS X 0201 and JIS X 0208 characters, so its
//! output always decodes back with the strict `shift_jis` decoder, while
//! `cp932` also writes the NEC and IBM extensions and the Private Use Area.

use std::fmt;

use encoding_rs::{EncoderResult, Encoding, EUC_JP, ISO_2022_JP, SHIFT_JIS};
use thiserror::Error;

use crate::decode::{is_jis_x0208_pair, CP932_SINGLE_BYTE_PUA, JIS_CP932_DIVERGENT};

/// Label used when no output encoding is configured.
pub const DEFAULT_OUTPUT_LABEL: &str = "utf-8";

const SHIFT_JIS_NAME: &str = "Shift_JIS";
const CP932_NAME: &str = "CP932";

/// A character the output encoding cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("character {ch:?} (U+{:04X}) is not representable in {encoding}", code_point(.ch))]
pub struct EncodeFailure {
    /// The offending character.
    pub ch: char,
    /// Byte offset of the character in the UTF-8 source text.
    pub offset: usize,
    /// Name of the output encoding.
    pub encoding: String,
}

fn code_point(ch: &char) -> u32 {
    u32::from(*ch)
}

/// Target encoding for the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    /// UTF-8, optionally preceded by a byte order mark.
    Utf8 { bom: bool },
    /// UTF-16 little-endian, optionally preceded by a byte order mark.
    Utf16Le { bom: bool },
    /// UTF-16 big-endian, without a byte order mark.
    Utf16Be,
    /// Shift_JIS limited to JIS X 0201 and JIS X 0208.
    ShiftJis,
    /// Microsoft code page 932 (Windows-31J).
    Cp932,
    /// Any other encoding with an `encoding_rs` encoder.
    Legacy(&'static Encoding),
}

impl Default for OutputEncoding {
    fn default() -> Self {
        Self::Utf8 { bom: false }
    }
}

impl OutputEncoding {
    /// Resolve an encoding label, case-insensitively.
    ///
    /// Besides the WHATWG labels known to `encoding_rs`, accepts `utf-8-sig`,
    /// `utf-16` (little-endian with BOM), `cp932` and `ms932`. The WHATWG
    /// labels of Windows-31J other than `shift_jis` and `sjis` resolve to
    /// [`OutputEncoding::Cp932`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sjis_dedupe::encode::OutputEncoding;
    ///
    /// assert_eq!(OutputEncoding::from_label("UTF8"), Some(OutputEncoding::Utf8 { bom: false }));
    /// assert_eq!(OutputEncoding::from_label("sjis"), Some(OutputEncoding::ShiftJis));
    /// assert_eq!(OutputEncoding::from_label("windows-31j"), Some(OutputEncoding::Cp932));
    /// assert_eq!(OutputEncoding::from_label("klingon"), None);
    /// ```
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" => return Some(Self::Utf8 { bom: false }),
            "utf-8-sig" | "utf8-sig" => return Some(Self::Utf8 { bom: true }),
            "utf-16" | "utf16" => return Some(Self::Utf16Le { bom: true }),
            "utf-16le" | "utf16le" => return Some(Self::Utf16Le { bom: false }),
            "utf-16be" | "utf16be" => return Some(Self::Utf16Be),
            "shift-jis" | "shiftjis" | "sjis" | "s-jis" | "csshiftjis" => {
                return Some(Self::ShiftJis)
            }
            "cp932" | "ms932" | "mskanji" => return Some(Self::Cp932),
            _ => {}
        }

        let encoding = Encoding::for_label_no_replacement(normalized.as_bytes())?;
        if encoding == encoding_rs::UTF_8 {
            Some(Self::Utf8 { bom: false })
        } else if encoding == encoding_rs::UTF_16LE {
            Some(Self::Utf16Le { bom: false })
        } else if encoding == encoding_rs::UTF_16BE {
            Some(Self::Utf16Be)
        } else if encoding == SHIFT_JIS {
            Some(Self::Cp932)
        } else if encoding.output_encoding() == encoding {
            Some(Self::Legacy(encoding))
        } else {
            None
        }
    }

    /// Human-readable name of the encoding.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 { bom: false } => "UTF-8",
            Self::Utf8 { bom: true } => "UTF-8 (BOM)",
            Self::Utf16Le { bom: true } => "UTF-16",
            Self::Utf16Le { bom: false } => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::ShiftJis => SHIFT_JIS_NAME,
            Self::Cp932 => CP932_NAME,
            Self::Legacy(encoding) => encoding.name(),
        }
    }

    /// Byte order mark written once at the start of a non-empty file.
    #[must_use]
    pub fn bom(&self) -> &'static [u8] {
        match self {
            Self::Utf8 { bom: true } => &[0xEF, 0xBB, 0xBF],
            Self::Utf16Le { bom: true } => &[0xFF, 0xFE],
            _ => &[],
        }
    }

    /// Encode `text`, without byte order mark.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeFailure`] for the first character the encoding
    /// cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodeFailure> {
        match self {
            Self::Utf8 { .. } => Ok(text.as_bytes().to_vec()),
            Self::Utf16Le { .. } => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Self::ShiftJis => encode_shift_jis(text),
            Self::Cp932 => encode_cp932(text),
            Self::Legacy(encoding) => encode_legacy(*encoding, text),
        }
    }

    /// Whether every character of `text` can be represented.
    #[must_use]
    pub fn can_encode(&self, text: &str) -> bool {
        self.encode(text).is_ok()
    }
}

impl fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strict Shift_JIS, one character at a time.
///
/// The CP932 forms of the divergent symbols are rejected because strict
/// decoding would turn their bytes into the JIS forms.
fn encode_shift_jis(text: &str) -> Result<Vec<u8>, EncodeFailure> {
    let mut encoder = SHIFT_JIS.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut utf8 = [0u8; 4];

    for (offset, ch) in text.char_indices() {
        let unmappable = || EncodeFailure {
            ch,
            offset,
            encoding: SHIFT_JIS_NAME.to_string(),
        };
        if is_cp932_form(ch) {
            return Err(unmappable());
        }

        let start = out.len();
        out.reserve(4);
        let folded = to_cp932_form(ch).encode_utf8(&mut utf8);
        let (result, _) = encoder.encode_from_utf8_to_vec_without_replacement(folded, &mut out, false);
        if !matches!(result, EncoderResult::InputEmpty) {
            return Err(unmappable());
        }

        let in_jis = match out[start..] {
            [byte] => matches!(byte, 0x00..=0x7F | 0xA1..=0xDF),
            [lead, trail] => is_jis_x0208_pair(lead, trail),
            _ => false,
        };
        if !in_jis {
            return Err(unmappable());
        }
    }
    Ok(out)
}

/// CP932: the WHATWG Shift_JIS encoder plus the Private Use Area mappings it
/// leaves out.
fn encode_cp932(text: &str) -> Result<Vec<u8>, EncodeFailure> {
    let mut out = Vec::with_capacity(text.len());
    let mut run_start = 0;

    let encode_run = |out: &mut Vec<u8>, start: usize, end: usize| {
        let bytes = encode_legacy(SHIFT_JIS, &text[start..end]).map_err(|f| EncodeFailure {
            offset: f.offset + start,
            encoding: CP932_NAME.to_string(),
            ..f
        })?;
        out.extend_from_slice(&bytes);
        Ok::<(), EncodeFailure>(())
    };

    for (offset, ch) in text.char_indices() {
        let mut private_use = Vec::new();
        if push_cp932_private_use(ch, &mut private_use) {
            encode_run(&mut out, run_start, offset)?;
            out.extend_from_slice(&private_use);
            run_start = offset + ch.len_utf8();
        }
    }
    encode_run(&mut out, run_start, text.len())?;
    Ok(out)
}

/// Append the CP932 bytes of a Private Use Area character.
///
/// Returns `false`, appending nothing, for any other character.
fn push_cp932_private_use(ch: char, out: &mut Vec<u8>) -> bool {
    if let Some(&(byte, _)) = CP932_SINGLE_BYTE_PUA.iter().find(|&&(_, c)| c == ch) {
        out.push(byte);
        return true;
    }

    let cp = u32::from(ch);
    if !(0xE000..=0xE757).contains(&cp) {
        return false;
    }
    // User-defined area, Shift_JIS index pointers 8836..=10715.
    let pointer = cp - 0xE000 + 8836;
    let (lead, trail) = (pointer / 188, pointer % 188);
    let lead_offset = if lead < 0x1F { 0x81 } else { 0xC1 };
    let trail_offset = if trail < 0x3F { 0x40 } else { 0x41 };
    out.push((lead + lead_offset) as u8);
    out.push((trail + trail_offset) as u8);
    true
}

fn encode_legacy(encoding: &'static Encoding, text: &str) -> Result<Vec<u8>, EncodeFailure> {
    // JIS X 0208 code points have no encoder mapping; write their CP932 twins.
    let uses_jis0208 = encoding == SHIFT_JIS || encoding == EUC_JP || encoding == ISO_2022_JP;
    let folded;
    let source = if uses_jis0208 {
        folded = text.chars().map(to_cp932_form).collect::<String>();
        folded.as_str()
    } else {
        text
    };

    let mut encoder = encoding.new_encoder();
    let capacity = encoder
        .max_buffer_length_from_utf8_without_replacement(source.len())
        .unwrap_or(source.len().saturating_mul(4));
    let mut out = Vec::with_capacity(capacity);

    let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(source, &mut out, true);
    match result {
        EncoderResult::InputEmpty => Ok(out),
        EncoderResult::Unmappable(ch) => {
            // Folding is one char for one char, so locate by char index and
            // report the character the caller passed in.
            let folded_offset = read.saturating_sub(ch.len_utf8());
            let char_index = source[..folded_offset].chars().count();
            let (offset, original) = text
                .char_indices()
                .nth(char_index)
                .unwrap_or((folded_offset.min(text.len()), ch));
            Err(EncodeFailure {
                ch: original,
                offset,
                encoding: encoding.name().to_string(),
            })
        }
        EncoderResult::OutputFull => Err(EncodeFailure {
            ch: source[read..].chars().next().unwrap_or('\u{FFFD}'),
            offset: read,
            encoding: encoding.name().to_string(),
        }),
    }
}

fn to_cp932_form(c: char) -> char {
    JIS_CP932_DIVERGENT
        .iter()
        .find_map(|&(cp932, jis)| (jis == c).then_some(cp932))
        .unwrap_or(c)
}

fn is_cp932_form(c: char) -> bool {
    JIS_CP932_DIVERGENT.iter().any(|&(cp932, _)| cp932 == c)
}
