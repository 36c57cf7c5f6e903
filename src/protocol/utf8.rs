//! UTF-8 encoding, decoding and validation (RFC 3629).
//!
//! Text payloads and close reasons must be well-formed UTF-8. Everything in
//! this module is built on a single decoding step so that one-shot validation,
//! incremental validation of fragmented messages and full decoding to code
//! points all agree on what is accepted.

use crate::error::{Error, Result};

/// Largest Unicode scalar value.
pub const MAX_CODE_POINT: u32 = 0x10FFFF;

/// Number of bytes needed to encode `cp` as UTF-8.
///
/// Returns `None` for surrogates (0xD800-0xDFFF) and values above
/// [`MAX_CODE_POINT`].
#[must_use]
pub const fn estimate_size(cp: u32) -> Option<usize> {
    match cp {
        0x0000..=0x007F => Some(1),
        0x0080..=0x07FF => Some(2),
        0xD800..=0xDFFF => None,
        0x0800..=0xFFFF => Some(3),
        0x1_0000..=MAX_CODE_POINT => Some(4),
        _ => None,
    }
}

/// Append the UTF-8 encoding of `cp` to `out`.
///
/// Invalid code points produce no output.
pub fn encode(cp: u32, out: &mut Vec<u8>) {
    debug_assert!(estimate_size(cp).is_some(), "invalid code point {cp:#x}");

    match estimate_size(cp) {
        Some(1) => out.push(cp as u8),
        Some(2) => out.extend_from_slice(&[0xC0 | (cp >> 6) as u8, continuation(cp)]),
        Some(3) => out.extend_from_slice(&[
            0xE0 | (cp >> 12) as u8,
            continuation(cp >> 6),
            continuation(cp),
        ]),
        Some(_) => out.extend_from_slice(&[
            0xF0 | (cp >> 18) as u8,
            continuation(cp >> 12),
            continuation(cp >> 6),
            continuation(cp),
        ]),
        None => {}
    }
}

#[inline]
const fn continuation(bits: u32) -> u8 {
    0x80 | (bits & 0x3F) as u8
}

/// Input accepted by [`serialize`].
///
/// Implementors yield raw code points; validity is checked by the caller.
/// Byte slices treat every byte as one code point (U+0000-U+00FF). `u16`
/// slices are UTF-16: a surrogate pair yields one code point and a lone
/// surrogate is yielded as-is, which [`serialize`] then rejects.
pub trait CodeUnits {
    /// Feed each code point to `visit` in order, stopping as soon as it
    /// returns `false`. Returns whether every code point was visited.
    fn visit_code_points(&self, visit: &mut dyn FnMut(u32) -> bool) -> bool;
}

impl CodeUnits for u32 {
    fn visit_code_points(&self, visit: &mut dyn FnMut(u32) -> bool) -> bool {
        visit(*self)
    }
}

impl CodeUnits for char {
    fn visit_code_points(&self, visit: &mut dyn FnMut(u32) -> bool) -> bool {
        visit(u32::from(*self))
    }
}

impl CodeUnits for [u8] {
    fn visit_code_points(&self, visit: &mut dyn FnMut(u32) -> bool) -> bool {
        self.iter().all(|&byte| visit(u32::from(byte)))
    }
}

impl CodeUnits for [u16] {
    fn visit_code_points(&self, visit: &mut dyn FnMut(u32) -> bool) -> bool {
        char::decode_utf16(self.iter().copied()).all(|unit| {
            let cp = match unit {
                Ok(c) => u32::from(c),
                Err(lone) => u32::from(lone.unpaired_surrogate()),
            };
            visit(cp)
        })
    }
}

impl CodeUnits for [u32] {
    fn visit_code_points(&self, visit: &mut dyn FnMut(u32) -> bool) -> bool {
        self.iter().all(|&cp| visit(cp))
    }
}

impl CodeUnits for str {
    fn visit_code_points(&self, visit: &mut dyn FnMut(u32) -> bool) -> bool {
        self.chars().all(|c| visit(u32::from(c)))
    }
}

/// Encode `input` as UTF-8, appending to `out`.
///
/// Stops at the first invalid code point and returns `false`; only the valid
/// prefix has been appended by then. With `out = None` the input is only
/// validated.
///
/// ```
/// use wsync::protocol::utf8::serialize;
///
/// let mut out = b"test".to_vec();
/// assert!(serialize(&[0x00u8, 0xFF][..], Some(&mut out)));
/// assert_eq!(out, b"test\x00\xC3\xBF");
///
/// assert!(!serialize(&0xDFFFu32, None));
/// ```
pub fn serialize<T: CodeUnits + ?Sized>(input: &T, mut out: Option<&mut Vec<u8>>) -> bool {
    input.visit_code_points(&mut |cp| {
        if estimate_size(cp).is_none() {
            return false;
        }
        if let Some(out) = out.as_deref_mut() {
            encode(cp, out);
        }
        true
    })
}

/// Decode UTF-8 `bytes` into code points, appending to `out`.
///
/// Rejects invalid lead bytes, missing or bad continuation bytes, overlong
/// forms, surrogates and values above [`MAX_CODE_POINT`]. Returns `false` at
/// the first malformed sequence; code points decoded before it stay in `out`.
pub fn deserialize(bytes: &[u8], mut out: Option<&mut Vec<u32>>) -> bool {
    let mut pos = 0;
    while pos < bytes.len() {
        match decode_one(&bytes[pos..]) {
            Step::Char(cp, len) => {
                if let Some(out) = out.as_deref_mut() {
                    out.push(cp);
                }
                pos += len;
            }
            Step::Truncated | Step::Invalid => return false,
        }
    }
    true
}

/// Validate that a byte slice is valid UTF-8.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    match complete_prefix(data) {
        (len, Step::Char(..)) if len == data.len() => Ok(()),
        _ => Err(Error::InvalidUtf8),
    }
}

/// Incremental UTF-8 validator for fragmented WebSocket messages.
///
/// Handles validation across fragment boundaries, saving incomplete
/// multi-byte sequences for continuation in the next fragment.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    pending: [u8; 4],
    pending_len: usize,
}

impl Utf8Validator {
    /// Create a new UTF-8 validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a fragment of UTF-8 data.
    ///
    /// For non-final fragments (`is_final = false`), an incomplete multi-byte
    /// sequence at the end is saved for the next fragment. For final
    /// fragments all bytes must form complete sequences.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` if the data contains invalid UTF-8
    /// sequences. The validator is reset on error.
    pub fn validate(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        let mut rest = data;

        if self.pending_len > 0 {
            let held = self.pending_len;
            let take = (4 - held).min(rest.len());
            let mut joined = self.pending;
            joined[held..held + take].copy_from_slice(&rest[..take]);

            match decode_one(&joined[..held + take]) {
                Step::Char(_, len) => {
                    rest = &rest[len - held..];
                    self.pending_len = 0;
                }
                Step::Truncated if !is_final => {
                    self.pending = joined;
                    self.pending_len = held + take;
                    return Ok(());
                }
                Step::Truncated | Step::Invalid => return self.fail(),
            }
        }

        let (valid, step) = complete_prefix(rest);
        match step {
            Step::Char(..) => Ok(()),
            Step::Truncated if !is_final => {
                let tail = &rest[valid..];
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len();
                Ok(())
            }
            Step::Truncated | Step::Invalid => self.fail(),
        }
    }

    fn fail(&mut self) -> Result<()> {
        self.reset();
        Err(Error::InvalidUtf8)
    }

    /// Reset the validator state, discarding any incomplete sequences.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    /// Check if there are pending incomplete bytes.
    pub fn has_incomplete(&self) -> bool {
        self.pending_len > 0
    }
}

/// Outcome of decoding one sequence at the start of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// A complete scalar value and its encoded length.
    Char(u32, usize),
    /// A valid prefix of a sequence that needs more bytes.
    Truncated,
    /// Not a prefix of any well-formed sequence.
    Invalid,
}

/// Decode the sequence at the start of a non-empty buffer.
fn decode_one(bytes: &[u8]) -> Step {
    let lead = bytes[0];

    // Second-byte ranges exclude overlongs, surrogates and values past U+10FFFF.
    let (len, mut cp, lo, hi) = match lead {
        0x00..=0x7F => return Step::Char(u32::from(lead), 1),
        0xC2..=0xDF => (2, u32::from(lead & 0x1F), 0x80, 0xBF),
        0xE0 => (3, u32::from(lead & 0x0F), 0xA0, 0xBF),
        0xE1..=0xEC | 0xEE..=0xEF => (3, u32::from(lead & 0x0F), 0x80, 0xBF),
        0xED => (3, u32::from(lead & 0x0F), 0x80, 0x9F),
        0xF0 => (4, u32::from(lead & 0x07), 0x90, 0xBF),
        0xF1..=0xF3 => (4, u32::from(lead & 0x07), 0x80, 0xBF),
        0xF4 => (4, u32::from(lead & 0x07), 0x80, 0x8F),
        _ => return Step::Invalid,
    };

    for i in 1..len {
        let Some(&byte) = bytes.get(i) else {
            return Step::Truncated;
        };
        let (lo, hi) = if i == 1 { (lo, hi) } else { (0x80, 0xBF) };
        if !(lo..=hi).contains(&byte) {
            return Step::Invalid;
        }
        cp = (cp << 6) | u32::from(byte & 0x3F);
    }

    Step::Char(cp, len)
}

/// Scan `bytes`, returning the length of the well-formed prefix and how the
/// scan ended. A `Step::Char` outcome means the whole buffer was consumed.
fn complete_prefix(bytes: &[u8]) -> (usize, Step) {
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos].is_ascii() {
            pos += 1;
            continue;
        }
        match decode_one(&bytes[pos..]) {
            Step::Char(_, len) => pos += len,
            stop => return (pos, stop),
        }
    }
    (pos, Step::Char(0, 0))
}
