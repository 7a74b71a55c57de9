//! Heuristic text-encoding and line-ending detection over a bounded byte prefix.
//!
//! The results are advisory: nothing else in the crate changes behavior based
//! on them. Only the first [`PREFIX_LEN`] bytes of a file are inspected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading bytes inspected per file.
pub const PREFIX_LEN: usize = 4096;

/// Bytes to read for [`sniff`]: the window plus one, which tells whether the
/// file continues past it.
pub const SAMPLE_LEN: usize = PREFIX_LEN + 1;

/// End-of-line convention found in a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EolKind {
    None,
    Lf,
    Crlf,
    Cr,
    Mixed,
}

impl EolKind {
    pub fn label(self) -> &'static str {
        match self {
            EolKind::None => "None",
            EolKind::Lf => "LF",
            EolKind::Crlf => "CRLF",
            EolKind::Cr => "CR",
            EolKind::Mixed => "Mixed",
        }
    }
}

impl fmt::Display for EolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Character encoding guessed for a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingKind {
    Utf8Bom,
    Utf16Be,
    Utf16Le,
    Ascii,
    Utf8,
    ShiftJis,
    /// Weak guess: only a byte-range check backs it.
    EucJpGuess,
    Unknown,
}

impl EncodingKind {
    pub fn label(self) -> &'static str {
        match self {
            EncodingKind::Utf8Bom => "UTF-8 (BOM)",
            EncodingKind::Utf16Be => "UTF-16 BE",
            EncodingKind::Utf16Le => "UTF-16 LE",
            EncodingKind::Ascii => "ASCII",
            EncodingKind::Utf8 => "UTF-8",
            EncodingKind::ShiftJis => "Shift_JIS",
            EncodingKind::EucJpGuess => "EUC-JP?",
            EncodingKind::Unknown => "Unknown",
        }
    }

    /// `false` for the low-confidence outcomes.
    pub fn is_confident(self) -> bool {
        !matches!(self, EncodingKind::EucJpGuess | EncodingKind::Unknown)
    }
}

impl fmt::Display for EncodingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw line-ending counters. A CRLF pair is counted once, never as a lone CR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EolCounts {
    pub cr: usize,
    pub lf: usize,
    pub crlf: usize,
}

impl EolCounts {
    pub fn scan(bytes: &[u8]) -> Self {
        let mut counts = Self::default();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                    counts.crlf += 1;
                    i += 1;
                }
                b'\r' => counts.cr += 1,
                b'\n' => counts.lf += 1,
                _ => {}
            }
            i += 1;
        }
        counts
    }

    /// The kind with the strictly greatest count, `Mixed` on a tie, `None` when empty.
    pub fn classify(&self) -> EolKind {
        let Self { cr, lf, crlf } = *self;
        if cr == 0 && lf == 0 && crlf == 0 {
            EolKind::None
        } else if crlf > lf && crlf > cr {
            EolKind::Crlf
        } else if lf > crlf && lf > cr {
            EolKind::Lf
        } else if cr > crlf && cr > lf {
            EolKind::Cr
        } else {
            EolKind::Mixed
        }
    }
}

/// Outcome of sniffing one prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub encoding: EncodingKind,
    pub eol: EolKind,
    pub counts: EolCounts,
}

/// Classifies line endings and encoding of a file sample.
///
/// Only the first [`PREFIX_LEN`] bytes are inspected. A longer sample (see
/// [`SAMPLE_LEN`]) marks the window as cut from a longer file.
pub fn sniff(sample: &[u8]) -> Detection {
    let truncated = sample.len() > PREFIX_LEN;
    let prefix = &sample[..sample.len().min(PREFIX_LEN)];
    let counts = EolCounts::scan(prefix);
    Detection {
        encoding: detect_encoding(prefix, truncated),
        eol: counts.classify(),
        counts,
    }
}

/// Ordered cascade; the first matching rule wins. `truncated` says the file
/// continues past `prefix`.
pub fn detect_encoding(prefix: &[u8], truncated: bool) -> EncodingKind {
    if prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return EncodingKind::Utf8Bom;
    }
    if prefix.starts_with(&[0xFE, 0xFF]) {
        return EncodingKind::Utf16Be;
    }
    if prefix.starts_with(&[0xFF, 0xFE]) {
        return EncodingKind::Utf16Le;
    }
    if prefix.is_ascii() {
        return EncodingKind::Ascii;
    }
    if is_utf8(prefix, truncated) {
        return EncodingKind::Utf8;
    }
    if looks_like_shift_jis(prefix) {
        return EncodingKind::ShiftJis;
    }
    if prefix.iter().any(|b| (0xA1..=0xFE).contains(b)) {
        return EncodingKind::EucJpGuess;
    }
    EncodingKind::Unknown
}

/// Strict UTF-8 validation.
///
/// When the file continues past the prefix, a multi-byte sequence that is
/// merely incomplete at the very end is accepted.
fn is_utf8(prefix: &[u8], truncated: bool) -> bool {
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(e) => truncated && e.error_len().is_none(),
    }
}

fn is_sjis_lead(b: u8) -> bool {
    (0x81..=0x9F).contains(&b) || (0xE0..=0xFC).contains(&b)
}

fn is_sjis_trail(b: u8) -> bool {
    (0x40..=0x7E).contains(&b) || (0x80..=0xFC).contains(&b)
}

fn looks_like_shift_jis(prefix: &[u8]) -> bool {
    let mut pairs = 0usize;
    let mut i = 0;
    while i < prefix.len() {
        let b = prefix[i];
        if is_sjis_lead(b) {
            let Some(&trail) = prefix.get(i + 1) else {
                // Lead byte cut off by the prefix boundary.
                break;
            };
            if !is_sjis_trail(trail) {
                return false;
            }
            pairs += 1;
            i += 2;
            continue;
        }
        if b >= 0xFD {
            return false;
        }
        i += 1;
    }
    pairs > 0
}
