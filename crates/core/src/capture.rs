//! Turning captured log text back into storage bytes.
//!
//! Trace logs carry record values in one of three shapes (see
//! [`CaptureEncoding`]). Malformed input never aborts: every problem becomes
//! a `buffer-encoding` diagnostic and the offending characters are passed
//! through as best they can be, so field offsets stay aligned.

use crate::diag_util::{ctx, diag};
use copylens_diagnostics::{Diagnostic, codes};
use copylens_profile::CaptureEncoding;

/// Replacement byte for characters with no single-byte form.
const SUBSTITUTE: u8 = b'?';

/// Storage bytes recovered from captured text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// The recovered bytes.
    pub bytes: Vec<u8>,
    /// One `buffer-encoding` diagnostic per problem found.
    pub diagnostics: Vec<Diagnostic>,
}

/// Convert captured text to storage bytes.
///
/// ```
/// use copylens_core::capture::normalize_capture;
/// use copylens_profile::CaptureEncoding;
///
/// let c = normalize_capture("AB_12", CaptureEncoding::Escaped { indicator: '_' });
/// assert_eq!(c.bytes, vec![b'A', b'B', 0x12]);
/// assert!(c.diagnostics.is_empty());
/// ```
pub fn normalize_capture(captured: &str, encoding: CaptureEncoding) -> Capture {
    let mut problems = Vec::new();
    let bytes = match encoding {
        CaptureEncoding::Raw => latin1(captured, &mut problems),
        CaptureEncoding::Hex => hex(captured, &mut problems),
        CaptureEncoding::Escaped { indicator } => escaped(captured, indicator, &mut problems),
    };
    let diagnostics: Vec<Diagnostic> = problems
        .into_iter()
        .map(|(offset, message)| {
            diag(codes::BUFFER_ENCODING, message, None).with_context(ctx!(
                "encoding" => encoding_name(encoding),
                "offset" => offset.to_string(),
            ))
        })
        .collect();
    if !diagnostics.is_empty() {
        tracing::debug!(
            problems = diagnostics.len(),
            bytes = bytes.len(),
            "captured text did not match its encoding"
        );
    }
    Capture { bytes, diagnostics }
}

fn encoding_name(encoding: CaptureEncoding) -> &'static str {
    match encoding {
        CaptureEncoding::Raw => "raw",
        CaptureEncoding::Hex => "hex",
        CaptureEncoding::Escaped { .. } => "escaped",
    }
}

fn latin1_byte(offset: usize, c: char, problems: &mut Vec<(usize, String)>) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or_else(|_| {
        problems.push((
            offset,
            format!("character U+{:04X} has no single-byte form", u32::from(c)),
        ));
        SUBSTITUTE
    })
}

/// One byte per character, ISO-8859-1.
fn latin1(captured: &str, problems: &mut Vec<(usize, String)>) -> Vec<u8> {
    captured
        .char_indices()
        .map(|(offset, c)| latin1_byte(offset, c, problems))
        .collect()
}

fn hex_value(c: u8) -> Option<u8> {
    char::from(c).to_digit(16).and_then(|d| u8::try_from(d).ok())
}

/// Two hex digits per byte; whitespace between pairs is ignored.
fn hex(captured: &str, problems: &mut Vec<(usize, String)>) -> Vec<u8> {
    let digits: Vec<(usize, u8)> = captured
        .bytes()
        .enumerate()
        .filter(|(_, b)| !b.is_ascii_whitespace())
        .collect();
    let mut out = Vec::with_capacity(digits.len() / 2);
    let mut pairs = digits.chunks_exact(2);
    for pair in &mut pairs {
        let (offset, h1) = pair[0];
        let (_, h2) = pair[1];
        match (hex_value(h1), hex_value(h2)) {
            (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
            _ => {
                problems.push((
                    offset,
                    format!(
                        "invalid hex pair `{}{}` (expected two hex digits 0-9, A-F)",
                        char::from(h1),
                        char::from(h2)
                    ),
                ));
                out.push(SUBSTITUTE);
            }
        }
    }
    if let [(offset, _)] = pairs.remainder() {
        problems.push((*offset, "odd number of hex digits; last digit ignored".into()));
    }
    out
}

/// Printable characters verbatim, `<indicator>XX` for any other byte.
///
/// Invalid or truncated escapes are copied through unchanged.
fn escaped(captured: &str, indicator: char, problems: &mut Vec<(usize, String)>) -> Vec<u8> {
    let mut out = Vec::with_capacity(captured.len());
    let mut chars = captured.char_indices();
    while let Some((offset, c)) = chars.next() {
        if c != indicator {
            out.push(latin1_byte(offset, c, problems));
            continue;
        }
        let h1 = chars.next();
        let h2 = chars.next();
        match (h1, h2) {
            (Some((at_a, a)), Some((at_b, b))) => match (a.to_digit(16), b.to_digit(16)) {
                (Some(hi), Some(lo)) => out.push(u8::try_from((hi << 4) | lo).unwrap_or(SUBSTITUTE)),
                _ => {
                    problems.push((
                        offset,
                        format!(
                            "invalid escape sequence {indicator}{a}{b} (expected two hex digits 0-9, A-F after '{indicator}')"
                        ),
                    ));
                    out.push(latin1_byte(offset, indicator, problems));
                    out.push(latin1_byte(at_a, a, problems));
                    out.push(latin1_byte(at_b, b, problems));
                }
            },
            (first, _) => {
                problems.push((
                    offset,
                    format!(
                        "incomplete escape sequence at offset {offset} (expected '{indicator}XX' but input ends)"
                    ),
                ));
                out.push(latin1_byte(offset, indicator, problems));
                if let Some((o, a)) = first {
                    out.push(latin1_byte(o, a, problems));
                }
            }
        }
    }
    out
}
