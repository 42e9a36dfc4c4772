//! Clause Interpreter: storage clause text → storage semantics and byte width.
//!
//! [`interpret`] is a pure function. Supported clauses come back as a
//! [`ClauseSpec`]; everything else is an [`UnsupportedClause`] carrying the
//! raw text and a best-effort width so the resolver can keep later offsets
//! as accurate as possible.

/// Clause tokenizer.
pub mod lexer;
/// Picture string expansion and classification.
pub mod picture;

use lexer::{TokKind, Token, tokenize};
use picture::PictureShape;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest digit count a supported numeric clause may declare.
pub const MAX_DIGITS: u32 = 38;

/// Storage category of a supported elementary clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageCategory {
    /// One character per byte, trailing spaces are padding.
    Text,
    /// One digit per byte, optional sign overpunch or separate sign byte.
    NumericDisplay,
    /// Two digits per byte plus a trailing sign nibble.
    NumericPacked,
}

/// Where a display numeric keeps its sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignPosition {
    /// Overpunched on the last digit (the default).
    TrailingOverpunch,
    /// Overpunched on the first digit.
    LeadingOverpunch,
    /// A `+`/`-` byte after the digits.
    TrailingSeparate,
    /// A `+`/`-` byte before the digits.
    LeadingSeparate,
}

impl SignPosition {
    fn is_separate(self) -> bool {
        matches!(
            self,
            SignPosition::TrailingSeparate | SignPosition::LeadingSeparate
        )
    }
}

/// Interpreted storage of a supported elementary clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseSpec {
    /// Storage category.
    pub category: StorageCategory,
    /// Character count (text) or digit count (numerics).
    pub length: u32,
    /// Digits right of the implied decimal point.
    pub scale: u32,
    /// Whether the value carries a sign.
    pub signed: bool,
    /// Sign placement for signed display numerics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<SignPosition>,
    /// Physical width in bytes.
    pub width: usize,
}

/// A clause outside the supported subset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported clause `{clause}`: {reason}")]
pub struct UnsupportedClause {
    /// Raw clause text.
    pub clause: String,
    /// Why the clause is unsupported.
    pub reason: String,
    /// Width estimate, if one could be derived.
    pub best_effort_width: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usage {
    Display,
    Packed,
    Binary,
    Float4,
    Float8,
    National,
    Index,
    Pointer,
}

impl Usage {
    fn from_token(tok: &Token<'_>) -> Option<Usage> {
        let word = tok.text.to_ascii_uppercase();
        let usage = match word.as_str() {
            "DISPLAY" => Usage::Display,
            "COMP-3" | "COMPUTATIONAL-3" | "PACKED-DECIMAL" => Usage::Packed,
            "COMP" | "COMPUTATIONAL" | "BINARY" | "COMP-4" | "COMPUTATIONAL-4" | "COMP-5"
            | "COMPUTATIONAL-5" => Usage::Binary,
            "COMP-1" | "COMPUTATIONAL-1" => Usage::Float4,
            "COMP-2" | "COMPUTATIONAL-2" => Usage::Float8,
            "NATIONAL" => Usage::National,
            "INDEX" => Usage::Index,
            "POINTER" => Usage::Pointer,
            _ => return None,
        };
        (tok.kind == TokKind::Word).then_some(usage)
    }

    fn name(self) -> &'static str {
        match self {
            Usage::Display => "DISPLAY",
            Usage::Packed => "COMP-3",
            Usage::Binary => "binary",
            Usage::Float4 => "COMP-1 floating point",
            Usage::Float8 => "COMP-2 floating point",
            Usage::National => "NATIONAL",
            Usage::Index => "INDEX",
            Usage::Pointer => "POINTER",
        }
    }
}

#[derive(Debug, Default)]
struct ClauseParts<'a> {
    picture: Option<&'a str>,
    usage: Option<Usage>,
    sign: Option<SignPosition>,
}

/// Interpret one elementary storage clause.
///
/// ```
/// use copylens_core::clause::{StorageCategory, interpret};
///
/// let spec = interpret("PIC S9(5)V99 COMP-3").unwrap();
/// assert_eq!(spec.category, StorageCategory::NumericPacked);
/// assert_eq!((spec.length, spec.scale, spec.width), (7, 2, 4));
///
/// let err = interpret("COMP-2").unwrap_err();
/// assert_eq!(err.best_effort_width, Some(8));
/// ```
pub fn interpret(clause: &str) -> Result<ClauseSpec, UnsupportedClause> {
    let unsupported = |reason: String, width: Option<usize>| UnsupportedClause {
        clause: clause.to_string(),
        reason,
        best_effort_width: width,
    };

    let parts = split_clause(clause)
        .map_err(|reason| unsupported(reason, salvage_width(clause)))?;
    let usage = parts.usage.unwrap_or(Usage::Display);

    let Some(pic) = parts.picture else {
        let width = match usage {
            Usage::Float4 | Usage::Index | Usage::Pointer => Some(4),
            Usage::Float8 => Some(8),
            _ => None,
        };
        let reason = match usage {
            Usage::Display | Usage::Packed | Usage::Binary | Usage::National => {
                "no picture string".to_string()
            }
            other => format!("{} storage is not decoded", other.name()),
        };
        return Err(unsupported(reason, width));
    };

    let Some(symbols) = picture::parse(pic) else {
        return Err(unsupported(format!("malformed picture string `{pic}`"), None));
    };
    let shape = picture::classify(&symbols);

    match (shape, usage) {
        (PictureShape::Text { length }, Usage::Display) => {
            if parts.sign.is_some() {
                return Err(unsupported(
                    "SIGN clause on a non-numeric picture".into(),
                    Some(length as usize),
                ));
            }
            Ok(ClauseSpec {
                category: StorageCategory::Text,
                length,
                scale: 0,
                signed: false,
                sign: None,
                width: length as usize,
            })
        }
        (
            PictureShape::Numeric {
                digits,
                scale,
                signed,
            },
            Usage::Display | Usage::Packed,
        ) => numeric_spec(clause, digits, scale, signed, usage, parts.sign),
        (PictureShape::Numeric { digits, .. }, Usage::Binary) => {
            let width = match digits {
                0..=4 => 2,
                5..=9 => 4,
                _ => 8,
            };
            Err(unsupported("binary integer storage is not decoded".into(), Some(width)))
        }
        (_, Usage::Float4) => Err(unsupported(
            format!("{} storage is not decoded", Usage::Float4.name()),
            Some(4),
        )),
        (_, Usage::Float8) => Err(unsupported(
            format!("{} storage is not decoded", Usage::Float8.name()),
            Some(8),
        )),
        (shape, Usage::National) => Err(unsupported(
            "NATIONAL storage is not decoded".into(),
            Some(shape_width(shape) as usize * 2),
        )),
        (PictureShape::Edited { length }, _) => Err(unsupported(
            format!("edited picture `{pic}` is not decoded"),
            Some(length as usize),
        )),
        (shape, other) => Err(unsupported(
            format!("{} usage with picture `{pic}`", other.name()),
            Some(shape_width(shape) as usize),
        )),
    }
}

fn numeric_spec(
    clause: &str,
    digits: u32,
    scale: u32,
    signed: bool,
    usage: Usage,
    sign: Option<SignPosition>,
) -> Result<ClauseSpec, UnsupportedClause> {
    let packed = usage == Usage::Packed;
    let natural_width = if packed {
        digits as usize / 2 + 1
    } else {
        digits as usize
    };
    let unsupported = |reason: &str, width: usize| UnsupportedClause {
        clause: clause.to_string(),
        reason: reason.to_string(),
        best_effort_width: Some(width),
    };

    if digits > MAX_DIGITS {
        return Err(unsupported(
            &format!("{digits} digits exceed the supported maximum of {MAX_DIGITS}"),
            natural_width,
        ));
    }
    if sign.is_some() && !signed {
        return Err(unsupported("SIGN clause on an unsigned picture", natural_width));
    }

    if packed {
        if sign.is_some() {
            return Err(unsupported("SIGN clause on packed decimal storage", natural_width));
        }
        return Ok(ClauseSpec {
            category: StorageCategory::NumericPacked,
            length: digits,
            scale,
            signed,
            sign: None,
            width: natural_width,
        });
    }

    let sign = signed.then(|| sign.unwrap_or(SignPosition::TrailingOverpunch));
    let width = natural_width + usize::from(sign.is_some_and(SignPosition::is_separate));
    Ok(ClauseSpec {
        category: StorageCategory::NumericDisplay,
        length: digits,
        scale,
        signed,
        sign,
        width,
    })
}

/// Width of whatever picture string an unparseable clause still contains.
fn salvage_width(clause: &str) -> Option<usize> {
    let toks = tokenize(clause);
    let after_keyword = toks
        .iter()
        .position(|t| t.is_any(&["PIC", "PICTURE"]))
        .and_then(|p| {
            let next = p + 1 + usize::from(toks.get(p + 1).is_some_and(|t| t.is("IS")));
            toks.get(next)
        });
    let word = after_keyword.or_else(|| {
        toks.iter()
            .find(|t| t.kind == TokKind::Word && picture::looks_like_picture(t.text))
    })?;
    let symbols = picture::parse(word.text)?;
    Some(shape_width(picture::classify(&symbols)) as usize)
}

fn shape_width(shape: PictureShape) -> u32 {
    match shape {
        PictureShape::Text { length } | PictureShape::Edited { length } => length,
        PictureShape::Numeric { digits, .. } => digits,
    }
}

/// Walk the clause tokens, collecting picture, usage and sign phrases.
fn split_clause(clause: &str) -> Result<ClauseParts<'_>, String> {
    let toks = tokenize(clause);
    let mut parts = ClauseParts::default();
    let mut i = 0usize;

    let skip_optional = |i: &mut usize, words: &[&str]| {
        if toks.get(*i).is_some_and(|t| t.is_any(words)) {
            *i += 1;
        }
    };

    while i < toks.len() {
        let tok = toks[i];
        i += 1;

        if tok.is_any(&["PIC", "PICTURE"]) {
            skip_optional(&mut i, &["IS"]);
            let Some(pic) = toks.get(i).filter(|t| t.kind == TokKind::Word) else {
                return Err("PIC without a picture string".into());
            };
            if parts.picture.replace(pic.text).is_some() {
                return Err("more than one picture string".into());
            }
            i += 1;
        } else if tok.is("USAGE") {
            skip_optional(&mut i, &["IS"]);
            let usage = toks.get(i).and_then(Usage::from_token);
            let Some(usage) = usage else {
                return Err("USAGE without a recognized usage".into());
            };
            parts.usage = Some(usage);
            i += 1;
        } else if let Some(usage) = Usage::from_token(&tok) {
            parts.usage = Some(usage);
        } else if tok.is_any(&["SIGN", "LEADING", "TRAILING"]) {
            let mut position = tok;
            if tok.is("SIGN") {
                skip_optional(&mut i, &["IS"]);
                match toks.get(i) {
                    Some(t) if t.is_any(&["LEADING", "TRAILING"]) => {
                        position = *t;
                        i += 1;
                    }
                    _ => return Err("SIGN without LEADING or TRAILING".into()),
                }
            }
            let separate = toks.get(i).is_some_and(|t| t.is("SEPARATE"));
            if separate {
                i += 1;
                skip_optional(&mut i, &["CHARACTER"]);
            }
            parts.sign = Some(match (position.is("LEADING"), separate) {
                (true, true) => SignPosition::LeadingSeparate,
                (true, false) => SignPosition::LeadingOverpunch,
                (false, true) => SignPosition::TrailingSeparate,
                (false, false) => SignPosition::TrailingOverpunch,
            });
        } else if tok.is_any(&["VALUE", "VALUES"]) {
            skip_optional(&mut i, &["IS", "ARE"]);
            if i >= toks.len() {
                return Err("VALUE without a literal".into());
            }
            i += 1;
        } else if tok.is_any(&["JUST", "JUSTIFIED"]) {
            skip_optional(&mut i, &["RIGHT"]);
        } else if tok.is_any(&["SYNC", "SYNCHRONIZED"]) {
            skip_optional(&mut i, &["LEFT", "RIGHT"]);
        } else if tok.is("BLANK") {
            skip_optional(&mut i, &["WHEN"]);
            skip_optional(&mut i, &["ZERO", "ZEROS", "ZEROES"]);
        } else if tok.is_any(&["GLOBAL", "EXTERNAL", "IS"]) {
            // No storage effect.
        } else if tok.kind == TokKind::Word
            && parts.picture.is_none()
            && picture::looks_like_picture(tok.text)
        {
            parts.picture = Some(tok.text);
        } else {
            return Err(format!("unrecognized clause word `{}`", tok.text));
        }
    }
    Ok(parts)
}
