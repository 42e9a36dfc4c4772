//! Picture string expansion and classification.

/// One picture symbol with its repetition count (`9(5)` → `('9', 5)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PicSymbol {
    /// Uppercased symbol character.
    pub symbol: char,
    /// Number of positions this symbol stands for.
    pub count: u32,
}

/// Shape of a picture string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureShape {
    /// `X`/`A`/`9` mix with at least one `X` or `A`: character data.
    Text {
        /// Number of character positions.
        length: u32,
    },
    /// `[S]9...[V9...]`: an unedited number.
    Numeric {
        /// Total digit positions.
        digits: u32,
        /// Digit positions right of the implied decimal point.
        scale: u32,
        /// Leading `S` present.
        signed: bool,
    },
    /// Anything with editing, scaling or national symbols.
    Edited {
        /// Number of character positions the edited form occupies.
        length: u32,
    },
}

/// Expand repetition factors. Returns `None` for a malformed string
/// (empty, unbalanced parentheses, zero or non-numeric repeat count).
pub fn parse(picture: &str) -> Option<Vec<PicSymbol>> {
    let mut symbols: Vec<PicSymbol> = Vec::new();
    let mut chars = picture.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '(' || c == ')' || c.is_whitespace() {
            return None;
        }
        let mut count = 1u32;
        if chars.peek() == Some(&'(') {
            chars.next();
            let mut digits = String::new();
            loop {
                match chars.next() {
                    Some(')') => break,
                    Some(d) if d.is_ascii_digit() => digits.push(d),
                    _ => return None,
                }
            }
            count = digits.parse().ok().filter(|n| *n > 0)?;
        }
        symbols.push(PicSymbol {
            symbol: c.to_ascii_uppercase(),
            count,
        });
    }
    if symbols.is_empty() { None } else { Some(symbols) }
}

/// Whether a bare clause word can only be a picture string.
pub fn looks_like_picture(word: &str) -> bool {
    word.starts_with(|c: char| matches!(c.to_ascii_uppercase(), 'X' | 'A' | '9' | 'S'))
        && parse(word).is_some_and(|syms| {
            syms.iter()
                .all(|s| matches!(s.symbol, 'X' | 'A' | '9' | 'S' | 'V'))
        })
}

/// Classify an expanded picture.
pub fn classify(symbols: &[PicSymbol]) -> PictureShape {
    let occupied: u32 = symbols
        .iter()
        .filter(|s| !matches!(s.symbol, 'S' | 'V' | 'P'))
        .fold(0u32, |acc, s| acc.saturating_add(s.count));

    if symbols.iter().all(|s| matches!(s.symbol, 'X' | 'A' | '9'))
        && symbols.iter().any(|s| s.symbol != '9')
    {
        return PictureShape::Text { length: occupied };
    }

    let mut signed = false;
    let mut seen_point = false;
    let mut digits = 0u32;
    let mut scale = 0u32;
    for (i, s) in symbols.iter().enumerate() {
        match s.symbol {
            'S' if i == 0 && s.count == 1 => signed = true,
            'V' if !seen_point && s.count == 1 => seen_point = true,
            '9' => {
                digits = digits.saturating_add(s.count);
                if seen_point {
                    scale = scale.saturating_add(s.count);
                }
            }
            _ => return PictureShape::Edited { length: occupied },
        }
    }
    if digits == 0 {
        return PictureShape::Edited { length: occupied };
    }
    PictureShape::Numeric {
        digits,
        scale,
        signed,
    }
}
