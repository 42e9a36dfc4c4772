/// Classification of a clause token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    /// A run of non-whitespace characters (keyword, picture string, number).
    Word,
    /// A quoted literal, quotes included.
    Literal,
}

/// A token that borrows its text directly from the clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The classification of this token.
    pub kind: TokKind,
    /// Borrowed slice of the clause for this token.
    pub text: &'a str,
}

impl Token<'_> {
    /// Case-insensitive keyword comparison.
    pub fn is(&self, keyword: &str) -> bool {
        self.kind == TokKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Case-insensitive comparison against any of `keywords`.
    pub fn is_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.is(k))
    }
}

/// Split a storage clause into words and quoted literals.
///
/// A period that ends the clause is a terminator, not part of the last word,
/// so `"PIC 9(4)."` yields `PIC` and `9(4)`. Commas and semicolons followed
/// by whitespace are separators. An unterminated literal runs to the end of
/// the clause.
pub fn tokenize(clause: &str) -> Vec<Token<'_>> {
    let body = clause.trim_end();
    let body = body.strip_suffix('.').unwrap_or(body);
    let b = body.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0usize;

    while i < b.len() {
        let c = b[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c == b'\'' || c == b'"' {
            i += 1;
            while i < b.len() {
                if b[i] == c {
                    // Doubled quote is an escaped quote inside the literal.
                    if i + 1 < b.len() && b[i + 1] == c {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            toks.push(Token {
                kind: TokKind::Literal,
                text: &body[start..i],
            });
            continue;
        }
        while i < b.len() && !b[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut end = i;
        if end - start > 1 && matches!(b[end - 1], b',' | b';') {
            end -= 1;
        }
        toks.push(Token {
            kind: TokKind::Word,
            text: &body[start..end],
        });
    }
    toks
}
