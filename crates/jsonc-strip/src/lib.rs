//! JSONC preprocessing for hand-edited copylens files.
//!
//! The reason-code catalogue and decode profiles are written by people, so
//! they may contain:
//! - `//` line comments
//! - `/* ... */` block comments
//! - a trailing comma before `}` or `]`
//!
//! [`strip_jsonc`] turns such input into plain JSON. String literals
//! (including escapes) pass through untouched.

/// Strip comments and trailing commas from JSONC input.
///
/// Comment-like sequences and commas inside string literals are preserved.
/// Newlines inside removed comments are kept so that `serde_json` error
/// positions still point at the original line.
#[must_use]
pub fn strip_jsonc(input: &str) -> String {
    let without_comments = strip_comments(input);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_str = false;

    while let Some(c) = chars.next() {
        if in_str {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_str = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_comma: Option<String> = None;
    let mut in_str = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_str {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }

        if let Some(held) = pending_comma.as_mut() {
            if c.is_whitespace() {
                held.push(c);
                continue;
            }
            let held = pending_comma.take().unwrap_or_default();
            if c == '}' || c == ']' {
                // Drop the comma, keep the whitespace after it.
                out.push_str(&held[1..]);
            } else {
                out.push_str(&held);
            }
        }

        match c {
            ',' => pending_comma = Some(String::from(",")),
            '"' => {
                in_str = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    if let Some(held) = pending_comma {
        out.push_str(&held);
    }
    out
}
