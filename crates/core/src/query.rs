//! Field path syntax: `TYPE.CODE`, `LAST-DATA.TYPE.CODE`, `TBL.ITEM[2]`.
//!
//! Segments are separated by `.`, matched case-insensitively, and may carry
//! 1-based `[n]` element indexes. The record root name is optional.

use thiserror::Error;

/// Failure to look up a field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The path is well formed but names no field.
    #[error("no field at `{path}`")]
    NotFound {
        /// Canonical form of the requested path.
        path: String,
    },
    /// The path could not be parsed.
    #[error("invalid field path `{path}`: {reason}")]
    InvalidPath {
        /// The path as given.
        path: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A value was requested but the path names a group.
    #[error("`{path}` is a group, not a value")]
    NotALeaf {
        /// Canonical form of the requested path.
        path: String,
    },
}

/// Canonical form of a user path: uppercase, trimmed segments, indexes
/// without leading zeros, prefixed with `root` when it was omitted.
///
/// A first segment equal to the root name is taken as the root, even if a
/// child of the root shares that name.
pub fn normalize_path(path: &str, root: &str) -> Result<String, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty path"));
    }

    let mut segments = Vec::new();
    for raw in trimmed.split('.') {
        let raw = raw.trim();
        let (name, mut rest) = raw.split_at(raw.find('[').unwrap_or(raw.len()));
        if name.is_empty() {
            return Err(invalid("empty segment name"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '#'))
        {
            return Err(invalid(&format!("unexpected character in `{name}`")));
        }

        let mut segment = name.to_ascii_uppercase();
        while !rest.is_empty() {
            let Some(close) = rest.find(']') else {
                return Err(invalid("unclosed `[`"));
            };
            let index: u32 = rest[1..close]
                .trim()
                .parse()
                .map_err(|_| invalid(&format!("`{}` is not an element index", &rest[1..close])))?;
            if index == 0 {
                return Err(invalid("element indexes start at 1"));
            }
            segment.push_str(&format!("[{index}]"));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(invalid("text after `]`"));
            }
        }
        segments.push(segment);
    }

    let first_name = segments[0].split('[').next().unwrap_or_default();
    if !first_name.eq_ignore_ascii_case(root) {
        segments.insert(0, root.to_ascii_uppercase());
    }
    Ok(segments.join("."))
}
