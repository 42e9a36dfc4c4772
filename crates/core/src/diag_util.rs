use copylens_diagnostics::Diagnostic;

/// Shorthand for building a `BTreeMap<String, String>` context from key-value pairs.
///
/// ```ignore
/// ctx!("target" => name, "alias_width" => width.to_string())
/// ```
macro_rules! ctx {
    ($($k:expr => $v:expr),+ $(,)?) => {
        std::collections::BTreeMap::from([$(($k.into(), $v.into())),+])
    };
}
pub(crate) use ctx;

/// Diagnostic with the severity declared for `code` in the catalogue.
pub(crate) fn diag(code: &'static str, message: impl Into<String>, path: Option<&str>) -> Diagnostic {
    Diagnostic::for_code(code, message, path.map(str::to_string))
}

/// Apply `(old, new)` prefix renames in order.
///
/// A prefix only matches a whole path or a path continuing with `.` or `[`,
/// so renaming `T.A[1]` leaves `T.A[10]` alone.
pub(crate) fn rewrite_path(path: &str, renames: &[(String, String)]) -> String {
    let mut out = path.to_string();
    for (old, new) in renames {
        if let Some(rest) = out.strip_prefix(old.as_str()) {
            if rest.is_empty() || rest.starts_with('.') || rest.starts_with('[') {
                out = format!("{new}{rest}");
            }
        }
    }
    out
}

/// Last segment of a dotted path.
pub(crate) fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
