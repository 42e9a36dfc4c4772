//! Diagnostics for copylens.
//!
//! Provides [`Diagnostic`] and [`Severity`], the structured events emitted by
//! the layout resolver, the capture normalizer and the value decoder. Reason
//! codes are defined in the [`codes`] module.
//!
//! Diagnostics never abort an operation. They are accumulated in order and
//! handed to the caller, which decides whether to persist them to a warning
//! log or treat any of them as fatal.

#![warn(missing_docs)]

/// Reason code constants auto-generated from `spec/diagnostics.jsonc`.
pub mod codes;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    /// Warning: a field degraded or its offsets may be unreliable.
    Warn,
    /// Informational note.
    Info,
}

/// A diagnostic produced while resolving a layout or decoding a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Machine-readable reason code (e.g., `"unsupported-clause"`).
    pub id: Cow<'static, str>,
    /// Severity level.
    pub severity: Severity,
    /// Human-readable diagnostic message.
    pub message: String,
    /// Path of the field involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Machine-readable context for tooling. Keys and values are free-form strings.
    ///
    /// Uses `BTreeMap` for deterministic key ordering in serialized output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Diagnostic {
    /// Create a diagnostic with the given fields.
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        severity: Severity,
        message: impl Into<String>,
        path: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            path,
            context: None,
        }
    }

    /// Create a diagnostic using the default severity declared for `id`.
    ///
    /// Unknown codes fall back to [`Severity::Warn`].
    pub fn for_code(
        id: &'static str,
        message: impl Into<String>,
        path: Option<String>,
    ) -> Self {
        let severity = default_severity(id).unwrap_or(Severity::Warn);
        Self::new(id, severity, message, path)
    }

    /// Attach machine-readable context metadata (builder pattern).
    pub fn with_context(mut self, ctx: BTreeMap<String, String>) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Returns the human-readable explanation for this diagnostic's code, if available.
    pub fn explain(&self) -> Option<&'static str> {
        explain(&self.id)
    }

    /// Looks up a context value by key.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|ctx| ctx.get(key))
            .map(String::as_str)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warn => write!(f, "warn"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// One warning-log line: `warn[code] PATH: message`, path omitted when absent.
impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}[{}] {}: {}", self.severity, self.id, path, self.message),
            None => write!(f, "{}[{}]: {}", self.severity, self.id, self.message),
        }
    }
}

/// Returns the human-readable explanation for a reason code, if known.
///
/// Auto-generated from `spec/diagnostics.jsonc` at build time.
pub fn explain(id: &str) -> Option<&'static str> {
    include!(concat!(env!("OUT_DIR"), "/generated_explain.rs"))
}

/// Returns the severity declared for a reason code, if known.
pub fn default_severity(id: &str) -> Option<Severity> {
    include!(concat!(env!("OUT_DIR"), "/generated_severity.rs"))
}
