//! copylens core library.
//!
//! Turns record declarations from legacy copybooks into byte-exact layouts
//! and decodes captured record bytes against them. The main entry points
//! are [`resolve`] for layout resolution, [`decode`] for decoding, and
//! [`FieldValueTree::get`] for path queries. [`clause::interpret`] exposes
//! the storage clause rules on their own.

#![warn(missing_docs)]

/// Captured log text → storage bytes.
pub mod capture;
/// Storage clause interpretation.
pub mod clause;
/// Record declaration trees.
pub mod declaration;
/// Decoding captured bytes into field values.
pub mod decode;
/// Byte layout resolution.
pub mod layout;
/// Field path parsing.
pub mod query;

mod diag_util;
mod dump;

// ── Convenience re-exports ──────────────────────────────────────────────────
// Flat imports for the most common entry points. The full module paths
// remain available for less common types.

// Declarations
pub use declaration::{DeclName, Declaration, Fingerprint, Occurs};

// Clause interpreter
pub use clause::{ClauseSpec, SignPosition, StorageCategory, UnsupportedClause, interpret};

// Layout
pub use layout::{
    FieldId, LayoutCache, Repeat, ResolveOptions, ResolvedField, ResolvedLayout, ValueCategory,
    resolve, resolve_with_options, resolve_with_profile,
};

// Decoder
pub use decode::{
    Decimal, DecodeError, DecodeResult, DiagnosticRef, DiagnosticSource, FieldValueTree, GroupView,
    Lookup, Unknown, Value, decode, decode_captured, decode_checked, decode_with_profile,
};

// Queries
pub use query::QueryError;

// Diagnostics (re-exported from the diagnostics crate)
pub use copylens_diagnostics::{Diagnostic, Severity, codes};

// Profiles (re-exported from the profile crate)
pub use copylens_profile::{CaptureEncoding, DecodeProfile, load_profile_from_str};

// Serialization helpers
pub use dump::{layout_to_pretty_json, result_to_pretty_json, tree_to_pretty_json};
