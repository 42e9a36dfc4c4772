//! Layout Resolver: declaration tree → flat, path-addressable field table.
//!
//! A [`ResolvedLayout`] is an arena of [`ResolvedField`]s in pre-order
//! (declaration order, parents before children), indexed by canonical path.
//! It is immutable once built and safe to share across threads.

/// Memoized layouts keyed by declaration fingerprint.
pub mod cache;
mod resolver;

pub use cache::LayoutCache;
pub use resolver::{ResolveOptions, resolve, resolve_with_options, resolve_with_profile};

use crate::clause::{ClauseSpec, StorageCategory};
use crate::declaration::Fingerprint;
use crate::query::normalize_path;
use copylens_diagnostics::Diagnostic;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Index of a field in [`ResolvedLayout::fields`].
pub type FieldId = usize;

/// How a field's bytes are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueCategory {
    /// Character data.
    Text,
    /// Zoned decimal digits.
    NumericDisplay,
    /// Packed decimal.
    NumericPacked,
    /// Aggregate of child fields (also the container of repeated elements).
    Group,
    /// Storage that is not decoded; values come back as unknown.
    Unsupported,
}

impl From<StorageCategory> for ValueCategory {
    fn from(category: StorageCategory) -> Self {
        match category {
            StorageCategory::Text => ValueCategory::Text,
            StorageCategory::NumericDisplay => ValueCategory::NumericDisplay,
            StorageCategory::NumericPacked => ValueCategory::NumericPacked,
        }
    }
}

/// Repetition attached to an array container field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Repeat {
    /// Statically repeated; elements `[1]..=[materialized]` are children.
    Fixed {
        /// Declared element count.
        count: u32,
        /// Elements present in the layout (capped by `max_occurs`).
        materialized: u32,
        /// Width of one element in bytes.
        element_width: usize,
    },
    /// Count read from a controlling field at decode time. The container
    /// holds a single template element `[1]`.
    Dynamic {
        /// Smallest permitted count.
        min: u32,
        /// Largest permitted count; storage is reserved for this many.
        max: u32,
        /// Field holding the count.
        controller: FieldId,
        /// Path of the controlling field.
        controller_path: String,
        /// Width of one element in bytes.
        element_width: usize,
    },
}

impl Repeat {
    /// Width of one element in bytes.
    pub fn element_width(&self) -> usize {
        match self {
            Repeat::Fixed { element_width, .. } | Repeat::Dynamic { element_width, .. } => {
                *element_width
            }
        }
    }
}

/// One addressable field of a resolved layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    /// Canonical dotted path from the root, e.g. `LAST-DATA.TYPE.CODE`.
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Absolute byte offset within the record.
    pub offset: usize,
    /// Physical width in bytes.
    pub width: usize,
    /// How the field's bytes are read.
    pub category: ValueCategory,
    /// Digits right of the implied decimal point (numerics only).
    pub scale: u32,
    /// Whether the numeric carries a sign.
    pub signed: bool,
    /// Interpreted clause of a supported elementary field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause: Option<ClauseSpec>,
    /// Path of the storage this field overlays, for aliases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    /// Repetition, when this field is an array container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,
    /// Enclosing field.
    #[serde(skip)]
    pub parent: Option<FieldId>,
    /// Child fields in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldId>,
    /// Index into [`ResolvedLayout::diagnostics`] explaining why an
    /// unsupported field cannot be decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<usize>,
}

impl ResolvedField {
    /// Whether this field has its own bytes to decode.
    pub fn is_leaf(&self) -> bool {
        !matches!(self.category, ValueCategory::Group)
    }

    /// One past the last byte of this field.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.width)
    }
}

/// The computed physical layout of one declaration tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLayout {
    pub(crate) fingerprint: Fingerprint,
    pub(crate) max_occurs: u32,
    pub(crate) fields: Vec<ResolvedField>,
    #[serde(skip)]
    pub(crate) by_path: HashMap<String, FieldId>,
    #[serde(skip)]
    pub(crate) controllers: BTreeSet<FieldId>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl ResolvedLayout {
    /// Fingerprint of the declaration tree this layout was resolved from.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Repetition cap the layout was resolved with.
    pub fn max_occurs(&self) -> u32 {
        self.max_occurs
    }

    /// The record's root field.
    pub fn root(&self) -> &ResolvedField {
        &self.fields[0]
    }

    /// Total record width in bytes.
    pub fn width(&self) -> usize {
        self.root().width
    }

    /// All fields in pre-order.
    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    /// Field by id.
    pub fn field(&self, id: FieldId) -> &ResolvedField {
        &self.fields[id]
    }

    /// Children of a field, in declaration order.
    pub fn children(&self, id: FieldId) -> impl Iterator<Item = &ResolvedField> + '_ {
        self.fields[id].children.iter().map(|&c| &self.fields[c])
    }

    /// Resolve-time diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether the field's value sizes a variable repetition.
    pub fn is_controller(&self, id: FieldId) -> bool {
        self.controllers.contains(&id)
    }

    /// Id of the field at `path`.
    ///
    /// Paths are matched case-insensitively and may omit the root name.
    /// Elements of a variable repetition other than `[1]` have no layout
    /// entry of their own; they exist only in decoded trees.
    pub fn field_id(&self, path: &str) -> Option<FieldId> {
        let canonical = normalize_path(path, &self.root().name).ok()?;
        self.by_path.get(&canonical).copied()
    }

    /// Field at `path`; see [`ResolvedLayout::field_id`].
    pub fn get(&self, path: &str) -> Option<&ResolvedField> {
        self.field_id(path).map(|id| &self.fields[id])
    }
}
