//! Declaration tree supplied by the source-parsing stage.
//!
//! Level numbers have already been turned into nesting and each elementary
//! item's storage clause is an opaque string. Nothing here interprets the
//! clause; that is [`crate::clause::interpret`]'s job.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Level number of condition-name declarations (no storage).
pub const LEVEL_CONDITION: u8 = 88;
/// Level number of renames declarations (regroup existing storage).
pub const LEVEL_RENAMES: u8 = 66;

/// One node of a record declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Declaration {
    /// Level number as written in the source (01, 05, 88, ...).
    pub level: u8,
    /// Declared name, or the anonymous filler marker.
    pub name: DeclName,
    /// Subordinate declarations in source order. Empty for elementary items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Declaration>,
    /// Storage clause text of an elementary item (e.g. `"PIC S9(5) COMP-3"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,
    /// Repetition of this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurs: Option<Occurs>,
    /// Name of an earlier sibling whose storage this node overlays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redefines: Option<String>,
}

/// Name of a declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeclName {
    /// A queryable name.
    Named(String),
    /// Anonymous storage (`FILLER` or no name at all).
    Filler,
}

impl DeclName {
    /// Build a name, mapping `FILLER` (any case) and blank names to [`DeclName::Filler`].
    pub fn from_source(name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("FILLER") {
            DeclName::Filler
        } else {
            DeclName::Named(trimmed.to_string())
        }
    }

    /// The declared name, or `None` for filler.
    pub fn as_named(&self) -> Option<&str> {
        match self {
            DeclName::Named(name) => Some(name),
            DeclName::Filler => None,
        }
    }
}

/// Repetition clause of a declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Occurs {
    /// A statically known number of contiguous elements.
    Fixed {
        /// Number of elements.
        count: u32,
    },
    /// Element count read at runtime from another field.
    DependingOn {
        /// Smallest permitted count.
        min: u32,
        /// Largest permitted count; storage is reserved for this many.
        max: u32,
        /// Name of the controlling field.
        controller: String,
    },
}

impl Declaration {
    /// A group item with the given children.
    pub fn group(level: u8, name: &str, children: Vec<Declaration>) -> Self {
        Self {
            level,
            name: DeclName::from_source(name),
            children,
            clause: None,
            occurs: None,
            redefines: None,
        }
    }

    /// An elementary item with a storage clause.
    pub fn elementary(level: u8, name: &str, clause: &str) -> Self {
        Self {
            level,
            name: DeclName::from_source(name),
            children: Vec::new(),
            clause: Some(clause.to_string()),
            occurs: None,
            redefines: None,
        }
    }

    /// Repeat this node a fixed number of times (builder pattern).
    pub fn with_occurs(mut self, count: u32) -> Self {
        self.occurs = Some(Occurs::Fixed { count });
        self
    }

    /// Repeat this node a runtime-determined number of times (builder pattern).
    pub fn with_occurs_depending_on(mut self, min: u32, max: u32, controller: &str) -> Self {
        self.occurs = Some(Occurs::DependingOn {
            min,
            max,
            controller: controller.to_string(),
        });
        self
    }

    /// Overlay the storage of an earlier sibling (builder pattern).
    pub fn with_redefines(mut self, target: &str) -> Self {
        self.redefines = Some(target.to_string());
        self
    }

    /// Whether this node has subordinate declarations.
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    /// Content fingerprint of this declaration tree.
    ///
    /// Two trees have the same fingerprint exactly when every level, name,
    /// clause, repetition and alias matches, so it keys layout caches and
    /// detects a layout being used with the wrong declaration.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        feed(&mut hasher, self);
        Fingerprint(hasher.finalize().into())
    }
}

fn feed(hasher: &mut Sha256, decl: &Declaration) {
    fn text(hasher: &mut Sha256, tag: u8, s: &str) {
        hasher.update([tag]);
        hasher.update((s.len() as u64).to_le_bytes());
        hasher.update(s.as_bytes());
    }

    hasher.update([b'L', decl.level]);
    match &decl.name {
        DeclName::Named(name) => text(hasher, b'N', name),
        DeclName::Filler => hasher.update([b'F']),
    }
    if let Some(clause) = &decl.clause {
        text(hasher, b'C', clause);
    }
    match &decl.occurs {
        Some(Occurs::Fixed { count }) => {
            hasher.update([b'O']);
            hasher.update(count.to_le_bytes());
        }
        Some(Occurs::DependingOn {
            min,
            max,
            controller,
        }) => {
            hasher.update([b'D']);
            hasher.update(min.to_le_bytes());
            hasher.update(max.to_le_bytes());
            text(hasher, b'c', controller);
        }
        None => {}
    }
    if let Some(target) = &decl.redefines {
        text(hasher, b'R', target);
    }
    hasher.update([b'(']);
    hasher.update((decl.children.len() as u64).to_le_bytes());
    for child in &decl.children {
        feed(hasher, child);
    }
    hasher.update([b')']);
}

/// SHA-256 content hash of a declaration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; 32]);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Declaration {
        Declaration::group(
            1,
            "LAST-DATA",
            vec![
                Declaration::elementary(5, "NAME", "PIC X(10)"),
                Declaration::group(
                    5,
                    "TYPE",
                    vec![
                        Declaration::elementary(10, "CODE", "PIC 9(5) COMP-3"),
                        Declaration::elementary(10, "DESC", "PIC X(10)"),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn filler_names_are_normalized() {
        assert_eq!(DeclName::from_source("filler"), DeclName::Filler);
        assert_eq!(DeclName::from_source("  "), DeclName::Filler);
        assert_eq!(
            DeclName::from_source(" WS-A "),
            DeclName::Named("WS-A".into())
        );
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());
        assert_eq!(sample().fingerprint().to_string().len(), 64);
    }

    #[test]
    fn fingerprint_changes_with_any_attribute() {
        let base = sample().fingerprint();

        let mut clause = sample();
        clause.children[0].clause = Some("PIC X(11)".into());
        assert_ne!(clause.fingerprint(), base);

        let mut occurs = sample();
        occurs.children[0].occurs = Some(Occurs::Fixed { count: 2 });
        assert_ne!(occurs.fingerprint(), base);

        let mut alias = sample();
        alias.children[1].redefines = Some("NAME".into());
        assert_ne!(alias.fingerprint(), base);

        let mut level = sample();
        level.children[0].level = 3;
        assert_ne!(level.fingerprint(), base);
    }

    #[test]
    fn fingerprint_distinguishes_nesting() {
        // Same nodes, different parentage.
        let flat = Declaration::group(
            1,
            "R",
            vec![
                Declaration::group(5, "G", vec![Declaration::elementary(10, "A", "PIC X")]),
                Declaration::elementary(5, "B", "PIC X"),
            ],
        );
        let nested = Declaration::group(
            1,
            "R",
            vec![Declaration::group(
                5,
                "G",
                vec![
                    Declaration::elementary(10, "A", "PIC X"),
                    Declaration::elementary(5, "B", "PIC X"),
                ],
            )],
        );
        assert_ne!(flat.fingerprint(), nested.fingerprint());
    }

    #[test]
    fn declaration_serde_round_trip() {
        let decl = Declaration::group(
            1,
            "TBL",
            vec![
                Declaration::elementary(5, "N", "PIC 99"),
                Declaration::elementary(5, "ITEM", "PIC X(4)").with_occurs_depending_on(0, 9, "N"),
                Declaration::elementary(5, "ALT", "PIC X(4)").with_redefines("ITEM"),
            ],
        );
        let json = serde_json::to_string(&decl).unwrap();
        let back: Declaration = serde_json::from_str(&json).unwrap();
        assert_eq!(decl, back);
        assert_eq!(decl.fingerprint(), back.fingerprint());
    }
}
