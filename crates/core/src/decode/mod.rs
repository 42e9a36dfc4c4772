//! Value Decoder: resolved layout + captured bytes → field value tree.
//!
//! Decoding never fails. Every field the buffer cannot satisfy becomes an
//! [`Value::Unknown`] that points at the diagnostic explaining it, and every
//! other field still decodes.

pub(crate) mod numeric;
mod tree;
mod value;

pub use tree::{FieldNode, FieldValueTree, GroupView, Lookup, NodeContent, NodeId};
pub use value::{Decimal, DiagnosticRef, DiagnosticSource, Unknown, Value};

use crate::capture::normalize_capture;
use crate::clause::{ClauseSpec, StorageCategory};
use crate::declaration::{Declaration, Fingerprint};
use crate::diag_util::{ctx, diag, last_segment, rewrite_path};
use crate::layout::{FieldId, Repeat, ResolvedField, ResolvedLayout, ValueCategory};
use copylens_diagnostics::{Diagnostic, codes};
use copylens_profile::{DecodeProfile, OverpunchTable};
use std::collections::HashMap;
use thiserror::Error;

/// Decoded record plus the diagnostics raised while decoding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    /// Decoded values.
    pub tree: FieldValueTree,
    /// Decode-time diagnostics (capture problems first, then per-field
    /// problems in declaration order).
    pub diagnostics: Vec<Diagnostic>,
}

impl DecodeResult {
    /// The diagnostic an [`Unknown`] value refers to.
    pub fn explain<'a>(
        &'a self,
        layout: &'a ResolvedLayout,
        reference: DiagnosticRef,
    ) -> Option<&'a Diagnostic> {
        match reference.source {
            DiagnosticSource::Layout => layout.diagnostics().get(reference.index),
            DiagnosticSource::Decode => self.diagnostics.get(reference.index),
        }
    }
}

/// Caller misuse detected by [`decode_checked`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The layout was resolved from a different declaration tree.
    #[error("layout was resolved from declaration {layout}, not {declaration}")]
    LayoutMismatch {
        /// Fingerprint stored in the layout.
        layout: Fingerprint,
        /// Fingerprint of the declaration supplied by the caller.
        declaration: Fingerprint,
    },
}

/// Decode `buffer` with the default profile.
pub fn decode(layout: &ResolvedLayout, buffer: &[u8]) -> DecodeResult {
    decode_with_profile(layout, buffer, &DecodeProfile::default())
}

/// Decode `buffer` using the sign conventions in `profile`.
pub fn decode_with_profile(
    layout: &ResolvedLayout,
    buffer: &[u8],
    profile: &DecodeProfile,
) -> DecodeResult {
    Decoder::new(layout, buffer, profile, Vec::new()).run()
}

/// Decode `buffer` after checking that `layout` was resolved from `decl`.
pub fn decode_checked(
    layout: &ResolvedLayout,
    decl: &Declaration,
    buffer: &[u8],
    profile: &DecodeProfile,
) -> Result<DecodeResult, DecodeError> {
    let declaration = decl.fingerprint();
    if declaration != layout.fingerprint() {
        return Err(DecodeError::LayoutMismatch {
            layout: layout.fingerprint(),
            declaration,
        });
    }
    Ok(decode_with_profile(layout, buffer, profile))
}

/// Decode a value as it appears in a capture log, converting the text to
/// bytes with `profile.capture_encoding` first.
pub fn decode_captured(
    layout: &ResolvedLayout,
    captured: &str,
    profile: &DecodeProfile,
) -> DecodeResult {
    let capture = normalize_capture(captured, profile.capture_encoding);
    Decoder::new(layout, &capture.bytes, profile, capture.diagnostics).run()
}

struct Decoder<'a> {
    layout: &'a ResolvedLayout,
    buffer: &'a [u8],
    profile: &'a DecodeProfile,
    overpunch: OverpunchTable,
    nodes: Vec<FieldNode>,
    by_path: HashMap<String, NodeId>,
    counts: HashMap<FieldId, Option<i128>>,
    diagnostics: Vec<Diagnostic>,
    short: Option<usize>,
}

impl<'a> Decoder<'a> {
    fn new(
        layout: &'a ResolvedLayout,
        buffer: &'a [u8],
        profile: &'a DecodeProfile,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            layout,
            buffer,
            profile,
            overpunch: profile.overpunch.table(),
            nodes: Vec::new(),
            by_path: HashMap::new(),
            counts: HashMap::new(),
            diagnostics,
            short: None,
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) -> DiagnosticRef {
        self.diagnostics.push(diagnostic);
        DiagnosticRef {
            source: DiagnosticSource::Decode,
            index: self.diagnostics.len() - 1,
        }
    }

    fn unknown(&self, reference: DiagnosticRef) -> Value {
        let reason = match reference.source {
            DiagnosticSource::Layout => &self.layout.diagnostics()[reference.index].id,
            DiagnosticSource::Decode => &self.diagnostics[reference.index].id,
        };
        Value::Unknown(Unknown {
            reason: reason.clone(),
            diagnostic: reference,
        })
    }

    fn run(mut self) -> DecodeResult {
        let expected = self.layout.width();
        let actual = self.buffer.len();
        if actual < expected {
            let root = self.layout.root().path.clone();
            let reference = self.report(
                diag(
                    codes::BUFFER_TOO_SHORT,
                    format!("record needs {expected} bytes, {actual} captured"),
                    Some(&root),
                )
                .with_context(ctx!(
                    "expected" => expected.to_string(),
                    "actual" => actual.to_string(),
                )),
            );
            self.short = Some(reference.index);
        }

        self.field(0, 0, &[]);
        tracing::debug!(
            root = %self.layout.root().path,
            bytes = actual,
            nodes = self.nodes.len(),
            diagnostics = self.diagnostics.len(),
            "decoded record"
        );
        DecodeResult {
            tree: FieldValueTree {
                fingerprint: self.layout.fingerprint(),
                nodes: self.nodes,
                by_path: self.by_path,
            },
            diagnostics: self.diagnostics,
        }
    }

    /// Decode layout field `id` shifted by `shift` bytes, with paths renamed
    /// for variable-repetition elements.
    fn field(&mut self, id: FieldId, shift: usize, renames: &[(String, String)]) -> NodeId {
        let layout = self.layout;
        let f = layout.field(id);
        let path = rewrite_path(&f.path, renames);
        let node = self.nodes.len();
        self.nodes.push(FieldNode {
            name: last_segment(&path).to_string(),
            path: path.clone(),
            content: NodeContent::Group(Vec::new()),
        });
        self.by_path.entry(path.clone()).or_insert(node);

        let content = match (&f.category, &f.repeat) {
            (ValueCategory::Unsupported, _) => NodeContent::Value(self.unsupported(f, &path)),
            (
                ValueCategory::Group,
                Some(Repeat::Dynamic {
                    min,
                    max,
                    controller,
                    controller_path,
                    element_width,
                }),
            ) => {
                let dynamic = DynamicRepeat {
                    bounds: (*min, *max),
                    controller: *controller,
                    controller_path,
                    element_width: *element_width,
                };
                self.dynamic(f, &path, &dynamic, shift, renames)
            }
            (ValueCategory::Group, _) => NodeContent::Group(
                f.children
                    .iter()
                    .map(|&child| self.field(child, shift, renames))
                    .collect(),
            ),
            _ => {
                let value = self.leaf(f, f.offset.saturating_add(shift), &path);
                if layout.is_controller(id) {
                    self.counts.insert(id, value.as_integer());
                }
                NodeContent::Value(value)
            }
        };
        self.nodes[node].content = content;
        node
    }

    fn unsupported(&mut self, f: &ResolvedField, path: &str) -> Value {
        let reference = match f.diagnostic {
            Some(index) => DiagnosticRef {
                source: DiagnosticSource::Layout,
                index,
            },
            None => self.report(diag(
                codes::UNSUPPORTED_CLAUSE,
                "field storage is not decoded",
                Some(path),
            )),
        };
        self.unknown(reference)
    }

    fn dynamic(
        &mut self,
        f: &ResolvedField,
        path: &str,
        repeat: &DynamicRepeat<'_>,
        shift: usize,
        renames: &[(String, String)],
    ) -> NodeContent {
        let (min, max) = repeat.bounds;
        let Some(declared) = self.counts.get(&repeat.controller).copied().flatten() else {
            let reference = self.report(
                diag(
                    codes::UNRESOLVED_OCCURS_COUNT,
                    format!("count field `{}` has no usable value", repeat.controller_path),
                    Some(path),
                )
                .with_context(ctx!("controller" => repeat.controller_path)),
            );
            return NodeContent::Value(self.unknown(reference));
        };

        let mut count = declared.clamp(i128::from(min), i128::from(max));
        if count != declared {
            self.report(
                diag(
                    codes::UNRESOLVED_OCCURS_COUNT,
                    format!(
                        "count field `{}` holds {declared}, outside {min} to {max}; using {count}",
                        repeat.controller_path
                    ),
                    Some(path),
                )
                .with_context(ctx!(
                    "controller" => repeat.controller_path,
                    "value" => declared.to_string(),
                    "min" => min.to_string(),
                    "max" => max.to_string(),
                )),
            );
        }
        let cap = i128::from(self.layout.max_occurs());
        if count > cap {
            self.report(
                diag(
                    codes::OCCURS_LIMIT,
                    format!("{count} elements present; only the first {cap} are decoded"),
                    Some(path),
                )
                .with_context(ctx!(
                    "declared" => count.to_string(),
                    "materialized" => cap.to_string(),
                )),
            );
            count = cap;
        }

        let Some(&template) = f.children.first() else {
            return NodeContent::Group(Vec::new());
        };
        let template_path = format!("{path}[1]");
        let mut children = Vec::new();
        // `count` is within 0..=max_occurs here.
        for i in 1..=usize::try_from(count).unwrap_or(0) {
            let mut element_renames = renames.to_vec();
            element_renames.push((template_path.clone(), format!("{path}[{i}]")));
            let element_shift = shift.saturating_add((i - 1).saturating_mul(repeat.element_width));
            children.push(self.field(template, element_shift, &element_renames));
        }
        NodeContent::Group(children)
    }

    /// Decode one elementary field at `offset`.
    ///
    /// A field cut by the end of the buffer keeps its present bytes only
    /// when it is text; a cut numeric is unknown, since missing zoned digits
    /// change its magnitude and a cut packed field has lost its sign nibble.
    fn leaf(&mut self, f: &ResolvedField, offset: usize, path: &str) -> Value {
        let available = self.buffer.len();
        let end = offset.saturating_add(f.width);

        if f.width > 0 && offset >= available {
            let reference = match self.short {
                Some(index) => DiagnosticRef {
                    source: DiagnosticSource::Decode,
                    index,
                },
                None => self.partial(path, offset, f.width),
            };
            return self.unknown(reference);
        }
        if end > available {
            let reference = self.partial(path, offset, f.width);
            if f.category == ValueCategory::Text {
                return Value::Text(numeric::text(self.buffer.get(offset..).unwrap_or_default()));
            }
            return self.unknown(reference);
        }

        let buffer = self.buffer;
        let bytes = &buffer[offset..end];
        let Some(spec) = f.clause else {
            return Value::Text(numeric::text(bytes));
        };
        match spec.category {
            StorageCategory::Text => Value::Text(numeric::text(bytes)),
            StorageCategory::NumericDisplay => {
                match numeric::zoned(bytes, spec.sign, &self.overpunch) {
                    Ok(unscaled) => number(unscaled, &spec),
                    Err(e) => self.invalid(codes::INVALID_NUMERIC, path, bytes, &e),
                }
            }
            StorageCategory::NumericPacked => {
                match numeric::packed(bytes, self.profile.packed_sign) {
                    Ok(unscaled) => number(unscaled, &spec),
                    Err(e) => self.invalid(codes::INVALID_PACKED, path, bytes, &e),
                }
            }
        }
    }

    fn partial(&mut self, path: &str, offset: usize, width: usize) -> DiagnosticRef {
        let present = self.buffer.len().saturating_sub(offset).min(width);
        self.report(
            diag(
                codes::PARTIAL_FIELD,
                format!("only {present} of {width} bytes captured"),
                Some(path),
            )
            .with_context(ctx!(
                "offset" => offset.to_string(),
                "width" => width.to_string(),
                "present" => present.to_string(),
            )),
        )
    }

    fn invalid(
        &mut self,
        code: &'static str,
        path: &str,
        bytes: &[u8],
        error: &numeric::NumericError,
    ) -> Value {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        let reference = self.report(
            diag(code, error.to_string(), Some(path)).with_context(ctx!("bytes" => hex)),
        );
        self.unknown(reference)
    }
}

struct DynamicRepeat<'r> {
    bounds: (u32, u32),
    controller: FieldId,
    controller_path: &'r str,
    element_width: usize,
}

fn number(unscaled: i128, spec: &ClauseSpec) -> Value {
    if spec.scale == 0 {
        Value::Integer(unscaled)
    } else {
        Value::Decimal(Decimal::new(unscaled, spec.scale))
    }
}
