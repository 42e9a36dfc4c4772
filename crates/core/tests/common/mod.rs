//! Shared test helpers for `copylens_core` integration tests.

#![allow(unreachable_pub)]

use copylens_core::{Declaration, Diagnostic, FieldValueTree, Value};

// ─── Record fixtures ─────────────────────────────────────────────────────────

/// `LAST-DATA`: NAME X(10), TYPE { CODE 9(5) COMP-3, DESC X(10) }. Width 23.
#[allow(dead_code)]
pub fn last_data() -> Declaration {
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

/// Storage bytes of a well-formed `LAST-DATA` record.
#[allow(dead_code)]
pub fn last_data_bytes() -> Vec<u8> {
    let mut buf = b"JOHNSMITH ".to_vec();
    buf.extend(packed(12345, 3));
    buf.extend(b"WIDGET    ");
    buf
}

/// `REC`: A X(5) with B 9(5) redefining it. Width 5.
#[allow(dead_code)]
pub fn redefined_rec() -> Declaration {
    Declaration::group(
        1,
        "REC",
        vec![
            Declaration::elementary(5, "A", "PIC X(5)"),
            Declaration::elementary(5, "B", "PIC 9(5)").with_redefines("A"),
        ],
    )
}

/// `TBL`: ITEM X(4) occurring 3 times. Width 12.
#[allow(dead_code)]
pub fn tbl() -> Declaration {
    Declaration::group(
        1,
        "TBL",
        vec![Declaration::elementary(5, "ITEM", "PIC X(4)").with_occurs(3)],
    )
}

/// `ORD`: N 9, LINES { SKU X(2), QTY 9 } occurring 1 to 4 times depending
/// on N, TRAILER X. Width 14.
#[allow(dead_code)]
pub fn orders() -> Declaration {
    Declaration::group(
        1,
        "ORD",
        vec![
            Declaration::elementary(5, "N", "PIC 9"),
            Declaration::group(
                5,
                "LINES",
                vec![
                    Declaration::elementary(10, "SKU", "PIC X(2)"),
                    Declaration::elementary(10, "QTY", "PIC 9"),
                ],
            )
            .with_occurs_depending_on(1, 4, "N"),
            Declaration::elementary(5, "TRAILER", "PIC X"),
        ],
    )
}

// ─── Byte builders ───────────────────────────────────────────────────────────

/// Packed decimal bytes for `value` in `width` bytes, sign nibble C or D.
#[allow(dead_code)]
pub fn packed(value: i128, width: usize) -> Vec<u8> {
    let digits = format!("{:0>w$}", value.unsigned_abs(), w = width * 2 - 1);
    let mut nibbles: Vec<u8> = digits.bytes().map(|b| b - b'0').collect();
    nibbles.push(if value < 0 { 0xD } else { 0xC });
    nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect()
}

// ─── Result helpers ──────────────────────────────────────────────────────────

/// Reason codes of diagnostics, in order.
#[allow(dead_code)]
pub fn codes_of(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics.iter().map(|d| d.id.to_string()).collect()
}

/// Reason codes of diagnostics recorded for one path.
#[allow(dead_code)]
pub fn codes_at(diagnostics: &[Diagnostic], path: &str) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|d| d.path.as_deref() == Some(path))
        .map(|d| d.id.to_string())
        .collect()
}

/// Text value at `path`, panicking with context otherwise.
#[allow(dead_code)]
pub fn text(tree: &FieldValueTree, path: &str) -> String {
    match tree.value(path) {
        Ok(Value::Text(s)) => s.clone(),
        other => panic!("expected text at {path}, got {other:?}"),
    }
}

/// Integer value at `path`, panicking with context otherwise.
#[allow(dead_code)]
pub fn integer(tree: &FieldValueTree, path: &str) -> i128 {
    match tree.value(path) {
        Ok(Value::Integer(n)) => *n,
        other => panic!("expected integer at {path}, got {other:?}"),
    }
}

/// Reason code of the unknown value at `path`, panicking otherwise.
#[allow(dead_code)]
pub fn unknown_reason(tree: &FieldValueTree, path: &str) -> String {
    match tree.value(path) {
        Ok(Value::Unknown(u)) => u.reason.to_string(),
        other => panic!("expected unknown at {path}, got {other:?}"),
    }
}
