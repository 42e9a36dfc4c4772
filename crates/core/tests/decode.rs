//! Decoding captured record bytes and querying the result.

mod common;

use common::{
    codes_at, codes_of, integer, last_data, last_data_bytes, orders, packed, redefined_rec, tbl,
    text, unknown_reason,
};
use copylens_core::{
    CaptureEncoding, Decimal, DecodeError, DecodeProfile, Declaration, DiagnosticSource, Lookup,
    QueryError, Value, codes, decode, decode_captured, decode_checked, decode_with_profile,
    ResolveOptions, load_profile_from_str, resolve, resolve_with_options, result_to_pretty_json,
    tree_to_pretty_json,
};
use serde_json::json;
use std::sync::Arc;

// ─── Core scenarios ──────────────────────────────────────────────────────────

#[test]
fn last_data_record() {
    let layout = resolve(&last_data());
    let result = decode(&layout, &last_data_bytes());
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let tree = &result.tree;
    assert_eq!(text(tree, "NAME"), "JOHNSMITH");
    assert_eq!(integer(tree, "TYPE.CODE"), 12345);
    assert_eq!(text(tree, "TYPE.DESC"), "WIDGET");
}

#[test]
fn packed_encoding_of_12345() {
    assert_eq!(packed(12345, 3), vec![0x12, 0x34, 0x5C]);
}

#[test]
fn alias_reads_the_same_bytes_two_ways() {
    let layout = resolve(&redefined_rec());
    let result = decode(&layout, b"12345");
    assert_eq!(text(&result.tree, "A"), "12345");
    assert_eq!(integer(&result.tree, "B"), 12345);
    assert!(result.diagnostics.is_empty());
}

#[test]
fn fixed_repeat_elements() {
    let layout = resolve(&tbl());
    let result = decode(&layout, b"wxyzabcdmnop");
    let tree = &result.tree;
    assert_eq!(text(tree, "ITEM[1]"), "wxyz");
    assert_eq!(text(tree, "ITEM[2]"), "abcd");
    assert_eq!(text(tree, "ITEM[3]"), "mnop");
    assert!(matches!(tree.get("ITEM[4]"), Err(QueryError::NotFound { .. })));
}

#[test]
fn unsupported_field_is_unknown_and_siblings_decode() {
    let decl = Declaration::group(
        1,
        "R",
        vec![
            Declaration::elementary(5, "A", "PIC X(2)"),
            Declaration::elementary(5, "F", "USAGE COMP-1"),
            Declaration::elementary(5, "B", "PIC 9(2)"),
        ],
    );
    let layout = resolve(&decl);
    let result = decode(&layout, b"AB\x00\x01\x02\x0312");
    let tree = &result.tree;
    assert_eq!(text(tree, "A"), "AB");
    assert_eq!(integer(tree, "B"), 12);
    assert_eq!(unknown_reason(tree, "F"), codes::UNSUPPORTED_CLAUSE);

    let Value::Unknown(unknown) = tree.value("F").unwrap() else {
        unreachable!()
    };
    assert_eq!(unknown.diagnostic.source, DiagnosticSource::Layout);
    let explained = result.explain(&layout, unknown.diagnostic).unwrap();
    assert_eq!(explained.path.as_deref(), Some("R.F"));

    let unsupported: Vec<_> = layout
        .diagnostics()
        .iter()
        .chain(&result.diagnostics)
        .filter(|d| d.id == codes::UNSUPPORTED_CLAUSE && d.path.as_deref() == Some("R.F"))
        .collect();
    assert_eq!(unsupported.len(), 1);
}

// ─── Buffer length ───────────────────────────────────────────────────────────

#[test]
fn exact_width_has_no_length_diagnostics() {
    let layout = resolve(&last_data());
    let result = decode(&layout, &last_data_bytes());
    assert!(!codes_of(&result.diagnostics).contains(&codes::BUFFER_TOO_SHORT.to_string()));
}

#[test]
fn longer_buffer_ignores_trailing_bytes() {
    let layout = resolve(&last_data());
    let mut buf = last_data_bytes();
    buf.extend(b"PADDING");
    let result = decode(&layout, &buf);
    assert!(result.diagnostics.is_empty());
    assert_eq!(text(&result.tree, "TYPE.DESC"), "WIDGET");
}

#[test]
fn short_buffer_degrades_only_the_tail() {
    let layout = resolve(&last_data());
    let buf = last_data_bytes();
    let result = decode(&layout, &buf[..12]);
    let tree = &result.tree;

    assert_eq!(text(tree, "NAME"), "JOHNSMITH");
    assert_eq!(unknown_reason(tree, "TYPE.CODE"), codes::PARTIAL_FIELD);
    assert_eq!(unknown_reason(tree, "TYPE.DESC"), codes::BUFFER_TOO_SHORT);
    assert_eq!(
        codes_of(&result.diagnostics),
        vec![codes::BUFFER_TOO_SHORT, codes::PARTIAL_FIELD]
    );
    assert_eq!(result.diagnostics[0].path.as_deref(), Some("LAST-DATA"));
    assert_eq!(result.diagnostics[0].context_value("expected"), Some("23"));
    assert_eq!(result.diagnostics[0].context_value("actual"), Some("12"));
}

#[test]
fn partially_captured_text_keeps_present_bytes() {
    let layout = resolve(&last_data());
    let result = decode(&layout, b"JOHNS");
    let tree = &result.tree;
    assert_eq!(text(tree, "NAME"), "JOHNS");
    assert_eq!(codes_at(&result.diagnostics, "LAST-DATA.NAME"), vec![codes::PARTIAL_FIELD]);
    assert_eq!(unknown_reason(tree, "TYPE.CODE"), codes::BUFFER_TOO_SHORT);
    assert_eq!(unknown_reason(tree, "TYPE.DESC"), codes::BUFFER_TOO_SHORT);
}

#[test]
fn empty_buffer_still_yields_a_full_tree() {
    let layout = resolve(&last_data());
    let result = decode(&layout, &[]);
    assert_eq!(result.tree.leaves().count(), 3);
    assert!(result.tree.leaves().all(|(_, v)| v.is_unknown()));
    assert_eq!(codes_of(&result.diagnostics), vec![codes::BUFFER_TOO_SHORT]);
}

// ─── Numeric content ─────────────────────────────────────────────────────────

fn amount() -> Declaration {
    Declaration::group(1, "PAY", vec![Declaration::elementary(5, "AMT", "PIC S9(3)V99")])
}

#[test]
fn overpunch_default_is_ibm() {
    let layout = resolve(&amount());
    let result = decode(&layout, b"1234}");
    assert_eq!(
        result.tree.value("AMT").unwrap(),
        &Value::Decimal(Decimal::new(-12340, 2))
    );
    assert_eq!(result.tree.value("AMT").unwrap().to_string(), "-123.40");
}

#[test]
fn overpunch_preset_from_profile() {
    let profile = load_profile_from_str(
        r#"{ "id": "mf", "schema_version": "1.0.0", "overpunch": "micro_focus" }"#,
    )
    .unwrap();
    let layout = resolve(&amount());
    let result = decode_with_profile(&layout, b"1234p", &profile);
    assert_eq!(
        result.tree.value("AMT").unwrap().as_decimal(),
        Some(Decimal::new(-12340, 2))
    );
    let ibm = decode(&layout, b"1234p");
    assert_eq!(unknown_reason(&ibm.tree, "AMT"), codes::INVALID_NUMERIC);
}

#[test]
fn custom_overpunch_table() {
    let profile = load_profile_from_str(
        r#"{
            // ASCII-translated dialect with its own sign characters
            "id": "custom",
            "schema_version": "1.0.0",
            "overpunch": { "positive": "@ABCDEFGHI", "negative": "!JKLMNOPQR" },
        }"#,
    )
    .unwrap();
    let layout = resolve(&amount());
    let result = decode_with_profile(&layout, b"1234!", &profile);
    assert_eq!(result.tree.value("AMT").unwrap().to_string(), "-123.40");
}

#[test]
fn invalid_display_digits() {
    let layout = resolve(&amount());
    let result = decode(&layout, b"12 4A");
    assert_eq!(unknown_reason(&result.tree, "AMT"), codes::INVALID_NUMERIC);
    let d = &result.diagnostics[0];
    assert_eq!(d.path.as_deref(), Some("PAY.AMT"));
    assert_eq!(d.context_value("bytes"), Some("3132203441"));
}

#[test]
fn packed_sign_rules() {
    let decl = Declaration::group(1, "P", vec![Declaration::elementary(5, "V", "PIC S9(3) COMP-3")]);
    let layout = resolve(&decl);

    let standard = decode(&layout, &[0x12, 0x3B]);
    assert_eq!(integer(&standard.tree, "V"), -123);

    let bad_sign = decode(&layout, &[0x12, 0x37]);
    assert_eq!(unknown_reason(&bad_sign.tree, "V"), codes::INVALID_PACKED);

    let parity = load_profile_from_str(
        r#"{ "id": "p", "schema_version": "1.0.0", "packed_sign": "parity" }"#,
    )
    .unwrap();
    let result = decode_with_profile(&layout, &[0x12, 0x3A], &parity);
    assert_eq!(integer(&result.tree, "V"), 123);
}

#[test]
fn separate_sign_numerics() {
    let decl = Declaration::group(
        1,
        "S",
        vec![
            Declaration::elementary(5, "L", "PIC S9(3) SIGN LEADING SEPARATE"),
            Declaration::elementary(5, "T", "PIC S9(3) SIGN TRAILING SEPARATE"),
        ],
    );
    let layout = resolve(&decl);
    assert_eq!(layout.width(), 8);
    let result = decode(&layout, b"-123045+");
    assert_eq!(integer(&result.tree, "L"), -123);
    assert_eq!(integer(&result.tree, "T"), 45);
}

#[test]
fn latin1_text() {
    let decl = Declaration::group(1, "T", vec![Declaration::elementary(5, "W", "PIC X(4)")]);
    let result = decode(&resolve(&decl), &[b'C', 0xC9, b'S', b' ']);
    assert_eq!(text(&result.tree, "W"), "C\u{C9}S");
}

// ─── Variable repetition ─────────────────────────────────────────────────────

#[test]
fn variable_repeat_uses_controller_value() {
    let layout = resolve(&orders());
    let result = decode(&layout, b"2AA1BB2xxxxxxZ");
    let tree = &result.tree;
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(text(tree, "LINES[1].SKU"), "AA");
    assert_eq!(integer(tree, "LINES[2].QTY"), 2);
    assert!(matches!(tree.get("LINES[3]"), Err(QueryError::NotFound { .. })));
    assert_eq!(tree.get("LINES").unwrap().as_group().unwrap().len(), 2);
    assert_eq!(text(tree, "TRAILER"), "Z");
}

#[test]
fn out_of_range_count_is_clamped() {
    let layout = resolve(&orders());
    let result = decode(&layout, b"9AA1BB2CC3DD4Z");
    assert_eq!(integer(&result.tree, "LINES[4].QTY"), 4);
    assert_eq!(
        codes_at(&result.diagnostics, "ORD.LINES"),
        vec![codes::UNRESOLVED_OCCURS_COUNT]
    );
    assert_eq!(result.diagnostics[0].context_value("value"), Some("9"));
}

#[test]
fn unreadable_count_makes_the_repeat_unknown() {
    let layout = resolve(&orders());
    let result = decode(&layout, b"?AA1BB2CC3DD4Z");
    let tree = &result.tree;
    assert_eq!(unknown_reason(tree, "N"), codes::INVALID_NUMERIC);
    assert_eq!(unknown_reason(tree, "LINES"), codes::UNRESOLVED_OCCURS_COUNT);
    assert_eq!(text(tree, "TRAILER"), "Z");
}

#[test]
fn variable_repeat_respects_the_profile_cap() {
    let profile =
        load_profile_from_str(r#"{ "id": "c", "schema_version": "1.0.0", "max_occurs": 2 }"#)
            .unwrap();
    let layout = copylens_core::resolve_with_profile(&orders(), &profile);
    let result = decode_with_profile(&layout, b"3AA1BB2CC3xxxZ", &profile);
    assert_eq!(result.tree.get("LINES").unwrap().as_group().unwrap().len(), 2);
    assert_eq!(codes_at(&result.diagnostics, "ORD.LINES"), vec![codes::OCCURS_LIMIT]);
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[test]
fn queries_are_case_insensitive_with_optional_root() {
    let layout = resolve(&last_data());
    let tree = decode(&layout, &last_data_bytes()).tree;
    for path in ["TYPE.CODE", "type.code", "LAST-DATA.TYPE.CODE", "last-data . type . code"] {
        assert_eq!(tree.value(path), Ok(&Value::Integer(12345)), "{path}");
    }
}

#[test]
fn group_lookup_gives_children() {
    let layout = resolve(&last_data());
    let tree = decode(&layout, &last_data_bytes()).tree;
    let Ok(Lookup::Group(group)) = tree.get("TYPE") else {
        panic!("TYPE should be a group");
    };
    assert_eq!(group.path(), "LAST-DATA.TYPE");
    let names: Vec<&str> = group.children().map(|(name, _)| name).collect();
    assert_eq!(names, ["CODE", "DESC"]);
    assert_eq!(
        group.get("desc").and_then(|l| l.as_value()),
        Some(&Value::Text("WIDGET".into()))
    );
    assert_eq!(
        tree.value("TYPE"),
        Err(QueryError::NotALeaf {
            path: "LAST-DATA.TYPE".into()
        })
    );
}

#[test]
fn query_errors() {
    let layout = resolve(&last_data());
    let tree = decode(&layout, &last_data_bytes()).tree;
    assert_eq!(
        tree.value("TYPE.NOPE"),
        Err(QueryError::NotFound {
            path: "LAST-DATA.TYPE.NOPE".into()
        })
    );
    assert!(matches!(tree.get("TYPE..CODE"), Err(QueryError::InvalidPath { .. })));
    assert!(matches!(tree.get("ITEM[0]"), Err(QueryError::InvalidPath { .. })));
}

#[test]
fn filler_fields_are_addressable() {
    let decl = Declaration::group(
        1,
        "R",
        vec![
            Declaration::elementary(5, "FILLER", "PIC X(2)"),
            Declaration::elementary(5, "A", "PIC X"),
        ],
    );
    let result = decode(&resolve(&decl), b"--A");
    assert_eq!(text(&result.tree, "FILLER#1"), "--");
    assert_eq!(text(&result.tree, "A"), "A");
}

// ─── Checked and captured decoding ───────────────────────────────────────────

#[test]
fn checked_decode_rejects_foreign_layout() {
    let layout = resolve(&last_data());
    let err = decode_checked(&layout, &tbl(), b"wxyzabcdmnop", &DecodeProfile::default())
        .unwrap_err();
    let DecodeError::LayoutMismatch {
        layout: from_layout,
        declaration,
    } = err;
    assert_eq!(from_layout, last_data().fingerprint());
    assert_eq!(declaration, tbl().fingerprint());

    let ok = decode_checked(&layout, &last_data(), &last_data_bytes(), &DecodeProfile::default())
        .unwrap();
    assert_eq!(ok.tree.fingerprint(), layout.fingerprint());
}

#[test]
fn captured_text_in_each_encoding() {
    let layout = resolve(&last_data());
    let bytes = last_data_bytes();

    let raw: String = bytes.iter().map(|&b| char::from(b)).collect();
    let hex: String = bytes.iter().map(|b| format!("{b:02x} ")).collect();
    let escaped = "JOHNSMITH _12_34_5CWIDGET    ";

    for (encoding, captured) in [
        (CaptureEncoding::Raw, raw.as_str()),
        (CaptureEncoding::Hex, hex.as_str()),
        (CaptureEncoding::Escaped { indicator: '_' }, escaped),
    ] {
        let profile = DecodeProfile {
            capture_encoding: encoding,
            ..DecodeProfile::default()
        };
        let result = decode_captured(&layout, captured, &profile);
        assert!(result.diagnostics.is_empty(), "{encoding:?}: {:?}", result.diagnostics);
        assert_eq!(integer(&result.tree, "TYPE.CODE"), 12345, "{encoding:?}");
    }
}

#[test]
fn capture_problems_come_first() {
    let layout = resolve(&redefined_rec());
    let profile = DecodeProfile {
        capture_encoding: CaptureEncoding::Hex,
        ..DecodeProfile::default()
    };
    let result = decode_captured(&layout, "3132zz3435", &profile);
    assert_eq!(
        codes_of(&result.diagnostics),
        vec![codes::BUFFER_ENCODING, codes::INVALID_NUMERIC]
    );
    assert_eq!(text(&result.tree, "A"), "12?45");
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[test]
fn tree_json_rendering() {
    let layout = resolve(&last_data());
    let result = decode(&layout, &last_data_bytes()[..13]);
    assert_eq!(
        result.tree.to_json(),
        json!({
            "LAST-DATA": {
                "NAME": "JOHNSMITH",
                "TYPE": { "CODE": 12345, "DESC": { "unknown": "buffer-too-short" } }
            }
        })
    );
    let pretty: serde_json::Value = serde_json::from_str(&tree_to_pretty_json(&result.tree)).unwrap();
    assert_eq!(pretty, result.tree.to_json());

    let doc: serde_json::Value = serde_json::from_str(&result_to_pretty_json(&result)).unwrap();
    assert_eq!(doc["diagnostics"][0]["id"], "buffer-too-short");
    assert_eq!(doc["diagnostics"][0]["severity"], "warn");
}

#[test]
fn concurrent_decodes_share_one_layout() {
    let layout = Arc::new(resolve(&tbl()));
    let inputs: [&[u8; 12]; 3] = [b"wxyzabcdmnop", b"111122223333", b"aaaabbbbcccc"];
    std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let layout = Arc::clone(&layout);
                s.spawn(move || decode(&layout, *input))
            })
            .collect();
        for (handle, input) in handles.into_iter().zip(inputs) {
            let result = handle.join().unwrap();
            let expected = String::from_utf8_lossy(&input[4..8]).into_owned();
            assert_eq!(text(&result.tree, "ITEM[2]"), expected);
        }
    });
}

#[test]
fn saturated_layout_decodes_without_panicking() {
    let big =
        |name: &str| Declaration::elementary(5, name, "PIC X(4294967295)").with_occurs(u32::MAX);
    let decl = Declaration::group(1, "R", vec![big("A"), big("B"), big("C")]);
    let layout = resolve_with_options(&decl, &ResolveOptions { max_occurs: 2 });
    let result = decode(&layout, b"abc");

    assert_eq!(text(&result.tree, "A[1]"), "abc");
    assert_eq!(codes_at(&result.diagnostics, "R.A[1]"), vec![codes::PARTIAL_FIELD]);
    assert_eq!(unknown_reason(&result.tree, "C[2]"), codes::BUFFER_TOO_SHORT);
    assert_eq!(
        result
            .diagnostics
            .iter()
            .filter(|d| d.id == codes::BUFFER_TOO_SHORT)
            .count(),
        1
    );
}
