use crate::decode::{DecodeResult, FieldValueTree};
use crate::layout::ResolvedLayout;

/// Serialize a resolved layout to a pretty-printed JSON string.
pub fn layout_to_pretty_json(layout: &ResolvedLayout) -> String {
    serde_json::to_string_pretty(layout).expect("ResolvedLayout serialization cannot fail")
}

/// Serialize a decoded tree to a pretty-printed JSON string.
pub fn tree_to_pretty_json(tree: &FieldValueTree) -> String {
    serde_json::to_string_pretty(&tree.to_json()).expect("JSON value serialization cannot fail")
}

/// Serialize a decode result (values and diagnostics) to a pretty-printed JSON string.
pub fn result_to_pretty_json(result: &DecodeResult) -> String {
    let doc = serde_json::json!({
        "fingerprint": result.tree.fingerprint().to_string(),
        "values": result.tree.to_json(),
        "diagnostics": result.diagnostics,
    });
    serde_json::to_string_pretty(&doc).expect("JSON value serialization cannot fail")
}
