//! Parsing and canonical formatting of the save document.
//!
//! The document is kept as a generic ordered JSON tree so that fields this
//! crate knows nothing about survive a decode, edit and encode cycle. Object
//! keys keep their source order (`serde_json` is built with `preserve_order`).

use serde_json::Value;

const BYTE_ORDER_MARK: char = '\u{feff}';

pub fn parse(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text))
}

/// Two-space indented rendering in source key order, no trailing newline.
///
/// `to_canonical(&parse(s)?)` is a fixed point: feeding the output back
/// through `parse` and `to_canonical` yields the same bytes.
pub fn to_canonical(value: &Value) -> String {
    format!("{value:#}")
}

pub fn to_compact(value: &Value) -> String {
    value.to_string()
}

pub fn canonicalize(text: &str) -> Result<String, serde_json::Error> {
    parse(text).map(|value| to_canonical(&value))
}
