//! Load and serialize documents
//!
//! The canonical on-disk form is nbformat 4.5 JSON with a one-space indent
//! and a trailing newline, the layout Jupyter itself writes.

use crate::document::Document;
use crate::error::FormatError;
use crate::upgrade;
use serde::Serialize;
use serde_json::Value;

/// Schema major version written by [`serialize`]
pub const CURRENT_VERSION: u64 = 4;

/// Schema minor version written by [`serialize`]
pub const CURRENT_MINOR: u64 = 5;

/// Parse raw bytes into a document
///
/// Upgrades older schema versions to 4.5 and back-fills absent `tags` and
/// `nbforge` metadata containers.
///
/// # Errors
///
/// Returns `FormatError` for malformed JSON, a missing version field, or an
/// unsupported major version.
pub fn load(raw: &[u8]) -> Result<Document, FormatError> {
    let value: Value = serde_json::from_slice(raw)?;
    from_value(value)
}

/// Build a document from an already-parsed JSON value
///
/// # Errors
///
/// Same conditions as [`load`].
pub fn from_value(mut value: Value) -> Result<Document, FormatError> {
    let version = value
        .get("nbformat")
        .and_then(Value::as_u64)
        .ok_or_else(|| FormatError::invalid("missing nbformat version"))?;

    match version {
        3 => value = upgrade::upgrade_v3(value)?,
        CURRENT_VERSION => {}
        other => return Err(FormatError::UnsupportedVersion(other)),
    }

    let mut doc: Document = serde_json::from_value(value)?;
    upgrade::upgrade_minor(&mut doc);
    Ok(doc)
}

/// Write a document in canonical form
///
/// # Errors
///
/// Returns `FormatError::Json` if serialization fails.
pub fn serialize(doc: &Document) -> Result<String, FormatError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut ser)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| FormatError::invalid(e.to_string()))
}

/// Check whether `text` parses as a document, without keeping the result
#[must_use]
pub fn is_document_text(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| from_value(v).ok())
        .is_some()
}
