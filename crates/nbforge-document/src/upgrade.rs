//! Schema upgrades to nbformat 4.5

use crate::cell::new_cell_id;
use crate::document::Document;
use crate::error::FormatError;
use crate::format::CURRENT_MINOR;
use crate::multiline::join_value;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// v3 output keys and their v4 mime types
const V3_MIME_KEYS: &[(&str, &str)] = &[
    ("text", "text/plain"),
    ("html", "text/html"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpeg", "image/jpeg"),
    ("latex", "text/latex"),
    ("json", "application/json"),
    ("javascript", "application/javascript"),
];

/// Rewrite an nbformat 3 document into the nbformat 4.0 layout
pub(crate) fn upgrade_v3(mut value: Value) -> Result<Value, FormatError> {
    let root = value
        .as_object_mut()
        .ok_or_else(|| FormatError::invalid("document root is not an object"))?;

    let worksheets = root.remove("worksheets").unwrap_or_else(|| json!([]));
    let mut cells = Vec::new();
    for sheet in worksheets.as_array().into_iter().flatten() {
        for cell in sheet.get("cells").and_then(Value::as_array).into_iter().flatten() {
            cells.push(upgrade_cell(cell)?);
        }
    }

    tracing::debug!(cells = cells.len(), "upgraded nbformat 3 document");

    root.insert("cells".into(), Value::Array(cells));
    root.insert("nbformat".into(), json!(4));
    root.insert("nbformat_minor".into(), json!(0));
    if let Some(Value::Object(meta)) = root.get_mut("metadata") {
        meta.remove("name");
        meta.remove("signature");
    }
    Ok(value)
}

fn upgrade_cell(cell: &Value) -> Result<Value, FormatError> {
    let obj = cell
        .as_object()
        .ok_or_else(|| FormatError::invalid("cell is not an object"))?;
    let cell_type = obj.get("cell_type").and_then(Value::as_str).unwrap_or("raw");
    let mut metadata = obj
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let upgraded = match cell_type {
        "code" => {
            if let Some(collapsed) = obj.get("collapsed") {
                metadata.insert("collapsed".into(), collapsed.clone());
            }
            let outputs: Vec<Value> = obj
                .get("outputs")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(upgrade_output)
                .collect();
            json!({
                "cell_type": "code",
                "execution_count": obj.get("prompt_number").cloned().unwrap_or(Value::Null),
                "metadata": metadata,
                "outputs": outputs,
                "source": join_value(obj.get("input").unwrap_or(&Value::Null)),
            })
        }
        "heading" => {
            let level = obj
                .get("level")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6);
            let source = join_value(obj.get("source").unwrap_or(&Value::Null));
            let hashes = "#".repeat(usize::try_from(level).unwrap_or(1));
            let text = source
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" ");
            json!({
                "cell_type": "markdown",
                "metadata": metadata,
                "source": format!("{hashes} {text}"),
            })
        }
        "markdown" => json!({
            "cell_type": "markdown",
            "metadata": metadata,
            "source": join_value(obj.get("source").unwrap_or(&Value::Null)),
        }),
        _ => json!({
            "cell_type": "raw",
            "metadata": metadata,
            "source": join_value(obj.get("source").unwrap_or(&Value::Null)),
        }),
    };
    Ok(upgraded)
}

fn upgrade_output(output: &Value) -> Value {
    let Some(obj) = output.as_object() else {
        return output.clone();
    };
    match obj.get("output_type").and_then(Value::as_str) {
        Some("pyout") => json!({
            "output_type": "execute_result",
            "execution_count": obj.get("prompt_number").cloned().unwrap_or(Value::Null),
            "data": mime_bundle(obj),
            "metadata": obj.get("metadata").cloned().unwrap_or_else(|| json!({})),
        }),
        Some("display_data") => json!({
            "output_type": "display_data",
            "data": mime_bundle(obj),
            "metadata": obj.get("metadata").cloned().unwrap_or_else(|| json!({})),
        }),
        Some("pyerr") => json!({
            "output_type": "error",
            "ename": obj.get("ename").cloned().unwrap_or_else(|| json!("")),
            "evalue": obj.get("evalue").cloned().unwrap_or_else(|| json!("")),
            "traceback": obj.get("traceback").cloned().unwrap_or_else(|| json!([])),
        }),
        Some("stream") => json!({
            "output_type": "stream",
            "name": obj.get("stream").cloned().unwrap_or_else(|| json!("stdout")),
            "text": join_value(obj.get("text").unwrap_or(&Value::Null)),
        }),
        _ => output.clone(),
    }
}

fn mime_bundle(obj: &Map<String, Value>) -> Map<String, Value> {
    V3_MIME_KEYS
        .iter()
        .filter_map(|(key, mime)| {
            obj.get(*key).map(|v| {
                let text = if v.is_string() || v.is_array() {
                    Value::String(join_value(v))
                } else {
                    v.clone()
                };
                ((*mime).to_string(), text)
            })
        })
        .collect()
}

/// Bring a 4.x document to 4.5: every cell gets a unique id
pub(crate) fn upgrade_minor(doc: &mut Document) {
    let mut seen = HashSet::new();
    for cell in &mut doc.cells {
        let keep = cell
            .id
            .as_ref()
            .is_some_and(|id| !id.is_empty() && seen.insert(id.clone()));
        if !keep {
            let mut id = new_cell_id();
            while !seen.insert(id.clone()) {
                id = new_cell_id();
            }
            cell.id = Some(id);
        }
    }
    doc.nbformat_minor = doc.nbformat_minor.max(CURRENT_MINOR);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_cells_are_flattened() {
        let v3 = json!({
            "metadata": {"name": "old"},
            "nbformat": 3,
            "nbformat_minor": 0,
            "worksheets": [{
                "cells": [
                    {"cell_type": "heading", "level": 2, "source": "Title", "metadata": {}},
                    {
                        "cell_type": "code",
                        "input": ["a = 1\n", "a"],
                        "prompt_number": 4,
                        "collapsed": false,
                        "language": "python",
                        "metadata": {},
                        "outputs": [
                            {"output_type": "pyout", "prompt_number": 4, "text": ["1"], "metadata": {}},
                            {"output_type": "stream", "stream": "stderr", "text": "warn"},
                            {"output_type": "pyerr", "ename": "E", "evalue": "v", "traceback": []}
                        ]
                    }
                ]
            }]
        });
        let v4 = upgrade_v3(v3).unwrap();
        assert_eq!(v4["nbformat"], json!(4));
        assert!(v4.get("worksheets").is_none());
        assert_eq!(v4["metadata"], json!({}));

        let cells = v4["cells"].as_array().unwrap();
        assert_eq!(cells[0]["cell_type"], json!("markdown"));
        assert_eq!(cells[0]["source"], json!("## Title"));

        let code = &cells[1];
        assert_eq!(code["source"], json!("a = 1\na"));
        assert_eq!(code["execution_count"], json!(4));
        assert_eq!(code["metadata"]["collapsed"], json!(false));
        assert_eq!(code["outputs"][0]["output_type"], json!("execute_result"));
        assert_eq!(code["outputs"][0]["data"]["text/plain"], json!("1"));
        assert_eq!(code["outputs"][1]["name"], json!("stderr"));
        assert_eq!(code["outputs"][2]["output_type"], json!("error"));
    }

    #[test]
    fn minor_upgrade_assigns_unique_ids() {
        let mut doc = Document::new(vec![
            crate::Cell::code("a"),
            crate::Cell::code("b"),
            crate::Cell::code("c"),
        ]);
        doc.nbformat_minor = 2;
        doc.cells[0].id = None;
        doc.cells[1].id = Some("dup".into());
        doc.cells[2].id = Some("dup".into());

        upgrade_minor(&mut doc);

        assert_eq!(doc.nbformat_minor, CURRENT_MINOR);
        assert_eq!(doc.cells[1].id.as_deref(), Some("dup"));
        let ids: HashSet<_> = doc.cells.iter().filter_map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 3);
    }
}
