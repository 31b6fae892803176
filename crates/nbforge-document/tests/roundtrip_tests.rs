//! Document load/serialize round-trip tests

use nbforge_document::{load, serialize, Cell, CellKind, Document, ParamValue};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn cell_strategy() -> impl Strategy<Value = Cell> {
    (
        prop_oneof![
            Just(CellKind::Code),
            Just(CellKind::Markdown),
            Just(CellKind::Raw)
        ],
        "[a-z =()\\n#'\"]{0,40}",
        proptest::collection::vec("[a-z-]{1,8}", 0..3),
    )
        .prop_map(|(kind, source, tags)| {
            let mut cell = Cell::new(kind, source);
            for tag in tags {
                cell.metadata.tags.insert(tag);
            }
            cell
        })
}

proptest! {
    #[test]
    fn prop_serialize_load_is_idempotent(cells in proptest::collection::vec(cell_strategy(), 0..8)) {
        let doc = Document::new(cells).with_kernel("python3", "python");

        let first = serialize(&doc).unwrap();
        let loaded = load(first.as_bytes()).unwrap();
        let second = serialize(&loaded).unwrap();
        let reloaded = load(second.as_bytes()).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(loaded.cells.len(), reloaded.cells.len());
        for (a, b) in loaded.cells.iter().zip(&reloaded.cells) {
            prop_assert_eq!(&a.source, &b.source);
            prop_assert_eq!(&a.metadata.tags, &b.metadata.tags);
            prop_assert_eq!(a.kind, b.kind);
        }
    }
}

#[test]
fn test_loads_minimal_v4_document() {
    let raw = r#"{
        "cells": [
            {"cell_type": "code", "metadata": {"tags": ["parameters"]}, "source": ["a = 1\n"], "outputs": [], "execution_count": null},
            {"cell_type": "markdown", "metadata": {}, "source": "notes"}
        ],
        "metadata": {"kernelspec": {"name": "python3", "language": "python", "display_name": "Python 3"}},
        "nbformat": 4,
        "nbformat_minor": 4
    }"#;
    let doc = load(raw.as_bytes()).unwrap();

    assert_eq!(doc.cells.len(), 2);
    assert_eq!(doc.find_first_tagged_cell_index("parameters"), Some(0));
    assert!(doc.cells[1].metadata.tags.is_empty());
    assert_eq!(doc.kernel_name(None).unwrap(), "python3");
    assert_eq!(doc.language(None).unwrap(), "python");
}

#[test]
fn test_run_metadata_survives_roundtrip() {
    let mut doc = Document::new(vec![Cell::code("x = 1")]);
    doc.metadata
        .nbforge
        .parameters
        .insert("alpha".into(), ParamValue::Float(f64::NAN));
    doc.metadata
        .nbforge
        .parameters
        .insert("n".into(), ParamValue::Int(3));
    doc.metadata.nbforge.input_path = Some("in.ipynb".into());

    let text = serialize(&doc).unwrap();
    assert!(text.contains("\"alpha\": \"NaN\""));

    let loaded = load(text.as_bytes()).unwrap();
    let params = &loaded.metadata.nbforge.parameters;
    assert_eq!(params["alpha"], ParamValue::from("NaN"));
    assert_eq!(params["n"], ParamValue::Int(3));
    assert_eq!(loaded.metadata.nbforge.input_path.as_deref(), Some("in.ipynb"));
}

#[test]
fn test_v3_document_upgrades_on_load() {
    let raw = r#"{
        "metadata": {"name": ""},
        "nbformat": 3,
        "nbformat_minor": 0,
        "worksheets": [{"cells": [
            {"cell_type": "code", "input": "print(1)", "language": "python", "metadata": {}, "outputs": [], "prompt_number": 1}
        ], "metadata": {}}]
    }"#;
    let doc = load(raw.as_bytes()).unwrap();

    assert_eq!(doc.nbformat, 4);
    assert_eq!(doc.nbformat_minor, 5);
    assert_eq!(doc.cells[0].source, "print(1)");
    assert_eq!(doc.cells[0].execution_count, Some(1));
    assert!(doc.cells[0].id.is_some());
}
