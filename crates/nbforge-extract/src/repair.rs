//! Scope repair
//!
//! Inserts `name = None` for every free name of a unit at the top of the
//! wrapper's body, so the unit runs without name-resolution errors.

use crate::error::ExtractError;
use crate::scope::{analyze_tree, first_error, ScopeAnalysis};
use crate::unit::ExtractionUnit;

/// A unit after scope repair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedUnit {
    /// Tag the unit was built for
    pub tag: String,
    /// Source with stand-ins inserted
    pub source: String,
    /// Names that received a stand-in, in first-read order
    pub stand_ins: Vec<String>,
    /// Analysis of the unit before repair
    pub analysis: ScopeAnalysis,
}

/// Repair a unit's free names
///
/// # Errors
///
/// Returns `ExtractError::Syntax` when the unit does not parse and
/// `ExtractError::ParserInit` when the grammar cannot be loaded.
pub fn repair_unit(unit: &ExtractionUnit) -> Result<RepairedUnit, ExtractError> {
    let source = unit.source.as_str();
    let Some(tree) = crate::parse_python(source)? else {
        return Err(ExtractError::syntax(&unit.tag, 0, 0, "parser produced no tree"));
    };
    let root = tree.root_node();
    if let Some(node) = first_error(root) {
        let position = node.start_position();
        let message = if node.is_missing() {
            format!("missing {}", node.kind())
        } else {
            let snippet = node.utf8_text(source.as_bytes()).unwrap_or("");
            format!("invalid syntax near '{}'", snippet.lines().next().unwrap_or("").trim())
        };
        return Err(ExtractError::syntax(&unit.tag, position.row, position.column, message));
    }

    let analysis = analyze_tree(root, source);
    let stand_ins = analysis.undefined_names();
    tracing::debug!(tag = %unit.tag, stand_ins = stand_ins.len(), "analyzed unit");
    if stand_ins.is_empty() {
        return Ok(RepairedUnit {
            tag: unit.tag.clone(),
            source: unit.source.clone(),
            stand_ins,
            analysis,
        });
    }

    let mut cursor = root.walk();
    let body = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "function_definition")
        .filter(|def| {
            def.child_by_field_name("name")
                .and_then(|name| name.utf8_text(source.as_bytes()).ok())
                == Some(unit.function_name.as_str())
        })
        .last()
        .and_then(|def| def.child_by_field_name("body"))
        .ok_or_else(|| ExtractError::syntax(&unit.tag, 0, 0, "unit wrapper has no body"))?;

    let body_start = body.start_byte();
    let line_start = body_start - body.start_position().column;
    let indent = &source[line_start..body_start];

    let mut repaired = String::with_capacity(source.len() + stand_ins.len() * 16);
    repaired.push_str(&source[..line_start]);
    for name in &stand_ins {
        repaired.push_str(indent);
        repaired.push_str(name);
        repaired.push_str(" = None\n");
    }
    repaired.push_str(&source[line_start..]);

    Ok(RepairedUnit {
        tag: unit.tag.clone(),
        source: repaired,
        stand_ins,
        analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{build_units, UnitSignature, DEFAULT_INDENT};
    use nbforge_document::{Cell, Document};
    use pretty_assertions::assert_eq;

    fn unit(source: &str) -> ExtractionUnit {
        let doc = Document::new(vec![Cell::code(source).with_tag("etl")]);
        build_units(&doc, &["etl".to_string()], &UnitSignature::new().with_parameter("a", "1"), DEFAULT_INDENT)
            .remove(0)
    }

    #[test]
    fn stand_ins_precede_the_body() {
        let repaired = repair_unit(&unit("b = a + offset\nhelper(b)")).unwrap();
        assert_eq!(repaired.stand_ins, vec!["offset", "helper"]);
        assert_eq!(
            repaired.source,
            "def etl(a=1):\n    offset = None\n    helper = None\n    b = a + offset\n    helper(b)\n"
        );
    }

    #[test]
    fn repaired_source_has_no_free_names() {
        let repaired = repair_unit(&unit("print(missing)")).unwrap();
        let again = crate::scope::analyze(&repaired.source).unwrap();
        assert!(again.undefined_names().is_empty());
        assert!(first_error(
            crate::parse_python(&repaired.source).unwrap().unwrap().root_node()
        )
        .is_none());
    }

    #[test]
    fn stand_ins_land_in_the_wrapper_after_a_prelude() {
        let doc = Document::new(vec![Cell::code("def etl():\n    pass\nprint(out_dir, later)").with_tag("etl")]);
        let signature = UnitSignature::new()
            .with_prelude("out_dir = 'out'")
            .with_parameter("out_dir", "out_dir");
        let unit = build_units(&doc, &["etl".to_string()], &signature, DEFAULT_INDENT).remove(0);

        let repaired = repair_unit(&unit).unwrap();
        assert_eq!(repaired.stand_ins, vec!["later"]);
        assert_eq!(
            repaired.source,
            "out_dir = 'out'\n\n\ndef etl(out_dir=out_dir):\n    later = None\n    def etl():\n        pass\n    print(out_dir, later)\n"
        );
    }

    #[test]
    fn bound_units_are_unchanged() {
        let original = unit("import math\nb = math.sqrt(a)");
        let repaired = repair_unit(&original).unwrap();
        assert!(repaired.stand_ins.is_empty());
        assert_eq!(repaired.source, original.source);
    }

    #[test]
    fn broken_units_report_position() {
        let err = repair_unit(&unit("x = (1,")).unwrap_err();
        match err {
            ExtractError::Syntax { tag, line, column, .. } => {
                assert_eq!(tag, "etl");
                assert!(line >= 1 && column >= 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
