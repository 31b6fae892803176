//! Extraction units
//!
//! A unit wraps every code cell carrying one tag in a single function
//! definition whose parameters are the document's parameters.
//!
//! Defaults that read other names cannot live in the `def` line on their
//! own. Such units start with the parameter statements as module-level code
//! and the affected parameters default to the module-level binding.

use crate::scope::{analyze_tree, first_error};
use nbforge_document::Document;

/// Indentation applied to unit bodies
pub const DEFAULT_INDENT: &str = "    ";

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Code assembled from the cells sharing one tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionUnit {
    /// Tag the cells were selected by
    pub tag: String,
    /// Name of the wrapper function
    pub function_name: String,
    /// Wrapped source
    pub source: String,
    /// Number of cells contributing to the unit
    pub cell_count: usize,
}

impl ExtractionUnit {
    /// File name the unit is persisted under
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> String {
        let mut stem: String = self
            .tag
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
            .collect();
        let dots = stem.len() - stem.trim_start_matches('.').len();
        stem.replace_range(..dots, &"_".repeat(dots));
        if stem.is_empty() {
            stem.push('_');
        }
        format!("{stem}.py")
    }
}

/// Parameters of a unit's wrapper function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSignature {
    /// Module-level statements emitted before the wrapper
    pub prelude: Option<String>,
    /// `(name, default)` pairs in declaration order
    pub parameters: Vec<(String, String)>,
}

impl UnitSignature {
    /// Signature without parameters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter with its default expression
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.parameters.push((name.into(), default.into()));
        self
    }

    /// Set the statements emitted before the wrapper
    #[must_use]
    pub fn with_prelude(mut self, prelude: impl Into<String>) -> Self {
        self.prelude = Some(prelude.into());
        self
    }

    /// Signature for `parameters`, falling back to `prelude` where needed
    ///
    /// A default that is not self-contained becomes `name=name`, bound by
    /// `prelude` at module level. The prelude is kept only when some
    /// default needs it; without one, defaults are used as given.
    #[must_use]
    pub fn resolve(parameters: Vec<(String, String)>, prelude: &str) -> Self {
        let prelude = prelude.trim_end();
        if prelude.trim().is_empty() {
            return Self {
                prelude: None,
                parameters,
            };
        }

        let mut needs_prelude = false;
        let parameters = parameters
            .into_iter()
            .map(|(name, default)| {
                if is_self_contained(&default) {
                    (name, default)
                } else {
                    tracing::debug!(parameter = %name, "default reads other names; binding it at module level");
                    needs_prelude = true;
                    (name.clone(), name)
                }
            })
            .collect();
        Self {
            prelude: needs_prelude.then(|| prelude.to_string()),
            parameters,
        }
    }

    fn header(&self, function_name: &str) -> String {
        let params = self
            .parameters
            .iter()
            .map(|(name, default)| format!("{name}={default}"))
            .collect::<Vec<_>>()
            .join(", ");
        match &self.prelude {
            Some(prelude) => format!("{prelude}\n\n\ndef {function_name}({params}):\n"),
            None => format!("def {function_name}({params}):\n"),
        }
    }
}

/// Whether `expr` is a valid expression reading no names but builtins
#[must_use]
pub fn is_self_contained(expr: &str) -> bool {
    let wrapped = format!("_value = (\n{expr}\n)\n");
    let Ok(Some(tree)) = crate::parse_python(&wrapped) else {
        return false;
    };
    let root = tree.root_node();
    if first_error(root).is_some() || root.named_child_count() != 1 {
        return false;
    }
    // `1) or (2` parses too; only a single group may span the wrapper parens
    let single_group = root
        .named_child(0)
        .and_then(|statement| statement.named_child(0))
        .and_then(|assignment| assignment.child_by_field_name("right"))
        .is_some_and(|right| {
            matches!(right.kind(), "parenthesized_expression" | "tuple" | "generator_expression")
        });
    single_group && analyze_tree(root, &wrapped).undefined_names().is_empty()
}

/// Python identifier for a tag
///
/// Characters outside `[A-Za-z0-9_]` become `_`; a leading digit or a
/// keyword gets an extra underscore.
#[must_use]
pub fn function_name(tag: &str) -> String {
    let mut name: String = tag
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if KEYWORDS.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

/// Build one unit per requested tag
///
/// Tags matching no code cell produce no unit.
#[must_use]
pub fn build_units(
    doc: &Document,
    tags: &[String],
    signature: &UnitSignature,
    indent: &str,
) -> Vec<ExtractionUnit> {
    let mut units = Vec::new();
    for tag in tags {
        let cells: Vec<_> = doc.code_cells_tagged(tag).collect();
        if cells.is_empty() {
            tracing::debug!(tag = %tag, "no code cells carry the tag");
            continue;
        }

        let function_name = function_name(tag);
        let mut source = signature.header(&function_name);
        let mut body_lines = 0usize;
        for cell in &cells {
            for line in cell.source.lines() {
                if line.trim().is_empty() {
                    source.push('\n');
                } else {
                    source.push_str(indent);
                    source.push_str(line.trim_end());
                    source.push('\n');
                    body_lines += 1;
                }
            }
        }
        if body_lines == 0 {
            source.push_str(indent);
            source.push_str("pass\n");
        }

        units.push(ExtractionUnit {
            tag: tag.clone(),
            function_name,
            source,
            cell_count: cells.len(),
        });
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbforge_document::Cell;
    use pretty_assertions::assert_eq;

    #[test]
    fn function_names_are_identifiers() {
        assert_eq!(function_name("etl"), "etl");
        assert_eq!(function_name("load-data v2"), "load_data_v2");
        assert_eq!(function_name("2nd"), "_2nd");
        assert_eq!(function_name("class"), "class_");
    }

    #[test]
    fn cells_concatenate_in_document_order() {
        let doc = Document::new(vec![
            Cell::code("x = 1").with_tag("etl"),
            Cell::code("ignored = True"),
            Cell::markdown("# not code").with_tag("etl"),
            Cell::code("for i in range(x):\n    print(i)\n").with_tag("etl"),
        ]);
        let units = build_units(
            &doc,
            &["etl".to_string(), "absent".to_string()],
            &UnitSignature::new().with_parameter("x", "1").with_parameter("name", "\"a\""),
            DEFAULT_INDENT,
        );

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].cell_count, 2);
        assert_eq!(units[0].file_name(), "etl.py");
        assert_eq!(
            units[0].source,
            "def etl(x=1, name=\"a\"):\n    x = 1\n    for i in range(x):\n        print(i)\n"
        );
    }

    #[test]
    fn empty_cells_get_a_pass_body() {
        let doc = Document::new(vec![Cell::code("\n").with_tag("noop")]);
        let units = build_units(&doc, &["noop".to_string()], &UnitSignature::new(), "\t");
        assert_eq!(units[0].source, "def noop():\n\n\tpass\n");
    }

    #[test]
    fn file_names_stay_inside_the_directory() {
        let unit = |tag: &str| ExtractionUnit {
            tag: tag.to_string(),
            function_name: function_name(tag),
            source: String::new(),
            cell_count: 1,
        };
        assert_eq!(unit("load-data v2").file_name(), "load-data_v2.py");
        assert_eq!(unit("../x").file_name(), "___x.py");
        assert_eq!(unit("a/b\\c").file_name(), "a_b_c.py");
        assert_eq!(unit(".hidden").file_name(), "_hidden.py");
        assert_eq!(unit("").file_name(), "_.py");
    }

    #[test]
    fn self_contained_defaults() {
        assert!(is_self_contained("1"));
        assert!(is_self_contained("'data'"));
        assert!(is_self_contained("[1, 2,\n 3]"));
        assert!(is_self_contained("\"\"\"\nSELECT *\n\"\"\""));
        assert!(is_self_contained("float('nan')"));
        assert!(is_self_contained("[i for i in range(3)]"));
        assert!(!is_self_contained("base + '/out'"));
        assert!(!is_self_contained("1, 2) or (3"));
        assert!(!is_self_contained("x = 1"));
    }

    #[test]
    fn dependent_defaults_bind_at_module_level() {
        let signature = UnitSignature::resolve(
            vec![
                ("base".into(), "'data'".into()),
                ("out_dir".into(), "base + '/out'".into()),
            ],
            "base = 'data'\nout_dir = base + '/out'\n",
        );
        assert_eq!(signature.prelude.as_deref(), Some("base = 'data'\nout_dir = base + '/out'"));
        assert_eq!(
            signature.parameters,
            vec![("base".to_string(), "'data'".to_string()), ("out_dir".to_string(), "out_dir".to_string())]
        );

        let literal = UnitSignature::resolve(vec![("a".into(), "1".into())], "a = 1");
        assert_eq!(literal, UnitSignature::new().with_parameter("a", "1"));
    }
}
