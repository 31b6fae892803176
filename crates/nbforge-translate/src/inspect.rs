//! Parameter-cell inspection
//!
//! Recovers `name[: type] = value [# type: T] [# help]` declarations from a
//! parameter cell. Python cells are parsed with tree-sitter; comments are
//! located in the tree, so a `#` inside a string literal is never mistaken
//! for a comment.

use crate::error::TranslateError;
use tree_sitter::Node;

/// A declared document parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Variable name
    pub name: String,
    /// Declared type, from a `# type:` comment or an annotation
    pub inferred_type: Option<String>,
    /// Default value as source text
    pub default: String,
    /// Help text from the trailing comment
    pub help: String,
}

impl Parameter {
    /// Create a parameter
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        inferred_type: Option<&str>,
        default: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            inferred_type: inferred_type.map(str::to_string),
            default: default.into(),
            help: help.into(),
        }
    }
}

/// Inspect Python parameter-cell source
///
/// Only top-level single-target assignments are considered. Chained
/// assignments and destructuring are skipped with a warning.
///
/// # Errors
///
/// Returns `TranslateError::ParserInit` if the grammar cannot be loaded.
pub fn inspect_python(source: &str) -> Result<Vec<Parameter>, TranslateError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| TranslateError::ParserInit(e.to_string()))?;

    let Some(tree) = parser.parse(source, None) else {
        return Ok(Vec::new());
    };
    let root = tree.root_node();
    let comments = collect_comments(root);

    let mut params = Vec::new();
    let mut cursor = root.walk();
    for stmt in root.named_children(&mut cursor) {
        if stmt.kind() != "expression_statement" {
            continue;
        }
        let Some(assignment) = stmt.named_child(0).filter(|n| n.kind() == "assignment") else {
            continue;
        };
        let (Some(left), Some(right)) = (
            assignment.child_by_field_name("left"),
            assignment.child_by_field_name("right"),
        ) else {
            continue;
        };
        if left.kind() != "identifier" || right.kind() == "assignment" {
            let line = source.lines().nth(stmt.start_position().row).unwrap_or("");
            tracing::warn!(
                "Unable to parse line {} '{}'.",
                stmt.start_position().row + 1,
                line
            );
            continue;
        }

        let annotation = assignment
            .child_by_field_name("type")
            .map(|t| node_text(t, source).trim().to_string())
            .filter(|t| !t.is_empty());

        let trailing = comments.iter().find(|c| {
            c.start_position().row == right.end_position().row && c.start_byte() >= right.end_byte()
        });
        let (type_comment, help) = trailing
            .map(|c| split_type_comment(node_text(*c, source)))
            .unwrap_or_default();

        params.push(Parameter {
            name: node_text(left, source).to_string(),
            inferred_type: type_comment.or(annotation),
            default: reflow(right, source),
            help,
        });
    }
    Ok(params)
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn collect_comments(root: Node<'_>) -> Vec<Node<'_>> {
    let mut comments = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "comment" {
            comments.push(node);
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    comments.sort_by_key(Node::start_byte);
    comments
}

/// Split `# type: T help` into the type token and the remaining help text
fn split_type_comment(comment: &str) -> (Option<String>, String) {
    let body = comment.trim_start_matches('#').trim();
    let Some(rest) = body.strip_prefix("type:") else {
        return (None, body.to_string());
    };
    let rest = rest.trim_start();
    let (type_token, help) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let type_token = (!type_token.is_empty()).then(|| type_token.to_string());
    (type_token, help.trim().to_string())
}

/// Default text for a value node
///
/// A multi-line list, tuple, dictionary or set is rejoined onto one line
/// from its tokens with embedded comments dropped. Every other value,
/// strings and comprehensions included, keeps its source text.
fn reflow(value: Node<'_>, source: &str) -> String {
    let text = node_text(value, source);
    if !text.contains('\n') {
        return text.trim().to_string();
    }
    if !matches!(value.kind(), "list" | "tuple" | "dictionary" | "set") {
        return text.to_string();
    }

    let mut tokens = Vec::new();
    leaf_tokens(value, &mut tokens);

    let mut joined = String::with_capacity(text.len());
    let mut previous: Option<Node<'_>> = None;
    for token in tokens {
        let token_text = node_text(token, source);
        if let Some(previous) = previous {
            let gap = &source[previous.end_byte()..token.start_byte()];
            if !gap.contains('\n') {
                joined.push_str(gap);
            } else {
                let opens = node_text(previous, source).ends_with(|c: char| matches!(c, '(' | '[' | '{' | ','));
                let closes = token_text.starts_with(|c: char| matches!(c, ')' | ']' | '}' | ','));
                if !opens && !closes {
                    joined.push(' ');
                }
            }
        }
        joined.push_str(token_text);
        previous = Some(token);
    }
    joined
}

/// Leaves of `node` in source order; strings count as one token
fn leaf_tokens<'t>(node: Node<'t>, tokens: &mut Vec<Node<'t>>) {
    match node.kind() {
        "comment" => {}
        "string" => tokens.push(node),
        _ if node.child_count() == 0 => tokens.push(node),
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                leaf_tokens(child, tokens);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn inspect(source: &str) -> Vec<Parameter> {
        inspect_python(source).unwrap()
    }

    #[test]
    fn plain_assignment() {
        assert_eq!(inspect("a = 2"), vec![Parameter::new("a", None, "2", "")]);
    }

    #[test]
    fn annotation_and_type_comment() {
        assert_eq!(inspect("a: int = 2"), vec![Parameter::new("a", Some("int"), "2", "")]);
        assert_eq!(inspect("a = 2 # type:int"), vec![Parameter::new("a", Some("int"), "2", "")]);
        assert_eq!(
            inspect("a: float = 2.258 # type: int Nice variable a"),
            vec![Parameter::new("a", Some("int"), "2.258", "Nice variable a")]
        );
    }

    #[test]
    fn help_text() {
        assert_eq!(
            inspect("a = False # Nice variable a"),
            vec![Parameter::new("a", None, "False", "Nice variable a")]
        );
        assert_eq!(
            inspect("a = 'this is a string' # type: int Nice variable a"),
            vec![Parameter::new("a", Some("int"), "'this is a string'", "Nice variable a")]
        );
    }

    #[test]
    fn hash_inside_string_is_not_a_comment() {
        assert_eq!(
            inspect("color = '#ff0000' # Hex color"),
            vec![Parameter::new("color", None, "'#ff0000'", "Hex color")]
        );
    }

    #[test]
    fn single_line_list_keeps_spacing() {
        assert_eq!(
            inspect("a: List[str] = ['this', 'is', 'a', 'string', 'list'] # Nice variable a"),
            vec![Parameter::new(
                "a",
                Some("List[str]"),
                "['this', 'is', 'a', 'string', 'list']",
                "Nice variable a"
            )]
        );
    }

    #[test]
    fn multi_line_list_is_reflowed() {
        let source = "a: List[str] = [\n    'this', # First\n    'is',\n\n    'a',\n    'string',\n    'list' # Last\n] # Nice variable a\n\nb: float = -2.3432 # My b variable\n";
        assert_eq!(
            inspect(source),
            vec![
                Parameter::new(
                    "a",
                    Some("List[str]"),
                    "['this','is','a','string','list']",
                    "Nice variable a"
                ),
                Parameter::new("b", Some("float"), "-2.3432", "My b variable"),
            ]
        );
    }

    #[test]
    fn multi_line_strings_keep_their_text() {
        let source = "query = \"\"\"\nSELECT *\n  FROM t\n\"\"\" # Query\n";
        assert_eq!(
            inspect(source),
            vec![Parameter::new("query", None, "\"\"\"\nSELECT *\n  FROM t\n\"\"\"", "Query")]
        );
    }

    #[test]
    fn comprehensions_keep_their_text() {
        let source = "ids = [i for i\n       in range(3)]\n";
        assert_eq!(
            inspect(source),
            vec![Parameter::new("ids", None, "[i for i\n       in range(3)]", "")]
        );
    }

    #[test]
    fn reflow_separates_words_across_lines() {
        let source = "xs = [\n    a if flag\n    else b, # pick\n    \"\"\"x\n  y\"\"\",\n]\ncfg = {\n    'k':\n        1,\n}\n";
        assert_eq!(
            inspect(source),
            vec![
                Parameter::new("xs", None, "[a if flag else b,\"\"\"x\n  y\"\"\",]", ""),
                Parameter::new("cfg", None, "{'k': 1,}", ""),
            ]
        );
    }

    #[test]
    fn skips_chained_and_non_assignments() {
        let source = "# header\nimport os\nx = y = 3\nprint(x)\nz = 4\n";
        assert_eq!(inspect(source), vec![Parameter::new("z", None, "4", "")]);
    }
}
