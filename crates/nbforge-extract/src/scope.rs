//! Flat scope analysis of Python source
//!
//! A single walk over the tree-sitter tree collects every name the source
//! binds, every name it reads (in first-read order), every plain call target
//! and every import. Scopes are not separated: a name bound anywhere in the
//! source counts as bound everywhere in it.

use crate::builtins::is_builtin;
use crate::error::ExtractError;
use indexmap::IndexSet;
use std::collections::VecDeque;
use tree_sitter::Node;

/// One import statement target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRecord {
    /// `import module [as binding]`
    Module {
        /// Dotted module path
        module: String,
        /// Local name the import binds
        binding: String,
    },
    /// `from module import symbol [as binding], ...`
    From {
        /// Dotted module path, leading dots of relative imports stripped
        module: String,
        /// Imported symbols, `*` for a wildcard import
        symbols: Vec<String>,
    },
}

impl ImportRecord {
    /// Dotted module path of the import
    #[inline]
    #[must_use]
    pub fn module(&self) -> &str {
        match self {
            Self::Module { module, .. } | Self::From { module, .. } => module,
        }
    }
}

/// Names bound, read and called by a source buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeAnalysis {
    /// Assigned names, function and class names, parameters
    pub defined: IndexSet<String>,
    /// Local names bound by imports
    pub imported: IndexSet<String>,
    /// Names read, in first-read order
    pub reads: IndexSet<String>,
    /// Names called directly as `name(...)`
    pub calls: IndexSet<String>,
    /// Import statements in source order
    pub imports: Vec<ImportRecord>,
}

impl ScopeAnalysis {
    /// Whether the source binds `name` itself
    #[inline]
    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        self.defined.contains(name) || self.imported.contains(name)
    }

    /// Reads that nothing binds and that are not built-ins
    #[must_use]
    pub fn undefined_names(&self) -> Vec<String> {
        self.reads
            .iter()
            .filter(|name| !self.is_bound(name) && !is_builtin(name))
            .cloned()
            .collect()
    }

    /// Call targets that nothing defines, imports or provides as a built-in
    #[must_use]
    pub fn unresolved_calls(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|name| !self.is_bound(name) && !is_builtin(name))
            .cloned()
            .collect()
    }
}

/// Parse and analyze Python source
///
/// Syntax errors do not stop the analysis; the parts tree-sitter recovered
/// are still walked.
///
/// # Errors
///
/// Returns `ExtractError::ParserInit` if the grammar cannot be loaded.
pub fn analyze(source: &str) -> Result<ScopeAnalysis, ExtractError> {
    let Some(tree) = crate::parse_python(source)? else {
        return Ok(ScopeAnalysis::default());
    };
    Ok(analyze_tree(tree.root_node(), source))
}

/// Analyze an already parsed tree
pub(crate) fn analyze_tree(root: Node<'_>, source: &str) -> ScopeAnalysis {
    let mut collector = Collector {
        source,
        analysis: ScopeAnalysis::default(),
    };
    collector.visit(root);
    collector.analysis
}

/// First ERROR or MISSING node in document order
pub(crate) fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    if !root.has_error() {
        return None;
    }
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev().filter(Node::has_error));
    }
    None
}

struct Collector<'s> {
    source: &'s str,
    analysis: ScopeAnalysis,
}

impl Collector<'_> {
    fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn bind(&mut self, node: Node<'_>) {
        let name = self.text(node).to_string();
        if !name.is_empty() {
            self.analysis.defined.insert(name);
        }
    }

    fn read(&mut self, node: Node<'_>) {
        let name = self.text(node).to_string();
        if !name.is_empty() {
            self.analysis.reads.insert(name);
        }
    }

    fn visit_field(&mut self, node: Node<'_>, field: &str) {
        if let Some(child) = node.child_by_field_name(field) {
            self.visit(child);
        }
    }

    fn visit_children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" | "keyword_identifier" => self.read(node),
            "attribute" => self.visit_field(node, "object"),
            "keyword_argument" => self.visit_field(node, "value"),
            "call" => {
                if let Some(function) = node
                    .child_by_field_name("function")
                    .filter(|f| f.kind() == "identifier")
                {
                    let name = self.text(function).to_string();
                    self.analysis.calls.insert(name);
                }
                self.visit_children(node);
            }
            "assignment" | "augmented_assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.bind_target(left);
                }
                self.visit_field(node, "type");
                self.visit_field(node, "right");
            }
            "for_statement" | "for_in_clause" => {
                let left = node.child_by_field_name("left");
                if let Some(left) = left {
                    self.bind_target(left);
                }
                let mut cursor = node.walk();
                let rest: Vec<Node<'_>> = node
                    .named_children(&mut cursor)
                    .filter(|child| Some(child.id()) != left.map(|l| l.id()))
                    .collect();
                for child in rest {
                    self.visit(child);
                }
            }
            "named_expression" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind(name);
                }
                self.visit_field(node, "value");
            }
            "as_pattern" | "except_clause" | "with_item" => self.visit_as_binding(node),
            "function_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind(name);
                }
                if let Some(params) = node.child_by_field_name("parameters") {
                    self.bind_parameters(params);
                }
                self.visit_field(node, "return_type");
                self.visit_field(node, "body");
            }
            "lambda" => {
                if let Some(params) = node.child_by_field_name("parameters") {
                    self.bind_parameters(params);
                }
                self.visit_field(node, "body");
            }
            "class_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind(name);
                }
                self.visit_field(node, "superclasses");
                self.visit_field(node, "body");
            }
            "global_statement" | "nonlocal_statement" => {
                let mut cursor = node.walk();
                let names: Vec<Node<'_>> = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() == "identifier")
                    .collect();
                for name in names {
                    self.bind(name);
                }
            }
            "import_statement" => self.record_import(node),
            "import_from_statement" => self.record_from_import(node),
            "future_import_statement" | "comment" | "dotted_name" => {}
            _ => self.visit_children(node),
        }
    }

    /// Children after an `as` token are bound, the rest are visited
    fn visit_as_binding(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        let mut bind_next = false;
        for child in children {
            if !child.is_named() {
                bind_next = child.kind() == "as";
                continue;
            }
            if bind_next || child.kind() == "as_pattern_target" {
                self.bind_target(child);
                bind_next = false;
            } else {
                self.visit(child);
            }
        }
    }

    /// Bind an assignment target, breadth-first through nested patterns
    fn bind_target(&mut self, target: Node<'_>) {
        let mut queue = VecDeque::from([target]);
        while let Some(node) = queue.pop_front() {
            match node.kind() {
                "identifier" | "keyword_identifier" => self.bind(node),
                "as_pattern_target" if node.named_child_count() == 0 => self.bind(node),
                "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
                | "expression_list" | "parenthesized_expression" | "list_splat_pattern"
                | "list_splat" | "as_pattern_target" => {
                    let mut cursor = node.walk();
                    queue.extend(node.named_children(&mut cursor));
                }
                "comment" => {}
                _ => self.visit(node),
            }
        }
    }

    fn bind_parameters(&mut self, params: Node<'_>) {
        let mut cursor = params.walk();
        let children: Vec<Node<'_>> = params.named_children(&mut cursor).collect();
        for param in children {
            match param.kind() {
                "identifier" => self.bind(param),
                "typed_parameter" => {
                    let kind = param.child_by_field_name("type");
                    let mut inner = param.walk();
                    let names: Vec<Node<'_>> = param
                        .named_children(&mut inner)
                        .filter(|n| Some(n.id()) != kind.map(|k| k.id()))
                        .collect();
                    for name in names {
                        self.bind_identifiers(name);
                    }
                    if let Some(kind) = kind {
                        self.visit(kind);
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(name) = param.child_by_field_name("name") {
                        self.bind_identifiers(name);
                    }
                    self.visit_field(param, "type");
                    self.visit_field(param, "value");
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => self.bind_identifiers(param),
                "tuple_pattern" => self.bind_target(param),
                _ => {}
            }
        }
    }

    fn bind_identifiers(&mut self, node: Node<'_>) {
        if node.kind() == "identifier" {
            self.bind(node);
            return;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.bind_identifiers(child);
        }
    }

    fn record_import(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let targets: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for target in targets {
            let (module, binding) = match target.kind() {
                "aliased_import" => {
                    let module = target
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let binding = target
                        .child_by_field_name("alias")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_else(|| module.clone());
                    (module, binding)
                }
                _ => {
                    let module = self.text(target).to_string();
                    let binding = module.split('.').next().unwrap_or_default().to_string();
                    (module, binding)
                }
            };
            if module.is_empty() {
                continue;
            }
            self.analysis.imported.insert(binding.clone());
            self.analysis.imports.push(ImportRecord::Module { module, binding });
        }
    }

    fn record_from_import(&mut self, node: Node<'_>) {
        let module = node
            .child_by_field_name("module_name")
            .map(|n| self.text(n).trim_start_matches('.').to_string())
            .unwrap_or_default();

        let mut symbols = Vec::new();
        let mut cursor = node.walk();
        let wildcard = node
            .named_children(&mut cursor)
            .any(|n| n.kind() == "wildcard_import");
        if wildcard {
            symbols.push("*".to_string());
        }

        let mut cursor = node.walk();
        let targets: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for target in targets {
            let (symbol, binding) = match target.kind() {
                "aliased_import" => {
                    let symbol = target
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let binding = target
                        .child_by_field_name("alias")
                        .map_or_else(|| symbol.clone(), |n| self.text(n).to_string());
                    (symbol, binding)
                }
                _ => {
                    let symbol = self.text(target).to_string();
                    (symbol.clone(), symbol)
                }
            };
            if symbol.is_empty() {
                continue;
            }
            self.analysis.imported.insert(binding);
            symbols.push(symbol);
        }

        self.analysis.imports.push(ImportRecord::From { module, symbols });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn undefined(source: &str) -> Vec<String> {
        analyze(source).unwrap().undefined_names()
    }

    #[test]
    fn assignments_bind_names() {
        assert!(undefined("x = 1\ny = x + 1\nx += y\n").is_empty());
        assert_eq!(undefined("y = x + 1\n"), vec!["x"]);
    }

    #[test]
    fn destructuring_and_nested_for_targets() {
        let source = "a, (b, [c, *d]) = items\nfor i, (j, k) in pairs:\n    print(a, b, c, d, i, j, k)\n";
        assert_eq!(undefined(source), vec!["items", "pairs"]);
    }

    #[test]
    fn comprehension_and_walrus_targets() {
        let source = "squares = [n * n for n in range(limit)]\nif (count := len(squares)) > 2:\n    print(count)\n";
        assert_eq!(undefined(source), vec!["limit"]);
    }

    #[test]
    fn with_and_except_bindings() {
        let source = "with open(path) as fh, lock:\n    data = fh.read()\ntry:\n    parse(data)\nexcept ValueError as err:\n    print(err)\n";
        assert_eq!(undefined(source), vec!["path", "lock", "parse"]);
    }

    #[test]
    fn functions_classes_and_lambdas() {
        let source = "def run(df, *args, scale: float = 2.0, **opts):\n    return df * scale + offset\n\nclass Model(Base):\n    pass\n\nf = lambda v, w=1: v + w + run(1)\nModel()\n";
        assert_eq!(undefined(source), vec!["offset", "Base"]);
    }

    #[test]
    fn attributes_and_keyword_names_are_not_reads() {
        let source = "import pandas as pd\nframe = pd.read_csv(path, sep=delim, header=None)\nframe.columns.values\n";
        assert_eq!(undefined(source), vec!["path", "delim"]);
    }

    #[test]
    fn imports_record_modules_symbols_and_aliases() {
        let analysis = analyze(
            "import os.path\nimport numpy as np\nfrom ..pkg.utils import clean as c, load\nfrom helpers import *\n",
        )
        .unwrap();

        assert!(analysis.imported.contains("os"));
        assert!(analysis.imported.contains("np"));
        assert!(analysis.imported.contains("c"));
        assert!(analysis.imported.contains("load"));
        assert_eq!(
            analysis.imports,
            vec![
                ImportRecord::Module { module: "os.path".into(), binding: "os".into() },
                ImportRecord::Module { module: "numpy".into(), binding: "np".into() },
                ImportRecord::From {
                    module: "pkg.utils".into(),
                    symbols: vec!["clean".into(), "load".into()],
                },
                ImportRecord::From { module: "helpers".into(), symbols: vec!["*".into()] },
            ]
        );
    }

    #[test]
    fn global_statements_bind() {
        assert!(undefined("def f():\n    global counter\n    counter = counter + 1\n").is_empty());
    }

    #[test]
    fn calls_are_collected() {
        let analysis = analyze("import json\nresult = helper(json.dumps(x))\nprint(result)\nobj.method()\n").unwrap();
        assert_eq!(analysis.unresolved_calls(), vec!["helper"]);
        assert_eq!(analysis.undefined_names(), vec!["helper", "x", "obj"]);
    }

    #[test]
    fn strings_are_not_reads() {
        assert!(undefined("label = \"name # not a comment\"\n").is_empty());
        assert_eq!(undefined("label = f\"{prefix}-x\"\n"), vec!["prefix"]);
    }

    #[test]
    fn first_error_locates_broken_source() {
        let tree = crate::parse_python("x = (1,\n").unwrap().unwrap();
        assert!(first_error(tree.root_node()).is_some());

        let tree = crate::parse_python("x = (1, 2)\n").unwrap().unwrap();
        assert!(first_error(tree.root_node()).is_none());
    }
}
