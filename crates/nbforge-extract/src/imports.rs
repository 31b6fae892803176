//! Missing references of an analyzed buffer

use crate::availability::ModuleAvailability;
use crate::scope::{ImportRecord, ScopeAnalysis};
use indexmap::IndexSet;
use std::fmt;

/// Something a buffer needs that the target environment does not provide
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MissingRef {
    /// `import module` of a module that does not import
    Module(String),
    /// `from module import symbols` of a module that does not import
    Group {
        /// Dotted module path
        module: String,
        /// Imported symbols
        symbols: Vec<String>,
    },
    /// A call to a name nothing defines or imports
    Definition(String),
}

impl fmt::Display for MissingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(module) => write!(f, "module {module}"),
            Self::Group { module, symbols } => write!(f, "{{{module}: [{}]}}", symbols.join(", ")),
            Self::Definition(symbol) => write!(f, "definition {symbol}"),
        }
    }
}

/// Collect the references `analysis` cannot satisfy in the target environment
///
/// A relative `from . import name` has no module path of its own; each
/// imported name is then treated as a module.
#[must_use]
pub fn missing_references(
    analysis: &ScopeAnalysis,
    availability: &dyn ModuleAvailability,
) -> Vec<MissingRef> {
    let mut missing = IndexSet::new();
    for record in &analysis.imports {
        match record {
            ImportRecord::Module { module, .. } => {
                if !availability.is_available(module) {
                    missing.insert(MissingRef::Module(module.clone()));
                }
            }
            ImportRecord::From { module, symbols } if module.is_empty() => {
                for symbol in symbols.iter().filter(|s| *s != "*") {
                    if !availability.is_available(symbol) {
                        missing.insert(MissingRef::Module(symbol.clone()));
                    }
                }
            }
            ImportRecord::From { module, symbols } => {
                if availability.is_available(module) {
                    continue;
                }
                let named: Vec<String> = symbols.iter().filter(|s| *s != "*").cloned().collect();
                if named.is_empty() {
                    missing.insert(MissingRef::Module(module.clone()));
                } else {
                    missing.insert(MissingRef::Group {
                        module: module.clone(),
                        symbols: named,
                    });
                }
            }
        }
    }
    for call in analysis.unresolved_calls() {
        missing.insert(MissingRef::Definition(call));
    }
    missing.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::StdlibAvailability;
    use crate::scope::analyze;

    fn missing(source: &str) -> Vec<MissingRef> {
        let analysis = analyze(source).unwrap();
        missing_references(&analysis, &StdlibAvailability::new().with_modules(["pandas"]))
    }

    #[test]
    fn available_imports_are_not_missing() {
        assert!(missing("import os\nimport pandas as pd\nfrom collections import OrderedDict\n").is_empty());
    }

    #[test]
    fn classifies_each_reference_kind() {
        let refs = missing(
            "import pkg.config\nfrom helpers import clean, load as ld\nfrom . import siblings\nfrom extras import *\nvalue = transform(clean(1))\n",
        );
        assert_eq!(
            refs,
            vec![
                MissingRef::Module("pkg.config".into()),
                MissingRef::Group {
                    module: "helpers".into(),
                    symbols: vec!["clean".into(), "load".into()],
                },
                MissingRef::Module("siblings".into()),
                MissingRef::Module("extras".into()),
                MissingRef::Definition("transform".into()),
            ]
        );
    }

    #[test]
    fn display_groups_symbols() {
        let group = MissingRef::Group {
            module: "helpers".into(),
            symbols: vec!["clean".into()],
        };
        assert_eq!(group.to_string(), "{helpers: [clean]}");
    }
}
