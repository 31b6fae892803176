//! Project import resolution
//!
//! Finds the project source files that satisfy a unit's missing references
//! and, transitively, the missing references of those files.

use crate::availability::ModuleAvailability;
use crate::error::ExtractError;
use crate::imports::{missing_references, MissingRef};
use crate::scope::analyze;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// Default bound on transitive expansion
pub const DEFAULT_MAX_DEPTH: usize = 8;

const SKIPPED_DIRS: &[&str] = &["venv", "env", "site-packages", "__pycache__"];

struct Candidate {
    path: PathBuf,
    components: Vec<String>,
}

/// Resolves missing references against a project directory
pub struct ImportResolver {
    project_dir: PathBuf,
    availability: Arc<dyn ModuleAvailability>,
    max_depth: usize,
}

impl std::fmt::Debug for ImportResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportResolver")
            .field("project_dir", &self.project_dir)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl ImportResolver {
    /// Resolve against `project_dir`
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>, availability: Arc<dyn ModuleAvailability>) -> Self {
        Self {
            project_dir: project_dir.into(),
            availability,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Bound transitive expansion to `depth` levels below the unit
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Project directory searched
    #[inline]
    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Resolve the missing references of a source buffer
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::ParserInit` if the grammar cannot be loaded.
    pub fn resolve(&self, source: &str) -> Result<Vec<PathBuf>, ExtractError> {
        let analysis = analyze(source)?;
        let missing = missing_references(&analysis, self.availability.as_ref());
        self.resolve_refs(&missing)
    }

    /// Resolve already classified references
    ///
    /// Returns canonical paths of the matched files in match order. Each
    /// matched file is expanded at most once.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::ParserInit` if the grammar cannot be loaded.
    pub fn resolve_refs(&self, refs: &[MissingRef]) -> Result<Vec<PathBuf>, ExtractError> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        if !self.project_dir.is_dir() {
            tracing::warn!(
                project_dir = %self.project_dir.display(),
                "project directory not found, missing imports stay unresolved"
            );
            return Ok(Vec::new());
        }

        let candidates = self.candidates();
        let mut contents: HashMap<PathBuf, Option<String>> = HashMap::new();
        let mut matched = IndexSet::new();
        let mut expanded = HashSet::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<(MissingRef, usize)> = refs.iter().rev().cloned().map(|r| (r, 0)).collect();

        while let Some((reference, depth)) = stack.pop() {
            if !seen.insert(reference.clone()) {
                continue;
            }
            let Some(candidate) = candidates
                .iter()
                .find(|c| matches_reference(c, &reference, &mut contents))
            else {
                tracing::debug!(reference = %reference, "no project file satisfies the reference");
                continue;
            };
            tracing::debug!(reference = %reference, file = %candidate.path.display(), "resolved");
            matched.insert(candidate.path.clone());

            if depth >= self.max_depth || !expanded.insert(candidate.path.clone()) {
                continue;
            }
            let Some(text) = read_cached(&mut contents, &candidate.path).map(str::to_string) else {
                continue;
            };
            let analysis = analyze(&text)?;
            let nested = missing_references(&analysis, self.availability.as_ref());
            stack.extend(nested.into_iter().rev().map(|r| (r, depth + 1)));
        }

        Ok(matched.into_iter().collect())
    }

    fn candidates(&self) -> Vec<Candidate> {
        let walker = WalkDir::new(&self.project_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry));

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable project entry");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.project_dir) else {
                continue;
            };
            let mut components: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            if let Some(last) = components.last_mut() {
                if let Some(stem) = last.strip_suffix(".py") {
                    *last = stem.to_string();
                }
            }
            candidates.push(Candidate {
                path: fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
                components,
            });
        }
        candidates
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&&*name)
}

fn read_cached<'c>(cache: &'c mut HashMap<PathBuf, Option<String>>, path: &Path) -> Option<&'c str> {
    cache
        .entry(path.to_path_buf())
        .or_insert_with(|| match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "cannot read project file");
                None
            }
        })
        .as_deref()
}

/// `pkg.utils` matches `.../pkg/utils.py` and `.../pkg/utils/__init__.py`
fn module_matches(candidate: &Candidate, module: &str) -> bool {
    let wanted: Vec<&str> = module.split('.').filter(|s| !s.is_empty()).collect();
    if wanted.is_empty() {
        return false;
    }
    let components: Vec<&str> = candidate.components.iter().map(String::as_str).collect();
    let module_path = match components.split_last() {
        Some((&"__init__", package)) => package,
        _ => components.as_slice(),
    };
    module_path.ends_with(&wanted)
}

fn defines_symbol(text: &str, symbol: &str) -> bool {
    let symbol = regex::escape(symbol);
    let pattern = format!(r"(?m)^(?:async\s+)?def\s+{symbol}\b|^class\s+{symbol}\b|^{symbol}\s*(?::[^=\n]*)?=");
    regex::Regex::new(&pattern).is_ok_and(|re| re.is_match(text))
}

fn matches_reference(
    candidate: &Candidate,
    reference: &MissingRef,
    contents: &mut HashMap<PathBuf, Option<String>>,
) -> bool {
    match reference {
        MissingRef::Module(module) => module_matches(candidate, module),
        MissingRef::Group { module, symbols } => {
            module_matches(candidate, module)
                && read_cached(contents, &candidate.path)
                    .is_some_and(|text| symbols.iter().any(|s| text.contains(s.as_str())))
        }
        MissingRef::Definition(symbol) => read_cached(contents, &candidate.path)
            .is_some_and(|text| defines_symbol(text, symbol)),
    }
}
