//! Cells and cell outputs

use indexmap::IndexSet;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of a cell
///
/// `Markdown` and `Raw` are narrative cells; only `Code` cells execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    /// Executable source
    Code,
    /// Rendered prose
    Markdown,
    /// Unrendered passthrough text
    Raw,
}

impl CellKind {
    /// Wire name of this kind (`cell_type`)
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
        }
    }
}

/// Front-end display hints stored under `metadata.jupyter`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JupyterCellMetadata {
    /// Hide the cell source when rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hidden: Option<bool>,
    /// Hide the cell outputs when rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_hidden: Option<bool>,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-cell metadata
///
/// `tags` and `nbforge` are always present after deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    /// Tag set, insertion ordered
    #[serde(default)]
    pub tags: IndexSet<String>,
    /// Run-specific annotations
    #[serde(default)]
    pub nbforge: Map<String, Value>,
    /// Display hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jupyter: Option<JupyterCellMetadata>,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One output captured while executing a code cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    /// Text written to stdout or stderr
    Stream {
        /// Stream name, `stdout` or `stderr`
        name: String,
        /// Written text
        #[serde(with = "crate::multiline")]
        text: String,
    },
    /// Rich display output
    DisplayData {
        /// Mime bundle
        #[serde(default)]
        data: Map<String, Value>,
        /// Display metadata
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    /// Value of the cell's final expression
    ExecuteResult {
        /// Execution counter of the producing cell
        #[serde(default)]
        execution_count: Option<i64>,
        /// Mime bundle
        #[serde(default)]
        data: Map<String, Value>,
        /// Display metadata
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    /// Raised exception
    Error {
        /// Exception class name
        ename: String,
        /// Exception message
        evalue: String,
        /// Formatted traceback lines
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl Output {
    /// Build a stream output
    #[must_use]
    pub fn stream(name: &str, text: &str) -> Self {
        Self::Stream {
            name: name.to_string(),
            text: text.to_string(),
        }
    }

    /// Build an error output
    #[must_use]
    pub fn error(ename: &str, evalue: &str, traceback: Vec<String>) -> Self {
        Self::Error {
            ename: ename.to_string(),
            evalue: evalue.to_string(),
            traceback,
        }
    }
}

/// A single cell
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Cell {
    /// Stable cell identifier (nbformat 4.5+)
    #[serde(default)]
    pub id: Option<String>,
    /// Cell kind
    #[serde(rename = "cell_type")]
    pub kind: CellKind,
    /// Source text
    #[serde(default, with = "crate::multiline")]
    pub source: String,
    /// Cell metadata
    #[serde(default)]
    pub metadata: CellMetadata,
    /// Execution counter, code cells only
    #[serde(default)]
    pub execution_count: Option<i64>,
    /// Captured outputs, code cells only
    #[serde(default)]
    pub outputs: Vec<Output>,
    /// Fields this crate does not interpret, such as `attachments`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cell {
    /// Create a cell of `kind` with a fresh id
    #[must_use]
    pub fn new(kind: CellKind, source: impl Into<String>) -> Self {
        Self {
            id: Some(new_cell_id()),
            kind,
            source: source.into(),
            metadata: CellMetadata::default(),
            execution_count: None,
            outputs: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Create a code cell
    #[must_use]
    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellKind::Code, source)
    }

    /// Create a markdown cell
    #[must_use]
    pub fn markdown(source: impl Into<String>) -> Self {
        Self::new(CellKind::Markdown, source)
    }

    /// Add a tag, returning the cell
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.insert(tag.into());
        self
    }

    /// Check whether the cell carries `tag`
    #[inline]
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.contains(tag)
    }

    /// Check whether this is a code cell
    #[inline]
    #[must_use]
    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }

    /// Mark the cell source hidden for downstream rendering
    pub fn hide_source(&mut self) {
        self.metadata
            .jupyter
            .get_or_insert_with(JupyterCellMetadata::default)
            .source_hidden = Some(true);
    }
}

/// Generate an 8-hex-character cell id
#[must_use]
pub fn new_cell_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

struct Lines<'a>(&'a str);

impl Serialize for Lines<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        crate::multiline::serialize(self.0, serializer)
    }
}

// Code cells always carry `execution_count` and `outputs`; narrative cells never do.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("cell_type", &self.kind)?;
        if self.kind == CellKind::Code {
            map.serialize_entry("execution_count", &self.execution_count)?;
        }
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        map.serialize_entry("metadata", &self.metadata)?;
        if self.kind == CellKind::Code {
            map.serialize_entry("outputs", &self.outputs)?;
        }
        map.serialize_entry("source", &Lines(&self.source))?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
