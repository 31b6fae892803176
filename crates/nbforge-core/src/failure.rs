//! Execution failure post-processing
//!
//! After execution the first error output (ignoring a clean `SystemExit`)
//! becomes an [`ExecutionError`], and two narrative marker cells point the
//! reader at the failing cell.

use nbforge_document::{Cell, Document, Output};

/// Tag carried by the inserted marker cells
pub const ERROR_MARKER_TAG: &str = "nbforge-error-cell-tag";

const ERROR_STYLE: &str =
    "style=\"color:red; font-family:Helvetica Neue, Helvetica, Arial, sans-serif; font-size:2em;\"";

/// A cell error captured from an executed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Index of the failing cell
    pub cell_index: usize,
    /// Execution counter of the failing cell
    pub exec_count: Option<i64>,
    /// Source of the failing cell
    pub source: String,
    /// Exception name
    pub ename: String,
    /// Exception value
    pub evalue: String,
    /// Traceback lines
    pub traceback: Vec<String>,
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\n{rule}\nException encountered at \"In [{count}]\":\n{trace}\n",
            rule = "-".repeat(75),
            count = exec_count_label(&self.exec_count),
            trace = traceback_text(&self.traceback)
        )
    }
}

impl std::error::Error for ExecutionError {}

fn exec_count_label(exec_count: &Option<i64>) -> String {
    exec_count.map_or_else(|| "None".to_string(), |n| n.to_string())
}

fn traceback_text(traceback: &[String]) -> String {
    traceback.join("\n")
}

fn is_clean_exit(ename: &str, evalue: &str) -> bool {
    ename == "SystemExit" && (evalue.is_empty() || evalue == "0")
}

/// First error output in document order
#[must_use]
pub fn find_execution_error(doc: &Document) -> Option<ExecutionError> {
    doc.cells.iter().enumerate().find_map(|(index, cell)| {
        cell.outputs.iter().find_map(|output| match output {
            Output::Error {
                ename,
                evalue,
                traceback,
            } if !is_clean_exit(ename, evalue) => Some(ExecutionError {
                cell_index: index,
                exec_count: cell.execution_count,
                source: cell.source.clone(),
                ename: ename.clone(),
                evalue: evalue.clone(),
                traceback: traceback.clone(),
            }),
            _ => None,
        })
    })
}

/// Insert the summary and anchor cells for `error`
///
/// The anchor goes immediately before the failing cell; the summary goes
/// at the top and links to it.
pub fn mark_execution_error(doc: &mut Document, error: &ExecutionError) {
    let summary = format!(
        "<span {ERROR_STYLE}>An Exception was encountered at '<a href=\"#nbforge-error-cell\">In [{}]</a>'.</span>",
        exec_count_label(&error.exec_count)
    );
    let anchor = format!(
        "<span id=\"nbforge-error-cell\" {ERROR_STYLE}>Execution using nbforge encountered an exception here and stopped:</span>"
    );

    let index = error.cell_index.min(doc.cells.len());
    doc.cells
        .insert(index, Cell::markdown(anchor).with_tag(ERROR_MARKER_TAG));
    doc.cells
        .insert(0, Cell::markdown(summary).with_tag(ERROR_MARKER_TAG));
}

/// Remove marker cells left by a previous failed run
///
/// Returns the number of removed cells.
pub fn strip_error_markers(doc: &mut Document) -> usize {
    let before = doc.cells.len();
    doc.cells.retain(|cell| !cell.has_tag(ERROR_MARKER_TAG));
    before - doc.cells.len()
}
