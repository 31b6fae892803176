//! End-to-end runs through the orchestrator.
//!
//! Guarantees exercised here:
//! - A run injects parameters, executes, extracts tagged units and lays its
//!   products out under `<output>/<run_id>/`.
//! - The first cell error is marked in the document, the document is
//!   persisted, and the error reaches the caller.
//! - A dead runtime is reported as-is with its distinct exit code.
//! - Paths resolve through the storage router, templated by parameters.
//! - Defaults computed from other parameters are bound before the unit.

use nbforge_core::{
    EngineRegistry, NbforgeConfig, NbforgeError, Orchestrator, RunRequest, ERROR_MARKER_TAG,
    INJECTED_PARAMETERS_TAG, INPUT_PATH_PARAMETER, OUTPUT_PATH_PARAMETER,
    RUNTIME_DIED_EXIT_CODE,
};
use nbforge_document::{load, serialize, Cell, ParamValue};
use nbforge_extract::{CellExtractor, ExtractError};
use nbforge_test_utils::{
    etl_document, memory_router, parameters, parameters_cell, python_document, tagged_code, MemoryStorage,
    ScriptedEngine,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn orchestrator(engine: Arc<ScriptedEngine>) -> Orchestrator {
    let mut engines = EngineRegistry::with_defaults("jupyter");
    engines.register(engine);
    Orchestrator::new(NbforgeConfig::new().with_default_engine("scripted"))
        .unwrap()
        .with_engines(engines)
        .with_extractor(CellExtractor::new())
}

fn out_dir(dir: &Path) -> String {
    dir.join("out").to_string_lossy().into_owned()
}

fn only_run_dir(output: &str) -> PathBuf {
    let mut entries: Vec<_> = std::fs::read_dir(output)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1, "expected exactly one run directory");
    entries.remove(0)
}

/// The reference scenario: `a = 1` as parameter default, an `etl` unit that
/// reads `a` and calls an undefined `helper()`.
#[test]
fn etl_unit_is_extracted_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(ScriptedEngine::new());
    let output = out_dir(dir.path());

    let outcome = orchestrator(Arc::clone(&engine))
        .run(
            RunRequest::from_document(etl_document())
                .with_output(output.clone())
                .with_tags(["etl"]),
        )
        .unwrap();

    assert_eq!(engine.calls(), 1);
    assert_eq!(outcome.units.len(), 1);
    assert_eq!(
        outcome.units[0].source,
        "def etl(a=1):\n    helper = None\n    b = a + 1\n    helper()\n"
    );

    let run_dir = format!("{output}/{}", outcome.run_id);
    assert_eq!(
        outcome.artifacts,
        vec![format!("{run_dir}/document.ipynb"), format!("{run_dir}/etl.py")]
    );
    assert_eq!(
        std::fs::read_to_string(format!("{run_dir}/etl.py")).unwrap(),
        outcome.units[0].source
    );

    let saved = load(std::fs::read(format!("{run_dir}/document.ipynb")).unwrap().as_slice()).unwrap();
    assert_eq!(saved.metadata.nbforge.run_id.as_deref(), Some(outcome.run_id.as_str()));
    assert_eq!(saved.cells[0].execution_count, Some(1));
}

/// Injected values become both the injected cell and the unit defaults.
#[test]
fn parameters_are_injected_and_become_unit_defaults() {
    let engine = Arc::new(ScriptedEngine::new());
    let outcome = orchestrator(Arc::clone(&engine))
        .run(
            RunRequest::from_document(etl_document())
                .with_tags(["etl"])
                .with_parameters(parameters(&[("a", ParamValue::Int(5))])),
        )
        .unwrap();

    let executed = engine.last_input().unwrap();
    assert!(executed.cells[1].has_tag(INJECTED_PARAMETERS_TAG));
    assert_eq!(executed.cells[1].source, "# Parameters\na = 5\n");
    assert!(outcome.units[0].source.starts_with("def etl(a=5):\n"));
    assert!(outcome.artifacts.is_empty());
    assert_eq!(
        outcome.document.metadata.nbforge.parameters,
        parameters(&[("a", ParamValue::Int(5))])
    );
}

/// A default computed from another parameter runs as module code first.
#[test]
fn dependent_defaults_are_bound_before_the_unit() {
    let doc = python_document(vec![
        parameters_cell("base = 'data'\nout_dir = base + '/out'"),
        tagged_code("print(out_dir)", "etl"),
    ]);
    let outcome = orchestrator(Arc::new(ScriptedEngine::new()))
        .run(RunRequest::from_document(doc).with_tags(["etl"]))
        .unwrap();

    assert!(outcome.skipped_units.is_empty());
    assert_eq!(
        outcome.units[0].source,
        "base = 'data'\nout_dir = base + '/out'\n\n\ndef etl(base='data', out_dir=out_dir):\n    print(out_dir)\n"
    );
}

/// A failing cell is marked, saved, and surfaced; extraction does not run.
#[test]
fn first_cell_error_is_marked_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let output = out_dir(dir.path());
    let engine = Arc::new(
        ScriptedEngine::new()
            .fail_on("helper()", "NameError", "name 'helper' is not defined")
            .fail_on("never", "KeyError", "unused"),
    );

    let err = orchestrator(engine)
        .run(
            RunRequest::from_document(etl_document())
                .with_output(output.clone())
                .with_tags(["etl"]),
        )
        .unwrap_err();

    let NbforgeError::Execution(error) = &err else {
        panic!("expected an execution error, got {err:?}");
    };
    assert_eq!(error.ename, "NameError");
    assert_eq!(error.exec_count, Some(2));
    assert_eq!(err.exit_code(), 1);

    let run_dir = only_run_dir(&output);
    let saved = load(std::fs::read(run_dir.join("document.ipynb")).unwrap().as_slice()).unwrap();
    assert!(saved.cells[0].has_tag(ERROR_MARKER_TAG));
    assert!(saved.cells[2].has_tag(ERROR_MARKER_TAG));
    assert_eq!(saved.cells[3].source, "b = a + 1\nhelper()");
    assert!(!run_dir.join("etl.py").exists());
}

/// A dead runtime is fatal and nothing is written.
#[test]
fn runtime_death_is_reported_with_its_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = out_dir(dir.path());
    let engine = Arc::new(ScriptedEngine::new().dies("Kernel died"));

    let err = orchestrator(engine)
        .run(RunRequest::from_document(etl_document()).with_output(output.clone()))
        .unwrap_err();

    assert!(matches!(err, NbforgeError::RuntimeDied(_)));
    assert_eq!(err.exit_code(), RUNTIME_DIED_EXIT_CODE);
    assert!(!Path::new(&output).exists());
}

/// Markers from an earlier failed run never reach the engine.
#[test]
fn previous_error_markers_are_stripped_before_execution() {
    let mut doc = etl_document();
    doc.cells.insert(0, Cell::markdown("old summary").with_tag(ERROR_MARKER_TAG));
    doc.cells.insert(2, Cell::markdown("old anchor").with_tag(ERROR_MARKER_TAG));
    let engine = Arc::new(ScriptedEngine::new());

    orchestrator(Arc::clone(&engine))
        .run(RunRequest::from_document(doc))
        .unwrap();

    let executed = engine.last_input().unwrap();
    assert_eq!(executed.cells.len(), 2);
    assert!(!executed.cells.iter().any(|c| c.has_tag(ERROR_MARKER_TAG)));
}

/// Input and output paths are templated by parameters and routed by scheme.
#[test]
fn templated_paths_route_through_storage() {
    let storage = Arc::new(
        MemoryStorage::new().with_file("mem://in/report.ipynb", &serialize(&etl_document()).unwrap()),
    );
    let engine = Arc::new(ScriptedEngine::new());
    let outcome = orchestrator(engine)
        .with_storage(memory_router(Arc::clone(&storage)))
        .run(
            RunRequest::from_path("mem://in/{name}.ipynb")
                .with_output("mem://out/{name}")
                .with_tags(["etl"])
                .with_parameters(parameters(&[("name", ParamValue::Str("report".into()))])),
        )
        .unwrap();

    let run_dir = format!("mem://out/report/{}", outcome.run_id);
    assert_eq!(
        storage.paths(),
        vec![
            "mem://in/report.ipynb".to_string(),
            format!("{run_dir}/etl.py"),
            format!("{run_dir}/report.ipynb"),
        ]
    );
    assert_eq!(
        outcome.document.metadata.nbforge.input_path.as_deref(),
        Some("mem://in/report.ipynb")
    );
}

/// Path injection sits below caller parameters.
#[test]
fn paths_are_injected_on_request() {
    let storage = Arc::new(
        MemoryStorage::new().with_file("mem://in.ipynb", &serialize(&etl_document()).unwrap()),
    );
    let outcome = orchestrator(Arc::new(ScriptedEngine::new()))
        .with_storage(memory_router(storage))
        .run(
            RunRequest::from_path("mem://in.ipynb")
                .with_output("mem://out")
                .with_inject_paths(true, true),
        )
        .unwrap();

    let recorded = &outcome.document.metadata.nbforge.parameters;
    assert_eq!(recorded[INPUT_PATH_PARAMETER], ParamValue::Str("mem://in.ipynb".into()));
    assert_eq!(recorded[OUTPUT_PATH_PARAMETER], ParamValue::Str("mem://out".into()));
}

/// Project files satisfying a unit's missing import are bundled beside it.
#[test]
fn resolved_project_files_are_bundled() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("helpers.py"), "def helper():\n    return 1\n").unwrap();
    let out = tempfile::tempdir().unwrap();
    let output = out_dir(out.path());

    let doc = python_document(vec![tagged_code("from helpers import helper\nhelper()", "etl")]);
    let outcome = orchestrator(Arc::new(ScriptedEngine::new()))
        .with_extractor(CellExtractor::new().with_project_dir(Some(project.path().to_path_buf())))
        .run(
            RunRequest::from_document(doc)
                .with_output(output.clone())
                .with_tags(["etl"]),
        )
        .unwrap();

    let run_dir = format!("{output}/{}", outcome.run_id);
    assert!(outcome.artifacts.contains(&format!("{run_dir}/helpers.py")));
    assert_eq!(
        std::fs::read_to_string(format!("{run_dir}/helpers.py")).unwrap(),
        "def helper():\n    return 1\n"
    );
}

/// Extraction is refused before execution for languages it cannot analyze.
#[test]
fn non_python_extraction_fails_before_execution() {
    let doc = nbforge_document::Document::new(vec![tagged_code("x <- 1", "etl")]).with_kernel("ir", "R");
    let engine = Arc::new(ScriptedEngine::new());

    let err = orchestrator(Arc::clone(&engine))
        .run(RunRequest::from_document(doc).with_tags(["etl"]))
        .unwrap_err();

    assert!(matches!(err, NbforgeError::Extract(ExtractError::UnsupportedLanguage(ref l)) if l == "R"));
    assert_eq!(engine.calls(), 0);
}

/// Report mode hides every code cell's source.
#[test]
fn report_mode_hides_code() {
    let engine = Arc::new(ScriptedEngine::new());
    orchestrator(Arc::clone(&engine))
        .run(RunRequest::from_document(etl_document()).with_report_mode(true))
        .unwrap();

    let executed = engine.last_input().unwrap();
    assert!(executed
        .cells
        .iter()
        .all(|c| c.metadata.jupyter.as_ref().and_then(|j| j.source_hidden) == Some(true)));
}

/// Engine selection is by name; unknown names fail.
#[test]
fn unknown_engine_is_rejected() {
    let err = orchestrator(Arc::new(ScriptedEngine::new()))
        .run(RunRequest::from_document(etl_document()).with_engine("missing"))
        .unwrap_err();
    assert!(matches!(err, NbforgeError::NoEngine(ref name) if name == "missing"));
}

/// The passthrough engine converts without executing.
#[test]
fn passthrough_engine_returns_the_prepared_document() {
    let outcome = orchestrator(Arc::new(ScriptedEngine::new()))
        .run(
            RunRequest::from_document(etl_document())
                .with_engine("passthrough")
                .with_parameters(parameters(&[("a", ParamValue::Int(2))])),
        )
        .unwrap();
    assert_eq!(outcome.document.cells.len(), 3);
    assert_eq!(outcome.document.cells[1].execution_count, None);
}
