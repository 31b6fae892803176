//! Storage router integration tests

use nbforge_document::{Cell, Document};
use nbforge_io::{IoError, StorageConfig, StorageHandler, StorageRouter};
use proptest::prelude::*;
use std::sync::Arc;

struct Tagged(String);

impl StorageHandler for Tagged {
    fn name(&self) -> &'static str {
        "Tagged"
    }

    fn read(&self, _path: &str) -> Result<String, IoError> {
        Ok(self.0.clone())
    }

    fn write(&self, _buf: &str, _path: &str) -> Result<(), IoError> {
        Ok(())
    }

    fn list(&self, _path: &str) -> Result<Vec<String>, IoError> {
        Ok(Vec::new())
    }
}

proptest! {
    #[test]
    fn prop_last_registration_wins(generations in 1..6usize) {
        let mut router = StorageRouter::new();
        for generation in 0..generations {
            router.register("s3://", Arc::new(Tagged(format!("gen-{generation}"))));
        }
        let resolved = router.read("s3://bucket/doc.ipynb").unwrap();
        prop_assert_eq!(resolved, format!("gen-{}", generations - 1));
    }
}

#[test]
fn test_default_registration_order() {
    let router = StorageRouter::with_defaults(&StorageConfig::default()).unwrap();
    assert_eq!(
        router.schemes(),
        vec!["-", "https://", "http://", "abs://", "gs://", "minio://", "s3://", "local"]
    );
}

#[test]
fn test_shadowing_a_default_scheme() {
    let mut router = StorageRouter::with_defaults(&StorageConfig::default()).unwrap();
    router.register("gs://", Arc::new(Tagged("custom".into())));
    assert_eq!(router.read("gs://bucket/doc.ipynb").unwrap(), "custom");
}

#[test]
fn test_local_document_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let router = StorageRouter::with_defaults(&StorageConfig::default()).unwrap();
    let doc = Document::new(vec![Cell::code("a = 1").with_tag("parameters")]);

    let path = dir.path().join("out/run.ipynb");
    let path = path.to_str().unwrap();
    router.write_document(&doc, path).unwrap();

    let loaded = router.load_document(path).unwrap();
    assert_eq!(loaded.cells.len(), 1);
    assert!(loaded.cells[0].has_tag("parameters"));
}

#[test]
fn test_list_notebook_files_filters_extensions() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.ipynb", "b.txt", "c.ipynb"] {
        std::fs::write(dir.path().join(name), "{}").unwrap();
    }
    let router = StorageRouter::with_defaults(&StorageConfig::default()).unwrap();
    let listed = router
        .list_notebook_files(dir.path().to_str().unwrap())
        .unwrap();

    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|p| p.ends_with(".ipynb")));
}

#[test]
fn test_stream_listing_is_unsupported() {
    let router = StorageRouter::with_defaults(&StorageConfig::default()).unwrap();
    assert!(matches!(
        router.list("-"),
        Err(IoError::Unsupported { operation: "listdir", .. })
    ));
}

#[test]
fn test_scoped_cwd_resolves_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("params.yaml"), "alpha: 0.1\n").unwrap();
    let router = StorageRouter::with_defaults(&StorageConfig::default()).unwrap();

    let value = {
        let _guard = router.local_cwd(Some(dir.path()));
        router.read_yaml_file("params.yaml").unwrap()
    };
    assert_eq!(value.to_json(), serde_json::json!({"alpha": 0.1}));
    assert!(router.read_yaml_file("params.yaml").is_err());
}
