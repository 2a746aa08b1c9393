mod helpers;

use helpers::{test_store, DIM};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_corpus(tmp: &TempDir, corpus: serde_json::Value) -> PathBuf {
    let path = tmp.path().join("corpus.json");
    std::fs::write(&path, serde_json::to_vec(&corpus).unwrap()).unwrap();
    path
}

#[test]
fn imports_items_by_id_or_name() {
    let tmp = TempDir::new().unwrap();
    let path = write_corpus(
        &tmp,
        json!({
            "physics": [
                {"id": "gravity", "embedding": [1, 0, 0, 0, 0, 0, 0, 0], "pos": [1, 2, 3, 4], "label": "Gravity"},
                {"name": "inertia", "vector": [0, 1, 0, 0, 0, 0, 0, 0]}
            ],
            "biology": [
                {"id": "cell"}
            ]
        }),
    );

    let store = test_store();
    let report = store.import_corpus(&path, 100).unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(report.skipped, 0);
    assert!(!report.truncated);

    let gravity = store.node("gravity").unwrap().unwrap();
    assert_eq!(gravity.position, [1.0, 2.0, 3.0, 4.0]);
    assert_eq!(gravity.vector[0], 1.0);
    let provenance = gravity.metadata.provenance().unwrap();
    assert_eq!(provenance.source, "bootstrap");
    assert_eq!(provenance.category.as_deref(), Some("physics"));
    assert_eq!(gravity.metadata.extra.get("label"), Some(&json!("Gravity")));

    assert_eq!(store.node("inertia").unwrap().unwrap().vector[1], 1.0);
    let cell = store.node("cell").unwrap().unwrap();
    assert_eq!(cell.vector, vec![0.0; DIM], "missing vector defaults to zeros");
}

#[test]
fn items_without_an_id_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let path = write_corpus(
        &tmp,
        json!({
            "misc": [
                {"embedding": [1, 2]},
                {"id": ""},
                {"id": 42},
                "not an object",
                {"id": "kept"}
            ],
            "broken": "not a list"
        }),
    );

    let store = test_store();
    let report = store.import_corpus(&path, 100).unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 4);
    assert_eq!(store.ids().unwrap(), vec!["kept"]);
}

#[test]
fn wrong_lengths_are_coerced_and_counted() {
    let tmp = TempDir::new().unwrap();
    let path = write_corpus(
        &tmp,
        json!({
            "c": [
                {"id": "short", "embedding": [0.5, 0.5]},
                {"id": "long", "embedding": [1, 1, 1, 1, 1, 1, 1, 1, 1, 1], "pos": [1, 1]}
            ]
        }),
    );

    let store = test_store();
    let report = store.import_corpus(&path, 100).unwrap();
    assert_eq!(report.coerced, 3);
    assert_eq!(store.node("short").unwrap().unwrap().vector.len(), DIM);
    assert_eq!(store.node("long").unwrap().unwrap().position, [1.0, 1.0, 0.0, 0.0]);
}

#[test]
fn import_stops_at_the_cap() {
    let tmp = TempDir::new().unwrap();
    let items: Vec<_> = (0..10).map(|i| json!({"id": format!("n{i}")})).collect();
    let path = write_corpus(&tmp, json!({ "bulk": items }));

    let store = test_store();
    let report = store.import_corpus(&path, 4).unwrap();
    assert_eq!(report.imported, 4);
    assert!(report.truncated);
    assert_eq!(store.len().unwrap(), 4);
}

#[test]
fn reimport_merges_into_existing_nodes() {
    let tmp = TempDir::new().unwrap();
    let path = write_corpus(&tmp, json!({ "a": [{"id": "x", "pos": [5, 0, 0, 0]}] }));

    let store = test_store();
    store.import_corpus(&path, 100).unwrap();
    let report = store.import_corpus(&path, 100).unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(report.imported, 0);
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn non_object_corpus_imports_nothing() {
    let tmp = TempDir::new().unwrap();
    let path = write_corpus(&tmp, json!([1, 2, 3]));
    let report = test_store().import_corpus(&path, 100).unwrap();
    assert_eq!(report.imported, 0);
}
